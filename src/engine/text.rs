//! Forward and reversed views of the text being matched
//!
//! Matching works on byte offsets into a haystack. The forward haystack is
//! the caller's text; the reversed haystack is the same text with its
//! characters in reverse order, built at most once per invocation. A
//! [`View`] selects a window of one haystack, and reversing a view at a
//! position gives the window of the opposite haystack that reads the text
//! before that position backward. Reversing twice lands on the forward
//! haystack again, which is how lookaheads inside lookbehinds work.

use std::cell::OnceCell;

/// Text of one invocation, forward and (lazily) reversed
#[derive(Debug)]
pub(crate) struct Text<'t> {
    forward: &'t str,
    reversed: OnceCell<String>,
}

impl<'t> Text<'t> {
    pub(crate) fn new(forward: &'t str) -> Self {
        Self {
            forward,
            reversed: OnceCell::new(),
        }
    }

    /// Length in bytes
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.forward.len()
    }

    #[inline]
    pub(crate) fn forward(&self) -> &'t str {
        self.forward
    }

    /// The haystack a view reads from
    pub(crate) fn haystack(&self, reversed: bool) -> &str {
        if reversed {
            self.reversed
                .get_or_init(|| self.forward.chars().rev().collect())
        } else {
            self.forward
        }
    }
}

/// Window onto a haystack: view offset `i` is haystack offset `shift + i`
///
/// Offsets below `floor` lie before the matching region; nothing reads
/// backward past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct View {
    pub(crate) reversed: bool,
    pub(crate) shift: usize,
    pub(crate) len: usize,
    pub(crate) floor: usize,
}

impl View {
    /// The forward view of `[0, end)`
    #[cfg(test)]
    pub(crate) fn forward(end: usize) -> Self {
        Self::region(0, end)
    }

    /// The forward view of `[0, end)` whose region begins at `start`
    pub(crate) fn region(start: usize, end: usize) -> Self {
        Self {
            reversed: false,
            shift: 0,
            len: end,
            floor: start.min(end),
        }
    }

    /// The view reading backward from `pos` down to the floor
    ///
    /// `total` is the length of the whole text.
    pub(crate) fn reverse_at(&self, pos: usize, total: usize) -> Self {
        Self {
            reversed: !self.reversed,
            shift: total - (self.shift + pos),
            len: pos.saturating_sub(self.floor),
            floor: 0,
        }
    }

    /// Text from view offset `start` to the end of the view
    #[inline]
    pub(crate) fn rest<'h>(&self, haystack: &'h str, start: usize) -> &'h str {
        &haystack[self.shift + start..self.shift + self.len]
    }

    /// Text of `[start, end)` in view offsets
    #[inline]
    pub(crate) fn slice<'h>(&self, haystack: &'h str, start: usize, end: usize) -> &'h str {
        &haystack[self.shift + start..self.shift + end]
    }

    /// Haystack offsets of view span `[start, end)` translated to the
    /// forward text
    pub(crate) fn forward_span(&self, start: usize, end: usize, total: usize) -> (usize, usize) {
        if self.reversed {
            (total - (self.shift + end), total - (self.shift + start))
        } else {
            (self.shift + start, self.shift + end)
        }
    }

    /// Byte length of the character starting at view offset `pos`
    pub(crate) fn char_len_at(&self, haystack: &str, pos: usize) -> usize {
        self.rest(haystack, pos)
            .chars()
            .next()
            .map_or(1, char::len_utf8)
    }
}
