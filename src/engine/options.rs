//! Matching options
//!
//! [`Options`] is what callers build; [`GlobalState`] is the validated form
//! one invocation runs with, after the region has been checked against the
//! text.

use super::error::{GrammarError, Result};
use serde::{Deserialize, Serialize};

/// Default cap on same-rule recursion at one offset
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 3;
/// Studying is on unless turned off
pub const DEFAULT_STUDY: bool = true;
/// Overlapping matches are off unless turned on
pub const DEFAULT_ALLOW_OVERLAP: bool = false;
/// Every result at a start offset is reported, not only the widest
pub const DEFAULT_LONGEST_MATCH: bool = false;

/// Configuration for one matching invocation
///
/// # Example
///
/// ```
/// use grammatic::Options;
///
/// let opts = Options::new()
///     .with_start(2)
///     .with_allow_overlap(true)
///     .with_study(false);
/// assert_eq!(opts.start, 2);
/// assert!(opts.allow_overlap);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// First offset of the region to match
    pub start: usize,
    /// End of the region; the end of the text when `None`
    pub end: Option<usize>,
    /// Report every result at every start offset
    pub allow_overlap: bool,
    /// Pre-scan terminals before matching
    pub study: bool,
    /// Keep only the widest results at each start offset
    pub longest_match: bool,
    /// Track the non-root match reaching furthest right
    pub keep_rightmost: bool,
    /// How often one rule may recurse into itself at one offset
    pub max_recursion_depth: usize,
    /// Record a trace of matcher events
    pub trace: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            start: 0,
            end: None,
            allow_overlap: DEFAULT_ALLOW_OVERLAP,
            study: DEFAULT_STUDY,
            longest_match: DEFAULT_LONGEST_MATCH,
            keep_rightmost: false,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            trace: false,
        }
    }
}

impl Options {
    /// Options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the region start
    pub fn with_start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    /// Set the region end
    pub fn with_end(mut self, end: usize) -> Self {
        self.end = Some(end);
        self
    }

    /// Allow or forbid overlapping results
    pub fn with_allow_overlap(mut self, allow: bool) -> Self {
        self.allow_overlap = allow;
        self
    }

    /// Turn studying on or off
    pub fn with_study(mut self, study: bool) -> Self {
        self.study = study;
        self
    }

    /// Keep only the widest results at each offset
    pub fn with_longest_match(mut self, longest: bool) -> Self {
        self.longest_match = longest;
        self
    }

    /// Track the rightmost match
    pub fn with_keep_rightmost(mut self, keep: bool) -> Self {
        self.keep_rightmost = keep;
        self
    }

    /// Set the recursion cap
    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    /// Turn tracing on or off
    pub fn trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Every result at every offset: overlap on, longest match off
    pub fn match_all(mut self) -> Self {
        self.allow_overlap = true;
        self.longest_match = false;
        self
    }

    /// Check the options against a text of `len` bytes
    pub fn resolve(&self, text: &str) -> Result<GlobalState> {
        let len = text.len();
        if self.start > len {
            return Err(GrammarError::InvalidOptions {
                reason: format!("start offset {} beyond end of text ({})", self.start, len),
            });
        }
        if !text.is_char_boundary(self.start) {
            return Err(GrammarError::InvalidOptions {
                reason: format!("start offset {} is not on a character boundary", self.start),
            });
        }
        let end = match self.end {
            Some(end) if end <= self.start => {
                return Err(GrammarError::InvalidOptions {
                    reason: "end offset must follow start".to_string(),
                })
            }
            Some(end) => end.min(len),
            None => len,
        };
        if !text.is_char_boundary(end) {
            return Err(GrammarError::InvalidOptions {
                reason: format!("end offset {} is not on a character boundary", end),
            });
        }
        Ok(GlobalState {
            start: self.start,
            end,
            allow_overlap: self.allow_overlap,
            study: self.study,
            longest_match: self.longest_match,
            keep_rightmost: self.keep_rightmost,
            max_depth: self.max_recursion_depth,
            trace: self.trace,
        })
    }
}

/// Validated options of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalState {
    /// Region start
    pub start: usize,
    /// Region end, within the text
    pub end: usize,
    /// Report every result at every start
    pub allow_overlap: bool,
    /// Terminals are pre-scanned
    pub study: bool,
    /// Only the widest results per start
    pub longest_match: bool,
    /// Rightmost match tracking
    pub keep_rightmost: bool,
    /// Recursion cap
    pub max_depth: usize,
    /// Trace recording
    pub trace: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let o = Options::default();
        assert_eq!(o.start, 0);
        assert_eq!(o.end, None);
        assert!(o.study);
        assert!(!o.allow_overlap);
        assert!(!o.longest_match);
        assert_eq!(o.max_recursion_depth, 3);
    }

    #[test]
    fn test_match_all() {
        let o = Options::new().with_longest_match(true).match_all();
        assert!(o.allow_overlap);
        assert!(!o.longest_match);
    }

    #[test]
    fn test_resolve_region() {
        let gs = Options::new().resolve("abc").unwrap();
        assert_eq!((gs.start, gs.end), (0, 3));
        let gs = Options::new().with_start(1).with_end(99).resolve("abc").unwrap();
        assert_eq!((gs.start, gs.end), (1, 3));
        let gs = Options::new().with_start(3).resolve("abc").unwrap();
        assert_eq!((gs.start, gs.end), (3, 3));
        assert!(Options::new().resolve("").is_ok());
    }

    #[test]
    fn test_resolve_errors() {
        assert!(matches!(
            Options::new().with_start(4).resolve("abc"),
            Err(GrammarError::InvalidOptions { .. })
        ));
        assert!(matches!(
            Options::new().with_start(2).with_end(2).resolve("abc"),
            Err(GrammarError::InvalidOptions { .. })
        ));
        assert!(Options::new().with_start(1).resolve("é").is_err());
    }

    #[test]
    fn test_serde() {
        let o = Options::new().with_end(5).trace(true);
        let json = serde_json::to_string(&o).unwrap();
        let back: Options = serde_json::from_str(&json).unwrap();
        assert_eq!(o, back);
    }
}
