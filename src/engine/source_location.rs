//! Line/column positions in grammar text
//!
//! Used to point rule-text syntax errors at the offending character.

use std::fmt;

/// A position in grammar source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    /// Byte offset from start of input
    pub offset: usize,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based, counted in characters)
    pub column: usize,
}

impl SourcePosition {
    /// Calculate position from an offset in the input
    pub fn from_offset(input: &str, offset: usize) -> Self {
        let offset = offset.min(input.len());
        let before = &input[..floor_boundary(input, offset)];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Self {
            offset,
            line,
            column,
        }
    }

    /// The line containing this position with a caret under the column
    pub fn caret(&self, input: &str) -> String {
        let line = line_at_offset(input, self.offset);
        let mut out = String::with_capacity(line.len() * 2 + 2);
        out.push_str(line);
        out.push('\n');
        for _ in 1..self.column {
            out.push(' ');
        }
        out.push('^');
        out
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

fn floor_boundary(input: &str, mut offset: usize) -> usize {
    while offset > 0 && !input.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// The full line containing `offset`, without its terminator
pub fn line_at_offset(input: &str, offset: usize) -> &str {
    let offset = floor_boundary(input, offset.min(input.len()));
    let start = input[..offset].rfind('\n').map_or(0, |i| i + 1);
    let end = input[offset..]
        .find('\n')
        .map_or(input.len(), |i| offset + i);
    &input[start..end]
}
