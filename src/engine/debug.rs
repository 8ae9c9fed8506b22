//! Developer tools
//!
//! - [`TreePrinter`]: indented rendering of a parse tree
//! - [`MatchTrace`]: step-by-step record of matcher activity, enabled with
//!   [`Options::trace`](crate::Options::trace)

use super::grammar::Grammar;
use super::matches::Match;
use super::rule::RuleId;
use std::fmt::Write;

/// Parse tree pretty printer
pub struct TreePrinter {
    /// Indentation string
    indent: String,
    /// Maximum depth to print
    max_depth: Option<usize>,
}

impl TreePrinter {
    /// Create a new tree printer
    pub fn new() -> Self {
        Self {
            indent: "  ".to_string(),
            max_depth: None,
        }
    }

    /// Set the indentation string
    pub fn indent(mut self, indent: &str) -> Self {
        self.indent = indent.to_string();
        self
    }

    /// Set the maximum depth to print
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Render `m`, found by `grammar` in `text`
    pub fn print(&self, m: &Match, grammar: &Grammar, text: &str) -> String {
        let mut output = String::new();
        self.print_node(m, grammar, text, 0, &mut output);
        output
    }

    fn print_node(&self, m: &Match, grammar: &Grammar, text: &str, depth: usize, output: &mut String) {
        let indent = self.indent.repeat(depth);
        if self.max_depth.is_some_and(|max| depth > max) {
            let _ = writeln!(output, "{}...", indent);
            return;
        }
        let _ = writeln!(
            output,
            "{}{} {:?} @ {}..{}",
            indent,
            grammar.graph().display_name(m.rule()),
            text.get(m.start()..m.end()).unwrap_or(""),
            m.start(),
            m.end()
        );
        for child in m.children() {
            self.print_node(child, grammar, text, depth + 1, output);
        }
    }
}

impl Default for TreePrinter {
    fn default() -> Self {
        Self::new()
    }
}

/// Debug trace of one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchTrace {
    /// Trace entries in the order they happened
    pub entries: Vec<TraceEntry>,
}

/// A single trace entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    /// Offset the matcher works at
    pub offset: usize,
    /// Rule being matched
    pub rule: RuleId,
    /// What happened
    pub action: TraceAction,
    /// Nesting depth
    pub depth: usize,
    /// Whether the matcher was scanning the reversed text
    pub reversed: bool,
}

/// Trace action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceAction {
    /// A matcher was asked for a result
    Enter,
    /// It produced one
    Match {
        /// End offset of the result
        end: usize,
    },
    /// It is exhausted
    Fail,
    /// A recursion cut stopped it
    DepthCut,
}

impl MatchTrace {
    /// Create a new empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry
    pub fn add(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Format as a readable string
    pub fn format(&self, grammar: &Grammar) -> String {
        let mut output = String::new();
        for entry in &self.entries {
            let indent = "  ".repeat(entry.depth);
            let name = grammar.graph().display_name(entry.rule);
            let direction = if entry.reversed { " (reversed)" } else { "" };
            let _ = match entry.action {
                TraceAction::Enter => writeln!(
                    output,
                    "{}-> {} at {}{}",
                    indent, name, entry.offset, direction
                ),
                TraceAction::Match { end } => {
                    writeln!(output, "{}   match {}..{}", indent, entry.offset, end)
                }
                TraceAction::Fail => writeln!(output, "{}   fail", indent),
                TraceAction::DepthCut => writeln!(output, "{}   recursion cut", indent),
            };
        }
        output
    }
}
