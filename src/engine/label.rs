//! Rule identities
//!
//! Every rule carries a [`Label`]. Named rules get explicit labels, the
//! designated root gets a root label, and anonymous constituents built by
//! the compiler get implicit labels whose id is a readable rendering of
//! their shape. References that have not been resolved yet stay
//! indeterminate until the compiler finds their definition.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Kind of a label, in diagnostic order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LabelKind {
    /// The designated root rule
    Root,
    /// A rule named in the grammar
    Explicit,
    /// A compiler-generated anonymous rule
    Implicit,
    /// A reference whose definition has not been seen yet
    Indeterminate,
}

/// Identity of a rule: a kind plus a string id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    /// Kind of label
    pub kind: LabelKind,
    /// Rule name or shape rendering
    pub id: String,
}

impl Label {
    /// Create a label of the given kind
    pub fn new(kind: LabelKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Label of a named rule
    pub fn explicit(id: impl Into<String>) -> Self {
        Self::new(LabelKind::Explicit, id)
    }

    /// Label of an anonymous rule
    pub fn implicit(id: impl Into<String>) -> Self {
        Self::new(LabelKind::Implicit, id)
    }

    /// Label of the root rule
    pub fn root(id: impl Into<String>) -> Self {
        Self::new(LabelKind::Root, id)
    }

    /// Whether this label names a rule the grammar author wrote
    #[inline]
    pub fn is_named(&self) -> bool {
        matches!(self.kind, LabelKind::Root | LabelKind::Explicit)
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LabelKind::Root | LabelKind::Explicit | LabelKind::Indeterminate => {
                write!(f, "<{}>", self.id)
            }
            LabelKind::Implicit => f.write_str(&self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_ordering() {
        let mut labels = vec![
            Label::implicit("\"a\""),
            Label::explicit("b"),
            Label::root("ROOT"),
            Label::explicit("a"),
        ];
        labels.sort();
        let ids: Vec<&str> = labels.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["ROOT", "a", "b", "\"a\""]);
    }

    #[test]
    fn test_label_display() {
        assert_eq!(Label::explicit("foo").to_string(), "<foo>");
        assert_eq!(Label::root("ROOT").to_string(), "<ROOT>");
        assert_eq!(Label::implicit("[a|b]").to_string(), "[a|b]");
    }

    #[test]
    fn test_is_named() {
        assert!(Label::root("r").is_named());
        assert!(Label::explicit("r").is_named());
        assert!(!Label::implicit("r").is_named());
    }
}
