//! Match nodes
//!
//! A [`Match`] is one node of a parse tree: the rule that produced it, its
//! offsets and its children. Nodes are immutable once built, so the end
//! offset and the child list are each set exactly once, at construction.
//! Children are shared behind an `Arc` because backtracking matchers hand
//! out the same prefix of results many times.

use super::rule::RuleId;
use std::sync::Arc;

/// A node in a parse tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    rule: RuleId,
    start: usize,
    end: usize,
    children: Option<Arc<[Match]>>,
}

impl Match {
    /// A node without children
    #[inline]
    pub fn leaf(rule: RuleId, start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self {
            rule,
            start,
            end,
            children: None,
        }
    }

    /// A node with children
    pub fn with_children(rule: RuleId, start: usize, end: usize, children: Vec<Match>) -> Self {
        debug_assert!(start <= end);
        debug_assert!(children.iter().all(|c| c.start >= start && c.end <= end));
        Self {
            rule,
            start,
            end,
            children: if children.is_empty() {
                None
            } else {
                Some(children.into())
            },
        }
    }

    /// A zero-width node at `offset`
    #[inline]
    pub fn empty(rule: RuleId, offset: usize) -> Self {
        Self::leaf(rule, offset, offset)
    }

    /// Zero-width node of a positive assertion, holding what the assertion saw
    ///
    /// The only kind of node whose child may lie outside it.
    pub(crate) fn lookaround(rule: RuleId, offset: usize, seen: Match) -> Self {
        Self {
            rule,
            start: offset,
            end: offset,
            children: Some(Arc::from(vec![seen])),
        }
    }

    /// The same node attributed to another rule
    pub(crate) fn with_rule(mut self, rule: RuleId) -> Self {
        self.rule = rule;
        self
    }

    /// Rule that produced this node
    #[inline]
    pub fn rule(&self) -> RuleId {
        self.rule
    }

    /// Start offset (byte index into the input)
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// End offset, exclusive
    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Width in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the node covers no input
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Alias of [`is_empty`](Self::is_empty) matching the grammar vocabulary
    #[inline]
    pub fn is_zero_width(&self) -> bool {
        self.is_empty()
    }

    /// Child nodes in input order
    #[inline]
    pub fn children(&self) -> &[Match] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// The `i`th child
    #[inline]
    pub fn child(&self, i: usize) -> Option<&Match> {
        self.children().get(i)
    }

    /// Whether this node has no children
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// The text this node covers
    ///
    /// `input` must be the text the match was produced from.
    pub fn group<'t>(&self, input: &'t str) -> &'t str {
        &input[self.start..self.end]
    }

    /// All leaf nodes, left to right
    pub fn leaves(&self) -> Vec<&Match> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Match>) {
        if self.is_leaf() {
            out.push(self);
        } else {
            for c in self.children() {
                c.collect_leaves(out);
            }
        }
    }

    /// Visit nodes depth first, parents before children
    ///
    /// The visitor returns `false` to stop the walk; the return value says
    /// whether the walk ran to completion.
    pub fn walk<F>(&self, f: &mut F) -> bool
    where
        F: FnMut(&Match) -> bool,
    {
        if !f(self) {
            return false;
        }
        for c in self.children() {
            if !c.walk(f) {
                return false;
            }
        }
        true
    }

    /// Number of nodes in the subtree rooted here
    pub fn size(&self) -> usize {
        1 + self.children().iter().map(Match::size).sum::<usize>()
    }

    /// Mirror offsets around `pivot`, reversing child order
    ///
    /// Maps a tree found in a reversed view back into the view it was
    /// reversed from: `[a, b)` becomes `[pivot - b, pivot - a)`.
    pub(crate) fn reflect(&self, pivot: usize) -> Match {
        let children: Vec<Match> = self
            .children()
            .iter()
            .rev()
            .map(|c| c.reflect(pivot))
            .collect();
        Match {
            rule: self.rule,
            start: pivot - self.end,
            end: pivot - self.start,
            children: if children.is_empty() {
                None
            } else {
                Some(children.into())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Match {
        let a = Match::leaf(RuleId(1), 0, 1);
        let b = Match::leaf(RuleId(2), 1, 3);
        Match::with_children(RuleId(0), 0, 3, vec![a, b])
    }

    #[test]
    fn test_accessors() {
        let m = sample();
        assert_eq!(m.start(), 0);
        assert_eq!(m.end(), 3);
        assert_eq!(m.len(), 3);
        assert_eq!(m.children().len(), 2);
        assert_eq!(m.child(1).map(|c| c.rule()), Some(RuleId(2)));
        assert!(m.child(2).is_none());
        assert_eq!(m.group("abcd"), "abc");
        assert_eq!(m.size(), 3);
    }

    #[test]
    fn test_leaves_and_walk() {
        let m = sample();
        let leaves: Vec<RuleId> = m.leaves().iter().map(|l| l.rule()).collect();
        assert_eq!(leaves, vec![RuleId(1), RuleId(2)]);

        let mut seen = Vec::new();
        assert!(m.walk(&mut |n| {
            seen.push(n.rule());
            true
        }));
        assert_eq!(seen, vec![RuleId(0), RuleId(1), RuleId(2)]);

        let mut count = 0;
        assert!(!m.walk(&mut |_| {
            count += 1;
            count < 2
        }));
        assert_eq!(count, 2);
    }

    #[test]
    fn test_reflect() {
        let r = sample().reflect(5);
        assert_eq!((r.start(), r.end()), (2, 5));
        let kids: Vec<(usize, usize)> = r.children().iter().map(|c| (c.start(), c.end())).collect();
        assert_eq!(kids, vec![(2, 4), (4, 5)]);
        assert_eq!(r.reflect(5), sample());
    }

    #[test]
    fn test_lookaround_node() {
        let seen = Match::leaf(RuleId(4), 3, 6);
        let m = Match::lookaround(RuleId(5), 3, seen.clone());
        assert!(m.is_zero_width());
        assert_eq!(m.children(), &[seen]);
        let r = m.reflect(10);
        assert_eq!((r.start(), r.end()), (7, 7));
        assert_eq!((r.children()[0].start(), r.children()[0].end()), (4, 7));
        assert_eq!(m.with_rule(RuleId(9)).rule(), RuleId(9));
    }

    #[test]
    fn test_zero_width() {
        let m = Match::empty(RuleId(0), 4);
        assert!(m.is_zero_width());
        assert!(m.is_leaf());
        assert_eq!(m.group("abcdef"), "");
    }
}
