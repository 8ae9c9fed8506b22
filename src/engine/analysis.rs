//! Static analysis of a compiled rule graph
//!
//! Three properties are computed here:
//! - whether a rule can match without consuming input
//! - whether a rule's outcome depends on the enclosing sequence (free
//!   up-level back references), which keeps it out of the match cache
//! - which terminals can begin a match of the root, and which terminals
//!   are reachable at all, for studying
//!
//! The graph is cyclic through placeholders, so the flags are least
//! fixpoints computed by iterating until nothing changes.
//!
//! # Example
//!
//! ```
//! use grammatic::Grammar;
//!
//! let g: Grammar = "ROOT = 'a'* 'b'".parse().unwrap();
//! assert!(!g.rule(g.root()).is_zero_width());
//! ```

use super::rule::{RuleGraph, RuleId, RuleKind};
use std::collections::BTreeSet;

/// Read-only analyzer over a rule graph
pub struct RuleAnalyzer<'a> {
    graph: &'a RuleGraph,
    zero_width: Vec<bool>,
}

impl<'a> RuleAnalyzer<'a> {
    /// Analyze `graph`
    pub fn new(graph: &'a RuleGraph) -> Self {
        let mut analyzer = Self {
            graph,
            zero_width: Vec::new(),
        };
        analyzer.zero_width = analyzer.compute_zero_width();
        analyzer
    }

    /// Whether `id` can match the empty string
    #[inline]
    pub fn is_zero_width(&self, id: RuleId) -> bool {
        self.zero_width[id.index()]
    }

    fn compute_zero_width(&self) -> Vec<bool> {
        let mut flags = vec![false; self.graph.len()];
        loop {
            let mut changed = false;
            for (id, rule) in self.graph.iter() {
                if flags[id.index()] {
                    continue;
                }
                let zero = match &rule.kind {
                    RuleKind::Literal { text } => text.is_empty(),
                    RuleKind::Regex { regex, .. } => regex.find("").is_some(),
                    RuleKind::Alternation { alternatives, .. } => {
                        alternatives.iter().any(|a| flags[a.index()])
                    }
                    RuleKind::Sequence { items, .. } => items.iter().all(|i| flags[i.index()]),
                    RuleKind::Repetition {
                        inner, repetition, ..
                    } => repetition.lower == 0 || flags[inner.index()],
                    RuleKind::Assertion { .. }
                    | RuleKind::Barrier { .. }
                    | RuleKind::BackReference { .. }
                    | RuleKind::UpLevelBackReference { .. } => true,
                    RuleKind::Conditional { inner, .. } => flags[inner.index()],
                    // an unfilled placeholder might be anything
                    RuleKind::Cyclic { target, .. } | RuleKind::Deferred { target, .. } => {
                        target.map_or(true, |t| flags[t.index()])
                    }
                };
                if zero {
                    flags[id.index()] = true;
                    changed = true;
                }
            }
            if !changed {
                return flags;
            }
        }
    }

    /// Rules whose results depend on the enclosing sequence
    pub fn context_dependent(&self) -> Vec<bool> {
        let mut flags = vec![false; self.graph.len()];
        loop {
            let mut changed = false;
            for (id, rule) in self.graph.iter() {
                if flags[id.index()] {
                    continue;
                }
                let dependent = match &rule.kind {
                    RuleKind::BackReference { .. } | RuleKind::UpLevelBackReference { .. } => true,
                    // a sequence is the scope its up-level references resolve against
                    RuleKind::Sequence { .. } => false,
                    RuleKind::Alternation { alternatives, .. } => {
                        alternatives.iter().any(|a| flags[a.index()])
                    }
                    RuleKind::Repetition { inner, .. } | RuleKind::Conditional { inner, .. } => {
                        flags[inner.index()]
                    }
                    RuleKind::Assertion { run, forward, .. } => *forward && flags[run.index()],
                    RuleKind::Cyclic { target, .. } | RuleKind::Deferred { target, .. } => {
                        target.is_some_and(|t| flags[t.index()])
                    }
                    RuleKind::Literal { .. } | RuleKind::Regex { .. } | RuleKind::Barrier { .. } => {
                        false
                    }
                };
                if dependent {
                    flags[id.index()] = true;
                    changed = true;
                }
            }
            if !changed {
                return flags;
            }
        }
    }

    /// Terminals one of which must match where any match of `root` starts
    ///
    /// `None` when no such set exists: the root can match the empty
    /// string, or its first step depends on something unknown until match
    /// time (an up-level back reference or an undefined rule).
    pub fn first_terminals(&self, root: RuleId) -> Option<BTreeSet<RuleId>> {
        if self.is_zero_width(root) {
            return None;
        }
        let mut visiting = BTreeSet::new();
        self.first(root, &mut visiting)
    }

    fn first(&self, id: RuleId, visiting: &mut BTreeSet<RuleId>) -> Option<BTreeSet<RuleId>> {
        if !visiting.insert(id) {
            // left recursion adds nothing the other branches don't
            return Some(BTreeSet::new());
        }
        let mut out = BTreeSet::new();
        match &self.graph.get(id).kind {
            RuleKind::Literal { .. } | RuleKind::Regex { .. } => {
                out.insert(id);
            }
            RuleKind::Alternation { alternatives, .. } => {
                for alt in alternatives {
                    out.extend(self.first(*alt, visiting)?);
                }
            }
            RuleKind::Sequence { items, .. } => {
                for item in items {
                    out.extend(self.first(*item, visiting)?);
                    if !self.is_zero_width(*item) {
                        break;
                    }
                }
            }
            RuleKind::Repetition { inner, .. } | RuleKind::Conditional { inner, .. } => {
                out = self.first(*inner, visiting)?;
            }
            // zero width, or a copy of a referent that was zero width
            RuleKind::Assertion { .. } | RuleKind::Barrier { .. } | RuleKind::BackReference { .. } => {}
            RuleKind::UpLevelBackReference { .. } => return None,
            RuleKind::Cyclic { target, .. } | RuleKind::Deferred { target, .. } => {
                out = self.first((*target)?, visiting)?;
            }
        }
        visiting.remove(&id);
        Some(out)
    }

    /// Every terminal a forward match of `root` can try
    ///
    /// Rules run inside backward assertions are skipped: they scan the
    /// reversed text and never consult the studied cache.
    pub fn reachable_terminals(&self, root: RuleId) -> BTreeSet<RuleId> {
        let mut seen = BTreeSet::new();
        let mut terminals = BTreeSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            match &self.graph.get(id).kind {
                RuleKind::Literal { .. } | RuleKind::Regex { .. } => {
                    terminals.insert(id);
                }
                RuleKind::Alternation { alternatives, .. } => stack.extend(alternatives),
                RuleKind::Sequence { items, .. } => stack.extend(items),
                RuleKind::Repetition { inner, .. } | RuleKind::Conditional { inner, .. } => {
                    stack.push(*inner)
                }
                RuleKind::Assertion { run, forward, .. } => {
                    if *forward {
                        stack.push(*run);
                    }
                }
                RuleKind::Cyclic { target, .. } | RuleKind::Deferred { target, .. } => {
                    stack.extend(target.iter().copied())
                }
                RuleKind::BackReference { .. }
                | RuleKind::UpLevelBackReference { .. }
                | RuleKind::Barrier { .. } => {}
            }
        }
        terminals
    }
}

/// Recompute the per-rule flags stored in the graph
pub(crate) fn annotate(graph: &mut RuleGraph) {
    let (zero_width, dependent) = {
        let analyzer = RuleAnalyzer::new(graph);
        let dependent = analyzer.context_dependent();
        (analyzer.zero_width, dependent)
    };
    for (i, (zero, uncached)) in zero_width.into_iter().zip(dependent).enumerate() {
        let rule = graph.get_mut(RuleId(i));
        rule.zero_width = zero;
        rule.uncached = uncached;
    }
}
