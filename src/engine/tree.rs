//! Finalized parse trees
//!
//! A [`Match`] only knows its children. A [`ParseTree`] flattens one into
//! an arena in preorder, adds parent links and resolves the labels of each
//! node: the names of the rule that produced it plus the tags attached to
//! its position in the parent.
//!
//! ```
//! use grammatic::{Grammar, Options};
//!
//! let g: Grammar = "ROOT = [{key} /\\w+/ ] '=' [{value} /\\w+/ ]".parse().unwrap();
//! let text = "a=b";
//! let m = g.matches(text, Options::default()).unwrap().next().unwrap();
//! let tree = g.tree(text, &m);
//! let value = tree.first("value").unwrap();
//! assert_eq!(tree.group(value), "b");
//! ```

use super::grammar::Grammar;
use super::matches::Match;
use super::rule::{RuleId, RuleKind, TagSet};
use std::collections::BTreeSet;

/// Position of a node in a [`ParseTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Preorder index
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Node {
    m: Match,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    labels: BTreeSet<String>,
}

/// A match with parent links and labels
#[derive(Debug, Clone)]
pub struct ParseTree<'g, 't> {
    grammar: &'g Grammar,
    text: &'t str,
    nodes: Vec<Node>,
}

impl<'g, 't> ParseTree<'g, 't> {
    /// Finalize `root`, a match `grammar` found in `text`
    pub fn new(grammar: &'g Grammar, text: &'t str, root: &Match) -> Self {
        let mut tree = Self {
            grammar,
            text,
            nodes: Vec::with_capacity(root.size()),
        };
        let mut stack: Vec<(&Match, Option<NodeId>, BTreeSet<String>)> =
            vec![(root, None, BTreeSet::new())];
        while let Some((m, parent, tags)) = stack.pop() {
            let id = NodeId(tree.nodes.len());
            let mut labels = tree.rule_labels(m.rule());
            labels.extend(tags);
            tree.nodes.push(Node {
                m: m.clone(),
                parent,
                children: Vec::with_capacity(m.children().len()),
                labels,
            });
            if let Some(p) = parent {
                tree.nodes[p.0].children.push(id);
            }
            for (i, child) in m.children().iter().enumerate().rev() {
                stack.push((child, Some(id), tree.position_tags(m, i, child)));
            }
        }
        tree
    }

    fn rule_labels(&self, rule: RuleId) -> BTreeSet<String> {
        let graph = self.grammar.graph();
        let origin = graph.origin(rule);
        let mut labels = graph.names_of(origin);
        labels.insert(graph.get(origin).label().id.clone());
        labels
    }

    /// Tags the parent's rule attaches to its `i`th child
    fn position_tags(&self, parent: &Match, i: usize, child: &Match) -> TagSet {
        let graph = self.grammar.graph();
        let empty = TagSet::new();
        let tags = match &graph.get(graph.origin(parent.rule())).kind {
            RuleKind::Sequence { tags, .. } => tags.get(i).unwrap_or(&empty),
            RuleKind::Repetition { tags, .. } => tags,
            RuleKind::Alternation { alternatives, tags } => {
                let chosen = graph.origin(child.rule());
                alternatives
                    .iter()
                    .position(|a| *a == chosen || graph.resolve(*a).is_some_and(|(r, _)| r == chosen))
                    .and_then(|p| tags.get(p))
                    .unwrap_or(&empty)
            }
            _ => &empty,
        };
        tags.clone()
    }

    /// The root node
    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes; never true for a built tree
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The match at `node`
    #[inline]
    pub fn get_match(&self, node: NodeId) -> &Match {
        &self.nodes[node.0].m
    }

    /// Text covered by `node`
    pub fn group(&self, node: NodeId) -> &'t str {
        self.nodes[node.0].m.group(self.text)
    }

    /// Parent of `node`; `None` for the root
    #[inline]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    /// Children of `node` in order
    #[inline]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Rule names, label id and position tags of `node`
    #[inline]
    pub fn labels(&self, node: NodeId) -> &BTreeSet<String> {
        &self.nodes[node.0].labels
    }

    /// Whether `node` carries `label`
    #[inline]
    pub fn has_label(&self, node: NodeId, label: &str) -> bool {
        self.nodes[node.0].labels.contains(label)
    }

    /// First node in preorder carrying `label`; parents come before
    /// children
    pub fn first(&self, label: &str) -> Option<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .find(|n| self.has_label(*n, label))
    }

    /// Every node carrying `label`, in preorder
    pub fn get(&self, label: &str) -> Vec<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|n| self.has_label(*n, label))
            .collect()
    }

    /// Highest descendants of `node` carrying `label`
    ///
    /// `node` itself is not considered, and nothing below a found node is.
    pub fn closest(&self, node: NodeId, label: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            if self.has_label(n, label) {
                found.push(n);
            } else {
                stack.extend(self.children(n).iter().rev());
            }
        }
        found
    }

    /// Nearest proper ancestor of `node` carrying `label`
    pub fn ancestor(&self, node: NodeId, label: &str) -> Option<NodeId> {
        let mut current = self.parent(node);
        while let Some(n) = current {
            if self.has_label(n, label) {
                return Some(n);
            }
            current = self.parent(n);
        }
        None
    }

    /// Childless nodes, left to right
    pub fn leaves(&self) -> Vec<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|n| self.nodes[n.0].children.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::options::Options;

    fn tree_of<'g, 't>(g: &'g Grammar, text: &'t str) -> ParseTree<'g, 't> {
        let m = g.matches(text, Options::default()).unwrap().next().unwrap();
        ParseTree::new(g, text, &m)
    }

    #[test]
    fn test_parent_links() {
        let g: Grammar = "ROOT = <a> <b>\na = 'x'\nb = 'y'".parse().unwrap();
        let tree = tree_of(&g, "xy");
        let root = tree.root();
        assert_eq!(tree.parent(root), None);
        let kids = tree.children(root).to_vec();
        assert_eq!(kids.len(), 2);
        assert_eq!(tree.parent(kids[1]), Some(root));
        assert_eq!(tree.group(kids[1]), "y");
        assert!(tree.has_label(kids[0], "a"));
        assert!(tree.has_label(root, "ROOT"));
    }

    #[test]
    fn test_tags_and_queries() {
        let g: Grammar = "ROOT = [{item} <w> ] [ ',' [{item} <w> ] ]*\nw = /\\w+/"
            .parse()
            .unwrap();
        let text = "a,bc,d";
        let tree = tree_of(&g, text);
        let items: Vec<&str> = tree.get("item").into_iter().map(|n| tree.group(n)).collect();
        assert_eq!(items, vec!["a", "bc", "d"]);
        assert_eq!(tree.group(tree.first("w").unwrap()), "a");
        let closest: Vec<&str> = tree
            .closest(tree.root(), "w")
            .into_iter()
            .map(|n| tree.group(n))
            .collect();
        assert_eq!(closest, vec!["a", "bc", "d"]);
        let last = *tree.get("w").last().unwrap();
        assert_eq!(tree.ancestor(last, "ROOT"), Some(tree.root()));
    }

    #[test]
    fn test_alternation_tags() {
        let g: Grammar = "ROOT = [ [{num} /\\d+/ ] | [{word} /[a-z]+/ ] ]"
            .parse()
            .unwrap();
        let tree = tree_of(&g, "abc");
        let child = tree.children(tree.root())[0];
        assert!(tree.has_label(child, "word"));
        assert!(!tree.has_label(child, "num"));
    }

    #[test]
    fn test_leaves() {
        let g: Grammar = "ROOT = 'a' [ 'b' 'c' ]".parse().unwrap();
        let tree = tree_of(&g, "abc");
        let leaves: Vec<&str> = tree.leaves().into_iter().map(|n| tree.group(n)).collect();
        assert_eq!(leaves, vec!["a", "b", "c"]);
    }
}
