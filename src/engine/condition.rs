//! Post-match conditions
//!
//! A condition is a named predicate over a candidate match. Rules carry a
//! [`ConditionExpr`] naming conditions and combining them with `&`, `|`,
//! `^` and `!`. The predicates themselves are bound after compilation
//! through [`Grammar::define_condition`](crate::Grammar::define_condition)
//! and live in a [`ConditionRegistry`] owned by the grammar.

use super::error::{GrammarError, Result};
use super::matches::Match;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A semantic predicate over a structural match
///
/// `group` is the matched text in reading order, even when the match was
/// found while scanning backward. Implementations must be free of side
/// effects: the engine makes no promise about how often or in what order
/// conditions are evaluated.
pub trait Condition: Send + Sync {
    /// Whether the candidate passes
    fn passes(&self, m: &Match, group: &str) -> bool;
}

impl<F> Condition for F
where
    F: Fn(&Match, &str) -> bool + Send + Sync,
{
    fn passes(&self, m: &Match, group: &str) -> bool {
        self(m, group)
    }
}

/// Boolean combination of named conditions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionExpr {
    /// A single named condition
    Leaf(String),
    /// All subconditions pass
    And(Vec<ConditionExpr>),
    /// At least one subcondition passes
    Or(Vec<ConditionExpr>),
    /// An odd number of subconditions pass
    Xor(Vec<ConditionExpr>),
    /// The subcondition fails
    Not(Box<ConditionExpr>),
}

impl ConditionExpr {
    /// Parse a condition expression such as `a & !(b | c)`
    ///
    /// Juxtaposition means `&`. Binding strength from tightest: `!`, `&`,
    /// `^`, `|`.
    pub fn parse(text: &str) -> Result<ConditionExpr> {
        let mut parser = ExprParser {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        };
        let expr = parser.disjunction()?;
        parser.skip_ws();
        if parser.pos < parser.bytes.len() {
            return Err(parser.error("unexpected character"));
        }
        Ok(expr)
    }

    /// Names of every leaf condition
    pub fn names(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        self.collect_names(&mut set);
        set
    }

    fn collect_names(&self, set: &mut BTreeSet<String>) {
        match self {
            ConditionExpr::Leaf(name) => {
                set.insert(name.clone());
            }
            ConditionExpr::And(subs) | ConditionExpr::Or(subs) | ConditionExpr::Xor(subs) => {
                for s in subs {
                    s.collect_names(set);
                }
            }
            ConditionExpr::Not(sub) => sub.collect_names(set),
        }
    }

    /// Evaluate against a registry
    ///
    /// An undefined leaf is reported as an error rather than a failure;
    /// the facade checks completeness before matching so this only fires
    /// for registries assembled by hand.
    pub fn evaluate(&self, registry: &ConditionRegistry, m: &Match, group: &str) -> Result<bool> {
        Ok(match self {
            ConditionExpr::Leaf(name) => match registry.get(name) {
                Some(c) => c.passes(m, group),
                None => {
                    return Err(GrammarError::UndefinedCondition {
                        names: vec![name.clone()],
                    })
                }
            },
            ConditionExpr::And(subs) => {
                for s in subs {
                    if !s.evaluate(registry, m, group)? {
                        return Ok(false);
                    }
                }
                true
            }
            ConditionExpr::Or(subs) => {
                for s in subs {
                    if s.evaluate(registry, m, group)? {
                        return Ok(true);
                    }
                }
                false
            }
            ConditionExpr::Xor(subs) => {
                let mut count = 0;
                for s in subs {
                    if s.evaluate(registry, m, group)? {
                        count += 1;
                    }
                }
                count % 2 == 1
            }
            ConditionExpr::Not(sub) => !sub.evaluate(registry, m, group)?,
        })
    }

    fn is_compound(&self) -> bool {
        matches!(
            self,
            ConditionExpr::And(_) | ConditionExpr::Or(_) | ConditionExpr::Xor(_)
        )
    }

    fn write_joined(f: &mut fmt::Formatter<'_>, subs: &[ConditionExpr], op: &str) -> fmt::Result {
        for (i, s) in subs.iter().enumerate() {
            if i > 0 {
                f.write_str(op)?;
            }
            if s.is_compound() {
                write!(f, "({})", s)?;
            } else {
                write!(f, "{}", s)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ConditionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionExpr::Leaf(name) => f.write_str(name),
            ConditionExpr::And(subs) => Self::write_joined(f, subs, " & "),
            ConditionExpr::Or(subs) => Self::write_joined(f, subs, " | "),
            ConditionExpr::Xor(subs) => Self::write_joined(f, subs, " ^ "),
            ConditionExpr::Not(sub) => {
                if sub.is_compound() {
                    write!(f, "!({})", sub)
                } else {
                    write!(f, "!{}", sub)
                }
            }
        }
    }
}

struct ExprParser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn error(&self, reason: &str) -> GrammarError {
        GrammarError::ill_formed(
            format!("({})", self.text),
            format!("{} in condition at offset {}", reason, self.pos),
        )
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.bytes.get(self.pos).copied()
    }

    fn disjunction(&mut self) -> Result<ConditionExpr> {
        let mut items = vec![self.xor()?];
        while self.peek() == Some(b'|') {
            self.pos += 1;
            items.push(self.xor()?);
        }
        Ok(collapse(items, ConditionExpr::Or))
    }

    fn xor(&mut self) -> Result<ConditionExpr> {
        let mut items = vec![self.conjunction()?];
        while self.peek() == Some(b'^') {
            self.pos += 1;
            items.push(self.conjunction()?);
        }
        Ok(collapse(items, ConditionExpr::Xor))
    }

    fn conjunction(&mut self) -> Result<ConditionExpr> {
        let mut items = vec![self.unary()?];
        loop {
            match self.peek() {
                Some(b'&') => {
                    self.pos += 1;
                    items.push(self.unary()?);
                }
                // juxtaposition
                Some(c) if c == b'!' || c == b'(' || is_name_byte(c) => {
                    items.push(self.unary()?);
                }
                _ => break,
            }
        }
        Ok(collapse(items, ConditionExpr::And))
    }

    fn unary(&mut self) -> Result<ConditionExpr> {
        match self.peek() {
            Some(b'!') => {
                self.pos += 1;
                Ok(ConditionExpr::Not(Box::new(self.unary()?)))
            }
            Some(b'(') => {
                self.pos += 1;
                let inner = self.disjunction()?;
                if self.peek() != Some(b')') {
                    return Err(self.error("unbalanced parentheses"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(c) if is_name_byte(c) => {
                let start = self.pos;
                while self.pos < self.bytes.len() && is_name_byte(self.bytes[self.pos]) {
                    self.pos += 1;
                }
                Ok(ConditionExpr::Leaf(self.text[start..self.pos].to_string()))
            }
            Some(_) => Err(self.error("expected condition name")),
            None => Err(self.error("empty condition")),
        }
    }
}

fn is_name_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'.' || c == b':' || c == b'-'
}

fn collapse(mut items: Vec<ConditionExpr>, wrap: fn(Vec<ConditionExpr>) -> ConditionExpr) -> ConditionExpr {
    if items.len() == 1 {
        items.remove(0)
    } else {
        wrap(items)
    }
}

/// Name to predicate map owned by a grammar
#[derive(Clone, Default)]
pub struct ConditionRegistry {
    conditions: HashMap<String, Arc<dyn Condition>>,
}

impl ConditionRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a name; fails if it is already bound
    pub fn define(&mut self, name: &str, condition: Arc<dyn Condition>) -> Result<()> {
        if self.conditions.contains_key(name) {
            return Err(GrammarError::AlreadyDefined {
                name: name.to_string(),
            });
        }
        self.conditions.insert(name.to_string(), condition);
        Ok(())
    }

    /// Look up a condition
    #[inline]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Condition>> {
        self.conditions.get(name)
    }

    /// Whether a name is bound
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }

    /// Number of bound conditions
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Whether nothing is bound
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

impl fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.conditions.keys().collect();
        names.sort();
        f.debug_struct("ConditionRegistry")
            .field("names", &names)
            .finish()
    }
}
