//! Compiled rule graph
//!
//! Rules live in an arena and refer to one another by [`RuleId`]. The
//! logical graph may be cyclic, but storage is not: recursion goes through
//! [`RuleKind::Cyclic`] placeholders whose target slot is written once
//! after the cycle's bodies are built. Undefined names compile to
//! [`RuleKind::Deferred`] placeholders that are filled the same way when a
//! definition arrives.
//!
//! Anonymous rules are interned by structural fingerprint. A fingerprint
//! renders the rule's own shape and names its constituents by slot, and
//! since every constituent is itself interned, equal fingerprints mean
//! equal structure all the way down.

use super::condition::ConditionExpr;
use super::fragment::{quote_literal, RegexFlags};
use super::label::{Label, LabelKind};
use super::repetition::Repetition;
use hashbrown::HashMap;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt::Write as _;

/// Index of a rule in its grammar's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub(crate) usize);

impl RuleId {
    /// Position in the arena
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Tags attached to one position of a container rule
pub type TagSet = BTreeSet<String>;

/// Structural variant of a compiled rule
#[derive(Debug, Clone)]
pub enum RuleKind {
    /// Literal text
    Literal {
        /// Text to match, already reversed for reversed rules
        text: String,
    },
    /// Regular-expression terminal
    Regex {
        /// Pattern as written
        pattern: String,
        /// Modifier flags
        flags: RegexFlags,
        /// Compiled form
        regex: Regex,
    },
    /// Ordered choice
    Alternation {
        /// Alternatives in priority order
        alternatives: Vec<RuleId>,
        /// Tags per alternative
        tags: Vec<TagSet>,
    },
    /// Concatenation
    Sequence {
        /// Constituents in order
        items: Vec<RuleId>,
        /// Tags per constituent
        tags: Vec<TagSet>,
    },
    /// Bounded repetition
    Repetition {
        /// Repeated rule
        inner: RuleId,
        /// Bounds and greed
        repetition: Repetition,
        /// Tags attached to each repeated match
        tags: TagSet,
    },
    /// Zero-width look-around
    Assertion {
        /// Asserted rule as written
        subject: RuleId,
        /// Rule actually run: the subject, or its reversal for backward assertions
        run: RuleId,
        /// `~` when true, `!` when false
        positive: bool,
        /// Lookahead when true, lookbehind when false
        forward: bool,
    },
    /// Same text as an earlier constituent of the enclosing sequence
    BackReference {
        /// Zero-based position of the referent
        index: usize,
    },
    /// Same text as a constituent of the nearest enclosing sequence,
    /// reached through intervening groups and repetitions
    UpLevelBackReference {
        /// Zero-based position of the referent
        index: usize,
    },
    /// Backtracking barrier
    Barrier {
        /// `::` when true
        double: bool,
    },
    /// Structural match filtered by a condition
    Conditional {
        /// Filtered rule
        inner: RuleId,
        /// Condition applied to each candidate
        condition: ConditionExpr,
    },
    /// Placeholder for a member of a recursive cycle
    Cyclic {
        /// Rule name
        name: String,
        /// Resolved body, written once
        target: Option<RuleId>,
    },
    /// Placeholder for a rule defined after compilation
    Deferred {
        /// Rule name
        name: String,
        /// Supplied definition, written once
        target: Option<RuleId>,
    },
}

impl RuleKind {
    /// Whether this is a literal or regex terminal
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, RuleKind::Literal { .. } | RuleKind::Regex { .. })
    }

    pub(crate) fn is_placeholder(&self) -> bool {
        matches!(self, RuleKind::Cyclic { .. } | RuleKind::Deferred { .. })
    }
}

/// A compiled rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub(crate) kind: RuleKind,
    pub(crate) label: Label,
    pub(crate) generation: i32,
    pub(crate) fingerprint: String,
    pub(crate) aliases: BTreeSet<String>,
    pub(crate) reversed_from: Option<RuleId>,
    pub(crate) zero_width: bool,
    pub(crate) uncached: bool,
}

impl Rule {
    pub(crate) fn new(kind: RuleKind, label: Label, fingerprint: String) -> Self {
        Self {
            kind,
            label,
            generation: -1,
            fingerprint,
            aliases: BTreeSet::new(),
            reversed_from: None,
            zero_width: false,
            uncached: false,
        }
    }

    /// Structural variant
    #[inline]
    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    /// Identity of the rule
    #[inline]
    pub fn label(&self) -> &Label {
        &self.label
    }

    /// Topological rank; -1 for anonymous rules
    #[inline]
    pub fn generation(&self) -> i32 {
        self.generation
    }

    /// Structural fingerprint
    #[inline]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Other names bound to this rule
    #[inline]
    pub fn aliases(&self) -> &BTreeSet<String> {
        &self.aliases
    }

    /// Whether the rule can match without consuming input
    #[inline]
    pub fn is_zero_width(&self) -> bool {
        self.zero_width
    }

    /// Whether results depend on an enclosing sequence, which keeps them
    /// out of the match cache
    #[inline]
    pub fn is_uncached(&self) -> bool {
        self.uncached
    }

    /// Whether the rule was built by reversing another for a lookbehind
    #[inline]
    pub fn is_reversed(&self) -> bool {
        self.reversed_from.is_some()
    }
}

/// Arena of compiled rules
#[derive(Debug, Clone, Default)]
pub struct RuleGraph {
    rules: Vec<Rule>,
    fingerprints: HashMap<String, RuleId>,
    pub(crate) reversals: HashMap<RuleId, RuleId>,
}

impl RuleGraph {
    /// Empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rules
    #[inline]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the graph holds no rules
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule in slot `id`
    #[inline]
    pub fn get(&self, id: RuleId) -> &Rule {
        &self.rules[id.0]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: RuleId) -> &mut Rule {
        &mut self.rules[id.0]
    }

    /// All rules with their ids
    pub fn iter(&self) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.rules.iter().enumerate().map(|(i, r)| (RuleId(i), r))
    }

    /// Slot of an interned rule with this fingerprint
    pub fn lookup(&self, fingerprint: &str) -> Option<RuleId> {
        self.fingerprints.get(fingerprint).copied()
    }

    /// Add a rule without deduplication
    pub(crate) fn push(&mut self, rule: Rule) -> RuleId {
        let id = RuleId(self.rules.len());
        self.rules.push(rule);
        id
    }

    /// Add an anonymous rule, reusing any structurally identical one
    pub(crate) fn intern(&mut self, kind: RuleKind) -> RuleId {
        let fingerprint = self.fingerprint_of(&kind);
        self.intern_with(kind, fingerprint, None)
    }

    /// Intern a rule built by reversing `from`
    pub(crate) fn intern_reversed(&mut self, kind: RuleKind, from: RuleId) -> RuleId {
        let fingerprint = format!("{}:r", self.fingerprint_of(&kind));
        self.intern_with(kind, fingerprint, Some(from))
    }

    fn intern_with(&mut self, kind: RuleKind, fingerprint: String, from: Option<RuleId>) -> RuleId {
        if let Some(id) = self.fingerprints.get(&fingerprint) {
            return *id;
        }
        let mut rule = Rule::new(kind, Label::implicit(fingerprint.clone()), fingerprint.clone());
        rule.reversed_from = from;
        let id = self.push(rule);
        self.fingerprints.insert(fingerprint, id);
        id
    }

    /// Canonical shape string of a rule kind
    pub(crate) fn fingerprint_of(&self, kind: &RuleKind) -> String {
        let mut s = String::new();
        match kind {
            RuleKind::Literal { text } => s.push_str(&quote_literal(text)),
            RuleKind::Regex { pattern, flags, .. } => {
                let _ = write!(s, "/{}/{}", escape_slashes(pattern), flags);
            }
            RuleKind::Alternation { alternatives, tags } => {
                s.push('[');
                for (i, alt) in alternatives.iter().enumerate() {
                    if i > 0 {
                        s.push('|');
                    }
                    let _ = write!(s, "#{}", alt.0);
                    push_tags(&mut s, tags.get(i));
                }
                s.push(']');
            }
            RuleKind::Sequence { items, tags } => {
                s.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        s.push(' ');
                    }
                    let _ = write!(s, "#{}", item.0);
                    push_tags(&mut s, tags.get(i));
                }
                s.push(']');
            }
            RuleKind::Repetition {
                inner,
                repetition,
                tags,
            } => {
                let _ = write!(s, "#{}{}", inner.0, repetition);
                push_tags(&mut s, Some(tags));
            }
            RuleKind::Assertion {
                subject,
                positive,
                forward,
                ..
            } => {
                s.push(if *positive { '~' } else { '!' });
                if !*forward {
                    s.push('-');
                }
                let _ = write!(s, "#{}", subject.0);
            }
            RuleKind::BackReference { index } => {
                let _ = write!(s, "{}", index + 1);
            }
            RuleKind::UpLevelBackReference { index } => {
                let _ = write!(s, "{}^", index + 1);
            }
            RuleKind::Barrier { double } => s.push_str(if *double { "::" } else { ":" }),
            RuleKind::Conditional { inner, condition } => {
                let _ = write!(s, "#{}({})", inner.0, condition);
            }
            RuleKind::Cyclic { name, .. } | RuleKind::Deferred { name, .. } => {
                let _ = write!(s, "<{}>", name);
            }
        }
        s
    }

    /// Follow placeholders to the rule that does the work
    ///
    /// Returns the resolved slot and whether a cyclic placeholder was
    /// crossed on the way; `None` when a deferred rule is still undefined.
    pub(crate) fn resolve(&self, mut id: RuleId) -> Option<(RuleId, bool)> {
        let mut cyclic = false;
        loop {
            match &self.get(id).kind {
                RuleKind::Cyclic { target, .. } => {
                    cyclic = true;
                    id = (*target)?;
                }
                RuleKind::Deferred { target, .. } => id = (*target)?,
                _ => return Some((id, cyclic)),
            }
        }
    }

    /// The forward rule a reversed rule was built from, or `id` itself
    #[inline]
    pub fn origin(&self, id: RuleId) -> RuleId {
        self.get(id).reversed_from.unwrap_or(id)
    }

    /// Name of a named rule
    pub fn name(&self, id: RuleId) -> Option<&str> {
        let label = &self.get(self.origin(id)).label;
        label.is_named().then_some(label.id.as_str())
    }

    /// Every name that refers to this rule
    pub fn names_of(&self, id: RuleId) -> BTreeSet<String> {
        let rule = self.get(self.origin(id));
        let mut out = rule.aliases.clone();
        if rule.label.is_named() {
            out.insert(rule.label.id.clone());
        }
        out
    }

    /// Short display form: `<name>` for named rules, the inline body otherwise
    pub fn display_name(&self, id: RuleId) -> String {
        self.render_ref(self.origin(id))
    }

    /// A rule as it appears where another rule uses it
    pub(crate) fn render_ref(&self, id: RuleId) -> String {
        let rule = self.get(id);
        if rule.label.is_named() || rule.kind.is_placeholder() {
            return match &rule.kind {
                RuleKind::Cyclic { name, .. } | RuleKind::Deferred { name, .. } => {
                    format!("<{}>", name)
                }
                _ => format!("<{}>", rule.label.id),
            };
        }
        match &rule.kind {
            RuleKind::Sequence { .. } | RuleKind::Alternation { .. } | RuleKind::Conditional { .. } => {
                format!("[ {} ]", self.render_body(id))
            }
            _ => self.render_body(id),
        }
    }

    /// The right-hand side of a rule in textual syntax
    pub(crate) fn render_body(&self, id: RuleId) -> String {
        match &self.get(id).kind {
            RuleKind::Literal { text } => quote_literal(text),
            RuleKind::Regex { pattern, flags, .. } => {
                format!("/{}/{}", escape_slashes(pattern), flags)
            }
            RuleKind::Alternation { alternatives, tags } => {
                let parts: Vec<String> = alternatives
                    .iter()
                    .enumerate()
                    .map(|(i, alt)| match tags.get(i).filter(|t| !t.is_empty()) {
                        Some(_) => self.render_tagged(*alt, tags.get(i)),
                        None if self.is_anonymous(*alt)
                            && matches!(self.get(*alt).kind, RuleKind::Sequence { .. }) =>
                        {
                            self.render_body(*alt)
                        }
                        None => self.render_ref(*alt),
                    })
                    .collect();
                parts.join(" | ")
            }
            RuleKind::Sequence { items, tags } => {
                let parts: Vec<String> = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.render_tagged(*item, tags.get(i)))
                    .collect();
                parts.join(" ")
            }
            RuleKind::Repetition {
                inner,
                repetition,
                tags,
            } => {
                let rendered = if tags.is_empty() {
                    match self.get(*inner).kind {
                        RuleKind::Repetition { .. } if self.is_anonymous(*inner) => {
                            format!("[ {} ]", self.render_body(*inner))
                        }
                        _ => self.render_ref(*inner),
                    }
                } else {
                    self.render_tagged(*inner, Some(tags))
                };
                format!("{}{}", rendered, repetition)
            }
            RuleKind::Assertion {
                subject,
                positive,
                forward,
                ..
            } => format!(
                "{}{}{}",
                if *positive { '~' } else { '!' },
                if *forward { "" } else { "-" },
                self.render_ref(*subject)
            ),
            RuleKind::BackReference { index } => (index + 1).to_string(),
            RuleKind::UpLevelBackReference { index } => format!("{}^", index + 1),
            RuleKind::Barrier { double } => (if *double { "::" } else { ":" }).to_string(),
            RuleKind::Conditional { inner, condition } => {
                let body = if self.is_anonymous(*inner) {
                    self.render_body(*inner)
                } else {
                    self.render_ref(*inner)
                };
                format!("{} ({})", body, condition)
            }
            RuleKind::Cyclic { name, target } | RuleKind::Deferred { name, target } => {
                match target {
                    Some(t) if self.get(*t).label.id == *name => self.render_body(*t),
                    Some(t) => self.render_ref(*t),
                    None => format!("<{}>", name),
                }
            }
        }
    }

    /// Rename an anonymous rule, or record an extra name for a named one
    pub(crate) fn bind_name(&mut self, id: RuleId, name: &str, kind: LabelKind, generation: i32) {
        let rule = self.get_mut(id);
        if rule.label.is_named() || rule.kind.is_placeholder() {
            if rule.label.id != name {
                rule.aliases.insert(name.to_string());
            }
        } else {
            rule.label = Label::new(kind, name);
            rule.generation = generation;
        }
    }

    /// Append every rule of `other`, renaming its named rules with `rename`
    ///
    /// Returns the slot `other`'s slot 0 landed in; an imported rule keeps
    /// its relative position. Imported rules stay out of the fingerprint
    /// table so they never merge with rules of this graph.
    pub(crate) fn import(&mut self, other: &RuleGraph, rename: impl Fn(&str) -> String) -> usize {
        let base = self.rules.len();
        let shift = |id: RuleId| RuleId(id.0 + base);
        for rule in &other.rules {
            let kind = match &rule.kind {
                RuleKind::Alternation { alternatives, tags } => RuleKind::Alternation {
                    alternatives: alternatives.iter().map(|a| shift(*a)).collect(),
                    tags: tags.clone(),
                },
                RuleKind::Sequence { items, tags } => RuleKind::Sequence {
                    items: items.iter().map(|i| shift(*i)).collect(),
                    tags: tags.clone(),
                },
                RuleKind::Repetition {
                    inner,
                    repetition,
                    tags,
                } => RuleKind::Repetition {
                    inner: shift(*inner),
                    repetition: *repetition,
                    tags: tags.clone(),
                },
                RuleKind::Assertion {
                    subject,
                    run,
                    positive,
                    forward,
                } => RuleKind::Assertion {
                    subject: shift(*subject),
                    run: shift(*run),
                    positive: *positive,
                    forward: *forward,
                },
                RuleKind::Conditional { inner, condition } => RuleKind::Conditional {
                    inner: shift(*inner),
                    condition: condition.clone(),
                },
                RuleKind::Cyclic { name, target } => RuleKind::Cyclic {
                    name: rename(name),
                    target: target.map(shift),
                },
                RuleKind::Deferred { name, target } => RuleKind::Deferred {
                    name: rename(name),
                    target: target.map(shift),
                },
                leaf => leaf.clone(),
            };
            let label = if rule.label.is_named() || rule.kind.is_placeholder() {
                let kind = match rule.label.kind {
                    LabelKind::Root => LabelKind::Explicit,
                    k => k,
                };
                Label::new(kind, rename(&rule.label.id))
            } else {
                rule.label.clone()
            };
            self.rules.push(Rule {
                kind,
                label,
                generation: rule.generation,
                fingerprint: format!("{}@{}", rule.fingerprint, base),
                aliases: rule.aliases.iter().map(|a| rename(a)).collect(),
                reversed_from: rule.reversed_from.map(shift),
                zero_width: rule.zero_width,
                uncached: rule.uncached,
            });
        }
        for (from, to) in &other.reversals {
            self.reversals.insert(shift(*from), shift(*to));
        }
        base
    }

    fn is_anonymous(&self, id: RuleId) -> bool {
        let rule = self.get(id);
        !rule.label.is_named() && !rule.kind.is_placeholder()
    }

    /// A constituent with the tags of its position, `[{t} body ]`
    fn render_tagged(&self, id: RuleId, tags: Option<&TagSet>) -> String {
        match tags.filter(|t| !t.is_empty()) {
            Some(tags) => {
                let body = match self.get(id).kind {
                    RuleKind::Sequence { .. } | RuleKind::Alternation { .. }
                        if self.is_anonymous(id) =>
                    {
                        self.render_body(id)
                    }
                    _ => self.render_ref(id),
                };
                let joined: Vec<&str> = tags.iter().map(String::as_str).collect();
                format!("[{{{}}} {} ]", joined.join(","), body)
            }
            None => self.render_ref(id),
        }
    }
}

fn push_tags(s: &mut String, tags: Option<&TagSet>) {
    if let Some(tags) = tags.filter(|t| !t.is_empty()) {
        s.push('{');
        let joined: Vec<&str> = tags.iter().map(String::as_str).collect();
        s.push_str(&joined.join(","));
        s.push('}');
    }
}

fn escape_slashes(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut escaped = false;
    for c in pattern.chars() {
        if c == '/' && !escaped {
            out.push('\\');
        }
        escaped = c == '\\' && !escaped;
        out.push(c);
    }
    out
}
