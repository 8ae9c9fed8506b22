//! Fragment model
//!
//! The compiler consumes rule bodies as ordered lists of typed fragments.
//! A [`RuleSet`] holds one [`RuleDefinition`] per name in definition order;
//! it is produced by the textual [`rule_parser`](super::rule_parser) or
//! assembled programmatically, and it round-trips through JSON so an
//! external tokenizer can hand fragments over without linking the parser.

use super::condition::ConditionExpr;
use super::error::{GrammarError, Result};
use super::repetition::Repetition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Modifier flags of a regular-expression terminal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegexFlags {
    /// `r`: usable inside backward assertions
    pub reversible: bool,
    /// `i`
    pub case_insensitive: bool,
    /// `s`
    pub dot_all: bool,
    /// `m`
    pub multi_line: bool,
    /// `d`: accepted for compatibility; `\n` is always the only line terminator
    pub unix_lines: bool,
    /// `u`: accepted for compatibility; matching is always Unicode-aware
    pub unicode_case: bool,
    /// `x`: whitespace and `#` comments in the pattern are ignored
    pub extended: bool,
}

impl RegexFlags {
    /// Parse a flag suffix such as `ri`
    pub fn parse(s: &str) -> std::result::Result<RegexFlags, char> {
        let mut flags = RegexFlags::default();
        for c in s.chars() {
            match c {
                'r' => flags.reversible = true,
                'i' => flags.case_insensitive = true,
                's' => flags.dot_all = true,
                'm' => flags.multi_line = true,
                'd' => flags.unix_lines = true,
                'u' => flags.unicode_case = true,
                'x' => flags.extended = true,
                other => return Err(other),
            }
        }
        Ok(flags)
    }

    /// Inline-flag prefix understood by the regex crate, e.g. `(?ix)`
    pub fn inline_prefix(&self) -> String {
        let mut s = String::new();
        if self.case_insensitive {
            s.push('i');
        }
        if self.multi_line {
            s.push('m');
        }
        if self.dot_all {
            s.push('s');
        }
        if self.extended {
            s.push('x');
        }
        if s.is_empty() {
            s
        } else {
            format!("(?{})", s)
        }
    }
}

impl fmt::Display for RegexFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (set, c) in [
            (self.reversible, 'r'),
            (self.case_insensitive, 'i'),
            (self.dot_all, 's'),
            (self.multi_line, 'm'),
            (self.unix_lines, 'd'),
            (self.unicode_case, 'u'),
            (self.extended, 'x'),
        ] {
            if set {
                write!(f, "{}", c)?;
            }
        }
        Ok(())
    }
}

/// One typed element of a rule body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fragment {
    /// Reference to another rule by name
    Reference {
        /// Referenced name
        name: String,
        /// Repetition suffix
        repetition: Repetition,
    },
    /// Literal text
    Literal {
        /// Text to match
        text: String,
        /// Repetition suffix
        repetition: Repetition,
    },
    /// Regular-expression terminal
    Regex {
        /// Pattern source without delimiters
        pattern: String,
        /// Modifier flags
        flags: RegexFlags,
        /// Repetition suffix
        repetition: Repetition,
    },
    /// Bracketed group: an alternation of sequences
    Group {
        /// Alternatives, each a sequence of fragments
        alternatives: Vec<Vec<Fragment>>,
        /// Tags attached to whatever the group matches
        tags: BTreeSet<String>,
        /// Repetition suffix
        repetition: Repetition,
    },
    /// Zero-width assertion about the fragment that follows
    Assertion {
        /// `~` when true, `!` when false
        positive: bool,
        /// `+` (or nothing) when true, `-` when false
        forward: bool,
        /// Asserted fragment
        inner: Box<Fragment>,
    },
    /// Back reference to a preceding constituent of the same sequence
    BackReference {
        /// One-based position of the referent
        index: usize,
    },
    /// Back reference to a constituent of the nearest enclosing sequence,
    /// usable inside groups and repetitions
    UpLevelBackReference {
        /// One-based position of the referent
        index: usize,
        /// Repetition suffix
        repetition: Repetition,
    },
    /// Backtracking barrier, `:` or `::`
    Barrier {
        /// `::` when true
        double: bool,
    },
}

impl Fragment {
    /// Unrepeated reference
    pub fn reference(name: impl Into<String>) -> Self {
        Fragment::Reference {
            name: name.into(),
            repetition: Repetition::ONCE,
        }
    }

    /// Unrepeated literal
    pub fn literal(text: impl Into<String>) -> Self {
        Fragment::Literal {
            text: text.into(),
            repetition: Repetition::ONCE,
        }
    }

    /// Unrepeated regex with default flags
    pub fn regex(pattern: impl Into<String>) -> Self {
        Fragment::Regex {
            pattern: pattern.into(),
            flags: RegexFlags::default(),
            repetition: Repetition::ONCE,
        }
    }

    /// Untagged, unrepeated group
    pub fn group(alternatives: Vec<Vec<Fragment>>) -> Self {
        Fragment::Group {
            alternatives,
            tags: BTreeSet::new(),
            repetition: Repetition::ONCE,
        }
    }

    /// Repetition suffix, if this kind of fragment takes one
    pub fn repetition(&self) -> Option<Repetition> {
        match self {
            Fragment::Reference { repetition, .. }
            | Fragment::Literal { repetition, .. }
            | Fragment::Regex { repetition, .. }
            | Fragment::Group { repetition, .. }
            | Fragment::UpLevelBackReference { repetition, .. } => Some(*repetition),
            _ => None,
        }
    }

    /// Replace the repetition suffix; fragments without one are returned unchanged
    pub fn repeated(mut self, rep: Repetition) -> Self {
        match &mut self {
            Fragment::Reference { repetition, .. }
            | Fragment::Literal { repetition, .. }
            | Fragment::Regex { repetition, .. }
            | Fragment::Group { repetition, .. }
            | Fragment::UpLevelBackReference { repetition, .. } => *repetition = rep,
            _ => {}
        }
        self
    }

    /// Names of all rules this fragment references, recursively
    pub fn references(&self, out: &mut BTreeSet<String>) {
        match self {
            Fragment::Reference { name, .. } => {
                out.insert(name.clone());
            }
            Fragment::Group { alternatives, .. } => {
                for alt in alternatives {
                    for f in alt {
                        f.references(out);
                    }
                }
            }
            Fragment::Assertion { inner, .. } => inner.references(out),
            _ => {}
        }
    }

    /// Whether the fragment is a single terminal suitable for a terminal rule
    pub(crate) fn is_plain_terminal(&self) -> bool {
        match self {
            Fragment::Literal { repetition, .. } | Fragment::Regex { repetition, .. } => {
                repetition.is_redundant()
            }
            _ => false,
        }
    }
}

/// Render a literal with quotes chosen to need the fewest escapes
pub(crate) fn quote_literal(text: &str) -> String {
    let delimiter = if text.contains('"') && !text.contains('\'') {
        '\''
    } else {
        '"'
    };
    let mut out = String::with_capacity(text.len() + 2);
    out.push(delimiter);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

fn write_sequence(f: &mut fmt::Formatter<'_>, seq: &[Fragment]) -> fmt::Result {
    for (i, frag) in seq.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{}", frag)?;
    }
    Ok(())
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fragment::Reference { name, repetition } => write!(f, "<{}>{}", name, repetition),
            Fragment::Literal { text, repetition } => {
                write!(f, "{}{}", quote_literal(text), repetition)
            }
            Fragment::Regex {
                pattern,
                flags,
                repetition,
            } => write!(f, "/{}/{}{}", pattern, flags, repetition),
            Fragment::Group {
                alternatives,
                tags,
                repetition,
            } => {
                f.write_str("[")?;
                if !tags.is_empty() {
                    let joined: Vec<&str> = tags.iter().map(String::as_str).collect();
                    write!(f, "{{{}}}", joined.join(","))?;
                }
                for (i, alt) in alternatives.iter().enumerate() {
                    f.write_str(if i == 0 { " " } else { " | " })?;
                    write_sequence(f, alt)?;
                }
                write!(f, " ]{}", repetition)
            }
            Fragment::Assertion {
                positive,
                forward,
                inner,
            } => write!(
                f,
                "{}{}{}",
                if *positive { '~' } else { '!' },
                if *forward { "" } else { "-" },
                inner
            ),
            Fragment::BackReference { index } => write!(f, "{}", index),
            Fragment::UpLevelBackReference { index, repetition } => {
                write!(f, "{}^{}", index, repetition)
            }
            Fragment::Barrier { double } => f.write_str(if *double { "::" } else { ":" }),
        }
    }
}

/// A named rule body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Rule name
    pub name: String,
    /// Body fragments; a top-level alternation is a single group
    pub body: Vec<Fragment>,
    /// Optional trailing condition
    pub condition: Option<ConditionExpr>,
}

impl RuleDefinition {
    /// Definition without a condition
    pub fn new(name: impl Into<String>, body: Vec<Fragment>) -> Self {
        Self {
            name: name.into(),
            body,
            condition: None,
        }
    }

    /// Attach a condition
    pub fn with_condition(mut self, condition: ConditionExpr) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Names this body references
    pub fn references(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for f in &self.body {
            f.references(&mut out);
        }
        out
    }

    /// Rendered body, used for diagnostics and ordering
    pub fn body_text(&self) -> String {
        let mut s = String::new();
        for (i, f) in self.body.iter().enumerate() {
            if i > 0 {
                s.push(' ');
            }
            s.push_str(&f.to_string());
        }
        if let Some(c) = &self.condition {
            s.push_str(&format!(" ({})", c));
        }
        s
    }
}

impl fmt::Display for RuleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.body_text())
    }
}

/// Ordered collection of rule definitions plus the root name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    root: Option<String>,
    rules: Vec<RuleDefinition>,
}

impl RuleSet {
    /// Empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse textual rules; see [`rule_parser`](super::rule_parser)
    pub fn parse(text: &str) -> Result<RuleSet> {
        super::rule_parser::parse_rules(text)
    }

    /// Add a definition; the first one added becomes root unless
    /// [`set_root`](Self::set_root) says otherwise
    pub fn add(&mut self, def: RuleDefinition) -> Result<()> {
        if self.get(&def.name).is_some() {
            return Err(GrammarError::DuplicateRule { name: def.name });
        }
        self.rules.push(def);
        Ok(())
    }

    /// Builder form of [`add`](Self::add)
    pub fn rule(mut self, def: RuleDefinition) -> Result<Self> {
        self.add(def)?;
        Ok(self)
    }

    /// Designate the root rule explicitly
    pub fn set_root(&mut self, name: impl Into<String>) {
        self.root = Some(name.into());
    }

    /// Name of the root rule
    pub fn root(&self) -> Option<&str> {
        self.root
            .as_deref()
            .or_else(|| self.rules.first().map(|r| r.name.as_str()))
    }

    /// Look up a definition
    pub fn get(&self, name: &str) -> Option<&RuleDefinition> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Definitions in order
    pub fn rules(&self) -> &[RuleDefinition] {
        &self.rules
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are defined
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON; definitions go through [`add`](Self::add)
    /// so a repeated name is rejected
    pub fn from_json(json: &str) -> Result<RuleSet> {
        let raw: RuleSet = serde_json::from_str(json)?;
        let mut set = RuleSet {
            root: raw.root,
            rules: Vec::with_capacity(raw.rules.len()),
        };
        for def in raw.rules {
            set.add(def)?;
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let flags = RegexFlags::parse("rix").unwrap();
        assert!(flags.reversible && flags.case_insensitive && flags.extended);
        assert_eq!(flags.to_string(), "rix");
        assert_eq!(flags.inline_prefix(), "(?ix)");
        assert_eq!(RegexFlags::parse("q"), Err('q'));
        assert_eq!(RegexFlags::default().inline_prefix(), "");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("foo"), "\"foo\"");
        assert_eq!(quote_literal("a\"b"), "'a\"b'");
        assert_eq!(quote_literal("a\\b"), "\"a\\\\b\"");
        assert_eq!(quote_literal("'\""), "\"'\\\"\"");
    }

    #[test]
    fn test_fragment_display() {
        let g = Fragment::Group {
            alternatives: vec![vec![Fragment::literal("-")], vec![Fragment::literal("_")]],
            tags: ["t".to_string()].into_iter().collect(),
            repetition: Repetition::PLUS,
        };
        assert_eq!(g.to_string(), "[{t} \"-\" | \"_\" ]+");
        let a = Fragment::Assertion {
            positive: false,
            forward: false,
            inner: Box::new(Fragment::reference("b")),
        };
        assert_eq!(a.to_string(), "!-<b>");
        assert_eq!(
            Fragment::UpLevelBackReference {
                index: 1,
                repetition: Repetition::possessive(1, None)
            }
            .to_string(),
            "1^++"
        );
    }

    #[test]
    fn test_rule_set_root_and_duplicates() {
        let mut rs = RuleSet::new();
        assert!(rs.root().is_none());
        rs.add(RuleDefinition::new("a", vec![Fragment::literal("x")]))
            .unwrap();
        rs.add(RuleDefinition::new("b", vec![Fragment::reference("a")]))
            .unwrap();
        assert_eq!(rs.root(), Some("a"));
        rs.set_root("b");
        assert_eq!(rs.root(), Some("b"));
        let err = rs
            .add(RuleDefinition::new("a", vec![Fragment::literal("y")]))
            .unwrap_err();
        assert_eq!(err, GrammarError::DuplicateRule { name: "a".into() });
    }

    #[test]
    fn test_json_round_trip() {
        let rs = RuleSet::new()
            .rule(RuleDefinition::new(
                "ROOT",
                vec![Fragment::regex(r"\d+")],
            ))
            .unwrap()
            .rule(
                RuleDefinition::new("b", vec![Fragment::literal("x")])
                    .with_condition(ConditionExpr::Leaf("c".into())),
            )
            .unwrap();
        let json = rs.to_json().unwrap();
        assert_eq!(RuleSet::from_json(&json).unwrap(), rs);
        assert!(RuleSet::from_json("{").is_err());
    }

    #[test]
    fn test_json_duplicate_rule() {
        let rs = RuleSet::new()
            .rule(RuleDefinition::new("a", vec![Fragment::literal("x")]))
            .unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&rs.to_json().unwrap()).unwrap();
        let rules = value["rules"].as_array_mut().unwrap();
        let first = rules[0].clone();
        rules.push(first);
        assert_eq!(
            RuleSet::from_json(&value.to_string()).unwrap_err(),
            GrammarError::DuplicateRule { name: "a".into() }
        );
    }

    #[test]
    fn test_references() {
        let def = RuleDefinition::new(
            "a",
            vec![
                Fragment::reference("b"),
                Fragment::group(vec![vec![Fragment::reference("c")], vec![Fragment::literal("x")]]),
                Fragment::Assertion {
                    positive: true,
                    forward: true,
                    inner: Box::new(Fragment::reference("d")),
                },
            ],
        );
        let refs: Vec<String> = def.references().into_iter().collect();
        assert_eq!(refs, vec!["b", "c", "d"]);
    }
}
