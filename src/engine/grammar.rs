//! Grammar facade
//!
//! [`Grammar`] owns a compiled rule graph and the conditions bound to it.
//! Matching borrows the grammar immutably, so one grammar serves any number
//! of concurrent invocations; each invocation gets its own [`MatchIter`]
//! with a private cache.
//!
//! # Example
//!
//! ```
//! use grammatic::{Grammar, Options};
//!
//! let g: Grammar = "ROOT = <word> [ ',' <word> ]*\nword = /\\w+/".parse().unwrap();
//! let found: Vec<_> = g.find("a,b c", Options::default()).unwrap().collect();
//! assert_eq!(found.len(), 2);
//! assert_eq!(found[0].group("a,b c"), "a,b");
//! ```

use super::analysis::{self, RuleAnalyzer};
use super::cache::MatchCache;
use super::compiler::{self, CompiledGrammar, Compiler};
use super::condition::ConditionRegistry;
use super::debug::MatchTrace;
use super::error::{GrammarError, Result};
use super::fragment::{RegexFlags, RuleSet};
use super::label::LabelKind;
use super::matcher::{Diagnostics, Env, Matcher, Signal};
use super::matches::Match;
use super::options::{GlobalState, Options};
use super::regex_cache;
use super::rule::{Rule, RuleGraph, RuleId, RuleKind};
use super::study::{self, Indexer};
use super::text::Text;
use super::tree::ParseTree;
use hashbrown::HashMap;
use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::str::FromStr;
use std::sync::Arc;

/// A compiled grammar ready for matching
#[derive(Debug, Clone)]
pub struct Grammar {
    graph: RuleGraph,
    root: RuleId,
    root_name: String,
    names: HashMap<String, RuleId>,
    conditions: BTreeSet<String>,
    registry: ConditionRegistry,
    /// Terminals a forward match of the root can try
    studied: BTreeSet<RuleId>,
    /// Terminals one of which starts every match of the root
    first: Option<BTreeSet<RuleId>>,
}

impl Grammar {
    /// Compile a rule set
    pub fn new(rules: RuleSet) -> Result<Self> {
        Ok(Self::from_compiled(Compiler::new(rules).compile()?))
    }

    /// Compile rule text; see [`rule_parser`](super::rule_parser) for the syntax
    pub fn parse(text: &str) -> Result<Self> {
        Self::new(RuleSet::parse(text)?)
    }

    fn from_compiled(compiled: CompiledGrammar) -> Self {
        let mut grammar = Self {
            graph: compiled.graph,
            root: compiled.root,
            root_name: compiled.root_name,
            names: compiled.names,
            conditions: compiled.conditions,
            registry: ConditionRegistry::new(),
            studied: BTreeSet::new(),
            first: None,
        };
        grammar.refresh();
        log_debug!(
            "compiled grammar rooted at {}: {} rules",
            grammar.root_name,
            grammar.graph.len()
        );
        grammar
    }

    /// Recompute everything derived from the graph's shape
    fn refresh(&mut self) {
        analysis::annotate(&mut self.graph);
        let analyzer = RuleAnalyzer::new(&self.graph);
        self.studied = analyzer.reachable_terminals(self.root);
        self.first = analyzer.first_terminals(self.root);
    }

    /// The root rule
    #[inline]
    pub fn root(&self) -> RuleId {
        self.root
    }

    /// Name of the root rule
    #[inline]
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// A compiled rule
    #[inline]
    pub fn rule(&self, id: RuleId) -> &Rule {
        self.graph.get(id)
    }

    /// The rule a name is bound to
    pub fn rule_id(&self, name: &str) -> Option<RuleId> {
        self.names.get(name).copied()
    }

    /// Short display form of a rule, `<name>` or its inline body
    pub fn display_name(&self, id: RuleId) -> String {
        self.graph.display_name(id)
    }

    pub(crate) fn graph(&self) -> &RuleGraph {
        &self.graph
    }

    // ========================================================================
    // Post-compile definitions
    // ========================================================================

    /// Supply a literal for a rule the grammar references but never defines
    pub fn define_literal(&mut self, name: &str, text: &str) -> Result<()> {
        let placeholder = self.undefined_slot(name)?;
        let id = self.graph.intern(RuleKind::Literal {
            text: text.to_string(),
        });
        self.bind_deferred(name, placeholder, id)
    }

    /// Supply a regex, with flags from `r i s m d u x`
    pub fn define_regex(&mut self, name: &str, pattern: &str, flags: &str) -> Result<()> {
        let placeholder = self.undefined_slot(name)?;
        let flags = RegexFlags::parse(flags).map_err(|c| {
            GrammarError::ill_formed(format!("/{}/{}", pattern, flags), format!("unknown regex flag '{}'", c))
        })?;
        let regex = regex_cache::get_or_compile(pattern, &flags)?;
        let id = self.graph.intern(RuleKind::Regex {
            pattern: pattern.to_string(),
            flags,
            regex,
        });
        self.bind_deferred(name, placeholder, id)
    }

    /// Supply another grammar as the definition of `name`
    ///
    /// The sub-grammar's root takes the name `name`; its other named rules
    /// are imported as `name_<rule>`, and those still undefined can be
    /// defined in turn under their new names. Conditions bound in the
    /// sub-grammar come along unless this grammar already binds the name.
    pub fn define_rule(&mut self, name: &str, grammar: &Grammar) -> Result<()> {
        let placeholder = self.undefined_slot(name)?;
        let rename = |n: &str| {
            if n == grammar.root_name {
                name.to_string()
            } else {
                format!("{}_{}", name, n)
            }
        };
        let base = self.graph.import(&grammar.graph, rename);
        let shift = |id: RuleId| RuleId(base + id.index());
        for (n, id) in &grammar.names {
            if *n != grammar.root_name {
                self.names.entry(rename(n)).or_insert(shift(*id));
            }
        }
        for condition in &grammar.conditions {
            self.conditions.insert(condition.clone());
            if let Some(c) = grammar.registry.get(condition) {
                if !self.registry.contains(condition) {
                    self.registry.define(condition, Arc::clone(c))?;
                }
            }
        }
        compiler::bind_placeholder(&mut self.graph, placeholder, shift(grammar.root))?;
        self.refresh();
        log_debug!("imported {} rules as <{}>", grammar.graph.len(), name);
        Ok(())
    }

    /// Bind a condition name used by some rule
    pub fn define_condition<F>(&mut self, name: &str, condition: F) -> Result<()>
    where
        F: Fn(&Match, &str) -> bool + Send + Sync + 'static,
    {
        if !self.conditions.contains(name) {
            return Err(GrammarError::UnknownName {
                name: name.to_string(),
            });
        }
        self.registry.define(name, Arc::new(condition))
    }

    fn undefined_slot(&self, name: &str) -> Result<RuleId> {
        let id = self.rule_id(name).ok_or_else(|| GrammarError::UnknownName {
            name: name.to_string(),
        })?;
        match &self.graph.get(id).kind {
            RuleKind::Deferred { target: None, .. } => Ok(id),
            _ => Err(GrammarError::AlreadyDefined {
                name: name.to_string(),
            }),
        }
    }

    fn bind_deferred(&mut self, name: &str, placeholder: RuleId, id: RuleId) -> Result<()> {
        self.graph.bind_name(id, name, LabelKind::Explicit, 1);
        compiler::bind_placeholder(&mut self.graph, placeholder, id)?;
        self.refresh();
        log_debug!("defined <{}>", name);
        Ok(())
    }

    /// Names still waiting for a definition
    pub fn undefined_rules(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .names
            .iter()
            .filter(|(_, id)| {
                matches!(
                    self.graph.get(**id).kind,
                    RuleKind::Deferred { target: None, .. }
                )
            })
            .map(|(n, _)| n.clone())
            .collect();
        names.sort();
        names
    }

    /// Condition names still waiting for a predicate
    pub fn undefined_conditions(&self) -> Vec<String> {
        self.conditions
            .iter()
            .filter(|c| !self.registry.contains(c))
            .cloned()
            .collect()
    }

    /// Fail if any referenced rule or condition is still undefined
    pub fn check_complete(&self) -> Result<()> {
        let names = self.undefined_rules();
        if !names.is_empty() {
            return Err(GrammarError::UndefinedTerminal { names });
        }
        self.check_conditions()
    }

    fn check_conditions(&self) -> Result<()> {
        let names = self.undefined_conditions();
        if names.is_empty() {
            Ok(())
        } else {
            Err(GrammarError::UndefinedCondition { names })
        }
    }

    /// The grammar as rule text
    ///
    /// Root first, then the other named rules by generation, highest
    /// first, then by name. Parsing the output gives an equivalent grammar.
    pub fn describe(&self) -> String {
        let mut others: Vec<(&String, RuleId)> = self
            .names
            .iter()
            .filter(|(n, _)| **n != self.root_name)
            .map(|(n, id)| (n, *id))
            .collect();
        others.sort_by(|(a, ia), (b, ib)| {
            self.graph
                .get(*ib)
                .generation
                .cmp(&self.graph.get(*ia).generation)
                .then_with(|| a.cmp(b))
        });
        let mut out = String::new();
        let root = std::iter::once((&self.root_name, self.root));
        for (name, id) in root.chain(others) {
            if let Some(body) = self.describe_rule(name, id) {
                out.push_str(name);
                out.push_str(" = ");
                out.push_str(&body);
                out.push('\n');
            }
        }
        out
    }

    fn describe_rule(&self, name: &str, id: RuleId) -> Option<String> {
        let rule = self.graph.get(id);
        match &rule.kind {
            RuleKind::Deferred { target: None, .. } => None,
            RuleKind::Cyclic { .. } | RuleKind::Deferred { .. } => Some(self.graph.render_body(id)),
            _ if rule.label.id == name => Some(self.graph.render_body(id)),
            _ => Some(self.graph.render_ref(id)),
        }
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Matches of the whole region
    pub fn matches<'g, 't>(&'g self, text: &'t str, options: Options) -> Result<MatchIter<'g, 't>> {
        self.start(text, options, Mode::Matches, None)
    }

    /// Matches anchored at the region start
    pub fn looking_at<'g, 't>(&'g self, text: &'t str, options: Options) -> Result<MatchIter<'g, 't>> {
        self.start(text, options, Mode::LookingAt, None)
    }

    /// Matches anywhere in the region
    pub fn find<'g, 't>(&'g self, text: &'t str, options: Options) -> Result<MatchIter<'g, 't>> {
        self.start(text, options, Mode::Find, None)
    }

    /// Matches starting only where `indexer` says
    pub fn find_with<'g, 't>(
        &'g self,
        text: &'t str,
        options: Options,
        indexer: &dyn Indexer,
    ) -> Result<MatchIter<'g, 't>> {
        self.start(text, options, Mode::Find, Some(indexer))
    }

    /// Finalized view of a match found in `text`
    pub fn tree<'g, 't>(&'g self, text: &'t str, m: &Match) -> ParseTree<'g, 't> {
        ParseTree::new(self, text, m)
    }

    fn start<'g, 't>(
        &'g self,
        text: &'t str,
        options: Options,
        mode: Mode,
        indexer: Option<&dyn Indexer>,
    ) -> Result<MatchIter<'g, 't>> {
        let state = options.resolve(text)?;
        self.check_conditions()?;
        let mut cache = MatchCache::for_input(state.end - state.start, self.graph.len());
        if state.study {
            study::study(&self.graph, &self.studied, text, state.start, state.end, &mut cache);
        }
        let offsets = match (mode, indexer) {
            (Mode::Find, Some(indexer)) => {
                let mut offsets: Vec<usize> = indexer
                    .index(text, state.start, state.end)
                    .into_iter()
                    .filter(|o| (state.start..=state.end).contains(o) && text.is_char_boundary(*o))
                    .collect();
                offsets.sort_unstable();
                offsets.dedup();
                offsets
            }
            (Mode::Find, None) => match (&self.first, state.study) {
                (Some(first), true) => study::first_offsets(&cache, first),
                _ => text[state.start..state.end]
                    .char_indices()
                    .map(|(i, _)| state.start + i)
                    .chain(std::iter::once(state.end))
                    .collect(),
            },
            _ => vec![state.start],
        };
        log_debug!(
            "{:?} over {}..{}: {} start offsets",
            mode,
            state.start,
            state.end,
            offsets.len()
        );
        let diag = Diagnostics {
            trace: state.trace.then(MatchTrace::new),
            rightmost: None,
            keep_rightmost: state.keep_rightmost,
        };
        Ok(MatchIter {
            grammar: self,
            session: Session {
                text: Text::new(text),
                cache,
                diag: RefCell::new(diag),
            },
            state,
            mode,
            offsets,
            cursor: 0,
            min_next: state.start,
            current: None,
            queued: VecDeque::new(),
            error: None,
            finished: false,
        })
    }
}

impl FromStr for Grammar {
    type Err = GrammarError;

    fn from_str(s: &str) -> Result<Self> {
        Grammar::parse(s)
    }
}

/// Kind of top-level search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Matches,
    LookingAt,
    Find,
}

impl Mode {
    fn is_anchored(self) -> bool {
        self != Mode::Find
    }
}

/// State an [`Env`] borrows for the length of one call
struct Session<'t> {
    text: Text<'t>,
    cache: MatchCache,
    diag: RefCell<Diagnostics>,
}

/// Lazy iterator over the results of one invocation
///
/// A fatal error ends the iteration; [`error`](Self::error) reports it.
pub struct MatchIter<'g, 't> {
    grammar: &'g Grammar,
    session: Session<'t>,
    state: GlobalState,
    mode: Mode,
    offsets: Vec<usize>,
    cursor: usize,
    /// Without overlap, the next start may not precede this
    min_next: usize,
    current: Option<Matcher>,
    queued: VecDeque<Match>,
    error: Option<GrammarError>,
    finished: bool,
}

impl<'g, 't> MatchIter<'g, 't> {
    /// The error that ended the iteration early, if any
    pub fn error(&self) -> Option<&GrammarError> {
        self.error.as_ref()
    }

    /// Whether another result follows, without consuming it
    ///
    /// The answer is exact: the next result is computed ahead and handed
    /// out by the following call to `next`.
    pub fn might_have_next(&mut self) -> bool {
        if !self.queued.is_empty() {
            return true;
        }
        match self.advance() {
            Some(m) => {
                self.queued.push_front(m);
                true
            }
            None => false,
        }
    }

    /// Non-root match reaching furthest into the text so far, the widest
    /// among ties, with
    /// [`Options::keep_rightmost`](crate::Options::keep_rightmost) on
    pub fn rightmost_match(&self) -> Option<Match> {
        self.session.diag.borrow().rightmost.clone()
    }

    /// Trace recorded so far, with [`Options::trace`](crate::Options::trace) on
    pub fn trace(&self) -> Option<MatchTrace> {
        self.session.diag.borrow().trace.clone()
    }

    /// Match cache hits, misses and hit rate
    pub fn cache_stats(&self) -> (u64, u64, f64) {
        self.session.cache.stats()
    }

    /// The text being searched
    pub fn text(&self) -> &'t str {
        self.session.text.forward()
    }

    fn next_offset(&mut self) -> Option<usize> {
        while let Some(&offset) = self.offsets.get(self.cursor) {
            self.cursor += 1;
            if offset >= self.min_next {
                return Some(offset);
            }
        }
        None
    }

    fn fail(&mut self, e: GrammarError) {
        log_debug!("match aborted: {}", e);
        self.error = Some(e);
        self.finished = true;
        self.current = None;
    }

    /// Done with the current start offset after producing `m`, if any
    fn close_start(&mut self, produced: Option<&Match>) {
        self.current = None;
        if self.mode.is_anchored() {
            self.finished = true;
            return;
        }
        if let Some(m) = produced {
            if !self.state.allow_overlap {
                let text = self.session.text.forward();
                self.min_next = if m.is_zero_width() {
                    m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8)
                } else {
                    m.end()
                };
            }
        }
    }

    /// Next acceptable result of the current matcher
    fn step(&mut self) -> std::result::Result<Option<Match>, Signal> {
        let grammar = self.grammar;
        let Some(current) = self.current.as_mut() else {
            return Ok(None);
        };
        let Session { text, cache, diag } = &mut self.session;
        let mut env = Env::top(
            &grammar.graph,
            &grammar.registry,
            text,
            cache,
            diag,
            (self.state.start, self.state.end),
            self.state.max_depth,
        );
        loop {
            match current.next(&mut env, None)? {
                Some(m) if self.mode == Mode::Matches && m.end() != self.state.end => {}
                found => return Ok(found),
            }
        }
    }

    fn open(&mut self, offset: usize) -> std::result::Result<(), Signal> {
        let grammar = self.grammar;
        let Session { text, cache, diag } = &mut self.session;
        let mut env = Env::top(
            &grammar.graph,
            &grammar.registry,
            text,
            cache,
            diag,
            (self.state.start, self.state.end),
            self.state.max_depth,
        );
        self.current = Some(Matcher::new(&mut env, grammar.root, offset)?);
        Ok(())
    }

    /// Every widest result at the current start
    fn longest(&mut self) -> std::result::Result<Vec<Match>, Signal> {
        let mut widest: Vec<Match> = Vec::new();
        while let Some(m) = self.step()? {
            match widest.first() {
                Some(w) if m.end() < w.end() => {}
                Some(w) if m.end() == w.end() => widest.push(m),
                _ => widest = vec![m],
            }
        }
        Ok(widest)
    }

    /// Next result, or `None` once the search is over
    fn advance(&mut self) -> Option<Match> {
        loop {
            if let Some(m) = self.queued.pop_front() {
                return Some(m);
            }
            if self.finished {
                return None;
            }
            if self.current.is_none() {
                let Some(offset) = self.next_offset() else {
                    self.finished = true;
                    continue;
                };
                match self.open(offset) {
                    Ok(()) => {}
                    Err(Signal::Fatal(e)) => {
                        self.fail(e);
                        continue;
                    }
                    Err(Signal::Barrier { .. }) => continue,
                }
            }
            if self.state.longest_match {
                match self.longest() {
                    Ok(widest) => {
                        let first = widest.first().cloned();
                        if self.state.allow_overlap {
                            self.queued.extend(widest);
                        } else {
                            self.queued.extend(first.clone());
                        }
                        self.close_start(first.as_ref());
                    }
                    // a barrier abandons the start, and what it found with it
                    Err(Signal::Barrier { .. }) => self.close_start(None),
                    Err(Signal::Fatal(e)) => self.fail(e),
                }
                continue;
            }
            match self.step() {
                Ok(Some(m)) => {
                    if !self.state.allow_overlap {
                        self.close_start(Some(&m));
                    }
                    return Some(m);
                }
                Ok(None) | Err(Signal::Barrier { .. }) => self.close_start(None),
                Err(Signal::Fatal(e)) => self.fail(e),
            }
        }
    }
}

impl<'g, 't> Iterator for MatchIter<'g, 't> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        self.advance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(iter: MatchIter<'_, '_>) -> Vec<(usize, usize)> {
        iter.map(|m| (m.start(), m.end())).collect()
    }

    #[test]
    fn test_find_without_overlap() {
        let g: Grammar = "ROOT = 'a'+".parse().unwrap();
        let found = spans(g.find("aa b aaa", Options::default()).unwrap());
        assert_eq!(found, vec![(0, 2), (5, 8)]);
    }

    #[test]
    fn test_find_with_overlap() {
        let g: Grammar = "ROOT = 'a'+".parse().unwrap();
        let found = spans(g.find("aa", Options::default().match_all()).unwrap());
        assert_eq!(found, vec![(0, 2), (0, 1), (1, 2)]);
    }

    #[test]
    fn test_zero_width_find_advances() {
        let g: Grammar = "ROOT = 'a'*".parse().unwrap();
        let found = spans(g.find("ba", Options::default()).unwrap());
        assert_eq!(found, vec![(0, 0), (1, 2), (2, 2)]);
    }

    #[test]
    fn test_study_does_not_change_results() {
        let g: Grammar = "ROOT = /\\d+/ '-' /\\d+/".parse().unwrap();
        let text = "1-2 x 33-44 5-";
        let studied = spans(g.find(text, Options::default()).unwrap());
        let plain = spans(g.find(text, Options::default().with_study(false)).unwrap());
        assert_eq!(studied, plain);
        assert_eq!(studied, vec![(0, 3), (6, 11)]);
    }

    #[test]
    fn test_matches_requires_full_region() {
        let g: Grammar = "ROOT = 'a'+".parse().unwrap();
        assert_eq!(spans(g.matches("aaa", Options::default()).unwrap()), vec![(0, 3)]);
        assert!(spans(g.matches("aab", Options::default()).unwrap()).is_empty());
        let region = Options::default().with_start(1).with_end(3);
        assert_eq!(spans(g.matches("baab", region).unwrap()), vec![(1, 3)]);
    }

    #[test]
    fn test_looking_at_is_anchored() {
        let g: Grammar = "ROOT = 'a'+".parse().unwrap();
        assert_eq!(spans(g.looking_at("aab", Options::default()).unwrap()), vec![(0, 2)]);
        assert!(spans(g.looking_at("baa", Options::default()).unwrap()).is_empty());
        let all = Options::default().with_allow_overlap(true);
        assert_eq!(spans(g.looking_at("aab", all).unwrap()), vec![(0, 2), (0, 1)]);
    }

    #[test]
    fn test_might_have_next_is_exact() {
        let g: Grammar = "ROOT = 'a' 'b'".parse().unwrap();
        let mut none = g.looking_at("ax", Options::default()).unwrap();
        assert!(!none.might_have_next());
        assert!(none.next().is_none());

        let mut found = g.find("ab ab", Options::default()).unwrap();
        assert!(found.might_have_next());
        assert!(found.might_have_next());
        assert_eq!(found.next().map(|m| m.start()), Some(0));
        assert!(found.might_have_next());
        assert_eq!(found.next().map(|m| m.start()), Some(3));
        assert!(!found.might_have_next());
        assert!(found.next().is_none());
    }

    #[test]
    fn test_longest_match() {
        let g: Grammar = "ROOT = 'a' | 'ab' | 'abc'".parse().unwrap();
        let longest = Options::default().with_longest_match(true);
        assert_eq!(spans(g.find("abc", longest).unwrap()), vec![(0, 3)]);
        assert_eq!(spans(g.find("abc", Options::default()).unwrap()), vec![(0, 1)]);
    }

    #[test]
    fn test_double_barrier_abandons_start() {
        let g: Grammar = "ROOT = [ 'a' :: 'b' ] | 'a'".parse().unwrap();
        assert!(spans(g.looking_at("ac", Options::default()).unwrap()).is_empty());
        let g: Grammar = "ROOT = [ 'a' : 'b' ] | 'a'".parse().unwrap();
        assert_eq!(spans(g.looking_at("ac", Options::default()).unwrap()), vec![(0, 1)]);
    }

    #[test]
    fn test_indexer_limits_starts() {
        let g: Grammar = "ROOT = /\\w+/".parse().unwrap();
        let indexer = study::CharacterIndexer::new('b');
        let found = spans(g.find_with("ab cb", Options::default(), &indexer).unwrap());
        assert_eq!(found, vec![(1, 2), (4, 5)]);
    }

    #[test]
    fn test_define_literal_and_regex() {
        let mut g: Grammar = "ROOT = <a> <b>".parse().unwrap();
        assert_eq!(g.undefined_rules(), vec!["a", "b"]);
        assert!(matches!(
            g.check_complete(),
            Err(GrammarError::UndefinedTerminal { .. })
        ));
        g.define_literal("a", "x").unwrap();
        g.define_regex("b", "Y+", "i").unwrap();
        g.check_complete().unwrap();
        assert_eq!(spans(g.find("-xyY", Options::default()).unwrap()), vec![(1, 4)]);
        assert_eq!(
            g.define_literal("a", "z"),
            Err(GrammarError::AlreadyDefined { name: "a".into() })
        );
        assert_eq!(
            g.define_literal("nope", "z"),
            Err(GrammarError::UnknownName { name: "nope".into() })
        );
    }

    #[test]
    fn test_undefined_rule_reported_when_reached() {
        let g: Grammar = "ROOT = 'x' <later> | 'y'".parse().unwrap();
        let mut iter = g.find("y x", Options::default().with_study(false)).unwrap();
        assert_eq!(iter.next().map(|m| m.start()), Some(0));
        assert_eq!(iter.next(), None);
        assert_eq!(
            iter.error(),
            Some(&GrammarError::UndefinedTerminal {
                names: vec!["later".into()]
            })
        );
    }

    #[test]
    fn test_define_rule_imports_grammar() {
        let mut g: Grammar = "ROOT = <num> [ ',' <num> ]*".parse().unwrap();
        let num: Grammar = "n = <digit>+\ndigit = /\\d/".parse().unwrap();
        g.define_rule("num", &num).unwrap();
        assert_eq!(spans(g.find("12,3", Options::default()).unwrap()), vec![(0, 4)]);
        assert!(g.rule_id("num_digit").is_some());
        assert_eq!(
            g.define_rule("num", &num),
            Err(GrammarError::AlreadyDefined { name: "num".into() })
        );
    }

    #[test]
    fn test_conditions_must_be_defined() {
        let mut g: Grammar = "ROOT = /\\d+/ (small)".parse().unwrap();
        assert_eq!(
            g.find("5", Options::default()).err(),
            Some(GrammarError::UndefinedCondition {
                names: vec!["small".into()]
            })
        );
        g.define_condition("small", |_: &Match, s: &str| s.len() < 2)
            .unwrap();
        assert_eq!(
            spans(g.find("5 42 7", Options::default()).unwrap()),
            vec![(0, 1), (3, 4), (5, 6)]
        );
        assert!(g.define_condition("other", |_: &Match, _: &str| true).is_err());
    }

    #[test]
    fn test_describe() {
        let g: Grammar = "ROOT = <a>+ <b>\na = 'a'\nb = /b/i".parse().unwrap();
        assert_eq!(g.describe(), "ROOT = <a>+ <b>\na = \"a\"\nb = /b/i\n");
    }

    #[test]
    fn test_rightmost_and_trace() {
        let g: Grammar = "ROOT = <a> <b>\na = 'a'+\nb = 'b'".parse().unwrap();
        let opts = Options::default().with_keep_rightmost(true).trace(true);
        let mut iter = g.looking_at("aac", opts).unwrap();
        assert_eq!(iter.next(), None);
        let rightmost = iter.rightmost_match().unwrap();
        assert_eq!((rightmost.start(), rightmost.end()), (0, 2));
        assert!(!iter.trace().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_options() {
        let g: Grammar = "ROOT = 'a'".parse().unwrap();
        assert!(matches!(
            g.find("abc", Options::default().with_start(4)),
            Err(GrammarError::InvalidOptions { .. })
        ));
    }
}
