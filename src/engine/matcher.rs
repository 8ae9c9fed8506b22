//! Lazy backtracking matchers
//!
//! A [`Matcher`] enumerates the matches of one rule at one offset, one
//! result per call to [`Matcher::next`], in precedence order. Matchers are
//! single-use and only move forward: once `next` returns `None` the
//! matcher is exhausted for good.
//!
//! Everything that varies per invocation lives in an [`Env`]: the text
//! and the view onto it, the match cache, the stack of `(rule, offset)`
//! pairs currently being fetched (for the recursion cut) and the shared
//! diagnostics. A backward assertion runs its rule in a child `Env` with a
//! reversed view and a private cache.
//!
//! Ordinary failure is `Ok(None)`. Barrier crossings and fatal errors are
//! [`Signal`]s carried in the `Err` arm so `?` unwinds them through every
//! matcher between the barrier and whoever handles it.

use super::cache::{CachedMatch, MatchCache};
use super::condition::ConditionRegistry;
use super::debug::{MatchTrace, TraceAction, TraceEntry};
use super::error::GrammarError;
use super::matches::Match;
use super::repetition::{Greed, Repetition};
use super::rule::{RuleGraph, RuleId, RuleKind};
use super::text::{Text, View};
use std::cell::RefCell;

/// Non-local exits from a match attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Signal {
    /// Backtracking crossed a barrier; `double` for `::`
    Barrier { double: bool },
    /// Matching cannot continue
    Fatal(GrammarError),
}

impl From<GrammarError> for Signal {
    fn from(e: GrammarError) -> Self {
        Signal::Fatal(e)
    }
}

pub(crate) type Step<T> = std::result::Result<T, Signal>;

/// Constituents already matched by the nearest enclosing sequence
pub(crate) type Scope<'s> = Option<&'s [Match]>;

/// Side channels shared by every matcher of one invocation
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    pub(crate) trace: Option<MatchTrace>,
    pub(crate) rightmost: Option<Match>,
    pub(crate) keep_rightmost: bool,
}

/// Per-invocation matching environment
pub(crate) struct Env<'e> {
    pub(crate) graph: &'e RuleGraph,
    pub(crate) conditions: &'e ConditionRegistry,
    pub(crate) text: &'e Text<'e>,
    pub(crate) view: View,
    pub(crate) cache: &'e mut MatchCache,
    pub(crate) stack: Vec<(RuleId, usize)>,
    pub(crate) max_depth: usize,
    pub(crate) diag: &'e RefCell<Diagnostics>,
    /// Recursion cuts so far; results influenced by a cut are not cached
    pub(crate) cuts: usize,
}

impl<'e> Env<'e> {
    /// Environment of a top-level invocation over the region
    /// `text[start..end]`
    pub(crate) fn top(
        graph: &'e RuleGraph,
        conditions: &'e ConditionRegistry,
        text: &'e Text<'e>,
        cache: &'e mut MatchCache,
        diag: &'e RefCell<Diagnostics>,
        (start, end): (usize, usize),
        max_depth: usize,
    ) -> Self {
        Self {
            graph,
            conditions,
            text,
            view: View::region(start, end),
            cache,
            stack: Vec::new(),
            max_depth,
            diag,
            cuts: 0,
        }
    }

    fn haystack(&self) -> &'e str {
        self.text.haystack(self.view.reversed)
    }

    fn is_forward_root(&self) -> bool {
        !self.view.reversed && self.view.shift == 0
    }

    fn trace(&self, rule: RuleId, offset: usize, action: TraceAction) {
        let mut diag = self.diag.borrow_mut();
        if let Some(trace) = diag.trace.as_mut() {
            trace.add(TraceEntry {
                offset,
                rule,
                action,
                depth: self.stack.len(),
                reversed: self.view.reversed,
            });
        }
    }

    fn observe(&self, m: &Match) {
        if self.stack.is_empty() || !self.is_forward_root() {
            return;
        }
        let mut diag = self.diag.borrow_mut();
        let further = |r: &Match| m.end() > r.end() || (m.end() == r.end() && m.start() < r.start());
        if diag.keep_rightmost && diag.rightmost.as_ref().map_or(true, further) {
            diag.rightmost = Some(m.clone());
        }
    }

    /// Same-rule ancestors at one offset
    fn depth_of(&self, rule: RuleId, offset: usize) -> usize {
        self.stack
            .iter()
            .filter(|(r, o)| *r == rule && *o == offset)
            .count()
    }
}

/// Lazy enumerator of one rule's matches at one offset
pub(crate) struct Matcher {
    rule: RuleId,
    offset: usize,
    done: bool,
    started: bool,
    cuts_at_start: usize,
    state: State,
}

enum State {
    /// Cut by the recursion cap
    Dead,
    Terminal(Option<Match>),
    BackReference { index: usize, fired: bool },
    Barrier { double: bool, fired: bool },
    Alternation(AlternationState),
    Sequence(SequenceState),
    Repetition(RepetitionState),
    Assertion { fired: bool },
    Conditional(Box<Matcher>),
}

struct AlternationState {
    next_index: usize,
    current: Option<Box<Matcher>>,
}

struct SequenceState {
    matchers: Vec<Matcher>,
    matched: Vec<Match>,
    yielded: bool,
}

struct RepetitionState {
    inner: RuleId,
    repetition: Repetition,
    matchers: Vec<Matcher>,
    matched: Vec<Match>,
    /// Greedy: the arrangement just yielded must be shrunk first
    pending_pop: bool,
    /// Stingy: number of repetitions currently sought
    goal: usize,
    /// Stingy: an arrangement was found at the current goal
    found_at_goal: bool,
    yielded: bool,
}

impl Matcher {
    /// Matcher for `rule` at view offset `offset`
    pub(crate) fn new(env: &mut Env<'_>, rule: RuleId, offset: usize) -> Step<Matcher> {
        let (rule, crossed_cycle) = match env.graph.resolve(rule) {
            Some(resolved) => resolved,
            None => {
                return Err(Signal::Fatal(GrammarError::UndefinedTerminal {
                    names: vec![undefined_name(env.graph, rule)],
                }))
            }
        };
        let mut matcher = Matcher {
            rule,
            offset,
            done: false,
            started: false,
            cuts_at_start: 0,
            state: State::Dead,
        };
        if crossed_cycle && env.depth_of(rule, offset) >= env.max_depth {
            env.cuts += 1;
            env.trace(rule, offset, TraceAction::DepthCut);
            matcher.done = true;
            return Ok(matcher);
        }
        let graph = env.graph;
        matcher.state = match &graph.get(rule).kind {
            RuleKind::Literal { .. } | RuleKind::Regex { .. } => {
                State::Terminal(match_terminal(env, rule, offset))
            }
            RuleKind::BackReference { index } | RuleKind::UpLevelBackReference { index } => {
                State::BackReference {
                    index: *index,
                    fired: false,
                }
            }
            RuleKind::Barrier { double } => State::Barrier {
                double: *double,
                fired: false,
            },
            RuleKind::Alternation { .. } => State::Alternation(AlternationState {
                next_index: 0,
                current: None,
            }),
            RuleKind::Sequence { items, .. } => State::Sequence(SequenceState {
                matchers: Vec::with_capacity(items.len()),
                matched: Vec::with_capacity(items.len()),
                yielded: false,
            }),
            RuleKind::Repetition {
                inner, repetition, ..
            } => State::Repetition(RepetitionState {
                inner: *inner,
                repetition: *repetition,
                matchers: Vec::new(),
                matched: Vec::new(),
                pending_pop: false,
                goal: repetition.lower,
                found_at_goal: false,
                yielded: false,
            }),
            RuleKind::Assertion { .. } => State::Assertion { fired: false },
            RuleKind::Conditional { inner, .. } => {
                State::Conditional(Box::new(Matcher::new(env, *inner, offset)?))
            }
            // resolve() never stops on a placeholder
            RuleKind::Cyclic { .. } | RuleKind::Deferred { .. } => State::Dead,
        };
        Ok(matcher)
    }

    /// The rule this matcher enumerates, after placeholders
    #[inline]
    pub(crate) fn rule(&self) -> RuleId {
        self.rule
    }

    /// The next match, or `None` once exhausted
    pub(crate) fn next(&mut self, env: &mut Env<'_>, scope: Scope<'_>) -> Step<Option<Match>> {
        if self.done {
            return Ok(None);
        }
        let first = !self.started;
        let cacheable = !env.graph.get(self.rule).uncached;
        if first {
            self.started = true;
            self.cuts_at_start = env.cuts;
            if cacheable && env.cache.is_failed(self.rule, self.offset) {
                self.done = true;
                return Ok(None);
            }
        }
        env.trace(self.rule, self.offset, TraceAction::Enter);
        env.stack.push((self.rule, self.offset));
        let result = self.fetch(env, scope);
        env.stack.pop();
        let result = result?;

        if first && cacheable {
            match &result {
                Some(_) => env.cache.record(self.rule, self.offset, CachedMatch::Matched),
                None if env.cuts == self.cuts_at_start => {
                    env.cache.record(self.rule, self.offset, CachedMatch::Failed)
                }
                None => {}
            }
        }
        match &result {
            Some(m) => {
                env.trace(self.rule, self.offset, TraceAction::Match { end: m.end() });
                env.observe(m);
            }
            None => {
                self.done = true;
                env.trace(self.rule, self.offset, TraceAction::Fail);
            }
        }
        Ok(result)
    }

    fn fetch(&mut self, env: &mut Env<'_>, scope: Scope<'_>) -> Step<Option<Match>> {
        let graph = env.graph;
        let (rule, offset) = (self.rule, self.offset);
        match &mut self.state {
            State::Dead => Ok(None),
            State::Terminal(pending) => Ok(pending.take()),
            State::BackReference { index, fired } => {
                if *fired {
                    return Ok(None);
                }
                *fired = true;
                Ok(match_back_reference(env, rule, offset, *index, scope))
            }
            State::Barrier { double, fired } => {
                if *fired {
                    return Err(Signal::Barrier { double: *double });
                }
                *fired = true;
                Ok(Some(Match::empty(rule, offset)))
            }
            State::Alternation(state) => {
                let alternatives = match &graph.get(rule).kind {
                    RuleKind::Alternation { alternatives, .. } => alternatives,
                    _ => return Ok(None),
                };
                loop {
                    if state.current.is_none() {
                        let Some(next) = alternatives.get(state.next_index) else {
                            return Ok(None);
                        };
                        state.next_index += 1;
                        state.current = Some(Box::new(Matcher::new(env, *next, offset)?));
                    }
                    if let Some(current) = state.current.as_mut() {
                        match current.next(env, scope)? {
                            Some(m) => {
                                return Ok(Some(Match::with_children(
                                    rule,
                                    m.start(),
                                    m.end(),
                                    vec![m],
                                )))
                            }
                            None => state.current = None,
                        }
                    }
                }
            }
            State::Sequence(state) => {
                let items = match &graph.get(rule).kind {
                    RuleKind::Sequence { items, .. } => items,
                    _ => return Ok(None),
                };
                match next_sequence(env, rule, offset, items, state) {
                    Err(Signal::Barrier { double: false }) => Ok(None),
                    other => other,
                }
            }
            State::Repetition(state) => match state.repetition.greed {
                Greed::Greedy => next_greedy(env, rule, offset, state, scope),
                Greed::Stingy => next_stingy(env, rule, offset, state, scope),
                Greed::Possessive => next_possessive(env, rule, offset, state, scope),
            },
            State::Assertion { fired } => {
                if *fired {
                    return Ok(None);
                }
                *fired = true;
                match_assertion(env, rule, offset, scope)
            }
            State::Conditional(inner) => {
                let condition = match &graph.get(rule).kind {
                    RuleKind::Conditional { condition, .. } => condition,
                    _ => return Ok(None),
                };
                while let Some(candidate) = inner.next(env, scope)? {
                    let (start, end) =
                        env.view
                            .forward_span(candidate.start(), candidate.end(), env.text.len());
                    let group = &env.text.forward()[start..end];
                    if condition.evaluate(env.conditions, &candidate, group)? {
                        return Ok(Some(candidate.with_rule(rule)));
                    }
                }
                Ok(None)
            }
        }
    }
}

/// Name of the undefined rule `id` leads to
fn undefined_name(graph: &RuleGraph, mut id: RuleId) -> String {
    loop {
        match &graph.get(id).kind {
            RuleKind::Cyclic { target: Some(t), .. } | RuleKind::Deferred { target: Some(t), .. } => {
                id = *t
            }
            RuleKind::Cyclic { name, .. } | RuleKind::Deferred { name, .. } => return name.clone(),
            _ => return graph.display_name(id),
        }
    }
}

/// A terminal's match at `offset`, from the cache when possible
pub(crate) fn match_terminal(env: &mut Env<'_>, rule: RuleId, offset: usize) -> Option<Match> {
    match env.cache.get(rule, offset) {
        Some(CachedMatch::Terminal(m)) => return Some(m.clone()),
        Some(CachedMatch::Failed) => return None,
        _ => {}
    }
    let terminal = env.graph.get(rule);
    if env.cache.is_studied(rule) && !terminal.zero_width {
        return None;
    }
    let haystack = env.haystack();
    let view = env.view;
    let found = match &terminal.kind {
        RuleKind::Literal { text } => view
            .rest(haystack, offset)
            .starts_with(text.as_str())
            .then(|| Match::leaf(rule, offset, offset + text.len())),
        RuleKind::Regex { regex, .. } => {
            let at = view.shift + offset;
            regex
                .find_at(&haystack[..view.shift + view.len], at)
                .filter(|m| m.start() == at)
                .map(|m| Match::leaf(rule, offset, m.end() - view.shift))
        }
        _ => None,
    };
    let entry = match &found {
        Some(m) => CachedMatch::Terminal(m.clone()),
        None => CachedMatch::Failed,
    };
    env.cache.record(rule, offset, entry);
    found
}

fn match_back_reference(
    env: &Env<'_>,
    rule: RuleId,
    offset: usize,
    index: usize,
    scope: Scope<'_>,
) -> Option<Match> {
    let referent = scope?.get(index)?;
    let haystack = env.haystack();
    let copy = env.view.slice(haystack, referent.start(), referent.end());
    env.view
        .rest(haystack, offset)
        .starts_with(copy)
        .then(|| Match::leaf(rule, offset, offset + copy.len()))
}

fn next_sequence(
    env: &mut Env<'_>,
    rule: RuleId,
    offset: usize,
    items: &[RuleId],
    state: &mut SequenceState,
) -> Step<Option<Match>> {
    let SequenceState {
        matchers,
        matched,
        yielded,
    } = state;
    if *yielded && matched.pop().is_none() {
        return Ok(None);
    }
    loop {
        let i = matched.len();
        if i == items.len() {
            *yielded = true;
            let end = matched.last().map_or(offset, Match::end);
            return Ok(Some(Match::with_children(rule, offset, end, matched.clone())));
        }
        if matchers.len() == i {
            let at = matched.last().map_or(offset, Match::end);
            matchers.push(Matcher::new(env, items[i], at)?);
        }
        match matchers[i].next(env, Some(&matched[..i]))? {
            Some(m) => matched.push(m),
            None => {
                matchers.pop();
                if matched.pop().is_none() {
                    return Ok(None);
                }
            }
        }
    }
}

fn repetition_node(rule: RuleId, offset: usize, matched: &[Match]) -> Match {
    let end = matched.last().map_or(offset, Match::end);
    Match::with_children(rule, offset, end, matched.to_vec())
}

/// Zero-width iterations past the lower bound of an unbounded repetition
/// add nothing and would never end
fn skip_iteration(repetition: &Repetition, count: usize, m: &Match) -> bool {
    m.is_zero_width() && repetition.upper.is_none() && count >= repetition.lower
}

/// Depth first, longer arrangements before their prefixes
fn next_greedy(
    env: &mut Env<'_>,
    rule: RuleId,
    offset: usize,
    state: &mut RepetitionState,
    scope: Scope<'_>,
) -> Step<Option<Match>> {
    if state.pending_pop {
        state.pending_pop = false;
        if state.matched.pop().is_none() {
            return Ok(None);
        }
    }
    loop {
        let count = state.matched.len();
        if state.matchers.len() == count {
            if !state.repetition.at_top(count) {
                let at = state.matched.last().map_or(offset, Match::end);
                state.matchers.push(Matcher::new(env, state.inner, at)?);
                continue;
            }
            // nothing more can be added
            state.pending_pop = true;
            return Ok(Some(repetition_node(rule, offset, &state.matched)));
        }
        let found = state.matchers[count].next(env, scope)?;
        match found {
            Some(m) if skip_iteration(&state.repetition, count, &m) => {}
            Some(m) => state.matched.push(m),
            None => {
                state.matchers.pop();
                if count >= state.repetition.lower {
                    state.pending_pop = true;
                    return Ok(Some(repetition_node(rule, offset, &state.matched)));
                }
                if state.matched.pop().is_none() {
                    return Ok(None);
                }
            }
        }
    }
}

/// Every arrangement of `goal` repetitions before any of `goal + 1`
fn next_stingy(
    env: &mut Env<'_>,
    rule: RuleId,
    offset: usize,
    state: &mut RepetitionState,
    scope: Scope<'_>,
) -> Step<Option<Match>> {
    loop {
        if state.repetition.beyond_top(state.goal) {
            return Ok(None);
        }
        if let Some(m) = seek_goal(env, rule, offset, state, scope)? {
            state.found_at_goal = true;
            return Ok(Some(m));
        }
        if !state.found_at_goal {
            // no arrangement of this size means none larger either
            return Ok(None);
        }
        state.goal += 1;
        state.found_at_goal = false;
        state.yielded = false;
        state.matchers.clear();
        state.matched.clear();
    }
}

fn seek_goal(
    env: &mut Env<'_>,
    rule: RuleId,
    offset: usize,
    state: &mut RepetitionState,
    scope: Scope<'_>,
) -> Step<Option<Match>> {
    if state.yielded {
        state.yielded = false;
        if state.matched.pop().is_none() {
            return Ok(None);
        }
    }
    loop {
        let count = state.matched.len();
        if count == state.goal {
            state.yielded = true;
            return Ok(Some(repetition_node(rule, offset, &state.matched)));
        }
        if state.matchers.len() == count {
            let at = state.matched.last().map_or(offset, Match::end);
            state.matchers.push(Matcher::new(env, state.inner, at)?);
        }
        let found = state.matchers[count].next(env, scope)?;
        match found {
            Some(m) if skip_iteration(&state.repetition, count, &m) => {}
            Some(m) => state.matched.push(m),
            None => {
                state.matchers.pop();
                if state.matched.pop().is_none() {
                    return Ok(None);
                }
            }
        }
    }
}

/// As many as possible, once
fn next_possessive(
    env: &mut Env<'_>,
    rule: RuleId,
    offset: usize,
    state: &mut RepetitionState,
    scope: Scope<'_>,
) -> Step<Option<Match>> {
    if state.yielded {
        return Ok(None);
    }
    state.yielded = true;
    while !state.repetition.at_top(state.matched.len()) {
        let at = state.matched.last().map_or(offset, Match::end);
        let mut matcher = Matcher::new(env, state.inner, at)?;
        let count = state.matched.len();
        let mut taken = None;
        while let Some(m) = matcher.next(env, scope)? {
            if !skip_iteration(&state.repetition, count, &m) {
                taken = Some(m);
                break;
            }
        }
        match taken {
            Some(m) => state.matched.push(m),
            None => break,
        }
    }
    if state.matched.len() < state.repetition.lower {
        return Ok(None);
    }
    Ok(Some(repetition_node(rule, offset, &state.matched)))
}

fn match_assertion(
    env: &mut Env<'_>,
    rule: RuleId,
    offset: usize,
    scope: Scope<'_>,
) -> Step<Option<Match>> {
    let (run, positive, forward) = match &env.graph.get(rule).kind {
        RuleKind::Assertion {
            run,
            positive,
            forward,
            ..
        } => (*run, *positive, *forward),
        _ => return Ok(None),
    };
    if !positive && matches!(env.cache.peek(rule, offset), Some(CachedMatch::Matched)) {
        return Ok(Some(Match::empty(rule, offset)));
    }
    let seen = if forward {
        let mut matcher = Matcher::new(env, run, offset)?;
        matcher.next(env, scope)
    } else {
        let mut private = MatchCache::new();
        let mut child = Env {
            graph: env.graph,
            conditions: env.conditions,
            text: env.text,
            view: env.view.reverse_at(offset, env.text.len()),
            cache: &mut private,
            stack: Vec::new(),
            max_depth: env.max_depth,
            diag: env.diag,
            cuts: 0,
        };
        let seen = Matcher::new(&mut child, run, 0).and_then(|mut m| m.next(&mut child, None));
        env.cuts += child.cuts;
        seen.map(|found| found.map(|m| m.reflect(offset)))
    };
    let seen = match seen {
        // a barrier inside an assertion only ends the assertion
        Err(Signal::Barrier { .. }) => None,
        other => other?,
    };
    Ok(match (seen, positive) {
        (Some(m), true) => Some(Match::lookaround(rule, offset, m)),
        (None, false) => Some(Match::empty(rule, offset)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::compiler::{CompiledGrammar, Compiler};
    use crate::engine::fragment::RuleSet;

    fn compile(rules: &str) -> CompiledGrammar {
        Compiler::new(RuleSet::parse(rules).unwrap())
            .compile()
            .unwrap()
    }

    /// Every result of the root at `offset`, as `(start, end)`
    fn spans(rules: &str, input: &str, offset: usize) -> Vec<(usize, usize)> {
        let c = compile(rules);
        let conditions = ConditionRegistry::new();
        let text = Text::new(input);
        let mut cache = MatchCache::new();
        let diag = RefCell::new(Diagnostics::default());
        let mut env = Env {
            graph: &c.graph,
            conditions: &conditions,
            text: &text,
            view: View::forward(input.len()),
            cache: &mut cache,
            stack: Vec::new(),
            max_depth: 3,
            diag: &diag,
            cuts: 0,
        };
        let mut m = Matcher::new(&mut env, c.root, offset).unwrap();
        let mut out = Vec::new();
        while let Some(found) = m.next(&mut env, None).unwrap() {
            out.push((found.start(), found.end()));
        }
        out
    }

    #[test]
    fn test_literal_and_regex() {
        assert_eq!(spans("ROOT = 'ab'", "xab", 1), vec![(1, 3)]);
        assert_eq!(spans("ROOT = 'ab'", "xab", 0), vec![]);
        assert_eq!(spans("ROOT = /\\d+/", "a123", 1), vec![(1, 4)]);
        assert_eq!(spans("ROOT = /\\d+/", "a123b", 0), vec![]);
    }

    #[test]
    fn test_alternation_order() {
        assert_eq!(spans("ROOT = 'a' | 'ab'", "ab", 0), vec![(0, 1), (0, 2)]);
    }

    #[test]
    fn test_sequence_backtracks() {
        assert_eq!(spans("ROOT = [ 'a' | 'ab' ] 'b'", "ab", 0), vec![(0, 2)]);
        assert_eq!(
            spans("ROOT = [ 'a' | 'ab' ] 'b'?", "ab", 0),
            vec![(0, 2), (0, 1), (0, 2)]
        );
    }

    #[test]
    fn test_greedy_order() {
        assert_eq!(
            spans("ROOT = 'a'*", "aaa", 0),
            vec![(0, 3), (0, 2), (0, 1), (0, 0)]
        );
        assert_eq!(spans("ROOT = 'a'{2,}", "aaa", 0), vec![(0, 3), (0, 2)]);
        assert_eq!(spans("ROOT = 'a'{2,}", "a", 0), vec![]);
    }

    #[test]
    fn test_stingy_order() {
        assert_eq!(
            spans("ROOT = 'a'*?", "aaa", 0),
            vec![(0, 0), (0, 1), (0, 2), (0, 3)]
        );
        assert_eq!(spans("ROOT = 'a'{1,2}?", "aaa", 0), vec![(0, 1), (0, 2)]);
    }

    #[test]
    fn test_possessive() {
        assert_eq!(spans("ROOT = 'a'*+", "aaa", 0), vec![(0, 3)]);
        assert_eq!(spans("ROOT = 'a'*+ 'a'", "aaa", 0), vec![]);
    }

    #[test]
    fn test_zero_width_iterations_end() {
        assert_eq!(spans("ROOT = [ 'a'? ]*", "b", 0), vec![(0, 0)]);
    }

    #[test]
    fn test_back_reference() {
        assert_eq!(spans("ROOT = /[ab]/ 'x' 1", "axa", 0), vec![(0, 3)]);
        assert_eq!(spans("ROOT = /[ab]/ 'x' 1", "axb", 0), vec![]);
    }

    #[test]
    fn test_up_level_back_reference() {
        let rules = "ROOT = /[ab]/ 'x' [ 1^ | 'c' ]+";
        assert_eq!(spans(rules, "axaca", 0), vec![(0, 5), (0, 4), (0, 3)]);
        assert_eq!(spans(rules, "bxa", 0), vec![]);
    }

    #[test]
    fn test_barriers() {
        assert_eq!(spans("ROOT = 'a'* : 'a'", "aaa", 0), vec![]);
        assert_eq!(spans("ROOT = 'a'* : 'b'", "aab", 0), vec![(0, 3)]);
        assert_eq!(spans("ROOT = [ 'a'* : 'a' ] | 'aa'", "aa", 0), vec![(0, 2)]);
    }

    #[test]
    fn test_assertions() {
        assert_eq!(spans("ROOT = 'a' ~'b'", "ab", 0), vec![(0, 1)]);
        assert_eq!(spans("ROOT = 'a' !'b'", "ab", 0), vec![]);
        assert_eq!(spans("ROOT = ~-'a' 'b'", "ab", 1), vec![(1, 2)]);
        assert_eq!(spans("ROOT = !-'a' 'b'", "ab", 1), vec![]);
        assert_eq!(spans("ROOT = ~-[ 'x' 'a' ] 'b'", "xab", 2), vec![(2, 3)]);
    }

    #[test]
    fn test_left_recursion_is_cut() {
        let rules = "ROOT = <ROOT> 'x' | 'y'";
        assert_eq!(spans(rules, "yxx", 0), vec![(0, 3), (0, 2), (0, 1)]);
    }

    #[test]
    fn test_right_recursion() {
        let rules = "ROOT = 'b' <ROOT> | 'a'";
        assert_eq!(spans(rules, "bba", 0), vec![(0, 3)]);
    }

    #[test]
    fn test_undefined_rule_is_fatal() {
        let c = compile("ROOT = <later>");
        let conditions = ConditionRegistry::new();
        let text = Text::new("x");
        let mut cache = MatchCache::new();
        let diag = RefCell::new(Diagnostics::default());
        let mut env = Env {
            graph: &c.graph,
            conditions: &conditions,
            text: &text,
            view: View::forward(1),
            cache: &mut cache,
            stack: Vec::new(),
            max_depth: 3,
            diag: &diag,
            cuts: 0,
        };
        let err = Matcher::new(&mut env, c.root, 0).err();
        assert_eq!(
            err,
            Some(Signal::Fatal(GrammarError::UndefinedTerminal {
                names: vec!["later".into()]
            }))
        );
    }
}
