//! Per-invocation match cache
//!
//! Entries are keyed by `(rule, offset)`. Nonterminals remember only how
//! their first enumeration at an offset went: a later matcher at a failed
//! pair gives up at once, a later matcher at a matched pair derives its
//! results again. Terminals remember their concrete match.
//!
//! Studying fills in terminal entries ahead of time; a studied terminal
//! with no entry at an offset is known not to match there.

use super::matches::Match;
use super::rule::RuleId;
use ahash::RandomState;
use hashbrown::{HashMap, HashSet};

/// State of one `(rule, offset)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedMatch {
    /// The rule cannot match here
    Failed,
    /// A nonterminal matched here at least once
    Matched,
    /// A terminal's match
    Terminal(Match),
}

/// Match cache for one invocation
#[derive(Debug, Clone)]
pub struct MatchCache {
    entries: HashMap<(RuleId, usize), CachedMatch, RandomState>,
    studied: HashSet<RuleId, RandomState>,
    hits: u64,
    misses: u64,
}

impl Default for MatchCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Cache sized for a text of `input_len` bytes
    pub fn for_input(input_len: usize, rule_count: usize) -> Self {
        let estimated = (input_len / 4) * rule_count.min(8);
        Self::with_capacity(estimated.clamp(64, 1 << 16))
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
            studied: HashSet::with_hasher(RandomState::new()),
            hits: 0,
            misses: 0,
        }
    }

    /// Entry for `(rule, offset)`, if any
    #[inline]
    pub fn get(&mut self, rule: RuleId, offset: usize) -> Option<&CachedMatch> {
        let found = self.entries.get(&(rule, offset));
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    /// Entry for `(rule, offset)` without touching the statistics
    #[inline]
    pub fn peek(&self, rule: RuleId, offset: usize) -> Option<&CachedMatch> {
        self.entries.get(&(rule, offset))
    }

    /// Whether `(rule, offset)` is known to fail
    #[inline]
    pub fn is_failed(&self, rule: RuleId, offset: usize) -> bool {
        matches!(self.entries.get(&(rule, offset)), Some(CachedMatch::Failed))
    }

    /// Record an outcome unless one is already present
    #[inline]
    pub fn record(&mut self, rule: RuleId, offset: usize, entry: CachedMatch) {
        self.entries.entry((rule, offset)).or_insert(entry);
    }

    /// Mark a terminal as studied
    pub fn mark_studied(&mut self, rule: RuleId) {
        self.studied.insert(rule);
    }

    /// Whether every match of `rule` has been recorded in advance
    #[inline]
    pub fn is_studied(&self, rule: RuleId) -> bool {
        self.studied.contains(&rule)
    }

    /// Offsets at which `rule` has a recorded terminal match, in order
    pub fn terminal_offsets(&self, rule: RuleId) -> Vec<usize> {
        let mut offsets: Vec<usize> = self
            .entries
            .iter()
            .filter(|((r, _), entry)| *r == rule && matches!(entry, CachedMatch::Terminal(_)))
            .map(|((_, offset), _)| *offset)
            .collect();
        offsets.sort_unstable();
        offsets
    }

    /// Number of entries
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.entries.clear();
        self.studied.clear();
        self.hits = 0;
        self.misses = 0;
    }

    /// Lookup statistics: hits, misses and hit rate
    pub fn stats(&self) -> (u64, u64, f64) {
        let total = self.hits + self.misses;
        let rate = if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        };
        (self.hits, self.misses, rate)
    }
}
