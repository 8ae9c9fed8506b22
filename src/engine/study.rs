//! Studying and start-offset indexing
//!
//! Studying scans every terminal a forward match can try once over the
//! match region and stores each hit in the match cache. A studied terminal
//! then fails at any offset the scan did not record, without looking at
//! the text again. Regexes that can match the empty string are the
//! exception: they still match directly wherever nothing was recorded.
//!
//! An [`Indexer`] decides where a `find` tries the root at all. Without
//! one, a studied `find` tries only offsets where some terminal of the
//! root's first set was recorded.

use super::cache::{CachedMatch, MatchCache};
use super::error::{GrammarError, Result};
use super::matches::Match;
use super::rule::{RuleGraph, RuleId, RuleKind};
use memchr::memmem;
use regex::Regex;
use std::collections::BTreeSet;

/// Chooses the offsets where a top-level search is attempted
///
/// Offsets are byte positions in `text` within `[start, end]`. They need
/// not be sorted or unique.
pub trait Indexer: Send + Sync {
    /// Candidate start offsets in `text[start..end]`
    fn index(&self, text: &str, start: usize, end: usize) -> Vec<usize>;
}

/// Every occurrence of one character
#[derive(Debug, Clone, Copy)]
pub struct CharacterIndexer {
    c: char,
}

impl CharacterIndexer {
    /// Index occurrences of `c`
    pub fn new(c: char) -> Self {
        Self { c }
    }
}

impl Indexer for CharacterIndexer {
    fn index(&self, text: &str, start: usize, end: usize) -> Vec<usize> {
        let region = &text.as_bytes()[start..end];
        if self.c.is_ascii() {
            memchr::memchr_iter(self.c as u8, region)
                .map(|i| start + i)
                .collect()
        } else {
            let mut buf = [0u8; 4];
            let needle = self.c.encode_utf8(&mut buf);
            memmem::find_iter(region, needle.as_bytes())
                .map(|i| start + i)
                .collect()
        }
    }
}

/// Every occurrence of a substring, overlapping occurrences included
#[derive(Debug, Clone)]
pub struct StringIndexer {
    finder: memmem::Finder<'static>,
}

impl StringIndexer {
    /// Index occurrences of `needle`
    pub fn new(needle: &str) -> Self {
        Self {
            finder: memmem::Finder::new(needle.as_bytes()).into_owned(),
        }
    }
}

impl Indexer for StringIndexer {
    fn index(&self, text: &str, start: usize, end: usize) -> Vec<usize> {
        overlapping_hits(&self.finder, text, start, end)
    }
}

/// Every offset where a regex match starts
#[derive(Debug, Clone)]
pub struct PatternIndexer {
    regex: Regex,
}

impl PatternIndexer {
    /// Index starts of `pattern`
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| GrammarError::InvalidRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { regex })
    }
}

impl From<Regex> for PatternIndexer {
    fn from(regex: Regex) -> Self {
        Self { regex }
    }
}

impl Indexer for PatternIndexer {
    fn index(&self, text: &str, start: usize, end: usize) -> Vec<usize> {
        overlapping_starts(&self.regex, text, start, end)
            .into_iter()
            .map(|(s, _)| s)
            .collect()
    }
}

/// Starts of `finder`'s needle in `text[start..end]`, overlaps included
fn overlapping_hits(finder: &memmem::Finder<'_>, text: &str, start: usize, end: usize) -> Vec<usize> {
    let mut hits = Vec::new();
    if finder.needle().is_empty() {
        return hits;
    }
    let mut pos = start;
    while pos < end {
        let Some(i) = finder.find(&text.as_bytes()[pos..end]) else {
            break;
        };
        let hit = pos + i;
        hits.push(hit);
        pos = hit + next_char_len(text, hit);
    }
    hits
}

/// Spans of the leftmost-first match starting at each offset where one
/// starts, scanning `text[..end]` from `start`
fn overlapping_starts(regex: &Regex, text: &str, start: usize, end: usize) -> Vec<(usize, usize)> {
    let haystack = &text[..end];
    let mut out = Vec::new();
    let mut pos = start;
    while pos <= end {
        let Some(m) = regex.find_at(haystack, pos) else {
            break;
        };
        out.push((m.start(), m.end()));
        if m.start() >= end {
            break;
        }
        pos = m.start() + next_char_len(text, m.start());
    }
    out
}

fn next_char_len(text: &str, pos: usize) -> usize {
    text[pos..].chars().next().map_or(1, char::len_utf8)
}

/// Scan `terminals` over `text[start..end]` and record every hit
///
/// Returns the number of hits recorded.
pub(crate) fn study(
    graph: &RuleGraph,
    terminals: &BTreeSet<RuleId>,
    text: &str,
    start: usize,
    end: usize,
    cache: &mut MatchCache,
) -> usize {
    let mut recorded = 0;
    for &id in terminals {
        let hits: Vec<(usize, usize)> = match &graph.get(id).kind {
            RuleKind::Literal { text: needle } if !needle.is_empty() => {
                let finder = memmem::Finder::new(needle.as_bytes());
                overlapping_hits(&finder, text, start, end)
                    .into_iter()
                    .map(|s| (s, s + needle.len()))
                    .collect()
            }
            RuleKind::Regex { regex, .. } => overlapping_starts(regex, text, start, end),
            _ => continue,
        };
        recorded += hits.len();
        for (s, e) in hits {
            cache.record(id, s, CachedMatch::Terminal(Match::leaf(id, s, e)));
        }
        cache.mark_studied(id);
    }
    log_debug!(
        "studied {} terminals over {}..{}: {} hits",
        terminals.len(),
        start,
        end,
        recorded
    );
    recorded
}

/// Offsets where some terminal of `first` was recorded, ascending
pub(crate) fn first_offsets(cache: &MatchCache, first: &BTreeSet<RuleId>) -> Vec<usize> {
    let mut offsets: Vec<usize> = first
        .iter()
        .flat_map(|t| cache.terminal_offsets(*t))
        .collect();
    offsets.sort_unstable();
    offsets.dedup();
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::compiler::Compiler;
    use crate::engine::fragment::RuleSet;

    #[test]
    fn test_character_indexer() {
        assert_eq!(CharacterIndexer::new('a').index("banana", 0, 6), vec![1, 3, 5]);
        assert_eq!(CharacterIndexer::new('a').index("banana", 2, 5), vec![3]);
        assert_eq!(CharacterIndexer::new('é').index("aébé", 0, 6), vec![1, 4]);
    }

    #[test]
    fn test_string_indexer_overlaps() {
        assert_eq!(StringIndexer::new("ana").index("banana", 0, 6), vec![1, 3]);
        assert_eq!(StringIndexer::new("aa").index("aaaa", 0, 4), vec![0, 1, 2]);
        assert!(StringIndexer::new("").index("abc", 0, 3).is_empty());
    }

    #[test]
    fn test_pattern_indexer() {
        let indexer = PatternIndexer::new(r"\d+").unwrap();
        assert_eq!(indexer.index("a12b3", 0, 5), vec![1, 2, 4]);
        assert!(PatternIndexer::new("(").is_err());
    }

    #[test]
    fn test_study_records_hits() {
        let c = Compiler::new(RuleSet::parse("ROOT = 'ab' /\\d/").unwrap())
            .compile()
            .unwrap();
        let terminals: BTreeSet<RuleId> = c
            .graph
            .iter()
            .filter(|(_, r)| r.kind().is_terminal())
            .map(|(id, _)| id)
            .collect();
        let mut cache = MatchCache::new();
        let hits = study(&c.graph, &terminals, "ab1ab2x", 0, 7, &mut cache);
        assert_eq!(hits, 4);
        for t in &terminals {
            assert!(cache.is_studied(*t));
        }
        let offsets = first_offsets(&cache, &terminals);
        assert_eq!(offsets, vec![0, 2, 3, 5]);
    }

    #[test]
    fn test_study_respects_region() {
        let c = Compiler::new(RuleSet::parse("ROOT = 'a'").unwrap())
            .compile()
            .unwrap();
        let terminals: BTreeSet<RuleId> = [c.root].into_iter().collect();
        let mut cache = MatchCache::new();
        study(&c.graph, &terminals, "aaaa", 1, 3, &mut cache);
        assert_eq!(cache.terminal_offsets(c.root), vec![1, 2]);
    }
}
