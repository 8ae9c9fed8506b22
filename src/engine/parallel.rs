//! Batch matching over many inputs
//!
//! A [`Grammar`] is immutable once built and every invocation owns its own
//! cache, so independent texts can be searched on separate threads against
//! one shared grammar.
//!
//! # Feature Flag
//!
//! Work is spread with rayon when the `parallel` feature is enabled:
//!
//! ```toml
//! [dependencies]
//! grammatic = { version = "0.1", features = ["parallel"] }
//! ```
//!
//! Without it the same functions run sequentially.
//!
//! # Example
//!
//! ```
//! use grammatic::{Grammar, Options};
//! use grammatic::engine::parallel::find_batch_parallel;
//!
//! let g: Grammar = "ROOT = /\\d+/".parse().unwrap();
//! let results = find_batch_parallel(&g, &["a1b22", "none"], Options::default());
//! assert_eq!(results[0].as_ref().unwrap().len(), 2);
//! assert!(results[1].as_ref().unwrap().is_empty());
//! ```

use super::error::Result;
use super::grammar::{Grammar, MatchIter};
use super::matches::Match;
use super::options::Options;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Drain an invocation, surfacing an error raised part way through
fn drain(mut iter: MatchIter<'_, '_>) -> Result<Vec<Match>> {
    let found: Vec<Match> = iter.by_ref().collect();
    match iter.error() {
        Some(e) => Err(e.clone()),
        None => Ok(found),
    }
}

fn find_one(grammar: &Grammar, input: &str, options: Options) -> Result<Vec<Match>> {
    drain(grammar.find(input, options)?)
}

fn matches_one(grammar: &Grammar, input: &str, options: Options) -> Result<Vec<Match>> {
    drain(grammar.matches(input, options)?)
}

/// Every `find` result for each input, in input order
///
/// Each input gets its own cache; nothing is shared between inputs but
/// the grammar.
#[cfg(feature = "rayon")]
pub fn find_batch_parallel(
    grammar: &Grammar,
    inputs: &[&str],
    options: Options,
) -> Vec<Result<Vec<Match>>> {
    inputs
        .par_iter()
        .map(|input| find_one(grammar, input, options))
        .collect()
}

/// Every `find` result for each input (sequential fallback)
#[cfg(not(feature = "rayon"))]
pub fn find_batch_parallel(
    grammar: &Grammar,
    inputs: &[&str],
    options: Options,
) -> Vec<Result<Vec<Match>>> {
    inputs
        .iter()
        .map(|input| find_one(grammar, input, options))
        .collect()
}

/// Whole-region matches for each input, in input order
#[cfg(feature = "rayon")]
pub fn matches_batch_parallel(
    grammar: &Grammar,
    inputs: &[&str],
    options: Options,
) -> Vec<Result<Vec<Match>>> {
    inputs
        .par_iter()
        .map(|input| matches_one(grammar, input, options))
        .collect()
}

/// Whole-region matches for each input (sequential fallback)
#[cfg(not(feature = "rayon"))]
pub fn matches_batch_parallel(
    grammar: &Grammar,
    inputs: &[&str],
    options: Options,
) -> Vec<Result<Vec<Match>>> {
    inputs
        .iter()
        .map(|input| matches_one(grammar, input, options))
        .collect()
}

/// Number of worker threads batch calls will use
#[cfg(feature = "rayon")]
pub fn num_threads() -> usize {
    rayon::current_num_threads()
}

/// Number of worker threads batch calls will use
#[cfg(not(feature = "rayon"))]
pub fn num_threads() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::GrammarError;

    #[test]
    fn test_find_batch_preserves_order() {
        let g: Grammar = "ROOT = 'ab'".parse().unwrap();
        let inputs = ["ab", "xx", "abab", ""];
        let results = find_batch_parallel(&g, &inputs, Options::default());
        let counts: Vec<usize> = results.iter().map(|r| r.as_ref().unwrap().len()).collect();
        assert_eq!(counts, vec![1, 0, 2, 0]);
    }

    #[test]
    fn test_matches_batch() {
        let g: Grammar = "ROOT = /a+/".parse().unwrap();
        let results = matches_batch_parallel(&g, &["aaa", "aab"], Options::default());
        assert_eq!(results[0].as_ref().unwrap().len(), 1);
        assert!(results[1].as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_batch_reports_per_input_errors() {
        let g: Grammar = "ROOT = 'a'".parse().unwrap();
        let opts = Options::new().with_start(3);
        let results = find_batch_parallel(&g, &["abcd", "a"], opts);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(GrammarError::InvalidOptions { .. })));
    }

    #[test]
    fn test_num_threads() {
        assert!(num_threads() >= 1);
    }
}
