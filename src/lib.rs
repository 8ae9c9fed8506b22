//! grammatic - Backtracking Grammar Matcher
//!
//! A grammar is a set of named rules built from literals, regular
//! expressions, groups, repetitions, assertions, back references,
//! conditions and backtracking barriers. It compiles into an immutable
//! rule graph, and matching enumerates lazily every parse tree of a text
//! in a fixed precedence order. It provides:
//! - Textual rule syntax and a serde-backed rule model
//! - Greedy, stingy and possessive repetition
//! - Forward and variable-width backward assertions
//! - Back references, including references into enclosing sequences
//! - Named conditions combined with `&`, `|`, `^` and `!`
//! - Per-invocation memoization and terminal pre-scanning
//! - Parse trees with tags, parent links and label queries
//! - Optional parallel batch matching
//!
//! ## Quick Start
//!
//! ```rust
//! use grammatic::{Grammar, Options};
//!
//! let g: Grammar = "ROOT = <word> [ ',' <word> ]*\nword = /\\w+/".parse().unwrap();
//! let text = "ab,cd ef";
//!
//! let found: Vec<&str> = g
//!     .find(text, Options::default())
//!     .unwrap()
//!     .map(|m| m.group(text))
//!     .collect();
//! assert_eq!(found, vec!["ab,cd", "ef"]);
//! ```
//!
//! ## Enumerating Every Parse
//!
//! ```rust
//! use grammatic::{Grammar, Options};
//!
//! let g: Grammar = "ROOT = /a/* /a*/".parse().unwrap();
//! let all = g.matches("aa", Options::default()).unwrap().count();
//! assert_eq!(all, 3);
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Enable debug logging using the `log` crate
//! - `parallel` - Spread batch matching over threads with rayon

// Lint configuration for production quality
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]
// Allow some pedantic lints that are too noisy
#![allow(clippy::module_inception)]
#![allow(clippy::redundant_closure)]

// Debug logging, compiled out unless the `logging` feature is on
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        log::debug!($($arg)*)
    };
}

// Prelude module for convenient imports
pub mod prelude;

// Matching engine
pub mod engine;

/// Re-export commonly used types for convenience
pub use engine::{
    // Batch matching
    parallel::{find_batch_parallel, matches_batch_parallel},
    // Studying
    study::{CharacterIndexer, Indexer, PatternIndexer, StringIndexer},
    // Diagnostics
    debug::{MatchTrace, TreePrinter},
    // Results
    tree::{NodeId, ParseTree},
    Condition,
    ConditionExpr,
    Grammar,
    GrammarError,
    Match,
    MatchIter,
    Options,
    Result,
    RuleDefinition,
    RuleSet,
};
