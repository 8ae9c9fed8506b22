//! Matching engine for grammatic
//!
//! Rule text is parsed into a [`RuleSet`], compiled into a graph of
//! deduplicated rules and wrapped in a [`Grammar`]. Each matching call
//! returns a lazy [`MatchIter`] that enumerates every way the grammar can
//! match, backtracking on demand.
//!
//! # Module Organization
//!
//! ## Rule Description
//! - [`fragment`] - Rule bodies as data, [`RuleSet`]
//! - [`rule_parser`] - Textual rule syntax
//! - [`repetition`] - Repetition bounds and greed
//! - [`condition`] - Boolean conditions over matches
//! - [`label`] - Rule labels
//!
//! ## Compilation
//! - [`compiler`] - Fragment to rule graph, cycles, reversal
//! - [`rule`] - The compiled rule graph
//! - [`analysis`] - Zero-width, first-set and context analysis
//!
//! ## Matching
//! - [`grammar`] - [`Grammar`] facade and [`MatchIter`]
//! - [`options`] - Per-invocation [`Options`]
//! - [`matches`] - [`Match`] trees
//! - [`cache`] - Per-invocation memoization
//! - [`study`] - Terminal pre-scan and start-offset [`Indexer`]s
//! - [`parallel`] - Batch matching over many inputs
//!
//! ## Results and Diagnostics
//! - [`tree`] - [`ParseTree`] with parent links and labels
//! - [`debug`] - Trace recording and tree printing
//! - [`error`] - [`GrammarError`]

// ============================================================================
// Module Declarations
// ============================================================================

pub mod analysis;
pub mod cache;
pub mod compiler;
pub mod condition;
pub mod debug;
pub mod error;
pub mod fragment;
pub mod grammar;
pub mod label;
pub mod matches;
pub mod options;
pub mod regex_cache;
pub mod repetition;
pub mod rule;
pub mod rule_parser;
pub mod source_location;
pub mod study;
pub mod tree;

// Batch matching (always available, uses rayon when the feature is enabled)
pub mod parallel;

mod matcher;
mod text;

// ============================================================================
// Core Types
// ============================================================================

pub use grammar::{Grammar, MatchIter};
pub use matches::Match;
pub use options::{Options, DEFAULT_MAX_RECURSION_DEPTH};
pub use rule::{Rule, RuleGraph, RuleId, RuleKind};

// ============================================================================
// Rule Description
// ============================================================================

pub use condition::{Condition, ConditionExpr, ConditionRegistry};
pub use fragment::{Fragment, RegexFlags, RuleDefinition, RuleSet};
pub use label::{Label, LabelKind};
pub use repetition::{Greed, Repetition};

// ============================================================================
// Error Handling
// ============================================================================

pub use error::{GrammarError, Result};
pub use source_location::SourcePosition;

// ============================================================================
// Studying
// ============================================================================

pub use study::{CharacterIndexer, Indexer, PatternIndexer, StringIndexer};

// ============================================================================
// Results and Diagnostics
// ============================================================================

pub use debug::{MatchTrace, TraceAction, TraceEntry, TreePrinter};
pub use tree::{NodeId, ParseTree};

// ============================================================================
// Batch Matching
// ============================================================================

pub use parallel::{find_batch_parallel, matches_batch_parallel};
