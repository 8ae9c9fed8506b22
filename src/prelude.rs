//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from grammatic.
//! Importing this module with a wildcard import brings the core types into scope:
//!
//! ```
//! use grammatic::prelude::*;
//!
//! let g = Grammar::parse("ROOT = 'a'+").unwrap();
//! assert_eq!(g.find("baa", Options::default()).unwrap().count(), 1);
//! ```
//!
//! # Re-exported Items
//!
//! ## Core Types
//! - [`Grammar`] - Compiled grammar
//! - [`MatchIter`] - Lazy enumeration of matches
//! - [`Match`] - One match tree
//! - [`Options`] - Per-invocation options
//!
//! ## Rule Description
//! - [`RuleSet`] - Rules as data
//! - [`RuleDefinition`] - One named rule
//! - [`Fragment`] - One element of a rule body
//! - [`Repetition`] - Repetition bounds
//! - [`Greed`] - Greedy, stingy or possessive
//! - [`ConditionExpr`] - Boolean condition over names
//! - [`Condition`] - Trait for condition predicates
//!
//! ## Studying
//! - [`Indexer`] - Trait choosing start offsets
//! - [`CharacterIndexer`], [`StringIndexer`], [`PatternIndexer`]
//!
//! ## Error Handling
//! - [`GrammarError`] - Error type
//! - [`Result`] - Result alias
//!
//! ## Results
//! - [`ParseTree`] - Match with parent links and labels
//! - [`NodeId`] - Node handle within a tree

// ============================================================================
// Core Types
// ============================================================================

pub use crate::engine::{Grammar, Match, MatchIter, Options};

// ============================================================================
// Rule Description
// ============================================================================

pub use crate::engine::{
    Condition, ConditionExpr, Fragment, Greed, Repetition, RuleDefinition, RuleSet,
};

// ============================================================================
// Studying
// ============================================================================

pub use crate::engine::study::{CharacterIndexer, Indexer, PatternIndexer, StringIndexer};

// ============================================================================
// Error Handling
// ============================================================================

pub use crate::engine::error::{GrammarError, Result};

// ============================================================================
// Results
// ============================================================================

pub use crate::engine::tree::{NodeId, ParseTree};
