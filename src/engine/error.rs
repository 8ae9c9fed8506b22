//! Error types for grammar compilation and matching

use std::fmt;

/// Errors surfaced by the compiler, the rule-text parser and the facade
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    /// The rule set defines no rule that could serve as root
    NoRootFound,

    /// A rule body could not be understood
    IllFormedRule {
        /// Rule line or body as written
        rule: String,
        /// What is wrong with it
        reason: String,
    },

    /// A rule name was defined twice
    DuplicateRule {
        /// Offending name
        name: String,
    },

    /// A rule was matched before its deferred definition was supplied
    UndefinedTerminal {
        /// Names still undefined
        names: Vec<String>,
    },

    /// A condition was referenced but never defined
    UndefinedCondition {
        /// Names still undefined
        names: Vec<String>,
    },

    /// A set of mutually recursive rules offers no way out of the recursion
    UnescapableCycle {
        /// Members of the cycle
        rules: Vec<String>,
    },

    /// A cyclic placeholder was bound twice
    CyclicRuleAlreadyResolved {
        /// Placeholder name
        name: String,
    },

    /// A deferred rule or condition was defined twice
    AlreadyDefined {
        /// Offending name
        name: String,
    },

    /// A definition was supplied for a name the grammar never uses
    UnknownName {
        /// Offending name
        name: String,
    },

    /// A back reference points at nothing usable
    BadBackReference {
        /// Rule body containing the reference
        rule: String,
        /// What is wrong with it
        reason: String,
    },

    /// A plain back reference was given a repetition suffix
    NonRepeatableBackReference {
        /// Rule body containing the reference
        rule: String,
    },

    /// A rule used inside a backward assertion cannot be reversed
    CannotReverse {
        /// Rendering of the offending rule
        rule: String,
    },

    /// A regular expression failed to compile
    InvalidRegex {
        /// Pattern as written
        pattern: String,
        /// Message from the regex engine
        message: String,
    },

    /// Match options are inconsistent with the input
    InvalidOptions {
        /// Why the options were rejected
        reason: String,
    },

    /// A rule set could not be (de)serialized
    Serialization {
        /// Message from serde
        message: String,
    },
}

impl GrammarError {
    /// Shorthand for [`GrammarError::IllFormedRule`]
    pub fn ill_formed(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        GrammarError::IllFormedRule {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`GrammarError::BadBackReference`]
    pub fn bad_back_reference(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        GrammarError::BadBackReference {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error arises from grammar construction rather than matching
    pub fn is_compilation_error(&self) -> bool {
        !matches!(
            self,
            GrammarError::UndefinedTerminal { .. }
                | GrammarError::UndefinedCondition { .. }
                | GrammarError::InvalidOptions { .. }
        )
    }
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarError::NoRootFound => write!(f, "no root rule found"),
            GrammarError::IllFormedRule { rule, reason } => {
                write!(f, "ill-formed rule: {}: {}", reason, rule)
            }
            GrammarError::DuplicateRule { name } => {
                write!(f, "rule <{}> defined more than once", name)
            }
            GrammarError::UndefinedTerminal { names } => {
                write!(
                    f,
                    "terminal rules remaining undefined: {}",
                    names.join(", ")
                )
            }
            GrammarError::UndefinedCondition { names } => {
                write!(f, "conditions remaining undefined: {}", names.join(", "))
            }
            GrammarError::UnescapableCycle { rules } => {
                write!(f, "cycle found in rules: {}", rules.join(", "))
            }
            GrammarError::CyclicRuleAlreadyResolved { name } => {
                write!(f, "cyclic rule <{}> already resolved", name)
            }
            GrammarError::AlreadyDefined { name } => {
                write!(f, "<{}> already defined", name)
            }
            GrammarError::UnknownName { name } => {
                write!(f, "grammar does not use the name <{}>", name)
            }
            GrammarError::BadBackReference { rule, reason } => {
                write!(f, "{} in {}", reason, rule)
            }
            GrammarError::NonRepeatableBackReference { rule } => {
                write!(
                    f,
                    "back reference cannot be modified with repetition suffixes in {}",
                    rule
                )
            }
            GrammarError::CannotReverse { rule } => {
                write!(f, "cannot reverse {}", rule)
            }
            GrammarError::InvalidRegex { pattern, message } => {
                write!(f, "invalid regex /{}/: {}", pattern, message)
            }
            GrammarError::InvalidOptions { reason } => {
                write!(f, "invalid options: {}", reason)
            }
            GrammarError::Serialization { message } => {
                write!(f, "serialization error: {}", message)
            }
        }
    }
}

impl std::error::Error for GrammarError {}

impl From<serde_json::Error> for GrammarError {
    fn from(e: serde_json::Error) -> Self {
        GrammarError::Serialization {
            message: e.to_string(),
        }
    }
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, GrammarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(GrammarError::NoRootFound.to_string(), "no root rule found");
        let e = GrammarError::UnescapableCycle {
            rules: vec!["<a>".into(), "<b>".into()],
        };
        assert_eq!(e.to_string(), "cycle found in rules: <a>, <b>");
        let e = GrammarError::UndefinedTerminal {
            names: vec!["foo".into()],
        };
        assert!(e.to_string().contains("terminal rules remaining undefined"));
    }

    #[test]
    fn test_compilation_classification() {
        assert!(GrammarError::NoRootFound.is_compilation_error());
        assert!(!GrammarError::UndefinedTerminal { names: vec![] }.is_compilation_error());
    }
}
