//! Thread-local cache of compiled terminal patterns
//!
//! Grammars built from the same rule text compile the same patterns again
//! and again; the cache keeps one `Regex` per distinct source, keyed by the
//! pattern with its inline-flag prefix so `/a/` and `/a/i` stay apart.

use super::error::{GrammarError, Result};
use super::fragment::RegexFlags;
use hashbrown::HashMap;
use regex::Regex;
use std::cell::RefCell;

thread_local! {
    static REGEX_CACHE: RefCell<HashMap<String, Regex>> = RefCell::new(HashMap::new());
}

/// Source handed to the regex crate for a pattern and its flags
pub fn effective_source(pattern: &str, flags: &RegexFlags) -> String {
    let prefix = flags.inline_prefix();
    if prefix.is_empty() {
        pattern.to_string()
    } else {
        format!("{}(?:{})", prefix, pattern)
    }
}

/// Get or compile a terminal pattern
#[inline]
pub fn get_or_compile(pattern: &str, flags: &RegexFlags) -> Result<Regex> {
    let source = effective_source(pattern, flags);
    REGEX_CACHE.with(|cache| {
        if let Some(regex) = cache.borrow().get(&source) {
            return Ok(regex.clone());
        }
        let regex = Regex::new(&source).map_err(|e| GrammarError::InvalidRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        cache.borrow_mut().insert(source, regex.clone());
        Ok(regex)
    })
}

/// Clear the cache
pub fn clear_cache() {
    REGEX_CACHE.with(|cache| cache.borrow_mut().clear());
}

/// Number of cached patterns
pub fn cache_size() -> usize {
    REGEX_CACHE.with(|cache| cache.borrow().len())
}
