//! Repetition bounds and backtracking discipline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Backtracking discipline of a repetition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Greed {
    /// Take as many as possible, give back one at a time
    Greedy,
    /// Take as few as possible, grow one at a time
    Stingy,
    /// Take as many as possible, never give any back
    Possessive,
}

/// Repetition modifier: discipline plus inclusive bounds
///
/// `upper == None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repetition {
    /// Backtracking discipline
    pub greed: Greed,
    /// Minimum number of repetitions
    pub lower: usize,
    /// Maximum number of repetitions
    pub upper: Option<usize>,
}

impl Default for Repetition {
    fn default() -> Self {
        Self::ONCE
    }
}

impl Repetition {
    /// Exactly once; the modifier of an unadorned fragment
    pub const ONCE: Repetition = Repetition::greedy(1, Some(1));
    /// `*`
    pub const STAR: Repetition = Repetition::greedy(0, None);
    /// `+`
    pub const PLUS: Repetition = Repetition::greedy(1, None);
    /// `?`
    pub const QMARK: Repetition = Repetition::greedy(0, Some(1));

    /// Greedy repetition
    pub const fn greedy(lower: usize, upper: Option<usize>) -> Self {
        Self {
            greed: Greed::Greedy,
            lower,
            upper,
        }
    }

    /// Stingy repetition
    pub const fn stingy(lower: usize, upper: Option<usize>) -> Self {
        Self {
            greed: Greed::Stingy,
            lower,
            upper,
        }
    }

    /// Possessive repetition
    pub const fn possessive(lower: usize, upper: Option<usize>) -> Self {
        Self {
            greed: Greed::Possessive,
            lower,
            upper,
        }
    }

    /// Whether this modifier changes nothing (`{1}` and not possessive)
    #[inline]
    pub fn is_redundant(&self) -> bool {
        self.lower == 1 && self.upper == Some(1) && self.greed != Greed::Possessive
    }

    /// Whether `count` repetitions reach the upper bound
    #[inline]
    pub fn at_top(&self, count: usize) -> bool {
        self.upper.is_some_and(|u| count >= u)
    }

    /// Whether `count` repetitions exceed the upper bound
    #[inline]
    pub fn beyond_top(&self, count: usize) -> bool {
        self.upper.is_some_and(|u| count > u)
    }

    /// Parse a repetition suffix at the start of `s`
    ///
    /// Returns the modifier and the number of bytes consumed. An input
    /// with no suffix yields [`Repetition::ONCE`] and zero bytes.
    pub fn parse_suffix(s: &str) -> Result<(Repetition, usize), String> {
        let bytes = s.as_bytes();
        let (lower, upper, mut used) = match bytes.first() {
            Some(b'*') => (0, None, 1),
            Some(b'+') => (1, None, 1),
            Some(b'?') => (0, Some(1), 1),
            Some(b'{') => {
                let close = match s.find('}') {
                    Some(i) => i,
                    None => return Err(format!("unterminated repetition modifier: {}", s)),
                };
                let inner = &s[1..close];
                let (lower, upper) = parse_braces(inner)?;
                (lower, upper, close + 1)
            }
            _ => return Ok((Repetition::ONCE, 0)),
        };
        let greed = match bytes.get(used) {
            Some(b'+') => {
                used += 1;
                Greed::Possessive
            }
            Some(b'?') => {
                used += 1;
                Greed::Stingy
            }
            _ => Greed::Greedy,
        };
        if let Some(u) = upper {
            if u < lower {
                return Err(format!(
                    "repetition upper bound {} is less than lower bound {}",
                    u, lower
                ));
            }
            if u == 0 {
                return Err("repetition upper bound must be positive".to_string());
            }
        }
        Ok((
            Repetition {
                greed,
                lower,
                upper,
            },
            used,
        ))
    }
}

fn parse_braces(inner: &str) -> Result<(usize, Option<usize>), String> {
    let bad = || format!("bad repetition modifier: {{{}}}", inner);
    if inner.is_empty() || inner == "," {
        return Err(bad());
    }
    let number = |t: &str| t.trim().parse::<usize>().map_err(|_| bad());
    match inner.find(',') {
        None => {
            let n = number(inner)?;
            Ok((n, Some(n)))
        }
        Some(0) => Ok((0, Some(number(&inner[1..])?))),
        Some(i) if i == inner.len() - 1 => Ok((number(&inner[..i])?, None)),
        Some(i) => Ok((number(&inner[..i])?, Some(number(&inner[i + 1..])?))),
    }
}

impl fmt::Display for Repetition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_redundant() {
            return Ok(());
        }
        match (self.lower, self.upper) {
            (l, Some(u)) if l == u => write!(f, "{{{}}}", u)?,
            (0, None) => f.write_str("*")?,
            (1, None) => f.write_str("+")?,
            (l, None) => write!(f, "{{{},}}", l)?,
            (0, Some(1)) => f.write_str("?")?,
            (0, Some(u)) => write!(f, "{{,{}}}", u)?,
            (l, Some(u)) => write!(f, "{{{},{}}}", l, u)?,
        }
        match self.greed {
            Greed::Greedy => Ok(()),
            Greed::Stingy => f.write_str("?"),
            Greed::Possessive => f.write_str("+"),
        }
    }
}
