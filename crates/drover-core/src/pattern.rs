//! Glob-style patterns used by trigger and step conditions.
//!
//! Only a trailing `*` is understood (prefix match). Everything else is an
//! exact comparison. Patterns are validated when a definition is loaded so
//! matching itself can never fail.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

const UNSUPPORTED_GLOB: &[char] = &['?', '[', ']', '{', '}'];

/// A validated pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Pattern {
    /// Matches the candidate exactly.
    Exact(String),
    /// Matches any candidate starting with the prefix (`release-*`).
    Prefix(String),
}

impl Pattern {
    /// Parse a pattern, rejecting syntax the matcher does not support.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidPattern {
            pattern: text.to_string(),
            reason: reason.to_string(),
        };

        if text.is_empty() {
            return Err(invalid("pattern is empty"));
        }
        if text.contains(UNSUPPORTED_GLOB) {
            return Err(invalid("only a trailing '*' wildcard is supported"));
        }

        match text.find('*') {
            None => Ok(Pattern::Exact(text.to_string())),
            Some(pos) if pos == text.len() - 1 => {
                Ok(Pattern::Prefix(text[..pos].to_string()))
            }
            Some(_) => Err(invalid("'*' is only allowed at the end of a pattern")),
        }
    }

    /// Check a candidate against this pattern.
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Pattern::Exact(expected) => expected == candidate,
            Pattern::Prefix(prefix) => candidate.starts_with(prefix.as_str()),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Exact(text) => f.write_str(text),
            Pattern::Prefix(prefix) => write!(f, "{}*", prefix),
        }
    }
}

impl std::str::FromStr for Pattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Pattern::parse(s)
    }
}

impl TryFrom<String> for Pattern {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Pattern::parse(&value)
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.to_string()
    }
}

/// Check a candidate against a single pattern.
pub fn matches(pattern: &Pattern, candidate: &str) -> bool {
    pattern.matches(candidate)
}

/// True iff the candidate matches at least one pattern.
///
/// An absent or empty candidate never matches, and neither does an empty
/// pattern set. Callers decide what an empty set means for them.
pub fn matches_any(patterns: &[Pattern], candidate: Option<&str>) -> bool {
    match candidate {
        Some(value) if !value.is_empty() => patterns.iter().any(|p| p.matches(value)),
        _ => false,
    }
}
