//! Glob patterns for policy overrides and skip lists.
//!
//! Patterns are translated to anchored regular expressions once, when the
//! policy is loaded, so malformed patterns fail the run before any job work.
//!
//! Supported syntax:
//! - `*` matches any run of characters (including none)
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]`, `[!abc]` character classes
//!
//! Everything else matches literally.

use crate::error::{CoreError, CoreResult};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A compiled glob pattern
#[derive(Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compile a glob pattern.
    pub fn new(pattern: &str) -> CoreResult<Self> {
        let invalid = |reason: &str| CoreError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }

        let translated = glob_to_regex(pattern).map_err(|reason| invalid(&reason))?;
        let regex = Regex::new(&translated).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Whether the whole name matches the pattern
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// Whether the pattern has no wildcards and only matches itself
    pub fn is_literal(&self) -> bool {
        !self.source.contains(['*', '?', '['])
    }

    /// The pattern as written in the config
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Translate a glob into an anchored regex source string.
fn glob_to_regex(pattern: &str) -> Result<String, String> {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                let mut first = true;
                let mut prev = None;
                while let Some(n) = chars.next() {
                    if n == ']' && !first {
                        closed = true;
                        break;
                    }
                    // `&&`, `--` and `~~` are set operators to the regex crate
                    let doubled_dash =
                        n == '-' && (prev == Some('-') || chars.peek() == Some(&'-'));
                    if first && n == '!' {
                        class.push('^');
                    } else if matches!(n, '\\' | '[' | '&' | '~')
                        || (n == ']' && first)
                        || (n == '^' && first)
                        || doubled_dash
                    {
                        class.push('\\');
                        class.push(n);
                    } else {
                        class.push(n);
                    }
                    first = false;
                    prev = Some(n);
                }
                if !closed || class.is_empty() || class == "^" {
                    return Err("unterminated or empty character class".to_string());
                }
                out.push('[');
                out.push_str(&class);
                out.push(']');
            }
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
    }

    out.push('$');
    Ok(out)
}

impl fmt::Debug for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GlobPattern").field(&self.source).finish()
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for GlobPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Serialize for GlobPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for GlobPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        GlobPattern::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "pattern_test.rs"]
mod tests;
