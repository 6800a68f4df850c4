//! Strongly-typed job name wrapper.

use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

/// Name of a compiled job, unique within a run.
///
/// Keeps job identifiers apart from table identifiers and glob patterns, which
/// are all plain strings at the edges of the system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JobName(String);

impl JobName {
    /// Create a new `JobName`, panicking if the name is empty.
    ///
    /// Prefer [`try_new`](Self::try_new) when handling untrusted input.
    pub fn new(name: impl Into<String>) -> Self {
        let s = name.into();
        assert!(!s.is_empty(), "JobName must not be empty");
        Self(s)
    }

    /// Try to create a new `JobName`, returning `None` if the name is empty.
    pub fn try_new(name: impl Into<String>) -> Option<Self> {
        let s = name.into();
        if s.is_empty() {
            None
        } else {
            Some(Self(s))
        }
    }

    /// Return the underlying name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for JobName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        JobName::try_new(s).ok_or_else(|| serde::de::Error::custom("JobName must not be empty"))
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JobName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for JobName {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for JobName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for JobName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for JobName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_name_display_and_deref() {
        let name = JobName::new("fct_orders");
        assert_eq!(format!("{}", name), "fct_orders");
        assert!(name.starts_with("fct_"));
        assert_eq!(name, "fct_orders");
    }

    #[test]
    fn test_job_name_try_new_rejects_empty() {
        assert!(JobName::try_new("").is_none());
        assert!(JobName::try_new("stg_users").is_some());
    }

    #[test]
    fn test_job_name_deserialize_rejects_empty() {
        let err = serde_json::from_str::<JobName>("\"\"");
        assert!(err.is_err());
        let ok: JobName = serde_json::from_str("\"dim_users\"").unwrap();
        assert_eq!(ok.as_str(), "dim_users");
    }

    #[test]
    fn test_job_name_borrow_lookup() {
        let mut map = std::collections::HashMap::new();
        map.insert(JobName::new("a"), 1);
        assert_eq!(map.get("a"), Some(&1));
    }
}
