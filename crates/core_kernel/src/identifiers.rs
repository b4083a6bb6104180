//! Strongly-typed identifiers for domain entities
//!
//! Upstream claims are keyed by a numeric id and documents by an opaque text
//! id. Wrapping both keeps them from being mixed up with each other or with
//! the lookup codes (region, status) that share the same primitive types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

/// Identifier of a claim in the upstream source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimId(i64);

impl ClaimId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw upstream value
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClaimId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| CoreError::InvalidIdentifier(format!("claim id '{}'", s)))
    }
}

impl From<i64> for ClaimId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<ClaimId> for i64 {
    fn from(id: ClaimId) -> i64 {
        id.0
    }
}

/// Identifier of an uploaded document in the upstream source
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for tabular output
    pub fn abbreviated(&self, max_chars: usize) -> String {
        if self.0.chars().count() > max_chars {
            let head: String = self.0.chars().take(max_chars).collect();
            format!("{}..", head)
        } else {
            self.0.clone()
        }
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FileId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidIdentifier("empty file id".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for FileId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of one polling cycle, used to correlate log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleId(Uuid);

impl CycleId {
    /// Creates a new time-ordered identifier (v7)
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CYC-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_id_display() {
        assert_eq!(ClaimId::new(12345).to_string(), "12345");
    }

    #[test]
    fn test_claim_id_parsing() {
        let parsed: ClaimId = " 987 ".parse().unwrap();
        assert_eq!(parsed, ClaimId::new(987));
        assert!("abc".parse::<ClaimId>().is_err());
    }

    #[test]
    fn test_cycle_id_display() {
        assert!(CycleId::new().to_string().starts_with("CYC-"));
    }
}
