//! Generation policies selectable by callers and engine configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How disagreeing versions of one module are reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Highest semantic version wins
    #[default]
    HighestWins,
    /// Any disagreement is a dependency conflict error
    Fail,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::HighestWins => f.write_str("highest-wins"),
            ConflictPolicy::Fail => f.write_str("fail"),
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "highest-wins" | "highest" => Ok(ConflictPolicy::HighestWins),
            "fail" | "strict" => Ok(ConflictPolicy::Fail),
            other => Err(format!(
                "unknown conflict policy '{}', expected 'highest-wins' or 'fail'",
                other
            )),
        }
    }
}

/// Behavior when the output directory already has content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    /// Refuse to write into a non-empty directory
    #[default]
    Create,
    /// Replace files at planned paths
    Overwrite,
    /// Keep existing files at planned paths, write only new ones
    Merge,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Create => f.write_str("create"),
            WriteMode::Overwrite => f.write_str("overwrite"),
            WriteMode::Merge => f.write_str("merge"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_policy_from_str() {
        assert_eq!("highest-wins".parse(), Ok(ConflictPolicy::HighestWins));
        assert_eq!("FAIL".parse(), Ok(ConflictPolicy::Fail));
        assert!("newest".parse::<ConflictPolicy>().is_err());
    }

    #[test]
    fn test_policy_serde_names() {
        let json = serde_json::to_string(&ConflictPolicy::HighestWins).unwrap();
        assert_eq!(json, "\"highest-wins\"");
        let mode: WriteMode = serde_json::from_str("\"overwrite\"").unwrap();
        assert_eq!(mode, WriteMode::Overwrite);
    }
}
