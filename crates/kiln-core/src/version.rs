//! Module version ordering
//!
//! Dependency declarations carry versions in ecosystem notation, most
//! commonly Go style (`v1.10.9`, `v0.0.0-20240101120000-abcdef123456`).
//! They are ordered by semantic version precedence after dropping the
//! leading `v`; the raw text is kept so that output is byte-for-byte what
//! the blueprint declared.

use semver::Version;
use std::cmp::Ordering;
use std::fmt;

/// A declared version with its semantic ordering key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleVersion {
    raw: String,
    parsed: Version,
}

impl ModuleVersion {
    /// Parse a declared version, `None` when it is not semver
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let candidate = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        // Go's "+incompatible" suffix is build metadata, which semver accepts as-is
        Version::parse(candidate).ok().map(|parsed| Self {
            raw: trimmed.to_string(),
            parsed,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn semver(&self) -> &Version {
        &self.parsed
    }
}

impl Ord for ModuleVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // Raw text breaks ties between spellings of the same version so the
        // ordering is total
        self.parsed
            .cmp(&other.parsed)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for ModuleVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
