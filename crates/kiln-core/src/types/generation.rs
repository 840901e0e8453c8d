//! Artifacts produced by one generation invocation

use crate::error::{Error, ErrorKind};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Rendered output file, path relative to the output root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub path: Utf8PathBuf,
    pub contents: Vec<u8>,
}

impl RenderedFile {
    pub fn new(path: impl Into<Utf8PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

/// One module in the merged manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedDependency {
    pub module: String,
    pub version: String,

    /// Entries that declared this module, sorted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub declared_by: Vec<String>,

    /// Versions that lost under highest-wins, sorted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub superseded: Vec<String>,
}

/// Deduplicated dependency list, one version per module, sorted by module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedManifest {
    pub dependencies: Vec<MergedDependency>,
}

impl MergedManifest {
    pub fn get(&self, module: &str) -> Option<&MergedDependency> {
        self.dependencies.iter().find(|d| d.module == module)
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// Result of a single post-generation hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum HookStatus {
    Succeeded,
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },
    TimedOut {
        timeout_secs: u64,
    },
    Skipped {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookOutcome {
    pub name: String,
    pub required: bool,
    #[serde(flatten)]
    pub status: HookStatus,
    pub duration_ms: u64,
}

impl HookOutcome {
    pub fn skipped(name: impl Into<String>, required: bool, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required,
            status: HookStatus::Skipped {
                reason: reason.into(),
            },
            duration_ms: 0,
        }
    }

    /// Failed or timed out
    pub fn is_failure(&self) -> bool {
        matches!(
            self.status,
            HookStatus::Failed { .. } | HookStatus::TimedOut { .. }
        )
    }
}

/// Classified error carried in a [`GenerationResult`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for ErrorReport {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// What ended up on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationOutcome {
    /// Failed before or during materialization; nothing was left on disk
    NotGenerated,
    /// Dry run: the plan was computed, nothing was written
    Planned,
    /// Project written, every executed hook succeeded
    Generated,
    /// Project written, at least one hook failed
    GeneratedWithHookFailures,
}

/// Final report of one invocation; the engine keeps no reference to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub blueprint: String,
    pub output_dir: Utf8PathBuf,
    pub dry_run: bool,
    pub outcome: GenerationOutcome,
    pub success: bool,

    /// Paths relative to `output_dir`, sorted
    pub files_written: Vec<Utf8PathBuf>,
    pub merged_manifest: Option<MergedManifest>,
    pub hook_outcomes: Vec<HookOutcome>,
    pub errors: Vec<ErrorReport>,
    pub warnings: Vec<String>,
}

impl GenerationResult {
    /// Result for a failure that left nothing on disk
    pub fn not_generated(
        blueprint: impl Into<String>,
        output_dir: impl Into<Utf8PathBuf>,
        dry_run: bool,
        error: &Error,
    ) -> Self {
        Self {
            blueprint: blueprint.into(),
            output_dir: output_dir.into(),
            dry_run,
            outcome: GenerationOutcome::NotGenerated,
            success: false,
            files_written: Vec::new(),
            merged_manifest: None,
            hook_outcomes: Vec::new(),
            errors: vec![ErrorReport::from(error)],
            warnings: Vec::new(),
        }
    }

    /// Number of hooks that failed or timed out
    pub fn failed_hooks(&self) -> usize {
        self.hook_outcomes.iter().filter(|h| h.is_failure()).count()
    }

    /// First error of the given kind
    pub fn error_of_kind(&self, kind: ErrorKind) -> Option<&ErrorReport> {
        self.errors.iter().find(|e| e.kind == kind)
    }
}
