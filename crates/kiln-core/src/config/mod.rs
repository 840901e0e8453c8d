//! Engine configuration

mod loader;

pub use loader::EngineConfigLoader;

use crate::types::ConflictPolicy;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables shared by every generation an engine runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Worker pool bound for rendering and condition evaluation (0 = auto)
    #[serde(default)]
    pub render_workers: usize,

    #[serde(default = "default_hook_timeout_secs")]
    pub hook_timeout_secs: u64,

    #[serde(default)]
    pub conflict_policy: ConflictPolicy,

    /// Extra directories scanned for blueprints
    #[serde(default)]
    pub blueprint_dirs: Vec<Utf8PathBuf>,

    #[serde(default = "default_true")]
    pub include_embedded: bool,

    /// Merged manifest destination when a blueprint declares none
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,
}

fn default_hook_timeout_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_manifest_path() -> String {
    "dependencies.json".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            render_workers: 0,
            hook_timeout_secs: default_hook_timeout_secs(),
            conflict_policy: ConflictPolicy::default(),
            blueprint_dirs: Vec::new(),
            include_embedded: true,
            manifest_path: default_manifest_path(),
        }
    }
}

impl EngineConfig {
    /// Effective worker count, resolving 0 to the available parallelism
    pub fn effective_workers(&self) -> usize {
        if self.render_workers > 0 {
            return self.render_workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }

    pub fn hook_timeout(&self) -> Duration {
        Duration::from_secs(self.hook_timeout_secs)
    }
}
