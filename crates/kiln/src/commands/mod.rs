//! CLI command implementations

pub mod config;
pub mod generate;
pub mod list;
pub mod show;
pub mod validate;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use kiln_core::{EngineConfig, EngineConfigLoader};
use kiln_engine::{configured_sources, Catalog};

/// Flags shared by every command
#[derive(Debug, Default)]
pub struct Globals {
    pub config: Option<Utf8PathBuf>,
    pub blueprint_dirs: Vec<Utf8PathBuf>,
}

impl Globals {
    /// Effective engine configuration, with command-line directories on top
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut loader = EngineConfigLoader::new();
        if let Some(path) = &self.config {
            loader = loader.with_file(path.clone());
        }
        let mut config = loader
            .load()
            .context("Failed to load engine configuration")?;
        config.blueprint_dirs.extend(self.blueprint_dirs.iter().cloned());
        Ok(config)
    }

    /// Load and validate every configured blueprint
    pub fn catalog(&self, config: &EngineConfig) -> Result<Catalog> {
        Catalog::load(&configured_sources(config)).context("Failed to load blueprint catalog")
    }
}
