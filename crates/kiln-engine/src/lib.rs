//! # kiln-engine
//!
//! Blueprint generation engine:
//! - Catalog: loads and validates blueprints from directories, embedded assets or memory
//! - Resolver: validates overrides into an immutable `ResolvedConfig`
//! - Conditions: a small typed boolean language deciding inclusion
//! - Renderer: Tera templates with a fixed pure helper library
//! - Merger: one version per module under a conflict policy
//! - Materializer: journaled all-or-nothing writes
//! - Hooks: ordered post-generation commands with timeouts
//!
//! [`Engine::generate`] runs the whole pipeline.

pub mod catalog;
pub mod condition;
pub mod engine;
pub mod hooks;
pub mod materializer;
pub mod merger;
pub mod pool;
pub mod render;
pub mod resolver;

pub use catalog::{
    Blueprint, BlueprintSource, Catalog, DirectorySource, EmbeddedSource, MemorySource,
};
pub use condition::{Condition, ConditionEvaluator};
pub use engine::{
    Engine, GenerationOptions, GenerationPlan, GenerationRequest, IncludedFile, PreparedGeneration,
};
pub use hooks::{HookRunner, PlannedHook};
pub use materializer::{Filesystem, LocalFilesystem, Materializer};
pub use merger::{DependencyMerger, IncludedDependency};
pub use render::TemplateRenderer;
pub use resolver::{resolve, Overrides};

use kiln_core::EngineConfig;

/// Blueprint sources selected by an engine configuration.
///
/// Configured directories come first, then the embedded set when enabled.
pub fn configured_sources(config: &EngineConfig) -> Vec<Box<dyn BlueprintSource>> {
    let mut sources: Vec<Box<dyn BlueprintSource>> = config
        .blueprint_dirs
        .iter()
        .map(|dir| Box::new(DirectorySource::new(dir.clone())) as Box<dyn BlueprintSource>)
        .collect();
    if config.include_embedded {
        sources.push(Box::new(EmbeddedSource));
    }
    sources
}
