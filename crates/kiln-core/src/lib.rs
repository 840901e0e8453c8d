//! # kiln-core
//!
//! Core library for kiln providing:
//! - Blueprint manifest types (variables, file entries, dependencies, hooks)
//! - Typed configuration values and the immutable `ResolvedConfig`
//! - Generation output types (`GenerationResult`, `MergedManifest`, hook outcomes)
//! - The error taxonomy shared by every stage
//! - Engine configuration loading with embedded defaults and env overrides

pub mod config;
pub mod error;
pub mod types;
pub mod version;

pub use config::{EngineConfig, EngineConfigLoader};
pub use error::{Error, ErrorKind, Result};
pub use version::ModuleVersion;
