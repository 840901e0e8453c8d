//! Error types for kiln-core

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using kiln-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse failure category, stable across error message wording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Validation,
    Condition,
    Render,
    DependencyConflict,
    Io,
    Hook,
    Catalog,
    Cancelled,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Condition => "condition",
            ErrorKind::Render => "render",
            ErrorKind::DependencyConflict => "dependency-conflict",
            ErrorKind::Io => "io",
            ErrorKind::Hook => "hook",
            ErrorKind::Catalog => "catalog",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "config",
        };
        f.write_str(label)
    }
}

/// Kiln error types
#[derive(Error, Debug)]
pub enum Error {
    /// Bad, missing or unknown configuration variable(s)
    #[error("Invalid configuration for blueprint '{blueprint}':\n{problems}")]
    Validation { blueprint: String, problems: String },

    /// Malformed condition or reference to an undeclared variable
    #[error("Condition '{expression}' is invalid: {message}")]
    Condition { expression: String, message: String },

    /// Template parse or execution failure
    #[error("Failed to render '{template}': {message}")]
    Render { template: String, message: String },

    /// Two included entries resolve to the same destination
    #[error("Destination collision: '{path}' is produced by both {first} and {second}")]
    DestinationCollision {
        path: String,
        first: String,
        second: String,
    },

    /// Irreconcilable dependency versions under the active policy
    #[error("Dependency conflict for {module}: {versions} ({reason})")]
    DependencyConflict {
        module: String,
        versions: String,
        reason: String,
    },

    /// Filesystem failure while materializing output
    #[error("Failed to materialize '{path}': {message}")]
    Materialize { path: String, message: String },

    /// Post-generation hook failure
    #[error("Hook '{hook}' failed: {message}")]
    Hook { hook: String, message: String },

    /// Blueprint catalog could not be loaded
    #[error("Catalog error in {origin}: {message}")]
    Catalog { origin: String, message: String },

    /// Blueprint not found
    #[error("Blueprint not found: {blueprint}. Available blueprints: {available}")]
    BlueprintNotFound { blueprint: String, available: String },

    /// Invalid engine configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Generation was cancelled
    #[error("Generation cancelled during {stage}")]
    Cancelled { stage: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a validation error from a list of problems
    pub fn validation(blueprint: impl Into<String>, problems: Vec<String>) -> Self {
        Self::Validation {
            blueprint: blueprint.into(),
            problems: problems
                .iter()
                .map(|p| format!("  - {}", p))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Create a condition error
    pub fn condition(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Condition {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Create a render error
    pub fn render(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Create a destination collision error
    pub fn destination_collision(
        path: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        Self::DestinationCollision {
            path: path.into(),
            first: first.into(),
            second: second.into(),
        }
    }

    /// Create a dependency conflict error
    pub fn dependency_conflict(
        module: impl Into<String>,
        versions: &[String],
        reason: impl Into<String>,
    ) -> Self {
        Self::DependencyConflict {
            module: module.into(),
            versions: versions.join(", "),
            reason: reason.into(),
        }
    }

    /// Create a materialization error
    pub fn materialize(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Materialize {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a hook error
    pub fn hook(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hook {
            hook: hook.into(),
            message: message.into(),
        }
    }

    /// Create a catalog error
    pub fn catalog(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Catalog {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Create a blueprint not found error
    pub fn blueprint_not_found(blueprint: impl Into<String>, available: &[&str]) -> Self {
        Self::BlueprintNotFound {
            blueprint: blueprint.into(),
            available: if available.is_empty() {
                "(none)".to_string()
            } else {
                available.join(", ")
            },
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create a cancellation error
    pub fn cancelled(stage: impl Into<String>) -> Self {
        Self::Cancelled {
            stage: stage.into(),
        }
    }

    /// Failure category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Condition { .. } => ErrorKind::Condition,
            Error::Render { .. } | Error::DestinationCollision { .. } => ErrorKind::Render,
            Error::DependencyConflict { .. } => ErrorKind::DependencyConflict,
            Error::Materialize { .. } | Error::Io(_) => ErrorKind::Io,
            Error::Hook { .. } => ErrorKind::Hook,
            Error::Catalog { .. } | Error::BlueprintNotFound { .. } => ErrorKind::Catalog,
            Error::Cancelled { .. } => ErrorKind::Cancelled,
            Error::InvalidConfig { .. }
            | Error::ConfigNotFound { .. }
            | Error::YamlParse(_)
            | Error::JsonParse(_) => ErrorKind::Config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_lists_every_problem() {
        let err = Error::validation(
            "go-service",
            vec!["unknown variable 'Nmae'".into(), "missing required 'Name'".into()],
        );
        let msg = err.to_string();
        assert!(msg.contains("go-service"));
        assert!(msg.contains("  - unknown variable 'Nmae'"));
        assert!(msg.contains("  - missing required 'Name'"));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_collision_is_render_kind() {
        let err = Error::destination_collision("README.md", "files[0]", "files[3]");
        assert_eq!(err.kind(), ErrorKind::Render);
        assert!(err.to_string().contains("README.md"));
    }

    #[test]
    fn test_blueprint_not_found_lists_available() {
        let err = Error::blueprint_not_found("nope", &["go-service", "rust-cli"]);
        assert!(err.to_string().contains("go-service, rust-cli"));

        let err = Error::blueprint_not_found("nope", &[]);
        assert!(err.to_string().contains("(none)"));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::DependencyConflict.to_string(), "dependency-conflict");
        assert_eq!(Error::cancelled("render").kind(), ErrorKind::Cancelled);
    }
}
