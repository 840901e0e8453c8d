//! Hierarchical engine configuration loader
//!
//! Precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. User config (~/.kiln/config.yaml, or an explicit path)
//! 3. Environment variables (KILN_* prefix)
//! 4. CLI flags (handled by caller)

use super::EngineConfig;
use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde_yaml_ng::{Mapping, Value};
use std::env;
use std::fs;
use tracing::debug;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

const DEFAULTS_FILE: &str = "engine-defaults.yaml";
const USER_CONFIG_FILE: &str = "config.yaml";

/// Loads [`EngineConfig`] from all configuration layers
pub struct EngineConfigLoader {
    config_dir: Option<Utf8PathBuf>,
    explicit_file: Option<Utf8PathBuf>,
}

impl EngineConfigLoader {
    /// Loader reading the user config from ~/.kiln
    pub fn new() -> Self {
        Self {
            config_dir: Self::default_config_dir(),
            explicit_file: None,
        }
    }

    /// Loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self {
            config_dir: Some(config_dir),
            explicit_file: None,
        }
    }

    /// Use an explicit config file instead of the directory lookup.
    ///
    /// Unlike the implicit user config, an explicit file must exist.
    pub fn with_file(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.explicit_file = Some(path.into());
        self
    }

    fn default_config_dir() -> Option<Utf8PathBuf> {
        directories::BaseDirs::new()
            .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.home_dir().join(".kiln")).ok())
    }

    /// Load the effective configuration
    pub fn load(&self) -> Result<EngineConfig> {
        let mut layered = Self::load_embedded_defaults()?;

        if let Some(path) = &self.explicit_file {
            if !path.exists() {
                return Err(Error::config_not_found(path.as_str()));
            }
            debug!("Loading engine config from {}", path);
            Self::overlay(&mut layered, Self::load_yaml_file(path)?);
        } else if let Some(dir) = &self.config_dir {
            let path = dir.join(USER_CONFIG_FILE);
            if path.exists() {
                debug!("Loading engine config from {}", path);
                Self::overlay(&mut layered, Self::load_yaml_file(&path)?);
            }
        }

        let config: EngineConfig = serde_yaml_ng::from_value(Value::Mapping(layered))
            .map_err(|e| Error::invalid_config(format!("Invalid engine config: {}", e)))?;

        let config = Self::apply_env_overrides(config)?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &EngineConfig) -> Result<()> {
        if config.hook_timeout_secs == 0 {
            return Err(Error::invalid_config(
                "hook-timeout-secs must be at least 1 (KILN_HOOK_TIMEOUT_SECS or config file)",
            ));
        }
        Ok(())
    }

    fn load_embedded_defaults() -> Result<Mapping> {
        let embedded_file = EmbeddedConfigs::get(DEFAULTS_FILE).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", DEFAULTS_FILE))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", DEFAULTS_FILE))
        })?;

        Self::parse_mapping(content, DEFAULTS_FILE)
    }

    fn load_yaml_file(path: &Utf8Path) -> Result<Mapping> {
        let content = fs::read_to_string(path)?;
        Self::parse_mapping(&content, path.as_str())
    }

    fn parse_mapping(content: &str, origin: &str) -> Result<Mapping> {
        let value: Value = serde_yaml_ng::from_str(content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", origin, e)))?;
        match value {
            Value::Mapping(mapping) => Ok(mapping),
            Value::Null => Ok(Mapping::new()),
            _ => Err(Error::invalid_config(format!(
                "{} must contain a mapping at the top level",
                origin
            ))),
        }
    }

    /// Keys present in the overlay replace the base
    fn overlay(base: &mut Mapping, overlay: Mapping) {
        for (key, value) in overlay {
            base.insert(key, value);
        }
    }

    fn apply_env_overrides(mut config: EngineConfig) -> Result<EngineConfig> {
        if let Ok(val) = env::var("KILN_RENDER_WORKERS") {
            config.render_workers = val.parse().map_err(|_| {
                Error::invalid_config("KILN_RENDER_WORKERS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("KILN_HOOK_TIMEOUT_SECS") {
            config.hook_timeout_secs = val.parse().map_err(|_| {
                Error::invalid_config("KILN_HOOK_TIMEOUT_SECS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("KILN_CONFLICT_POLICY") {
            config.conflict_policy = val
                .parse()
                .map_err(|e: String| Error::invalid_config(format!("KILN_CONFLICT_POLICY: {}", e)))?;
        }

        if let Ok(val) = env::var("KILN_BLUEPRINT_DIRS") {
            config.blueprint_dirs = env::split_paths(&val)
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| {
                    Utf8PathBuf::from_path_buf(p).map_err(|p| {
                        Error::invalid_config(format!(
                            "KILN_BLUEPRINT_DIRS contains a non UTF-8 path: {}",
                            p.display()
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
        }

        if let Ok(val) = env::var("KILN_INCLUDE_EMBEDDED") {
            config.include_embedded = val.parse().map_err(|_| {
                Error::invalid_config("KILN_INCLUDE_EMBEDDED must be 'true' or 'false'")
            })?;
        }

        Ok(config)
    }
}

impl Default for EngineConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConflictPolicy;
    use serial_test::serial;
    use tempfile::TempDir;

    fn create_temp_loader() -> (EngineConfigLoader, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_dir =
            Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).expect("Invalid UTF-8 path");
        (EngineConfigLoader::with_dir(config_dir), temp_dir)
    }

    fn clear_env() {
        for key in [
            "KILN_RENDER_WORKERS",
            "KILN_HOOK_TIMEOUT_SECS",
            "KILN_CONFLICT_POLICY",
            "KILN_BLUEPRINT_DIRS",
            "KILN_INCLUDE_EMBEDDED",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_load_embedded_defaults() {
        clear_env();
        let (loader, _temp) = create_temp_loader();
        let config = loader.load().unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    #[serial]
    fn test_user_file_overrides_only_present_keys() {
        clear_env();
        let (loader, temp) = create_temp_loader();
        fs::write(
            temp.path().join("config.yaml"),
            "hook-timeout-secs: 30\nconflict-policy: fail\n",
        )
        .unwrap();

        let config = loader.load().unwrap();
        assert_eq!(config.hook_timeout_secs, 30);
        assert_eq!(config.conflict_policy, ConflictPolicy::Fail);
        assert_eq!(config.manifest_path, "dependencies.json");
    }

    #[test]
    #[serial]
    fn test_explicit_file_must_exist() {
        clear_env();
        let (loader, temp) = create_temp_loader();
        let missing = Utf8PathBuf::from_path_buf(temp.path().join("nope.yaml")).unwrap();
        let err = loader.with_file(missing).load().unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        let (loader, _temp) = create_temp_loader();

        env::set_var("KILN_RENDER_WORKERS", "2");
        env::set_var("KILN_HOOK_TIMEOUT_SECS", "15");
        env::set_var("KILN_CONFLICT_POLICY", "fail");
        env::set_var("KILN_INCLUDE_EMBEDDED", "false");

        let config = loader.load().unwrap();
        assert_eq!(config.render_workers, 2);
        assert_eq!(config.hook_timeout_secs, 15);
        assert_eq!(config.conflict_policy, ConflictPolicy::Fail);
        assert!(!config.include_embedded);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_is_an_error() {
        clear_env();
        let (loader, _temp) = create_temp_loader();
        env::set_var("KILN_RENDER_WORKERS", "many");

        let err = loader.load().unwrap_err();
        assert!(err.to_string().contains("KILN_RENDER_WORKERS"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_hook_timeout_rejected() {
        clear_env();
        let (loader, temp) = create_temp_loader();
        fs::write(temp.path().join("config.yaml"), "hook-timeout-secs: 0\n").unwrap();
        let err = loader.load().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
        assert!(err.to_string().contains("hook-timeout-secs"));

        fs::remove_file(temp.path().join("config.yaml")).unwrap();
        env::set_var("KILN_HOOK_TIMEOUT_SECS", "0");
        assert!(loader.load().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_non_mapping_file_rejected() {
        clear_env();
        let (loader, temp) = create_temp_loader();
        fs::write(temp.path().join("config.yaml"), "- just\n- a list\n").unwrap();
        assert!(loader.load().is_err());
    }
}
