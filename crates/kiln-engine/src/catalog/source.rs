//! Blueprint source abstraction
//!
//! A source supplies raw manifest and template text to the catalog:
//! - Directory: `<root>/<id>/blueprint.yaml` with templates under `<root>/<id>/templates/`
//! - Embedded: the same layout compiled into the binary from `embedded/blueprints/`
//! - Memory: manifests and templates held in maps, for tests and hosting applications

use camino::{Utf8Path, Utf8PathBuf};
use kiln_core::{Error, Result};
use rust_embed::RustEmbed;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use tracing::debug;

pub const MANIFEST_FILE: &str = "blueprint.yaml";
pub const TEMPLATES_DIR: &str = "templates";

/// Supplier of raw blueprint manifests and template bodies
pub trait BlueprintSource: Send + Sync {
    /// Human-readable origin used in error messages
    fn name(&self) -> String;

    /// Blueprint identifiers this source provides, sorted
    fn list(&self) -> Result<Vec<String>>;

    /// Raw `blueprint.yaml` text
    fn read_manifest(&self, id: &str) -> Result<String>;

    /// Raw template body, `source` relative to the blueprint's templates directory
    fn read_template(&self, id: &str, source: &str) -> Result<String>;
}

/// Reject template references escaping the templates directory
pub(crate) fn check_template_source(source: &str) -> std::result::Result<(), String> {
    let normalized = source.replace('\\', "/");
    if normalized.is_empty() {
        return Err("template source is empty".to_string());
    }
    if normalized.starts_with('/') || Utf8Path::new(source).is_absolute() {
        return Err(format!("template source '{}' must be relative", source));
    }
    if normalized.split('/').any(|segment| segment == "..") {
        return Err(format!(
            "template source '{}' must not contain '..' segments",
            source
        ));
    }
    Ok(())
}

/// Blueprints stored on disk, one subdirectory per blueprint
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: Utf8PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn blueprint_dir(&self, id: &str) -> Utf8PathBuf {
        self.root.join(id)
    }
}

impl BlueprintSource for DirectorySource {
    fn name(&self) -> String {
        format!("directory {}", self.root)
    }

    fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            Error::catalog(self.name(), format!("cannot read blueprint directory: {}", e))
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.join(MANIFEST_FILE).is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(id) => ids.push(id),
                Err(name) => debug!("Skipping non UTF-8 blueprint directory {:?}", name),
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn read_manifest(&self, id: &str) -> Result<String> {
        let path = self.blueprint_dir(id).join(MANIFEST_FILE);
        fs::read_to_string(&path)
            .map_err(|e| Error::catalog(self.name(), format!("cannot read {}: {}", path, e)))
    }

    fn read_template(&self, id: &str, source: &str) -> Result<String> {
        check_template_source(source).map_err(|msg| Error::catalog(self.name(), msg))?;
        let path = self.blueprint_dir(id).join(TEMPLATES_DIR).join(source);
        fs::read_to_string(&path).map_err(|e| {
            Error::catalog(
                self.name(),
                format!("blueprint '{}': cannot read template {}: {}", id, path, e),
            )
        })
    }
}

/// Blueprints compiled into the binary
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/blueprints/"]
#[prefix = ""]
struct EmbeddedBlueprints;

/// Source over the blueprints embedded at build time
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedSource;

impl EmbeddedSource {
    fn read(&self, path: &str) -> Result<String> {
        let file = EmbeddedBlueprints::get(path).ok_or_else(|| {
            Error::catalog(self.name(), format!("embedded file not found: {}", path))
        })?;
        String::from_utf8(file.data.into_owned()).map_err(|_| {
            Error::catalog(self.name(), format!("invalid UTF-8 in embedded file: {}", path))
        })
    }
}

impl BlueprintSource for EmbeddedSource {
    fn name(&self) -> String {
        "embedded blueprints".to_string()
    }

    fn list(&self) -> Result<Vec<String>> {
        let suffix = format!("/{}", MANIFEST_FILE);
        let ids: BTreeSet<String> = EmbeddedBlueprints::iter()
            .filter_map(|path| {
                path.strip_suffix(suffix.as_str())
                    .filter(|id| !id.contains('/'))
                    .map(str::to_string)
            })
            .collect();
        Ok(ids.into_iter().collect())
    }

    fn read_manifest(&self, id: &str) -> Result<String> {
        self.read(&format!("{}/{}", id, MANIFEST_FILE))
    }

    fn read_template(&self, id: &str, source: &str) -> Result<String> {
        check_template_source(source).map_err(|msg| Error::catalog(self.name(), msg))?;
        let source = source.replace('\\', "/");
        self.read(&format!("{}/{}/{}", id, TEMPLATES_DIR, source))
    }
}

/// In-memory blueprints
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    manifests: BTreeMap<String, String>,
    templates: BTreeMap<(String, String), String>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a manifest; the identifier is the key the catalog lists
    pub fn with_manifest(mut self, id: impl Into<String>, yaml: impl Into<String>) -> Self {
        self.manifests.insert(id.into(), yaml.into());
        self
    }

    pub fn with_template(
        mut self,
        id: impl Into<String>,
        source: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        self.templates
            .insert((id.into(), source.into()), body.into());
        self
    }
}

impl BlueprintSource for MemorySource {
    fn name(&self) -> String {
        format!("memory source '{}'", self.name)
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.manifests.keys().cloned().collect())
    }

    fn read_manifest(&self, id: &str) -> Result<String> {
        self.manifests.get(id).cloned().ok_or_else(|| {
            Error::catalog(self.name(), format!("no manifest for blueprint '{}'", id))
        })
    }

    fn read_template(&self, id: &str, source: &str) -> Result<String> {
        check_template_source(source).map_err(|msg| Error::catalog(self.name(), msg))?;
        self.templates
            .get(&(id.to_string(), source.to_string()))
            .cloned()
            .ok_or_else(|| {
                Error::catalog(
                    self.name(),
                    format!("blueprint '{}': template '{}' not found", id, source),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_template_source_must_stay_inside() {
        assert!(check_template_source("main.go.tmpl").is_ok());
        assert!(check_template_source("cmd/main.go.tmpl").is_ok());
        assert!(check_template_source("../secrets").is_err());
        assert!(check_template_source("a/../../b").is_err());
        assert!(check_template_source("/etc/passwd").is_err());
        assert!(check_template_source("").is_err());
    }

    #[test]
    fn test_directory_source_lists_blueprints() {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();

        fs::create_dir_all(root.join("beta/templates")).unwrap();
        fs::write(root.join("beta/blueprint.yaml"), "id: beta\n").unwrap();
        fs::write(root.join("beta/templates/readme.md"), "# {{ Name }}").unwrap();
        fs::create_dir_all(root.join("alpha")).unwrap();
        fs::write(root.join("alpha/blueprint.yaml"), "id: alpha\n").unwrap();
        fs::create_dir_all(root.join("not-a-blueprint")).unwrap();

        let source = DirectorySource::new(root);
        assert_eq!(source.list().unwrap(), vec!["alpha", "beta"]);
        assert_eq!(source.read_manifest("beta").unwrap(), "id: beta\n");
        assert_eq!(source.read_template("beta", "readme.md").unwrap(), "# {{ Name }}");
        assert!(source.read_template("beta", "../blueprint.yaml").is_err());
    }

    #[test]
    fn test_missing_directory_is_catalog_error() {
        let source = DirectorySource::new("/definitely/not/here");
        assert!(matches!(source.list(), Err(Error::Catalog { .. })));
    }

    #[test]
    fn test_embedded_source_lists_sample() {
        let ids = EmbeddedSource.list().unwrap();
        assert!(ids.contains(&"go-service".to_string()));
        assert!(EmbeddedSource.read_manifest("go-service").unwrap().contains("go-service"));
    }

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new("test")
            .with_manifest("demo", "id: demo")
            .with_template("demo", "a.txt", "A");
        assert_eq!(source.list().unwrap(), vec!["demo"]);
        assert_eq!(source.read_template("demo", "a.txt").unwrap(), "A");
        assert!(source.read_template("demo", "b.txt").is_err());
    }
}
