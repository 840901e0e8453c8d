//! Blueprint catalog
//!
//! Loads manifests and template bodies from one or more [`BlueprintSource`]s,
//! validates them, and freezes the result. A catalog is read-only after
//! [`Catalog::load`] and can be shared across concurrent generations.

mod source;
mod validate;

pub use source::{BlueprintSource, DirectorySource, EmbeddedSource, MemorySource};
pub use validate::validate_manifest;

use kiln_core::types::BlueprintManifest;
use kiln_core::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A validated blueprint with every referenced template body
#[derive(Debug)]
pub struct Blueprint {
    pub manifest: BlueprintManifest,

    /// Template bodies keyed by file entry source
    pub templates: BTreeMap<String, Arc<str>>,

    /// Name of the source the blueprint was loaded from
    pub origin: String,
}

impl Blueprint {
    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    pub fn template(&self, source: &str) -> Option<&Arc<str>> {
        self.templates.get(source)
    }
}

/// Immutable index of blueprints keyed by identifier
#[derive(Debug, Default)]
pub struct Catalog {
    blueprints: BTreeMap<String, Arc<Blueprint>>,
}

impl Catalog {
    /// Load every blueprint of every source
    pub fn load(sources: &[Box<dyn BlueprintSource>]) -> Result<Self> {
        let mut blueprints: BTreeMap<String, Arc<Blueprint>> = BTreeMap::new();

        for source in sources {
            let origin = source.name();
            for id in source.list()? {
                let blueprint = Self::load_blueprint(source.as_ref(), &id)?;
                if let Some(existing) = blueprints.get(&id) {
                    return Err(Error::catalog(
                        &origin,
                        format!(
                            "blueprint '{}' is already provided by {}",
                            id, existing.origin
                        ),
                    ));
                }
                debug!("Loaded blueprint '{}' from {}", id, origin);
                blueprints.insert(id, Arc::new(blueprint));
            }
        }

        info!("Catalog loaded with {} blueprint(s)", blueprints.len());
        Ok(Self { blueprints })
    }

    /// Load and validate one blueprint
    pub fn load_blueprint(source: &dyn BlueprintSource, id: &str) -> Result<Blueprint> {
        let origin = source.name();
        let raw = source.read_manifest(id)?;
        let manifest = BlueprintManifest::from_yaml(&raw).map_err(|e| {
            Error::catalog(&origin, format!("blueprint '{}': invalid manifest: {}", id, e))
        })?;

        let mut problems = validate_manifest(&manifest);
        if manifest.id != id {
            problems.push(format!(
                "manifest identifier '{}' does not match its location '{}'",
                manifest.id, id
            ));
        }
        if !problems.is_empty() {
            return Err(Error::catalog(
                &origin,
                format!(
                    "blueprint '{}' is invalid:\n{}",
                    id,
                    problems
                        .iter()
                        .map(|p| format!("  - {}", p))
                        .collect::<Vec<_>>()
                        .join("\n")
                ),
            ));
        }

        let mut templates = BTreeMap::new();
        for file in &manifest.files {
            if templates.contains_key(&file.source) {
                continue;
            }
            let body = source.read_template(id, &file.source)?;
            templates.insert(file.source.clone(), Arc::from(body));
        }

        Ok(Blueprint {
            manifest,
            templates,
            origin,
        })
    }

    /// Look up a blueprint by identifier
    pub fn get(&self, id: &str) -> Result<Arc<Blueprint>> {
        self.blueprints.get(id).cloned().ok_or_else(|| {
            let available: Vec<&str> = self.ids().collect();
            Error::blueprint_not_found(id, &available)
        })
    }

    /// Identifiers in sorted order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.blueprints.keys().map(String::as_str)
    }

    pub fn blueprints(&self) -> impl Iterator<Item = &Arc<Blueprint>> {
        self.blueprints.values()
    }

    pub fn len(&self) -> usize {
        self.blueprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blueprints.is_empty()
    }
}
