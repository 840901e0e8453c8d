//! Dependency merger
//!
//! Reduces the included dependency declarations to one version per module.
//! Grouping goes through ordered maps and version choice through a total
//! order, so the outcome does not depend on declaration order.

use kiln_core::types::{ConflictPolicy, ManifestFormat, MergedDependency, MergedManifest};
use kiln_core::{Error, ModuleVersion, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// A dependency declaration whose condition held, with the entry that declared it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncludedDependency {
    pub module: String,
    pub version: String,
    pub declared_by: String,
}

impl IncludedDependency {
    pub fn new(
        module: impl Into<String>,
        version: impl Into<String>,
        declared_by: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            version: version.into(),
            declared_by: declared_by.into(),
        }
    }
}

/// Merges dependency declarations under a conflict policy
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyMerger {
    policy: ConflictPolicy,
}

impl DependencyMerger {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// One entry per module, sorted by module
    pub fn merge(&self, declarations: &[IncludedDependency]) -> Result<MergedManifest> {
        let mut groups: BTreeMap<&str, Vec<&IncludedDependency>> = BTreeMap::new();
        for decl in declarations {
            groups.entry(decl.module.trim()).or_default().push(decl);
        }

        let mut dependencies = Vec::with_capacity(groups.len());
        for (module, decls) in groups {
            let versions: BTreeSet<&str> = decls.iter().map(|d| d.version.trim()).collect();
            let declared_by: Vec<String> = decls
                .iter()
                .map(|d| d.declared_by.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            let (version, superseded) = self.pick_version(module, &versions)?;
            if !superseded.is_empty() {
                debug!(
                    "{} resolved to {} (superseded: {})",
                    module,
                    version,
                    superseded.join(", ")
                );
            }

            dependencies.push(MergedDependency {
                module: module.to_string(),
                version,
                declared_by,
                superseded,
            });
        }

        Ok(MergedManifest { dependencies })
    }

    fn pick_version(
        &self,
        module: &str,
        versions: &BTreeSet<&str>,
    ) -> Result<(String, Vec<String>)> {
        let all: Vec<String> = versions.iter().map(|v| v.to_string()).collect();

        if let [only] = all.as_slice() {
            return Ok((only.clone(), Vec::new()));
        }

        match self.policy {
            ConflictPolicy::Fail => Err(Error::dependency_conflict(
                module,
                &all,
                "versions disagree and the conflict policy is 'fail'",
            )),
            ConflictPolicy::HighestWins => {
                let mut parsed = Vec::with_capacity(all.len());
                for raw in &all {
                    let version = ModuleVersion::parse(raw).ok_or_else(|| {
                        Error::dependency_conflict(
                            module,
                            &all,
                            format!("'{}' is not a semantic version and cannot be ordered", raw),
                        )
                    })?;
                    parsed.push(version);
                }
                parsed.sort();

                let winner = parsed
                    .pop()
                    .map(|v| v.raw().to_string())
                    .unwrap_or_default();
                let superseded = all.into_iter().filter(|v| *v != winner).collect();
                Ok((winner, superseded))
            }
        }
    }
}

#[derive(Serialize)]
struct ManifestDocument<'a> {
    dependencies: Vec<ManifestLine<'a>>,
}

#[derive(Serialize)]
struct ManifestLine<'a> {
    module: &'a str,
    version: &'a str,
}

/// Serialize the merged manifest; `header` is only used by line formats
pub fn serialize_manifest(
    manifest: &MergedManifest,
    format: ManifestFormat,
    header: Option<&str>,
) -> Result<Vec<u8>> {
    let document = ManifestDocument {
        dependencies: manifest
            .dependencies
            .iter()
            .map(|d| ManifestLine {
                module: &d.module,
                version: &d.version,
            })
            .collect(),
    };

    let text = match format {
        ManifestFormat::Json => {
            let mut json = serde_json::to_string_pretty(&document)?;
            json.push('\n');
            json
        }
        ManifestFormat::Yaml => serde_yaml_ng::to_string(&document)?,
        ManifestFormat::GoMod => {
            let mut out = String::new();
            if let Some(header) = header.map(str::trim_end).filter(|h| !h.is_empty()) {
                out.push_str(header);
                out.push('\n');
            }
            if !manifest.is_empty() {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str("require (\n");
                for dep in &manifest.dependencies {
                    out.push_str(&format!("\t{} {}\n", dep.module, dep.version));
                }
                out.push_str(")\n");
            }
            out
        }
    };

    Ok(text.into_bytes())
}
