//! Blueprint manifest structure (blueprint.yaml)

use super::value::RawValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Complete blueprint definition as loaded from `blueprint.yaml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlueprintManifest {
    /// Catalog identifier (e.g. "go-service")
    pub id: String,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub variables: Vec<VariableDefinition>,

    /// Ordered file entries
    #[serde(default)]
    pub files: Vec<FileEntry>,

    /// Blueprint-level dependency declarations
    #[serde(default)]
    pub dependencies: Vec<DependencyDeclaration>,

    /// Ordered post-generation hooks
    #[serde(default)]
    pub hooks: Vec<PostHook>,

    /// Where and how the merged dependency manifest is written
    #[serde(default)]
    pub manifest: Option<ManifestOutput>,
}

impl BlueprintManifest {
    /// Parse a manifest from YAML
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Look up a variable definition by name
    pub fn variable(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables.iter().find(|v| v.name == name)
    }
}

/// Kind of a blueprint variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    String,
    Bool,
    Int,
    Enum,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VariableKind::String => "string",
            VariableKind::Bool => "bool",
            VariableKind::Int => "int",
            VariableKind::Enum => "enum",
        };
        f.write_str(label)
    }
}

/// Declared blueprint variable
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableDefinition {
    pub name: String,

    #[serde(default = "default_kind")]
    pub kind: VariableKind,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub default: Option<RawValue>,

    /// Allowed values for enum variables
    #[serde(default)]
    pub choices: Vec<String>,

    #[serde(default)]
    pub description: String,
}

fn default_kind() -> VariableKind {
    VariableKind::String
}

/// A template file to render into the output tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileEntry {
    /// Template path relative to the blueprint's templates directory
    pub source: String,

    /// Destination path relative to the output root; rendered as a template
    pub destination: String,

    #[serde(default)]
    pub condition: Option<String>,

    /// Dependencies contributed only when this file is included
    #[serde(default)]
    pub dependencies: Vec<DependencyDeclaration>,
}

/// A module dependency contributed to the merged manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyDeclaration {
    pub module: String,
    pub version: String,

    #[serde(default)]
    pub condition: Option<String>,
}

/// Command run inside the materialized project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostHook {
    pub name: String,

    /// Shell command; rendered as a template
    pub command: String,

    /// Working directory relative to the output root; rendered as a template
    #[serde(default)]
    pub work_dir: Option<String>,

    #[serde(default)]
    pub condition: Option<String>,

    /// Failure of a required hook fails the whole generation
    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Serialization format of the merged manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestFormat {
    #[default]
    Json,
    Yaml,
    GoMod,
}

/// Output location of the merged manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestOutput {
    pub path: String,

    #[serde(default)]
    pub format: ManifestFormat,

    /// Leading text for line-oriented formats; rendered as a template
    #[serde(default)]
    pub header: Option<String>,
}
