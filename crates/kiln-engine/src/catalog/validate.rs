//! Structural validation of blueprint manifests at load time

use crate::condition::Condition;
use crate::resolver::coerce;
use kiln_core::types::{BlueprintManifest, VariableKind};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]*$").expect("id regex is valid"));

static VARIABLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("variable regex is valid"));

/// Collect every structural problem of a manifest; empty when valid
pub fn validate_manifest(manifest: &BlueprintManifest) -> Vec<String> {
    let mut problems = Vec::new();

    if !ID_PATTERN.is_match(&manifest.id) {
        problems.push(format!(
            "identifier '{}' must match {}",
            manifest.id,
            ID_PATTERN.as_str()
        ));
    }

    if let Some(version) = &manifest.version {
        if kiln_core::ModuleVersion::parse(version).is_none() {
            problems.push(format!("version '{}' is not a semantic version", version));
        }
    }

    validate_variables(manifest, &mut problems);

    let kind_of = |name: &str| manifest.variable(name).map(|v| v.kind);
    let mut check_condition = |owner: String, condition: &Option<String>| {
        let Some(source) = condition.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return;
        };
        if let Err(e) = Condition::parse(source).and_then(|c| c.check(kind_of)) {
            problems.push(format!("{}: {}", owner, e));
        }
    };

    for (index, file) in manifest.files.iter().enumerate() {
        check_condition(format!("files[{}] ({})", index, file.source), &file.condition);
        for dep in &file.dependencies {
            check_condition(
                format!("files[{}] dependency {}", index, dep.module),
                &dep.condition,
            );
        }
    }
    for dep in &manifest.dependencies {
        check_condition(format!("dependency {}", dep.module), &dep.condition);
    }
    for hook in &manifest.hooks {
        check_condition(format!("hook '{}'", hook.name), &hook.condition);
    }

    for (index, file) in manifest.files.iter().enumerate() {
        if let Err(msg) = super::source::check_template_source(&file.source) {
            problems.push(format!("files[{}]: {}", index, msg));
        }
        if file.destination.trim().is_empty() {
            problems.push(format!("files[{}] ({}): destination is empty", index, file.source));
        }
    }

    for dep in manifest
        .dependencies
        .iter()
        .chain(manifest.files.iter().flat_map(|f| f.dependencies.iter()))
    {
        if dep.module.trim().is_empty() {
            problems.push("dependency with an empty module".to_string());
        }
        if dep.version.trim().is_empty() {
            problems.push(format!("dependency {} has an empty version", dep.module));
        }
    }

    let mut hook_names = HashSet::new();
    for hook in &manifest.hooks {
        if !hook_names.insert(hook.name.as_str()) {
            problems.push(format!("hook '{}' is declared more than once", hook.name));
        }
        if hook.command.trim().is_empty() {
            problems.push(format!("hook '{}' has an empty command", hook.name));
        }
        if hook.timeout_secs == Some(0) {
            problems.push(format!("hook '{}' has a zero timeout", hook.name));
        }
    }

    if let Some(output) = &manifest.manifest {
        if output.path.trim().is_empty() {
            problems.push("manifest path is empty".to_string());
        }
    }

    problems
}

fn validate_variables(manifest: &BlueprintManifest, problems: &mut Vec<String>) {
    let mut seen = HashSet::new();

    for var in &manifest.variables {
        if !VARIABLE_PATTERN.is_match(&var.name) {
            problems.push(format!(
                "variable name '{}' must match {}",
                var.name,
                VARIABLE_PATTERN.as_str()
            ));
        }
        if !seen.insert(var.name.as_str()) {
            problems.push(format!("variable '{}' is declared more than once", var.name));
        }

        match var.kind {
            VariableKind::Enum if var.choices.is_empty() => {
                problems.push(format!("enum variable '{}' declares no choices", var.name));
            }
            VariableKind::Enum => {}
            _ if !var.choices.is_empty() => {
                problems.push(format!(
                    "variable '{}' of kind {} must not declare choices",
                    var.name, var.kind
                ));
            }
            _ => {}
        }

        if let Some(default) = &var.default {
            if let Err(msg) = coerce(var, default) {
                problems.push(format!("default of '{}': {}", var.name, msg));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problems(yaml: &str) -> Vec<String> {
        validate_manifest(&BlueprintManifest::from_yaml(yaml).unwrap())
    }

    #[test]
    fn test_valid_manifest() {
        let found = problems(
            r#"
id: go-service
version: "1.0.0"
variables:
  - name: Name
    required: true
  - name: Driver
    kind: enum
    choices: ["", "postgres"]
    default: ""
  - name: Metrics
    kind: bool
    default: "yes"
files:
  - source: main.go.tmpl
    destination: main.go
  - source: db.go.tmpl
    destination: db.go
    condition: 'Driver != ""'
hooks:
  - name: tidy
    command: go mod tidy
    condition: Metrics
"#,
        );
        assert!(found.is_empty(), "unexpected problems: {:?}", found);
    }

    #[test]
    fn test_problems_are_aggregated() {
        let found = problems(
            r#"
id: Bad_Id
variables:
  - name: 9lives
  - name: Driver
    kind: enum
  - name: Port
    kind: int
    default: eighty
  - name: Port
    kind: int
  - name: Name
    choices: [a]
files:
  - source: ../escape.tmpl
    destination: x
    condition: "Missing == 1"
hooks:
  - name: tidy
    command: " "
  - name: tidy
    command: go vet
"#,
        );
        let joined = found.join("\n");
        assert!(joined.contains("Bad_Id"));
        assert!(joined.contains("9lives"));
        assert!(joined.contains("declares no choices"));
        assert!(joined.contains("default of 'Port'"));
        assert!(joined.contains("'Port' is declared more than once"));
        assert!(joined.contains("must not declare choices"));
        assert!(joined.contains("'..' segments"));
        assert!(joined.contains("Missing"));
        assert!(joined.contains("empty command"));
        assert!(joined.contains("hook 'tidy' is declared more than once"));
    }

    #[test]
    fn test_default_must_be_a_choice() {
        let found = problems(
            r#"
id: demo
variables:
  - name: Driver
    kind: enum
    choices: [postgres, mysql]
    default: sqlite
"#,
        );
        assert_eq!(found.len(), 1);
        assert!(found[0].contains("sqlite"));
    }
}
