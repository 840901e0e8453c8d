//! Blueprint show command

use anyhow::{Context, Result};
use kiln_core::types::{BlueprintManifest, DependencyDeclaration, ManifestFormat};
use tabled::{settings::Style, Table, Tabled};

use super::Globals;
use crate::cli::ShowArgs;
use crate::output;

#[derive(Tabled)]
struct VariableRow {
    name: String,
    kind: String,
    required: String,
    default: String,
    choices: String,
    description: String,
}

pub fn run(args: ShowArgs, globals: &Globals) -> Result<()> {
    let config = globals.engine_config()?;
    let catalog = globals.catalog(&config)?;
    let blueprint = catalog.get(&args.blueprint)?;
    let manifest = &blueprint.manifest;

    if args.json {
        let json = serde_json::to_string_pretty(manifest)
            .context("Failed to serialize blueprint to JSON")?;
        println!("{}", json);
        return Ok(());
    }

    output::section(&format!("Blueprint: {}", manifest.id));
    if let Some(version) = &manifest.version {
        output::field("Version", version);
    }
    if !manifest.description.is_empty() {
        output::field("Description", &manifest.description);
    }
    output::field("Source", &blueprint.origin);

    print_variables(manifest);
    print_files(manifest);
    print_dependencies(manifest);
    print_hooks(manifest);

    Ok(())
}

fn print_variables(manifest: &BlueprintManifest) {
    if manifest.variables.is_empty() {
        return;
    }
    output::section("Variables");
    let rows: Vec<VariableRow> = manifest
        .variables
        .iter()
        .map(|v| VariableRow {
            name: v.name.clone(),
            kind: v.kind.to_string(),
            required: if v.required { "yes" } else { "no" }.to_string(),
            default: v
                .default
                .as_ref()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            choices: if v.choices.is_empty() {
                "-".to_string()
            } else {
                v.choices
                    .iter()
                    .map(|c| format!("{:?}", c))
                    .collect::<Vec<_>>()
                    .join(", ")
            },
            description: v.description.clone(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);
}

fn print_files(manifest: &BlueprintManifest) {
    if manifest.files.is_empty() {
        return;
    }
    output::section("Files");
    for file in &manifest.files {
        let line = format!("{} -> {}", file.source, file.destination);
        match &file.condition {
            Some(condition) => output::field(&line, &format!("if {}", condition)),
            None => output::item(&line),
        }
        for dep in &file.dependencies {
            println!("      requires {}", describe_dependency(dep));
        }
    }
}

fn print_dependencies(manifest: &BlueprintManifest) {
    if manifest.dependencies.is_empty() && manifest.manifest.is_none() {
        return;
    }
    output::section("Dependencies");
    for dep in &manifest.dependencies {
        output::item(&describe_dependency(dep));
    }
    if let Some(target) = &manifest.manifest {
        let format = match target.format {
            ManifestFormat::Json => "json",
            ManifestFormat::Yaml => "yaml",
            ManifestFormat::GoMod => "go-mod",
        };
        output::field("Manifest", &format!("{} ({})", target.path, format));
    }
}

fn print_hooks(manifest: &BlueprintManifest) {
    if manifest.hooks.is_empty() {
        return;
    }
    output::section("Hooks");
    for hook in &manifest.hooks {
        let mut notes = Vec::new();
        if hook.required {
            notes.push("required".to_string());
        }
        if let Some(secs) = hook.timeout_secs {
            notes.push(format!("timeout {}s", secs));
        }
        if let Some(condition) = &hook.condition {
            notes.push(format!("if {}", condition));
        }
        let suffix = if notes.is_empty() {
            String::new()
        } else {
            format!(" [{}]", notes.join(", "))
        };
        output::field(&hook.name, &format!("{}{}", hook.command, suffix));
    }
}

fn describe_dependency(dep: &DependencyDeclaration) -> String {
    match &dep.condition {
        Some(condition) => format!("{} {} (if {})", dep.module, dep.version, condition),
        None => format!("{} {}", dep.module, dep.version),
    }
}
