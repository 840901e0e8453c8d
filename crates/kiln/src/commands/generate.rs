//! Generate command

use anyhow::{anyhow, bail, Context, Result};
use camino::Utf8Path;
use kiln_core::types::{ConflictPolicy, GenerationOutcome, GenerationResult, RawValue, WriteMode};
use kiln_engine::{Engine, GenerationRequest, Overrides};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Globals;
use crate::cli::GenerateArgs;
use crate::output;

pub async fn run(args: GenerateArgs, globals: &Globals) -> Result<()> {
    let config = globals.engine_config()?;
    let catalog = globals.catalog(&config)?;
    let engine = Engine::new(Arc::new(catalog), config);

    let request = build_request(&args)?;
    debug!(
        "Generating '{}' into {} with {} override(s)",
        request.blueprint,
        request.output_dir,
        request.overrides.len()
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let spinner = (!args.json).then(|| {
        output::progress(&format!(
            "{} {}...",
            if args.dry_run { "Planning" } else { "Generating" },
            args.blueprint
        ))
    });
    let result = engine.generate(request, cancel).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize generation result to JSON")?;
        println!("{}", json);
    } else {
        print_result(&result);
    }

    if !result.success {
        bail!("generation of '{}' failed", result.blueprint);
    }
    Ok(())
}

fn build_request(args: &GenerateArgs) -> Result<GenerationRequest> {
    let mut overrides = match &args.values {
        Some(path) => read_values(path)?,
        None => Overrides::new(),
    };
    for (key, value) in &args.set {
        overrides.insert(key.clone(), RawValue::String(value.clone()));
    }

    let write_mode = if args.overwrite {
        WriteMode::Overwrite
    } else if args.merge {
        WriteMode::Merge
    } else {
        WriteMode::Create
    };

    let mut request = GenerationRequest::new(&args.blueprint, args.output.clone())
        .with_overrides(overrides)
        .dry_run(args.dry_run)
        .skip_hooks(args.skip_hooks)
        .write_mode(write_mode);
    if args.strict_versions {
        request = request.conflict_policy(ConflictPolicy::Fail);
    }
    Ok(request)
}

/// Read a values file; YAML is a superset of JSON so both parse
fn read_values(path: &Utf8Path) -> Result<Overrides> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read values file {}", path))?;
    if content.trim().is_empty() {
        return Ok(Overrides::new());
    }
    serde_yaml_ng::from_str(&content).map_err(|e| {
        anyhow!(
            "Values file {} must map variable names to strings, booleans or integers: {}",
            path,
            e
        )
    })
}

fn print_result(result: &GenerationResult) {
    match result.outcome {
        GenerationOutcome::Planned => {
            output::section(&format!("Plan for {}", result.blueprint));
        }
        GenerationOutcome::Generated | GenerationOutcome::GeneratedWithHookFailures => {
            output::success(&format!(
                "Generated {} into {}",
                result.blueprint, result.output_dir
            ));
        }
        GenerationOutcome::NotGenerated => {}
    }

    if !result.files_written.is_empty() {
        output::section(if result.dry_run {
            "Files (not written)"
        } else {
            "Files"
        });
        for path in &result.files_written {
            output::item(path.as_str());
        }
    }

    if let Some(manifest) = result.merged_manifest.as_ref().filter(|m| !m.is_empty()) {
        output::section("Dependencies");
        for dep in &manifest.dependencies {
            output::dependency(dep);
        }
    }

    if !result.hook_outcomes.is_empty() {
        output::section("Hooks");
        for hook in &result.hook_outcomes {
            output::hook(hook);
        }
    }

    for warning in &result.warnings {
        output::warning(warning);
    }
    for error in &result.errors {
        output::error(&error.message);
    }
    if result.outcome == GenerationOutcome::NotGenerated {
        output::note("Nothing was written");
    }
}
