//! Config command

use anyhow::{Context, Result};

use super::Globals;
use crate::cli::{ConfigCommands, ConfigShowArgs};
use crate::output;

pub fn run(cmd: ConfigCommands, globals: &Globals) -> Result<()> {
    match cmd {
        ConfigCommands::Show(args) => show(args, globals),
    }
}

fn show(args: ConfigShowArgs, globals: &Globals) -> Result<()> {
    let config = globals.engine_config()?;

    if args.json {
        let json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize configuration to JSON")?;
        println!("{}", json);
        return Ok(());
    }

    output::section("Engine configuration");
    let workers = if config.render_workers == 0 {
        format!("auto ({})", config.effective_workers())
    } else {
        config.render_workers.to_string()
    };
    output::field("render-workers", &workers);
    output::field("hook-timeout-secs", &config.hook_timeout_secs.to_string());
    output::field("conflict-policy", &config.conflict_policy.to_string());
    output::field("include-embedded", &config.include_embedded.to_string());
    output::field("manifest-path", &config.manifest_path);
    if config.blueprint_dirs.is_empty() {
        output::field("blueprint-dirs", "(none)");
    } else {
        output::field("blueprint-dirs", "");
        for dir in &config.blueprint_dirs {
            output::item(dir.as_str());
        }
    }

    Ok(())
}
