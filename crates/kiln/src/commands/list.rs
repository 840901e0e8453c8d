//! Blueprint list command

use anyhow::{Context, Result};
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Modify, Style, Width},
    Table, Tabled,
};

use super::Globals;
use crate::cli::ListArgs;
use crate::output;

#[derive(Tabled, Serialize)]
struct BlueprintRow {
    id: String,
    version: String,
    variables: usize,
    files: usize,
    description: String,
}

pub fn run(args: ListArgs, globals: &Globals) -> Result<()> {
    let config = globals.engine_config()?;
    let catalog = globals.catalog(&config)?;

    let rows: Vec<BlueprintRow> = catalog
        .blueprints()
        .map(|bp| BlueprintRow {
            id: bp.id().to_string(),
            version: bp
                .manifest
                .version
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            variables: bp.manifest.variables.len(),
            files: bp.manifest.files.len(),
            description: bp.manifest.description.clone(),
        })
        .collect();

    if args.json {
        let json =
            serde_json::to_string_pretty(&rows).context("Failed to serialize blueprints to JSON")?;
        println!("{}", json);
        return Ok(());
    }

    if rows.is_empty() {
        output::note("No blueprints found");
        return Ok(());
    }

    let count = rows.len();
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    table.with(Modify::new(Columns::new(4..5)).with(Width::wrap(60).keep_words(true)));
    println!("{}", table);
    output::note(&format!("{} blueprint(s)", count));

    Ok(())
}
