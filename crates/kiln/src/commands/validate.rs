//! Validate command

use anyhow::{bail, Result};
use kiln_engine::{configured_sources, Catalog};
use std::collections::BTreeMap;

use super::Globals;
use crate::cli::ValidateArgs;
use crate::output;

/// Validate every blueprint of every source, reporting each one separately
pub fn run(args: ValidateArgs, globals: &Globals) -> Result<()> {
    let config = globals.engine_config()?;
    let sources = configured_sources(&config);

    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    let mut checked = 0usize;
    let mut failed = 0usize;

    for source in &sources {
        let origin = source.name();
        let ids = match source.list() {
            Ok(ids) => ids,
            Err(e) => {
                output::error(&e.to_string());
                failed += 1;
                continue;
            }
        };

        for id in ids {
            if args.blueprint.as_deref().is_some_and(|wanted| wanted != id) {
                continue;
            }
            checked += 1;

            if let Some(first) = seen.get(&id) {
                output::error(&format!(
                    "{}: duplicate identifier, already provided by {}",
                    id, first
                ));
                failed += 1;
                continue;
            }
            seen.insert(id.clone(), origin.clone());

            match Catalog::load_blueprint(source.as_ref(), &id) {
                Ok(_) => output::success(&format!("{} ({})", id, origin)),
                Err(e) => {
                    output::error(&e.to_string());
                    failed += 1;
                }
            }
        }
    }

    if let Some(wanted) = &args.blueprint {
        if checked == 0 {
            bail!("Blueprint not found: {}", wanted);
        }
    }
    if failed > 0 {
        bail!("{} of {} blueprint(s) failed validation", failed, checked);
    }
    output::note(&format!("{} blueprint(s) valid", checked));
    Ok(())
}
