//! Kiln CLI - Project scaffolding from declarative blueprints
//!
//! This is the main entry point for the kiln command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let globals = commands::Globals {
        config: cli.config,
        blueprint_dirs: cli.blueprints,
    };

    match cli.command {
        Commands::List(args) => commands::list::run(args, &globals),
        Commands::Show(args) => commands::show::run(args, &globals),
        Commands::Generate(args) => commands::generate::run(args, &globals).await,
        Commands::Validate(args) => commands::validate::run(args, &globals),
        Commands::Config(cmd) => commands::config::run(cmd, &globals),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            // Stage boundaries at info; -v for per-entry decisions
            0 => EnvFilter::new("warn,kiln_engine=info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
