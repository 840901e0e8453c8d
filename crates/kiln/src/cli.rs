//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Kiln - Project scaffolding from declarative blueprints
#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress log output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Engine config file (default: ~/.kiln/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Additional blueprint directory (repeatable)
    #[arg(short, long = "blueprints", global = true)]
    pub blueprints: Vec<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available blueprints
    List(ListArgs),

    /// Show a blueprint's variables, files, dependencies and hooks
    Show(ShowArgs),

    /// Generate a project from a blueprint
    Generate(GenerateArgs),

    /// Validate blueprint manifests
    Validate(ValidateArgs),

    /// Engine configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Blueprint identifier
    pub blueprint: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Blueprint identifier
    pub blueprint: String,

    /// Output directory
    #[arg(short, long)]
    pub output: Utf8PathBuf,

    /// Set a variable (repeatable): --set Name=api
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub set: Vec<(String, String)>,

    /// YAML or JSON file of variable values; --set wins on conflicts
    #[arg(long, value_name = "FILE")]
    pub values: Option<Utf8PathBuf>,

    /// Compute the plan without writing files or running hooks
    #[arg(long)]
    pub dry_run: bool,

    /// Do not run post-generation hooks
    #[arg(long)]
    pub skip_hooks: bool,

    /// Replace existing files in the output directory
    #[arg(long, conflicts_with = "merge")]
    pub overwrite: bool,

    /// Keep existing files, write only new ones
    #[arg(long)]
    pub merge: bool,

    /// Fail when dependency versions disagree instead of taking the highest
    #[arg(long)]
    pub strict_versions: bool,

    /// Output the generation result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Validate a single blueprint
    pub blueprint: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective engine configuration
    Show(ConfigShowArgs),
}

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parse a KEY=VALUE pair
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("Name=api").unwrap(),
            ("Name".to_string(), "api".to_string())
        );
        assert_eq!(
            parse_key_val("Header=a=b").unwrap(),
            ("Header".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_key_val("Empty=").unwrap(),
            ("Empty".to_string(), String::new())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_generate_flags() {
        let cli = Cli::try_parse_from([
            "kiln",
            "-b",
            "/tmp/bp",
            "generate",
            "go-service",
            "-o",
            "out",
            "--set",
            "Name=api",
            "--set",
            "Port=9000",
            "--merge",
            "--strict-versions",
        ])
        .unwrap();

        assert_eq!(cli.blueprints, vec![Utf8PathBuf::from("/tmp/bp")]);
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.set.len(), 2);
        assert!(args.merge && args.strict_versions && !args.overwrite);
    }

    #[test]
    fn test_overwrite_conflicts_with_merge() {
        let result = Cli::try_parse_from([
            "kiln",
            "generate",
            "go-service",
            "-o",
            "out",
            "--overwrite",
            "--merge",
        ]);
        assert!(result.is_err());
    }
}
