//! Terminal reporting for kiln commands
//!
//! Results and listings go to stdout; problems go to stderr so `--json`
//! output stays machine readable.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use kiln_core::types::{HookOutcome, HookStatus, MergedDependency};
use std::time::Duration;

const FIELD_WIDTH: usize = 18;

pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

pub fn warning(msg: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), msg);
}

pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Secondary line, such as a count or a reminder
pub fn note(msg: &str) {
    println!("{}", style(msg).dim());
}

pub fn section(title: &str) {
    println!("\n{}", style(title).bold().underlined());
}

/// Aligned `key  value` line inside a section
pub fn field(key: &str, value: &str) {
    println!("  {:<width$} {}", style(key).dim(), value, width = FIELD_WIDTH);
}

/// Indented entry of a plain list (paths, declarations)
pub fn item(text: &str) {
    println!("  {}", text);
}

/// Merged dependency, with the versions it replaced
pub fn dependency(dep: &MergedDependency) {
    if dep.superseded.is_empty() {
        field(&dep.module, &dep.version);
    } else {
        let replaced = format!("(over {})", dep.superseded.join(", "));
        field(&dep.module, &format!("{} {}", dep.version, style(replaced).yellow()));
    }
}

/// One hook outcome, coloured by status
pub fn hook(outcome: &HookOutcome) {
    let status = match &outcome.status {
        HookStatus::Succeeded => style(format!("ok ({}ms)", outcome.duration_ms)).green(),
        HookStatus::Failed {
            exit_code: Some(code),
            ..
        } => style(format!("failed (exit code {})", code)).red(),
        HookStatus::Failed { .. } => style("failed".to_string()).red(),
        HookStatus::TimedOut { timeout_secs } => {
            style(format!("timed out after {}s", timeout_secs)).red()
        }
        HookStatus::Skipped { reason } => style(format!("skipped: {}", reason)).dim(),
    };
    let name = if outcome.required {
        format!("{} (required)", outcome.name)
    } else {
        outcome.name.clone()
    };
    field(&name, &status.to_string());
}

/// Spinner shown while a generation runs
pub fn progress(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .expect("progress template is valid")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}
