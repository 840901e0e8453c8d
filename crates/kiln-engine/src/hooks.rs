//! Post-generation hook runner
//!
//! Hooks run one at a time in declared order inside the materialized
//! project. Each has its own timeout. A failed required hook stops the
//! sequence; an optional failure is recorded and the sequence continues.
//! Hooks never touch the rollback journal, so a failure leaves the
//! generated files in place.
//!
//! On unix each hook runs in its own process group, and a timeout or
//! cancellation kills the whole group rather than only the shell.

use crate::render::{normalize_destination, TemplateRenderer};
use camino::{Utf8Path, Utf8PathBuf};
use kiln_core::types::{HookOutcome, HookStatus, PostHook};
use kiln_core::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tera::Context;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const STDERR_TAIL_LINES: usize = 20;

/// A hook whose condition held, with command and working directory rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedHook {
    pub name: String,
    pub command: String,

    /// Relative to the output directory; empty for the root
    pub work_dir: Utf8PathBuf,
    pub required: bool,
    pub timeout_secs: u64,
    pub env: BTreeMap<String, String>,
}

impl PlannedHook {
    /// Render a declared hook against the configuration
    pub fn prepare(
        hook: &PostHook,
        renderer: &TemplateRenderer,
        context: &Context,
        default_timeout: Duration,
    ) -> Result<Self> {
        let label = format!("hook '{}'", hook.name);
        let command = renderer.render_text(&label, &hook.command, context)?;
        if command.trim().is_empty() {
            return Err(Error::hook(&hook.name, "command renders to an empty string"));
        }

        let work_dir = match hook.work_dir.as_deref().map(str::trim) {
            None | Some("") | Some(".") | Some("./") => Utf8PathBuf::new(),
            Some(template) => {
                let rendered = renderer.render_text(&label, template, context)?;
                normalize_destination(&rendered)
                    .map_err(|msg| Error::hook(&hook.name, format!("work_dir: {}", msg)))?
            }
        };

        Ok(Self {
            name: hook.name.clone(),
            command,
            work_dir,
            required: hook.required,
            timeout_secs: hook.timeout_secs.unwrap_or(default_timeout.as_secs()),
            env: hook.env.clone(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Executes planned hooks through the platform shell
#[derive(Debug, Clone, Default)]
pub struct HookRunner;

impl HookRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run every hook in order and report one outcome per hook
    pub async fn run_all(
        &self,
        hooks: &[PlannedHook],
        output_dir: &Utf8Path,
        cancel: &CancellationToken,
    ) -> Vec<HookOutcome> {
        let mut outcomes = Vec::with_capacity(hooks.len());
        let mut abort_reason: Option<String> = None;

        for hook in hooks {
            if let Some(reason) = &abort_reason {
                outcomes.push(HookOutcome::skipped(&hook.name, hook.required, reason));
                continue;
            }
            if cancel.is_cancelled() {
                abort_reason = Some("generation cancelled".to_string());
                outcomes.push(HookOutcome::skipped(
                    &hook.name,
                    hook.required,
                    "generation cancelled",
                ));
                continue;
            }

            let outcome = self.run(hook, output_dir, cancel).await;
            if outcome.is_failure() {
                if hook.required {
                    warn!("Required hook '{}' failed, skipping remaining hooks", hook.name);
                    abort_reason =
                        Some(format!("aborted after required hook '{}' failed", hook.name));
                } else {
                    warn!("Hook '{}' failed, continuing", hook.name);
                }
            }
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Run a single hook
    pub async fn run(
        &self,
        hook: &PlannedHook,
        output_dir: &Utf8Path,
        cancel: &CancellationToken,
    ) -> HookOutcome {
        info!("Running hook '{}': {}", hook.name, hook.command);
        let started = Instant::now();
        let status = self.execute(hook, output_dir, cancel).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &status {
            HookStatus::Succeeded => debug!("Hook '{}' succeeded in {}ms", hook.name, duration_ms),
            HookStatus::Failed { exit_code, .. } => {
                debug!("Hook '{}' failed with exit code {:?}", hook.name, exit_code)
            }
            HookStatus::TimedOut { timeout_secs } => {
                debug!("Hook '{}' timed out after {}s", hook.name, timeout_secs)
            }
            HookStatus::Skipped { .. } => {}
        }

        HookOutcome {
            name: hook.name.clone(),
            required: hook.required,
            status,
            duration_ms,
        }
    }

    async fn execute(
        &self,
        hook: &PlannedHook,
        output_dir: &Utf8Path,
        cancel: &CancellationToken,
    ) -> HookStatus {
        let mut cmd = shell_command(&hook.command);
        cmd.current_dir(output_dir.join(&hook.work_dir))
            .envs(&hook.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return HookStatus::Failed {
                    exit_code: None,
                    stderr: format!("failed to start: {}", e),
                }
            }
        };

        let pid = child.id();

        // Dropping the wait future kills the shell
        let waited = tokio::select! {
            res = tokio::time::timeout(hook.timeout(), child.wait_with_output()) => res,
            _ = cancel.cancelled() => {
                kill_group(pid);
                return HookStatus::Failed {
                    exit_code: None,
                    stderr: "interrupted by cancellation".to_string(),
                };
            }
        };

        match waited {
            Err(_) => {
                kill_group(pid);
                HookStatus::TimedOut {
                    timeout_secs: hook.timeout_secs,
                }
            }
            Ok(Err(e)) => HookStatus::Failed {
                exit_code: None,
                stderr: format!("failed to wait for process: {}", e),
            },
            Ok(Ok(output)) => {
                for line in String::from_utf8_lossy(&output.stdout).lines() {
                    debug!("{}: {}", hook.name, line);
                }
                if output.status.success() {
                    HookStatus::Succeeded
                } else {
                    HookStatus::Failed {
                        exit_code: output.status.code(),
                        stderr: tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_LINES),
                    }
                }
            }
        }
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// SIGKILL every process left in a hook's group
#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        debug!("Process group {} already gone: {}", pid, e);
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

/// Last `lines` lines of `text`
fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::types::{ResolvedConfig, Value, VariableKind};

    fn context() -> Context {
        let declared = BTreeMap::from([("Name".to_string(), VariableKind::String)]);
        let values = BTreeMap::from([("Name".to_string(), Value::String("svc".into()))]);
        TemplateRenderer::context(&ResolvedConfig::new("bp", declared, values))
    }

    fn post_hook(command: &str, work_dir: Option<&str>) -> PostHook {
        PostHook {
            name: "h".into(),
            command: command.into(),
            work_dir: work_dir.map(str::to_string),
            condition: None,
            required: false,
            timeout_secs: None,
            env: BTreeMap::new(),
        }
    }

    #[test]
    fn test_prepare_renders_command_and_work_dir() {
        let renderer = TemplateRenderer::new();
        let planned = PlannedHook::prepare(
            &post_hook("echo {{ .Name }}", Some("cmd/{{ Name }}")),
            &renderer,
            &context(),
            Duration::from_secs(42),
        )
        .unwrap();
        assert_eq!(planned.command, "echo svc");
        assert_eq!(planned.work_dir, "cmd/svc");
        assert_eq!(planned.timeout_secs, 42);
    }

    #[test]
    fn test_work_dir_must_stay_inside() {
        let renderer = TemplateRenderer::new();
        let err = PlannedHook::prepare(
            &post_hook("ls", Some("../..")),
            &renderer,
            &context(),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Hook { .. }));
    }

    #[test]
    fn test_default_work_dir_is_root() {
        let renderer = TemplateRenderer::new();
        let planned =
            PlannedHook::prepare(&post_hook("ls", Some(".")), &renderer, &context(), Duration::ZERO)
                .unwrap();
        assert_eq!(planned.work_dir, "");
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail("only", 5), "only");
        assert_eq!(tail("", 5), "");
    }
}
