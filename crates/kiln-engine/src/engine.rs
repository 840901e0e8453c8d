//! Generation pipeline
//!
//! Resolve → Evaluate → Render → Merge → Materialize → Hooks. Stages run one
//! after another; evaluate and render fan out over the worker pool. Nothing
//! touches the output directory before every earlier stage has succeeded.

use crate::catalog::{Blueprint, Catalog};
use crate::condition::ConditionEvaluator;
use crate::hooks::{HookRunner, PlannedHook};
use crate::materializer::{Filesystem, LocalFilesystem, Materializer};
use crate::merger::{serialize_manifest, DependencyMerger, IncludedDependency};
use crate::pool::fan_out;
use crate::render::{ensure_unique_destinations, TemplateRenderer};
use crate::resolver::{resolve, Overrides};
use camino::Utf8PathBuf;
use kiln_core::types::{
    BlueprintManifest, ConflictPolicy, ErrorReport, FileEntry, GenerationOutcome,
    GenerationResult, HookOutcome, ManifestFormat, MergedManifest, RawValue, RenderedFile,
    ResolvedConfig, WriteMode,
};
use kiln_core::{EngineConfig, Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tera::Context;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Per-invocation flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Compute the full plan without touching disk or running hooks
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub skip_hooks: bool,

    #[serde(default)]
    pub write_mode: WriteMode,

    /// Overrides the engine's configured policy
    #[serde(default)]
    pub conflict_policy: Option<ConflictPolicy>,
}

/// Input of one generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub blueprint: String,

    #[serde(default)]
    pub overrides: Overrides,

    pub output_dir: Utf8PathBuf,

    #[serde(default)]
    pub options: GenerationOptions,
}

impl GenerationRequest {
    pub fn new(blueprint: impl Into<String>, output_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            blueprint: blueprint.into(),
            overrides: Overrides::new(),
            output_dir: output_dir.into(),
            options: GenerationOptions::default(),
        }
    }

    pub fn with_override(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides.extend(overrides);
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.options.dry_run = dry_run;
        self
    }

    pub fn skip_hooks(mut self, skip_hooks: bool) -> Self {
        self.options.skip_hooks = skip_hooks;
        self
    }

    pub fn write_mode(mut self, mode: WriteMode) -> Self {
        self.options.write_mode = mode;
        self
    }

    pub fn conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.options.conflict_policy = Some(policy);
        self
    }
}

/// A file entry whose condition held
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncludedFile {
    /// Position in the manifest's file list
    pub index: usize,
    pub entry: FileEntry,
}

impl IncludedFile {
    pub fn label(&self) -> String {
        file_label(self.index, &self.entry)
    }
}

fn file_label(index: usize, entry: &FileEntry) -> String {
    format!("files[{}] ({})", index, entry.source)
}

/// Entries, dependencies and hooks selected by their conditions
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationPlan {
    pub files: Vec<IncludedFile>,
    pub dependencies: Vec<IncludedDependency>,
    pub hooks: Vec<PlannedHook>,
}

/// Everything computed before the first disk write
#[derive(Debug, Clone)]
pub struct PreparedGeneration {
    pub config: Arc<ResolvedConfig>,
    pub plan: GenerationPlan,

    /// Rendered files including the serialized manifest, sorted by path
    pub files: Vec<RenderedFile>,
    pub merged_manifest: MergedManifest,

    /// Destination of the serialized manifest, when one is written
    pub manifest_path: Option<Utf8PathBuf>,
}

/// Something carrying an inclusion condition
#[derive(Debug, Clone, Copy)]
enum Subject {
    File(usize),
    FileDependency(usize, usize),
    Dependency(usize),
    Hook(usize),
}

impl Subject {
    fn condition(self, manifest: &BlueprintManifest) -> Option<&str> {
        match self {
            Subject::File(i) => manifest.files[i].condition.as_deref(),
            Subject::FileDependency(f, d) => {
                manifest.files[f].dependencies[d].condition.as_deref()
            }
            Subject::Dependency(d) => manifest.dependencies[d].condition.as_deref(),
            Subject::Hook(h) => manifest.hooks[h].condition.as_deref(),
        }
    }
}

/// Where and how the merged manifest is written
struct ManifestTarget {
    path: Utf8PathBuf,
    format: ManifestFormat,
    header: Option<String>,
}

/// Blueprint generation engine.
///
/// Holds no per-invocation state; one engine can serve concurrent
/// generations.
#[derive(Clone)]
pub struct Engine {
    catalog: Arc<Catalog>,
    config: EngineConfig,
    renderer: Arc<TemplateRenderer>,
    fs: Arc<dyn Filesystem>,
    hooks: HookRunner,
}

impl Engine {
    pub fn new(catalog: Arc<Catalog>, config: EngineConfig) -> Self {
        Self {
            catalog,
            config,
            renderer: Arc::new(TemplateRenderer::new()),
            fs: Arc::new(LocalFilesystem),
            hooks: HookRunner::new(),
        }
    }

    /// Replace the filesystem the materializer writes through
    pub fn with_filesystem(mut self, fs: Arc<dyn Filesystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve, evaluate, render and merge without touching disk
    pub async fn plan(&self, request: &GenerationRequest) -> Result<PreparedGeneration> {
        self.prepare(request, &CancellationToken::new()).await
    }

    /// Run one generation to completion.
    ///
    /// Never returns an error; failures are classified in the result.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> GenerationResult {
        let span = info_span!("generate", blueprint = %request.blueprint);
        self.run(request, cancel).instrument(span).await
    }

    async fn run(&self, request: GenerationRequest, cancel: CancellationToken) -> GenerationResult {
        let options = &request.options;

        let prepared = match self.prepare(&request, &cancel).await {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!("Generation failed before materialization: {}", e);
                return GenerationResult::not_generated(
                    &request.blueprint,
                    request.output_dir.clone(),
                    options.dry_run,
                    &e,
                );
            }
        };

        let mut warnings: Vec<String> = prepared
            .merged_manifest
            .dependencies
            .iter()
            .filter(|d| !d.superseded.is_empty())
            .map(|d| {
                format!(
                    "{} resolved to {} (superseded: {})",
                    d.module,
                    d.version,
                    d.superseded.join(", ")
                )
            })
            .collect();

        if options.dry_run {
            info!(
                "Dry run: {} file(s) planned for {}",
                prepared.files.len(),
                request.output_dir
            );
            return GenerationResult {
                blueprint: request.blueprint.clone(),
                output_dir: request.output_dir.clone(),
                dry_run: true,
                outcome: GenerationOutcome::Planned,
                success: true,
                files_written: prepared.files.iter().map(|f| f.path.clone()).collect(),
                merged_manifest: Some(prepared.merged_manifest),
                hook_outcomes: skip_all(&prepared.plan.hooks, "dry run"),
                errors: Vec::new(),
                warnings,
            };
        }

        let report = match self.materialize(&request, prepared.files, &cancel).await {
            Ok(report) => report,
            Err(e) => {
                let mut result = GenerationResult::not_generated(
                    &request.blueprint,
                    request.output_dir.clone(),
                    false,
                    &e,
                );
                result.warnings = warnings;
                return result;
            }
        };
        warnings.extend(
            report
                .kept
                .iter()
                .map(|path| format!("kept existing {} (merge mode)", path)),
        );

        let mut errors = Vec::new();
        let hook_outcomes = if options.skip_hooks {
            skip_all(&prepared.plan.hooks, "skip_hooks")
        } else {
            self.hooks
                .run_all(&prepared.plan.hooks, &request.output_dir, &cancel)
                .await
        };

        for outcome in hook_outcomes.iter().filter(|o| o.is_failure()) {
            let error = Error::hook(&outcome.name, describe_failure(outcome));
            if outcome.required {
                errors.push(ErrorReport::from(&error));
            } else {
                warnings.push(error.to_string());
            }
        }
        if cancel.is_cancelled() {
            errors.push(ErrorReport::from(&Error::cancelled("hooks")));
        }

        let outcome = if hook_outcomes.iter().any(HookOutcome::is_failure) {
            GenerationOutcome::GeneratedWithHookFailures
        } else {
            GenerationOutcome::Generated
        };

        info!(
            "Generated {} file(s) into {} ({:?})",
            report.written.len(),
            request.output_dir,
            outcome
        );

        GenerationResult {
            blueprint: request.blueprint.clone(),
            output_dir: request.output_dir.clone(),
            dry_run: false,
            outcome,
            success: errors.is_empty(),
            files_written: report.written,
            merged_manifest: Some(prepared.merged_manifest),
            hook_outcomes,
            errors,
            warnings,
        }
    }

    async fn materialize(
        &self,
        request: &GenerationRequest,
        files: Vec<RenderedFile>,
        cancel: &CancellationToken,
    ) -> Result<crate::materializer::MaterializeReport> {
        let materializer = Materializer::new(Arc::clone(&self.fs));
        let output_dir = request.output_dir.clone();
        let mode = request.options.write_mode;
        let cancel = cancel.clone();

        tokio::task::spawn_blocking(move || {
            materializer.materialize(&output_dir, &files, mode, &cancel)
        })
        .await
        .map_err(|e| Error::materialize(request.output_dir.as_str(), e.to_string()))?
    }

    async fn prepare(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<PreparedGeneration> {
        let blueprint = self.catalog.get(&request.blueprint)?;
        let workers = self.config.effective_workers();

        let config = resolve(&blueprint.manifest, &request.overrides)?;
        info!("Resolved {} variable(s)", config.len());

        let plan_selection = evaluate(&blueprint, &config, workers, cancel).await?;
        let context = Arc::new(TemplateRenderer::context(&config));

        let hooks = plan_selection
            .hooks
            .iter()
            .map(|&index| {
                PlannedHook::prepare(
                    &blueprint.manifest.hooks[index],
                    &self.renderer,
                    &context,
                    self.config.hook_timeout(),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let plan = GenerationPlan {
            files: plan_selection
                .files
                .iter()
                .map(|&index| IncludedFile {
                    index,
                    entry: blueprint.manifest.files[index].clone(),
                })
                .collect(),
            dependencies: plan_selection.dependencies,
            hooks,
        };
        info!(
            "Plan: {} file(s), {} dependency declaration(s), {} hook(s)",
            plan.files.len(),
            plan.dependencies.len(),
            plan.hooks.len()
        );

        let manifest_target = self.manifest_target(&blueprint, &plan, &context)?;

        let destinations = self
            .render_destinations(&plan, &context, workers, cancel)
            .await?;
        {
            let labels: Vec<String> = plan.files.iter().map(IncludedFile::label).collect();
            let manifest_entry = manifest_target
                .as_ref()
                .map(|target| (&target.path, "merged manifest"));
            ensure_unique_destinations(
                destinations
                    .iter()
                    .zip(labels.iter().map(String::as_str))
                    .chain(manifest_entry),
            )?;
        }

        let mut files = self
            .render_bodies(&blueprint, &plan, destinations, &context, workers, cancel)
            .await?;

        let policy = request
            .options
            .conflict_policy
            .unwrap_or(self.config.conflict_policy);
        let merged_manifest = DependencyMerger::new(policy).merge(&plan.dependencies)?;
        info!(
            "Merged {} declaration(s) into {} module(s) ({})",
            plan.dependencies.len(),
            merged_manifest.len(),
            policy
        );

        let manifest_path = match manifest_target {
            Some(target) => {
                let contents = serialize_manifest(
                    &merged_manifest,
                    target.format,
                    target.header.as_deref(),
                )?;
                files.push(RenderedFile::new(target.path.clone(), contents));
                Some(target.path)
            }
            None => None,
        };
        files.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(PreparedGeneration {
            config,
            plan,
            files,
            merged_manifest,
            manifest_path,
        })
    }

    fn manifest_target(
        &self,
        blueprint: &Blueprint,
        plan: &GenerationPlan,
        context: &Context,
    ) -> Result<Option<ManifestTarget>> {
        match &blueprint.manifest.manifest {
            Some(output) => {
                let path = self
                    .renderer
                    .render_path("manifest path", &output.path, context)?;
                let header = output
                    .header
                    .as_deref()
                    .map(|h| self.renderer.render_text("manifest header", h, context))
                    .transpose()?;
                Ok(Some(ManifestTarget {
                    path,
                    format: output.format,
                    header,
                }))
            }
            None if plan.dependencies.is_empty() => Ok(None),
            None if self.config.manifest_path.trim().is_empty() => Ok(None),
            None => {
                let path = crate::render::normalize_destination(&self.config.manifest_path)
                    .map_err(|msg| Error::invalid_config(format!("manifest-path: {}", msg)))?;
                Ok(Some(ManifestTarget {
                    path,
                    format: ManifestFormat::Json,
                    header: None,
                }))
            }
        }
    }

    async fn render_destinations(
        &self,
        plan: &GenerationPlan,
        context: &Arc<Context>,
        workers: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Utf8PathBuf>> {
        let jobs: Vec<(String, String)> = plan
            .files
            .iter()
            .map(|f| (format!("{} destination", f.label()), f.entry.destination.clone()))
            .collect();

        let renderer = Arc::clone(&self.renderer);
        let context = Arc::clone(context);
        fan_out("render", jobs, workers, cancel, move |_, (label, template)| {
            renderer.render_path(&label, &template, &context)
        })
        .await
    }

    async fn render_bodies(
        &self,
        blueprint: &Arc<Blueprint>,
        plan: &GenerationPlan,
        destinations: Vec<Utf8PathBuf>,
        context: &Arc<Context>,
        workers: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<RenderedFile>> {
        let jobs: Vec<(String, Utf8PathBuf)> = plan
            .files
            .iter()
            .map(|f| f.entry.source.clone())
            .zip(destinations)
            .collect();

        let renderer = Arc::clone(&self.renderer);
        let context = Arc::clone(context);
        let blueprint = Arc::clone(blueprint);
        let files = fan_out("render", jobs, workers, cancel, move |_, (source, path)| {
            let template = blueprint
                .template(&source)
                .ok_or_else(|| Error::render(&source, "template body was not loaded"))?;
            let body = renderer.render_text(&source, template, &context)?;
            debug!("Rendered {} -> {}", source, path);
            Ok(RenderedFile::new(path, body))
        })
        .await?;

        info!("Rendered {} file(s)", files.len());
        Ok(files)
    }
}

/// Indices selected by the evaluate stage
struct Selection {
    files: Vec<usize>,
    dependencies: Vec<IncludedDependency>,
    hooks: Vec<usize>,
}

async fn evaluate(
    blueprint: &Arc<Blueprint>,
    config: &Arc<ResolvedConfig>,
    workers: usize,
    cancel: &CancellationToken,
) -> Result<Selection> {
    let manifest = &blueprint.manifest;

    let mut subjects = Vec::new();
    for (f, file) in manifest.files.iter().enumerate() {
        subjects.push(Subject::File(f));
        subjects.extend((0..file.dependencies.len()).map(|d| Subject::FileDependency(f, d)));
    }
    subjects.extend((0..manifest.dependencies.len()).map(Subject::Dependency));
    subjects.extend((0..manifest.hooks.len()).map(Subject::Hook));

    let decisions = {
        let blueprint = Arc::clone(blueprint);
        let config = Arc::clone(config);
        fan_out("evaluate", subjects.clone(), workers, cancel, move |_, subject| {
            ConditionEvaluator::new(&config).evaluate(subject.condition(&blueprint.manifest))
        })
        .await?
    };

    let mut selection = Selection {
        files: Vec::new(),
        dependencies: Vec::new(),
        hooks: Vec::new(),
    };
    let mut blueprint_dependencies = Vec::new();

    for (subject, included) in subjects.into_iter().zip(decisions) {
        match subject {
            Subject::File(f) => {
                debug!(
                    "{} {}",
                    file_label(f, &manifest.files[f]),
                    if included { "included" } else { "excluded" }
                );
                if included {
                    selection.files.push(f);
                }
            }
            Subject::FileDependency(f, d) => {
                if included && selection.files.last() == Some(&f) {
                    let dep = &manifest.files[f].dependencies[d];
                    selection.dependencies.push(IncludedDependency::new(
                        &dep.module,
                        &dep.version,
                        file_label(f, &manifest.files[f]),
                    ));
                }
            }
            Subject::Dependency(d) => {
                if included {
                    let dep = &manifest.dependencies[d];
                    blueprint_dependencies.push(IncludedDependency::new(
                        &dep.module,
                        &dep.version,
                        "blueprint",
                    ));
                }
            }
            Subject::Hook(h) => {
                if included {
                    selection.hooks.push(h);
                }
            }
        }
    }
    selection.dependencies.extend(blueprint_dependencies);

    Ok(selection)
}

fn skip_all(hooks: &[PlannedHook], reason: &str) -> Vec<HookOutcome> {
    hooks
        .iter()
        .map(|h| HookOutcome::skipped(&h.name, h.required, reason))
        .collect()
}

fn describe_failure(outcome: &HookOutcome) -> String {
    use kiln_core::types::HookStatus;
    match &outcome.status {
        HookStatus::Failed { exit_code, stderr } => {
            let code = exit_code
                .map(|c| format!("exit code {}", c))
                .unwrap_or_else(|| "no exit code".to_string());
            if stderr.is_empty() {
                code
            } else {
                format!("{}: {}", code, stderr)
            }
        }
        HookStatus::TimedOut { timeout_secs } => format!("timed out after {}s", timeout_secs),
        HookStatus::Succeeded | HookStatus::Skipped { .. } => String::new(),
    }
}
