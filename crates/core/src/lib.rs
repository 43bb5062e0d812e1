//! Orchestrator: loads a project file, validates its target graph, schedules
//! the build through [`complemake_job::Runner`], and persists metadata
//! (spec §2, §4.4-§4.6). Mirrors the teacher's `ninja::run` in shape: one
//! `Config` in, one `anyhow::Result` out.

mod engine;
mod error;
mod report;

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::Context;
use complemake_platform::{Platform, SystemType};
use complemake_sig::{MetadataStore, SystemDiskInterface};
use complemake_target::{TargetArena, TargetId};
use tracing::info;

pub use error::CoreError;
pub use report::BuildReport;

use engine::EngineState;

/// Everything a `build`/`clean`/`query` invocation needs (spec §6's CLI
/// surface, gathered into one value so the binary crate stays a thin
/// flag parser).
#[derive(Debug, Clone)]
pub struct Config {
    pub project_path: PathBuf,
    pub output_dir: PathBuf,
    pub shared_dir: Option<PathBuf>,
    pub system_type: Option<String>,
    pub tool_cxx: Option<PathBuf>,
    pub tool_ld: Option<PathBuf>,
    pub verbose: u8,
    pub dry_run: bool,
    pub force: bool,
    pub force_test: bool,
    pub jobs: usize,
    pub keep_going: bool,
    pub target_files: Vec<PathBuf>,
    pub target_names: Vec<String>,
}

fn resolve_system_type(config: &Config) -> anyhow::Result<Option<SystemType>> {
    match &config.system_type {
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| CoreError::UnsupportedSystem(s.clone()).into()),
        None => Ok(None),
    }
}

fn resolve_platform(system: &Option<SystemType>) -> anyhow::Result<Platform> {
    match system {
        Some(s) => Platform::from_system_type(s)
            .ok_or_else(|| CoreError::UnsupportedSystem(s.to_string()).into()),
        None => Ok(Platform::host()),
    }
}

fn target_label(arena: &TargetArena, id: TargetId) -> String {
    let target = arena.get(id);
    match (&target.name, &target.output_path) {
        (Some(name), _) => name.clone(),
        (None, Some(path)) => path.display().to_string(),
        (None, None) => format!("<target {}>", id.index()),
    }
}

fn resolve_start_targets(
    arena: &TargetArena,
    roots: &[TargetId],
    config: &Config,
) -> Result<Vec<TargetId>, CoreError> {
    if config.target_names.is_empty() && config.target_files.is_empty() {
        return Ok(roots.to_vec());
    }
    let mut start = Vec::new();
    for name in &config.target_names {
        let id = arena
            .find_by_name(name)
            .ok_or_else(|| CoreError::TargetNotFound(name.clone()))?;
        start.push(id);
    }
    for path in &config.target_files {
        let id = arena
            .find_by_path(path)
            .ok_or_else(|| CoreError::TargetNotFound(path.display().to_string()))?;
        start.push(id);
    }
    Ok(start)
}

/// Runs a full `build` (spec §2, §4.4-§4.6): parse the project file, check
/// the graph is acyclic, then drive every requested target through the
/// state machine until nothing is left runnable.
pub fn run_build(config: &Config) -> anyhow::Result<BuildReport> {
    let system = resolve_system_type(config)?;
    let platform = resolve_platform(&system)?;

    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating output directory {}", config.output_dir.display()))?;
    for dir in complemake_paths::layout_dirs(&config.output_dir) {
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    if config.verbose >= 2 {
        complemake_metrics::enable();
    }

    let yaml = std::fs::read_to_string(&config.project_path)
        .with_context(|| format!("reading project file {}", config.project_path.display()))?;
    let source_name = config.project_path.display().to_string();
    let (arena, roots) = {
        complemake_metrics::scoped_metric!("load_project");
        complemake_project::load_project(&source_name, &yaml, &config.output_dir, platform)?
    };

    if let Some(cycle) = complemake_target::find_cycle(&arena) {
        let names: Vec<String> = cycle
            .cycle
            .iter()
            .map(|id| target_label(&arena, *id))
            .collect();
        return Err(CoreError::DependencyCycle(names).into());
    }

    let start_ids = resolve_start_targets(&arena, &roots, config)?;

    let metadata_path = config.output_dir.join(".comk-metadata");
    let metadata = MetadataStore::load(SystemDiskInterface, &metadata_path);

    let state = EngineState {
        arena,
        metadata,
        tool_cache: complemake_tool::ToolCache::new(),
        platform,
        system,
        tool_cxx_override: config.tool_cxx.clone(),
        tool_ld_override: config.tool_ld.clone(),
        out_dir: config.output_dir.clone(),
        dry_run: config.dry_run,
        force: config.force,
        force_test: config.force_test,
        verbose: config.verbose,
        fatal_error: None,
    };
    let shared: engine::Shared = Arc::new(Mutex::new(state));

    let mut runner = complemake_job::Runner::new(config.jobs, config.dry_run, config.keep_going);

    let mut ready = Vec::new();
    {
        let mut state = shared.lock().unwrap();
        for id in &start_ids {
            complemake_target::start_build(&mut state.arena, *id, None, &mut ready);
        }
    }
    {
        complemake_metrics::scoped_metric!("build");
        for id in ready {
            engine::dispatch_one(&mut runner, &shared, id);
        }
        runner.run();
    }

    if complemake_metrics::is_enabled() {
        complemake_metrics::dump();
    }

    let fatal = shared.lock().unwrap().fatal_error.take();
    if let Some(err) = fatal {
        return Err(err.into());
    }

    {
        let mut state = shared.lock().unwrap();
        if let Err(e) = state.metadata.write(&metadata_path) {
            tracing::warn!(error = %e, "failed to write metadata file");
        }
    }

    let failed_jobs = runner.failed_jobs();
    Ok(BuildReport {
        succeeded: failed_jobs == 0,
        failed_jobs,
        test_summary: std::mem::take(&mut runner.test_summary),
    })
}

/// Removes the output directory tree and its metadata file (spec §A.3:
/// not detailed in spec.md's distillation but present in the original).
pub fn run_clean(config: &Config) -> anyhow::Result<()> {
    if !config.output_dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(&config.output_dir)
        .with_context(|| format!("reading {}", config.output_dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        info!(path = %path.display(), "removing");
        if path.is_dir() {
            std::fs::remove_dir_all(&path)
                .with_context(|| format!("removing {}", path.display()))?;
        } else {
            std::fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
        }
    }
    Ok(())
}

/// `query --exec-env`: the environment assignments needed to run binaries
/// out of the project's `lib/` output directory, one `NAME=value` per line.
pub fn run_query_exec_env(config: &Config) -> anyhow::Result<String> {
    let system = resolve_system_type(config)?;
    let platform = resolve_platform(&system)?;

    let mut env = std::collections::HashMap::new();
    platform.add_dir_to_dynlib_env_path(&mut env, &config.output_dir.join("lib"));

    let mut lines: Vec<String> = env
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v.to_string_lossy()))
        .collect();
    lines.sort();
    Ok(lines.join("\n"))
}
