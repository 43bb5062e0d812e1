use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use complemake_job::{ExternalCmdSpec, JobKind, Runner};
use complemake_platform::{Platform, SystemType};
use complemake_sig::{MetadataStore, SystemDiskInterface, TargetKey};
use complemake_target::{Dependency, TargetArena, TargetId, TargetKind};
use complemake_tool::{AbstractFlag, Define, LinkInput, ToolCache};

use crate::error::CoreError;

/// Everything a running build needs, behind one lock (spec §9: "the
/// orchestrator is single-threaded" — the mutex exists only because
/// `Runner::enqueue`'s completion callback must be `Send`, not because two
/// threads ever touch this concurrently).
pub struct EngineState {
    pub arena: TargetArena,
    pub metadata: MetadataStore<SystemDiskInterface>,
    pub tool_cache: ToolCache,
    pub platform: Platform,
    pub system: Option<SystemType>,
    pub tool_cxx_override: Option<PathBuf>,
    pub tool_ld_override: Option<PathBuf>,
    pub out_dir: PathBuf,
    pub dry_run: bool,
    pub force: bool,
    pub force_test: bool,
    pub verbose: u8,
    pub fatal_error: Option<CoreError>,
}

pub type Shared = Arc<Mutex<EngineState>>;

impl EngineState {
    pub fn target_key(&self, id: TargetId) -> TargetKey {
        let target = self.arena.get(id);
        match &target.name {
            Some(name) => TargetKey::Name(name.clone()),
            None => TargetKey::Path(
                target
                    .output_path
                    .clone()
                    .expect("an unnamed target must have an output path"),
            ),
        }
    }

    fn is_test_kind(&self, id: TargetId) -> bool {
        matches!(
            self.arena.get(id).kind,
            TargetKind::ToolTest(_) | TargetKind::ExecutableTest(_)
        )
    }

    fn rebuild_inputs_outputs(&self, id: TargetId) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let target = self.arena.get(id);
        match &target.kind {
            TargetKind::CxxPreprocessed(p) | TargetKind::CxxObject(p) => {
                (vec![p.source.clone()], vec![target.output_path.clone().unwrap()])
            }
            TargetKind::Executable(_) | TargetKind::DynLib(_) => {
                let inputs = target
                    .dependencies
                    .iter()
                    .filter_map(|d| match d {
                        Dependency::Target(tid) => self.arena.get(*tid).output_path.clone(),
                        _ => None,
                    })
                    .collect();
                (inputs, vec![target.output_path.clone().unwrap()])
            }
            TargetKind::ExecutableTest(_) => {
                let inputs = target
                    .dependencies
                    .iter()
                    .filter_map(|d| match d {
                        Dependency::Target(tid) => self.arena.get(*tid).output_path.clone(),
                        Dependency::TestExecScript(p) => Some(p.clone()),
                        _ => None,
                    })
                    .collect();
                (inputs, vec![target.output_path.clone().unwrap()])
            }
            TargetKind::ToolTest(_) => {
                let inputs = target
                    .dependencies
                    .iter()
                    .filter_map(|d| match d {
                        Dependency::Target(tid) => self.arena.get(*tid).output_path.clone(),
                        Dependency::OutputReference(p) => Some(p.clone()),
                        _ => None,
                    })
                    .collect();
                (inputs, Vec::new())
            }
        }
    }

    /// Whether `id`'s tool job must run this pass (spec §8 property 3).
    pub fn needs_rebuild(&self, id: TargetId) -> bool {
        let (inputs, outputs) = self.rebuild_inputs_outputs(id);
        let key = self.target_key(id);
        let changed = self.metadata.has_target_snapshot_changed(&key, &inputs, &outputs);
        changed || self.force || (self.force_test && self.is_test_kind(id))
    }
}

/// Drives one target through the state machine (spec §4.4): decide
/// up-to-date-skip vs. build, dispatch the right job kind, and on
/// completion recurse into whatever the finalize step frees up.
pub fn dispatch_one(runner: &mut Runner, shared: &Shared, id: TargetId) {
    let (build, tag) = {
        let state = shared.lock().unwrap();
        if state.fatal_error.is_some() {
            return;
        }
        (state.needs_rebuild(id), state.arena.get(id).kind.tag())
    };

    if !build {
        finalize_and_continue(runner, shared, id);
        return;
    }

    {
        let mut state = shared.lock().unwrap();
        complemake_target::begin_tool_job(&mut state.arena, id);
    }

    match tag {
        "cxx-preprocessed" | "cxx-object" => enqueue_cxx(runner, shared, id),
        "exe" | "dynlib" => enqueue_link(runner, shared, id),
        "tooltest" => enqueue_tooltest(runner, shared, id),
        "exetest" => start_exetest(runner, shared, id),
        other => unreachable!("unknown target kind tag {other}"),
    }
}

fn finalize_and_continue(runner: &mut Runner, shared: &Shared, id: TargetId) {
    let mut ready = Vec::new();
    {
        let mut state = shared.lock().unwrap();
        let key = state.target_key(id);
        let dry_run = state.dry_run;
        state.metadata.update_target_snapshot(&key, dry_run);
        complemake_target::finalize_metadata(&mut state.arena, id, &mut ready);
    }
    for next in ready {
        dispatch_one(runner, shared, next);
    }
}

fn enqueue_simple(runner: &mut Runner, shared: &Shared, id: TargetId, kind: JobKind) {
    let shared2 = Arc::clone(shared);
    runner.enqueue(kind, move |runner, _outcome| {
        finalize_and_continue(runner, &shared2, id);
    });
}

fn enqueue_cxx(runner: &mut Runner, shared: &Shared, id: TargetId) {
    let result = {
        let mut state = shared.lock().unwrap();
        cxx_job(&mut state, id)
    };
    match result {
        Ok(kind) => enqueue_simple(runner, shared, id, kind),
        Err(e) => {
            shared.lock().unwrap().fatal_error = Some(e);
        }
    }
}

fn enqueue_link(runner: &mut Runner, shared: &Shared, id: TargetId) {
    let result = {
        let mut state = shared.lock().unwrap();
        link_job_for(&mut state, id)
    };
    match result {
        Ok(kind) => enqueue_simple(runner, shared, id, kind),
        Err(e) => {
            shared.lock().unwrap().fatal_error = Some(e);
        }
    }
}

fn enqueue_tooltest(runner: &mut Runner, shared: &Shared, id: TargetId) {
    let (kind, name) = {
        let state = shared.lock().unwrap();
        let name = state.arena.get(id).name.clone().unwrap_or_default();
        (tooltest_job(&state, id), name)
    };
    let shared2 = Arc::clone(shared);
    runner.enqueue(kind, move |runner, outcome| {
        let failed = if outcome.success() { 0 } else { 1 };
        runner.test_summary.add_testcase_result(name, 1, failed);
        finalize_and_continue(runner, &shared2, id);
    });
}

/// `ExecutableTest` is link-then-run: one job builds the binary, a second
/// executes it, and only the second's outcome decides the test result
/// (spec §4.4, §4.5).
fn start_exetest(runner: &mut Runner, shared: &Shared, id: TargetId) {
    let result = {
        let mut state = shared.lock().unwrap();
        link_job_for(&mut state, id)
    };
    let link_kind = match result {
        Ok(kind) => kind,
        Err(e) => {
            shared.lock().unwrap().fatal_error = Some(e);
            return;
        }
    };
    let shared2 = Arc::clone(shared);
    runner.enqueue(link_kind, move |runner, outcome| {
        if !outcome.success() {
            let name = {
                let state = shared2.lock().unwrap();
                state.arena.get(id).name.clone().unwrap_or_default()
            };
            runner.test_summary.add_testcase_result(name, 1, 1);
            finalize_and_continue(runner, &shared2, id);
            return;
        }
        run_exetest_phase(runner, &shared2, id);
    });
}

fn run_exetest_phase(runner: &mut Runner, shared: &Shared, id: TargetId) {
    let run_kind = {
        let state = shared.lock().unwrap();
        run_job_for(&state, id)
    };
    let shared2 = Arc::clone(shared);
    runner.enqueue(run_kind, move |runner, outcome| {
        if outcome.completed_cases.is_empty() && !outcome.skipped {
            let (name, reference) = {
                let state = shared2.lock().unwrap();
                let target = state.arena.get(id);
                let name = target.name.clone().unwrap_or_default();
                let reference = target.dependencies.iter().find_map(|d| match d {
                    Dependency::OutputReference(p) => Some(p.clone()),
                    _ => None,
                });
                let transforms = match &target.kind {
                    TargetKind::ExecutableTest(p) => p.transforms.clone(),
                    _ => Vec::new(),
                };
                (name, reference.map(|p| (p, transforms)))
            };
            let failed = match reference {
                Some((expected_path, transforms)) => {
                    let actual = String::from_utf8_lossy(&outcome.captured_stdout).into_owned();
                    let actual = complemake_job::apply_all(&transforms, &actual).unwrap_or(actual);
                    let expected = std::fs::read_to_string(&expected_path).unwrap_or_default();
                    let expected =
                        complemake_job::apply_all(&transforms, &expected).unwrap_or(expected);
                    if actual == expected {
                        0
                    } else {
                        1
                    }
                }
                None => {
                    if outcome.success() {
                        0
                    } else {
                        1
                    }
                }
            };
            runner.test_summary.add_testcase_result(name, 1, failed);
        }
        finalize_and_continue(runner, &shared2, id);
    });
}

fn cxx_job(state: &mut EngineState, id: TargetId) -> Result<JobKind, CoreError> {
    let target = state.arena.get(id);
    let (source, final_output) = match &target.kind {
        TargetKind::CxxPreprocessed(p) | TargetKind::CxxObject(p) => (p.source.clone(), p.final_output),
        _ => unreachable!("cxx_job called on a non-source target"),
    };
    let preprocess_only = matches!(target.kind, TargetKind::CxxPreprocessed(_));
    let output_path = target
        .output_path
        .clone()
        .expect("source targets always have an output path");
    let needs_pic = final_output
        .map(|fid| target.kind.needs_position_independent_code(&state.arena.get(fid).kind))
        .unwrap_or(false);
    let build_macro = final_output.and_then(|fid| match &state.arena.get(fid).kind {
        TargetKind::DynLib(d) => Some(d.build_macro.clone()),
        _ => None,
    });

    let factory = state
        .tool_cache
        .get_cxx_tool(state.system.as_ref(), state.tool_cxx_override.as_deref())
        .map_err(|e| CoreError::ToolDetect(e.to_string()))?
        .clone();
    let backend = factory.backend();
    let mut tool = factory.make_tool(output_path.clone());
    tool.inputs.push(source.clone());
    if preprocess_only {
        tool.flags.push(AbstractFlag::PreprocessOnly);
    }
    if needs_pic {
        tool.flags.push(AbstractFlag::Dynlib);
    }
    if let Some(name) = build_macro {
        tool.defines.push(Define { name, expansion: None });
    }

    let argv = complemake_tool::compile_command_line(backend, &tool);
    let quiet = complemake_tool::quiet_command(backend.tag(), &source);
    let log_path = complemake_paths::log_path(&state.out_dir, &output_path);

    // spec §4.2: MSC writes diagnostics to stdout and echoes the source file
    // name, which must be filtered.
    let is_msc = factory.backend_kind == complemake_tool::CompilerBackendKind::Msc;
    let exclude_patterns = if is_msc {
        vec![source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()]
    } else {
        Vec::new()
    };

    Ok(JobKind::AsynchronousExternalCmd(ExternalCmdSpec {
        program: tool.exe_path.clone(),
        args: argv[1..].to_vec(),
        env: Vec::new(),
        cwd: None,
        quiet_command: quiet,
        verbose_command: argv.join(" "),
        merge_stderr_into_stdout: is_msc,
        capture_stdout: false,
        log_path,
        exclude_patterns,
    }))
}

fn link_job_for(state: &mut EngineState, id: TargetId) -> Result<JobKind, CoreError> {
    let target = state.arena.get(id);
    let is_dynlib = matches!(target.kind, TargetKind::DynLib(_));
    let output_path = target
        .output_path
        .clone()
        .expect("linked targets always have an output path");
    let deps = target.dependencies.clone();

    let factory = state
        .tool_cache
        .get_ld_tool(state.system.as_ref(), state.tool_ld_override.as_deref())
        .map_err(|e| CoreError::ToolDetect(e.to_string()))?
        .clone();
    let backend = factory.backend();
    let mut tool = factory.make_tool(output_path.clone());
    if is_dynlib {
        tool.flags.push(AbstractFlag::Dynlib);
    }

    let lib_dir = state.out_dir.join("lib");
    for dep in &deps {
        match dep {
            Dependency::Target(tid) => {
                let dep_target = state.arena.get(*tid);
                match &dep_target.kind {
                    TargetKind::CxxObject(_) | TargetKind::CxxPreprocessed(_) => {
                        if let Some(p) = &dep_target.output_path {
                            tool.inputs.push(p.clone());
                        }
                    }
                    TargetKind::DynLib(_) => {
                        if let Some(name) = &dep_target.name {
                            if !tool.lib_dirs.contains(&lib_dir) {
                                tool.lib_dirs.push(lib_dir.clone());
                            }
                            tool.libs.push(LinkInput::Name(name.clone()));
                        }
                    }
                    _ => {}
                }
            }
            Dependency::ForeignLib(name) => {
                tool.libs.push(LinkInput::Name(name.clone()));
            }
            _ => {}
        }
    }
    complemake_tool::configure_tool(state.platform, &mut tool);

    let argv = complemake_tool::link_command_line(backend, &tool);
    let quiet = complemake_tool::quiet_command(backend.tag(), &output_path);
    let log_path = complemake_paths::log_path(&state.out_dir, &output_path);

    // spec §4.2: MS Link writes diagnostics to stdout and echoes
    // "Creating library ... and object ..." for /IMPLIB, which must be
    // filtered.
    let is_ms_link = factory.backend_kind == complemake_tool::LinkerBackendKind::Ms;
    let exclude_patterns = if is_ms_link {
        vec!["Creating library".to_string()]
    } else {
        Vec::new()
    };

    Ok(JobKind::AsynchronousExternalCmd(ExternalCmdSpec {
        program: tool.exe_path.clone(),
        args: argv[1..].to_vec(),
        env: Vec::new(),
        cwd: None,
        quiet_command: quiet,
        verbose_command: argv.join(" "),
        merge_stderr_into_stdout: is_ms_link,
        capture_stdout: false,
        log_path,
        exclude_patterns,
    }))
}

fn tooltest_job(state: &EngineState, id: TargetId) -> JobKind {
    let target = state.arena.get(id);
    let transforms = match &target.kind {
        TargetKind::ToolTest(p) => p.transforms.clone(),
        _ => unreachable!("tooltest_job called on a non-tooltest target"),
    };
    let operands: Vec<PathBuf> = target
        .dependencies
        .iter()
        .filter_map(|dep| match dep {
            Dependency::Target(tid) => state.arena.get(*tid).output_path.clone(),
            Dependency::OutputReference(p) => Some(p.clone()),
            _ => None,
        })
        .collect();

    JobKind::Synchronous(Box::new(move || {
        if operands.len() != 2 {
            return 1;
        }
        let read = |p: &PathBuf| std::fs::read_to_string(p).unwrap_or_default();
        let a = match complemake_job::apply_all(&transforms, &read(&operands[0])) {
            Ok(s) => s,
            Err(_) => return 1,
        };
        let b = match complemake_job::apply_all(&transforms, &read(&operands[1])) {
            Ok(s) => s,
            Err(_) => return 1,
        };
        if a == b {
            0
        } else {
            1
        }
    }))
}

fn run_job_for(state: &EngineState, id: TargetId) -> JobKind {
    let target = state.arena.get(id);
    let (uses_abaclade, script) = match &target.kind {
        TargetKind::ExecutableTest(p) => {
            let script = target.dependencies.iter().find_map(|d| match d {
                Dependency::TestExecScript(p) => Some(p.clone()),
                _ => None,
            });
            (p.uses_abaclade_testing, script)
        }
        _ => unreachable!("run_job_for called on a non-exetest target"),
    };
    let has_reference = target
        .dependencies
        .iter()
        .any(|d| matches!(d, Dependency::OutputReference(_)));
    let test_bin = target
        .output_path
        .clone()
        .expect("exetest targets always have an output path");

    let mut argv: Vec<std::ffi::OsString> = Vec::new();
    if let Some(script) = &script {
        argv.push(script.clone().into_os_string());
    }
    argv.push(test_bin.clone().into_os_string());
    state.platform.adjust_popen_args_for_script(&mut argv);

    let mut env_map = std::collections::HashMap::new();
    state
        .platform
        .add_dir_to_dynlib_env_path(&mut env_map, &state.out_dir.join("lib"));
    let env: Vec<(String, String)> = env_map
        .into_iter()
        .map(|(k, v)| (k, v.to_string_lossy().into_owned()))
        .collect();

    let program = PathBuf::from(argv.remove(0));
    let args: Vec<String> = argv.into_iter().map(|a| a.to_string_lossy().into_owned()).collect();

    let quiet = complemake_tool::quiet_command("TEST", &test_bin);
    let verbose = std::iter::once(program.to_string_lossy().into_owned())
        .chain(args.clone())
        .collect::<Vec<_>>()
        .join(" ");
    let log_path = complemake_paths::log_path(&state.out_dir, &test_bin);

    let spec = ExternalCmdSpec {
        program,
        args,
        env,
        cwd: None,
        quiet_command: quiet,
        verbose_command: verbose,
        merge_stderr_into_stdout: uses_abaclade,
        capture_stdout: has_reference,
        log_path,
        exclude_patterns: Vec::new(),
    };
    if uses_abaclade {
        JobKind::AbacladeTest(spec)
    } else {
        JobKind::AsynchronousExternalCmd(spec)
    }
}
