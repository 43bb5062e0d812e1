use std::{
    collections::{HashMap, VecDeque},
    io::{BufRead, BufReader, Write},
    process::{Command, Stdio},
    sync::mpsc::{channel, Receiver, Sender},
    thread,
};

use complemake_metrics::scoped_metric;
use tracing::{debug, info, warn};

use crate::{
    abaclade::{AbacladeTestParser, SentinelEffect, TestSummary},
    job::{ExternalCmdSpec, Job, JobId, JobKind, JobOutcome},
};

type OnComplete = Box<dyn FnOnce(&mut Runner, JobOutcome) + Send>;

struct RunningJob {
    spec_quiet: String,
}

struct QueuedJob {
    job: Job,
    on_complete: OnComplete,
}

/// Sent by a reader thread once a job's capture streams have reached EOF.
struct WakeMsg {
    id: JobId,
    outcome: JobOutcome,
}

/// Schedules [`Job`]s with bounded parallelism (spec §4.5). A single
/// orchestrator thread calls [`Runner::run`] and blocks only on the wake
/// channel; everything else here is non-blocking, matching the teacher's
/// command-pool scheduling loop generalized to unbounded heterogeneous jobs
/// instead of a fixed worker pool.
pub struct Runner {
    dry_run: bool,
    keep_going: bool,
    running_jobs_max: usize,
    queued: VecDeque<QueuedJob>,
    running: HashMap<JobId, RunningJob>,
    pending_completions: HashMap<JobId, OnComplete>,
    failed_jobs: usize,
    process_queue: bool,
    next_job_id: JobId,
    wake_tx: Sender<WakeMsg>,
    wake_rx: Receiver<WakeMsg>,
    pub test_summary: TestSummary,
}

impl Runner {
    pub fn new(running_jobs_max: usize, dry_run: bool, keep_going: bool) -> Runner {
        let (wake_tx, wake_rx) = channel();
        Runner {
            dry_run,
            keep_going,
            running_jobs_max: running_jobs_max.max(1),
            queued: VecDeque::new(),
            running: HashMap::new(),
            pending_completions: HashMap::new(),
            failed_jobs: 0,
            process_queue: true,
            next_job_id: 0,
            wake_tx,
            wake_rx,
            test_summary: TestSummary::default(),
        }
    }

    pub fn failed_jobs(&self) -> usize {
        self.failed_jobs
    }

    /// Schedules `job`; `on_complete` runs on the orchestrator thread once
    /// the job's outcome is known.
    pub fn enqueue(
        &mut self,
        kind: JobKind,
        on_complete: impl FnOnce(&mut Runner, JobOutcome) + Send + 'static,
    ) -> JobId {
        let id = self.next_job_id;
        self.next_job_id += 1;
        let on_complete: OnComplete = Box::new(on_complete);

        if self.dry_run {
            info!(job_id = id, "dry-run: would run job");
            on_complete(self, JobOutcome::default());
            return id;
        }

        match kind {
            JobKind::Synchronous(run) => {
                let exit_code = run();
                on_complete(
                    self,
                    JobOutcome {
                        exit_code: Some(exit_code),
                        ..JobOutcome::default()
                    },
                );
            }
            JobKind::AsynchronousExternalCmd(spec) => {
                self.schedule_external(id, spec, false, on_complete);
            }
            JobKind::AbacladeTest(spec) => {
                self.schedule_external(id, spec, true, on_complete);
            }
        }
        id
    }

    fn schedule_external(
        &mut self,
        id: JobId,
        spec: ExternalCmdSpec,
        is_abaclade: bool,
        on_complete: OnComplete,
    ) {
        if !self.process_queue {
            self.queued.push_back(QueuedJob {
                job: Job {
                    id,
                    kind: if is_abaclade {
                        JobKind::AbacladeTest(spec)
                    } else {
                        JobKind::AsynchronousExternalCmd(spec)
                    },
                },
                on_complete,
            });
            return;
        }
        if self.running.len() < self.running_jobs_max {
            self.start_external(id, spec, is_abaclade);
            self.pending_completions.insert(id, on_complete);
        } else {
            self.queued.push_back(QueuedJob {
                job: Job {
                    id,
                    kind: if is_abaclade {
                        JobKind::AbacladeTest(spec)
                    } else {
                        JobKind::AsynchronousExternalCmd(spec)
                    },
                },
                on_complete,
            });
        }
    }

    fn start_external(&mut self, id: JobId, spec: ExternalCmdSpec, is_abaclade: bool) {
        debug!(job_id = id, cmd = %spec.quiet_command, "starting job");
        info!("{}", spec.quiet_command);

        let _m = scoped_metric!("job_spawn");
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        cmd.stderr(Stdio::piped());
        cmd.stdout(if spec.merge_stderr_into_stdout || spec.capture_stdout {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let skipped = e.raw_os_error() == Some(not_executable_os_error());
                warn!(job_id = id, error = %e, "failed to spawn job");
                self.wake_tx
                    .send(WakeMsg {
                        id,
                        outcome: JobOutcome {
                            exit_code: None,
                            captured_stdout: Vec::new(),
                            skipped,
                            completed_cases: Vec::new(),
                        },
                    })
                    .ok();
                self.running.insert(id, RunningJob { spec_quiet: spec.quiet_command });
                return;
            }
        };

        self.running.insert(
            id,
            RunningJob {
                spec_quiet: spec.quiet_command.clone(),
            },
        );

        let log_path = spec.log_path.clone();
        let exclude = spec.exclude_patterns.clone();
        let tx = self.wake_tx.clone();
        let capture_stdout = spec.capture_stdout;

        thread::spawn(move || {
            let mut child = child;
            let stderr = child.stderr.take();
            let stdout = child.stdout.take();

            // spec §4.5: a reader task for stderr (always) and one for
            // stdout, running concurrently — the child can otherwise block
            // writing to whichever pipe isn't being drained.
            let stdout_exclude = exclude.clone();
            let stdout_log_path = log_path.clone();
            let stdout_handle = stdout.map(|stdout| {
                thread::spawn(move || -> (Vec<u8>, Vec<crate::abaclade::TestCaseResult>) {
                    let mut log_file = std::fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&stdout_log_path)
                        .ok();
                    let mut abaclade = if is_abaclade {
                        Some(AbacladeTestParser::new())
                    } else {
                        None
                    };
                    let mut case_results = Vec::new();
                    let mut captured_stdout = Vec::new();
                    if capture_stdout {
                        use std::io::Read;
                        let mut reader = stdout;
                        reader.read_to_end(&mut captured_stdout).ok();
                    } else {
                        let reader = BufReader::new(stdout);
                        for line in reader.lines().flatten() {
                            process_line(&line, &stdout_exclude, &mut log_file, &mut abaclade, &mut case_results);
                        }
                    }
                    (captured_stdout, case_results)
                })
            });

            let mut log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .ok();
            let mut abaclade = if is_abaclade {
                Some(AbacladeTestParser::new())
            } else {
                None
            };
            let mut case_results = Vec::new();
            if let Some(stderr) = stderr {
                let reader = BufReader::new(stderr);
                for line in reader.lines().flatten() {
                    process_line(&line, &exclude, &mut log_file, &mut abaclade, &mut case_results);
                }
            }

            let (captured_stdout, mut stdout_cases) = stdout_handle
                .map(|h| h.join().unwrap_or_default())
                .unwrap_or_default();
            case_results.append(&mut stdout_cases);

            let status = child.wait();
            let exit_code = status.ok().and_then(|s| s.code());

            tx.send(WakeMsg {
                id,
                outcome: JobOutcome {
                    exit_code,
                    captured_stdout,
                    skipped: false,
                    completed_cases: case_results,
                },
            })
            .ok();
        });
    }

    /// Blocks reading the wake channel until `running` drains (spec §5's
    /// only suspension point).
    pub fn run(&mut self) {
        while !self.running.is_empty() || !self.pending_completions.is_empty() {
            let msg = match self.wake_rx.recv() {
                Ok(msg) => msg,
                Err(_) => break,
            };
            self.running.remove(&msg.id);
            for case in &msg.outcome.completed_cases {
                self.test_summary
                    .add_testcase_result(case.title.clone(), case.total, case.failed);
            }
            if !msg.outcome.success() && !msg.outcome.skipped {
                self.failed_jobs += 1;
                if !self.keep_going {
                    self.process_queue = false;
                }
            }
            if let Some(on_complete) = self.pending_completions.remove(&msg.id) {
                on_complete(self, msg.outcome);
            }
            if self.process_queue {
                if let Some(next) = self.queued.pop_front() {
                    self.dispatch(next);
                }
            }
        }
    }

    fn dispatch(&mut self, queued: QueuedJob) {
        match queued.job.kind {
            JobKind::AsynchronousExternalCmd(spec) => {
                self.start_external(queued.job.id, spec, false);
                self.pending_completions.insert(queued.job.id, queued.on_complete);
            }
            JobKind::AbacladeTest(spec) => {
                self.start_external(queued.job.id, spec, true);
                self.pending_completions.insert(queued.job.id, queued.on_complete);
            }
            JobKind::Synchronous(run) => {
                let exit_code = run();
                (queued.on_complete)(
                    self,
                    JobOutcome {
                        exit_code: Some(exit_code),
                        ..JobOutcome::default()
                    },
                );
            }
        }
    }
}

fn process_line(
    line: &str,
    exclude: &[String],
    log_file: &mut Option<std::fs::File>,
    abaclade: &mut Option<AbacladeTestParser>,
    case_results: &mut Vec<crate::abaclade::TestCaseResult>,
) {
    if exclude.iter().any(|pat| line.contains(pat.as_str())) {
        return;
    }
    if let Some(f) = log_file {
        writeln!(f, "{}", line).ok();
    }
    if let Some(parser) = abaclade {
        if let SentinelEffect::CaseComplete(result) = parser.feed_line(line) {
            if result.failed > 0 {
                warn!(case = %result.title, failed = result.failed, total = result.total, "test case had failures");
            }
            case_results.push(result);
            return;
        }
    }
    debug!("{}", line);
}

/// The OS error code meaning "this binary can't execute on this machine"
/// (spec §4.4: `ENOEXEC` on POSIX, `ERROR_BAD_EXE_FORMAT` on Windows) —
/// used to distinguish a cross-build test skip from a real spawn failure.
#[cfg(windows)]
fn not_executable_os_error() -> i32 {
    193
}

#[cfg(not(windows))]
fn not_executable_os_error() -> i32 {
    8
}
