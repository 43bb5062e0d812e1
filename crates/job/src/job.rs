use std::path::PathBuf;

use crate::abaclade::TestCaseResult;

pub type JobId = u64;

/// Everything needed to spawn and capture one external command (spec §4.5,
/// *AsynchronousExternalCmd* / *AbacladeTest*).
#[derive(Debug, Clone)]
pub struct ExternalCmdSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    /// Short command summary printed unless `--verbose`.
    pub quiet_command: String,
    /// Full argv, printed when `--verbose`.
    pub verbose_command: String,
    /// stderr is merged into the stdout pipe (one reader instead of two).
    pub merge_stderr_into_stdout: bool,
    /// Accumulate stdout in memory (tests); compilers/linkers don't need it.
    pub capture_stdout: bool,
    /// Per-target log file that every stderr line is appended to.
    pub log_path: PathBuf,
    /// Lines containing any of these substrings are dropped from the log
    /// and from the lines forwarded to the logger.
    pub exclude_patterns: Vec<String>,
}

/// The unit of scheduled work (spec §4.5).
pub enum JobKind {
    /// Runs in the scheduling thread; no I/O capture.
    Synchronous(Box<dyn FnOnce() -> i32 + Send>),
    /// A child process; stdout/stderr captured per `ExternalCmdSpec`.
    AsynchronousExternalCmd(ExternalCmdSpec),
    /// Like `AsynchronousExternalCmd`, but stderr lines are additionally fed
    /// through the `COMK-TEST-<event>` sentinel parser.
    AbacladeTest(ExternalCmdSpec),
}

pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
}

/// What a finished job produced, handed to the `on_complete` callback.
#[derive(Debug, Clone, Default)]
pub struct JobOutcome {
    /// `None` when the job could not even be started (e.g. ENOEXEC).
    pub exit_code: Option<i32>,
    pub captured_stdout: Vec<u8>,
    /// The binary could not execute on this host (cross-build); not a failure.
    pub skipped: bool,
    /// `AbacladeTest` cases the stderr parser committed during this job.
    pub completed_cases: Vec<TestCaseResult>,
}

impl JobOutcome {
    pub fn success(&self) -> bool {
        !self.skipped && self.exit_code == Some(0)
    }
}
