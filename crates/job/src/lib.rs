//! Job scheduling: the abstract unit of build work ([`Job`]), the
//! `COMK-TEST-*` sentinel parser for Abaclade-linked test binaries, output
//! transforms applied before test comparisons, and the bounded-parallelism
//! [`Runner`] that drives them all (spec §4.5, §4.6).

mod abaclade;
mod job;
mod runner;
mod transform;

pub use abaclade::{AbacladeTestParser, SentinelEffect, TestCaseResult, TestSummary};
pub use job::{ExternalCmdSpec, Job, JobId, JobKind, JobOutcome};
pub use runner::Runner;
pub use transform::{apply_all, Transform, TransformError};
