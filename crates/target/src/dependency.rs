use std::path::PathBuf;

use crate::arena::TargetId;

/// Anything a target may depend on (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    /// A source file not built by this project.
    ForeignSource(PathBuf),
    /// A library from the system, identified by name.
    ForeignLib(String),
    /// A file a test's output is compared against.
    OutputReference(PathBuf),
    /// A driver script for an executable test.
    TestExecScript(PathBuf),
    /// Parse-time placeholder, resolved during validation to either a
    /// `Target` or a `ForeignLib`.
    UndeterminedLib(String),
    /// A dependency produced by this project.
    Target(TargetId),
}
