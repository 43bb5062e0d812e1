use thiserror::Error;

/// Orchestrator-level errors (spec §7's "fatal" rows: parse, target
/// reference, cycle, duplicate registration, tool detection).
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("dependency cycle: [{}]", .0.join(", "))]
    DependencyCycle(Vec<String>),
    #[error("no target named or built at '{0}'")]
    TargetNotFound(String),
    #[error("unsupported system type '{0}'")]
    UnsupportedSystem(String),
    #[error("tool detection failed: {0}")]
    ToolDetect(String),
    #[error(transparent)]
    Project(#[from] complemake_project::ProjectError),
    #[error(transparent)]
    Registration(#[from] complemake_target::TargetRegistrationError),
    #[error(transparent)]
    MetadataWrite(#[from] complemake_sig::MetadataWriteError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
