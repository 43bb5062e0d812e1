use thiserror::Error;

/// Project parse/validation errors (spec §7, §9: "a result type whose error
/// variant carries source name, line/column, and a message").
#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("{source_name}: {message}")]
    Parse { source_name: String, message: String },
    #[error("{source_name}: unrecognized document kind '{kind}' (expected 'complemake/project')")]
    WrongDocumentKind { source_name: String, kind: String },
    #[error("{source_name}: project has no targets")]
    EmptyProject { source_name: String },
    #[error("{source_name}: tooltest '{name}' must have exactly two comparison operands, found {count}")]
    ToolTestOperandCount {
        source_name: String,
        name: String,
        count: usize,
    },
    #[error("{0}")]
    Registration(#[from] complemake_target::TargetRegistrationError),
    #[error("invalid output transform pattern: {0}")]
    Transform(#[from] complemake_job::TransformError),
}

impl ProjectError {
    pub fn parse(source_name: impl Into<String>, err: serde_yaml::Error) -> ProjectError {
        ProjectError::Parse {
            source_name: source_name.into(),
            message: err.to_string(),
        }
    }
}
