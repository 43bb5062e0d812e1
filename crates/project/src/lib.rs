//! Loading of the tagged YAML project file (spec §6) into the target entity
//! model: the raw [`spec`] vocabulary, parsed by `serde_yaml` and lowered by
//! [`build`] into a populated `TargetArena`.

mod build;
mod error;
mod spec;

pub use build::load_project;
pub use error::ProjectError;
pub use spec::{ExeSpec, ExeTestSpec, ProjectDocument, SourceEntry, TargetSpec, ToolTestSpec};
