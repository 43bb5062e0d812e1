//! The target entity model (spec §3, §4.4): dependencies, the tagged
//! [`TargetKind`] variants that replace the original's inheritance chain,
//! an arena owning every target by index, DFS-based cycle detection, and
//! the per-target build state machine.

mod arena;
mod dependency;
mod graph;
mod kind;
mod state_machine;
mod target;
mod validate;

pub use arena::{TargetArena, TargetId, TargetRegistrationError};
pub use dependency::Dependency;
pub use graph::{find_cycle, DependencyCycle};
pub use kind::{
    CxxSourcePayload, DynLibPayload, ExecutablePayload, ExecutableTestPayload, TargetKind,
    ToolTestPayload,
};
pub use state_machine::{begin_tool_job, dependency_updated, finalize_metadata, start_build};
pub use target::{Target, TargetState};
pub use validate::resolve_undetermined_libs;
