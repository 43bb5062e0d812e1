use std::path::PathBuf;

use crate::{arena::TargetId, dependency::Dependency, kind::TargetKind};

/// Mirrors the diagram in spec §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Fresh,
    Building,
    WaitingDeps,
    DependenciesReady,
    RunningToolJob,
    FinalizeMetadata,
    UpToDate,
}

/// A buildable entity with a well-defined output (spec §3). Shared header
/// fields plus a tagged [`TargetKind`] payload, replacing the original's
/// deep inheritance chain (spec §9).
#[derive(Debug, Clone)]
pub struct Target {
    pub name: Option<String>,
    pub output_path: Option<PathBuf>,
    pub dependencies: Vec<Dependency>,
    pub blocking_dependencies: usize,
    pub blocked_dependents: Vec<TargetId>,
    pub building: bool,
    pub up_to_date: bool,
    pub state: TargetState,
    pub kind: TargetKind,
}

impl Target {
    pub fn new(
        name: Option<String>,
        output_path: Option<PathBuf>,
        dependencies: Vec<Dependency>,
        kind: TargetKind,
    ) -> Target {
        Target {
            name,
            output_path,
            dependencies,
            blocking_dependencies: 0,
            blocked_dependents: Vec::new(),
            building: false,
            up_to_date: false,
            state: TargetState::Fresh,
            kind,
        }
    }

    /// Direct dependencies that are themselves targets, in declaration order
    /// (link order, and fan-out order for `start_build`).
    pub fn target_dependencies(&self) -> impl Iterator<Item = TargetId> + '_ {
        self.dependencies.iter().filter_map(|d| match d {
            Dependency::Target(id) => Some(*id),
            _ => None,
        })
    }
}
