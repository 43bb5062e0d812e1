use std::{collections::HashMap, path::PathBuf};

use thiserror::Error;

use crate::target::Target;

/// Index into a [`TargetArena`]. Targets are never freed, so an id is valid
/// for the lifetime of the arena (spec §3 Lifecycle: "not destroyed until
/// the process exits") — an arena-owned replacement for the original's weak
/// pointers (spec §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(usize);

impl TargetId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TargetRegistrationError {
    #[error("duplicate target name '{0}'")]
    DuplicateName(String),
    #[error("duplicate output path '{0}'")]
    DuplicatePath(PathBuf),
}

/// Owns every target by identity (spec §3 Lifecycle: "Core exclusively owns
/// all targets by identity"). Enforces invariants 1 and 2 (file/name
/// uniqueness) through one flat map shared by every target kind, per the
/// spec's Open Question resolution in §9 ("current code rejects via a flat
/// file-target map — keep that").
#[derive(Debug, Default)]
pub struct TargetArena {
    targets: Vec<Target>,
    by_name: HashMap<String, TargetId>,
    by_path: HashMap<PathBuf, TargetId>,
}

impl TargetArena {
    pub fn new() -> TargetArena {
        TargetArena::default()
    }

    pub fn insert(&mut self, target: Target) -> Result<TargetId, TargetRegistrationError> {
        if let Some(name) = &target.name {
            if self.by_name.contains_key(name) {
                return Err(TargetRegistrationError::DuplicateName(name.clone()));
            }
        }
        if let Some(path) = &target.output_path {
            if self.by_path.contains_key(path) {
                return Err(TargetRegistrationError::DuplicatePath(path.clone()));
            }
        }
        let id = TargetId(self.targets.len());
        if let Some(name) = &target.name {
            self.by_name.insert(name.clone(), id);
        }
        if let Some(path) = &target.output_path {
            self.by_path.insert(path.clone(), id);
        }
        self.targets.push(target);
        Ok(id)
    }

    pub fn get(&self, id: TargetId) -> &Target {
        &self.targets[id.0]
    }

    pub fn get_mut(&mut self, id: TargetId) -> &mut Target {
        &mut self.targets[id.0]
    }

    pub fn find_by_name(&self, name: &str) -> Option<TargetId> {
        self.by_name.get(name).copied()
    }

    pub fn find_by_path(&self, path: &std::path::Path) -> Option<TargetId> {
        self.by_path.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = TargetId> {
        (0..self.targets.len()).map(TargetId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{ExecutablePayload, TargetKind};

    fn exe(name: &str) -> Target {
        Target::new(
            Some(name.to_string()),
            None,
            Vec::new(),
            TargetKind::Executable(ExecutablePayload::default()),
        )
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut arena = TargetArena::new();
        arena.insert(exe("app")).unwrap();
        let err = arena.insert(exe("app")).unwrap_err();
        assert_eq!(err, TargetRegistrationError::DuplicateName("app".to_string()));
    }

    #[test]
    fn duplicate_output_path_is_rejected_across_kinds() {
        let mut arena = TargetArena::new();
        let mut a = exe("a");
        a.output_path = Some(PathBuf::from("out/bin/app"));
        arena.insert(a).unwrap();
        let mut b = Target::new(
            Some("b".to_string()),
            Some(PathBuf::from("out/bin/app")),
            Vec::new(),
            TargetKind::DynLib(crate::kind::DynLibPayload::for_name("b")),
        );
        b.name = Some("b".to_string());
        let err = arena.insert(b).unwrap_err();
        assert_eq!(
            err,
            TargetRegistrationError::DuplicatePath(PathBuf::from("out/bin/app"))
        );
    }

    #[test]
    fn find_by_name_and_path_roundtrip() {
        let mut arena = TargetArena::new();
        let mut t = exe("app");
        t.output_path = Some(PathBuf::from("out/bin/app"));
        let id = arena.insert(t).unwrap();
        assert_eq!(arena.find_by_name("app"), Some(id));
        assert_eq!(arena.find_by_path(std::path::Path::new("out/bin/app")), Some(id));
    }
}
