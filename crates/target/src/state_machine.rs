use crate::{
    arena::{TargetArena, TargetId},
    target::TargetState,
};

/// `start_build(dependent?)` (spec §4.4). If `id` is already up to date this
/// run, immediately notifies `dependent` (if any) and returns. Otherwise
/// fans out `start_build` to every dependency target; targets whose fan-out
/// bottoms out here (zero dependency targets) are appended to `ready` in
/// the order they become buildable — callers drain `ready` by asking
/// `MetadataStore` whether each needs a rebuild and either enqueuing a tool
/// job or calling [`finalize_metadata`] directly.
pub fn start_build(arena: &mut TargetArena, id: TargetId, dependent: Option<TargetId>, ready: &mut Vec<TargetId>) {
    if arena.get(id).up_to_date {
        if let Some(dependent) = dependent {
            dependency_updated(arena, dependent, ready);
        }
        return;
    }

    if let Some(dependent) = dependent {
        arena.get_mut(id).blocked_dependents.push(dependent);
    }

    if arena.get(id).building {
        return;
    }

    arena.get_mut(id).building = true;
    arena.get_mut(id).state = TargetState::Building;

    let dep_targets: Vec<TargetId> = arena.get(id).target_dependencies().collect();
    arena.get_mut(id).blocking_dependencies = dep_targets.len();
    arena.get_mut(id).state = TargetState::WaitingDeps;

    if dep_targets.is_empty() {
        enter_dependencies_ready(arena, id, ready);
        return;
    }

    for dep_id in dep_targets {
        start_build(arena, dep_id, Some(id), ready);
    }
}

fn enter_dependencies_ready(arena: &mut TargetArena, id: TargetId, ready: &mut Vec<TargetId>) {
    arena.get_mut(id).state = TargetState::DependenciesReady;
    ready.push(id);
}

/// `dependency_updated` (spec §4.4): decrements `blocking_dependencies`;
/// when it reaches zero exactly once, appends `id` to `ready`.
pub fn dependency_updated(arena: &mut TargetArena, id: TargetId, ready: &mut Vec<TargetId>) {
    let t = arena.get_mut(id);
    debug_assert!(t.blocking_dependencies > 0, "dependency_updated called more times than blocking_dependencies allows");
    t.blocking_dependencies = t.blocking_dependencies.saturating_sub(1);
    if t.blocking_dependencies == 0 {
        enter_dependencies_ready(arena, id, ready);
    }
}

/// Advances `id` into `RUNNING_TOOL_JOB` (spec §4.4). Pure bookkeeping; the
/// caller (complemake-core) is responsible for actually obtaining the Tool
/// and enqueuing the job.
pub fn begin_tool_job(arena: &mut TargetArena, id: TargetId) {
    arena.get_mut(id).state = TargetState::RunningToolJob;
}

/// `FINALIZE_METADATA` (spec §4.4): marks `id` up to date, clears
/// `building`, and releases every blocked dependent exactly once, appending
/// any that become ready to `ready`.
pub fn finalize_metadata(arena: &mut TargetArena, id: TargetId, ready: &mut Vec<TargetId>) {
    arena.get_mut(id).state = TargetState::FinalizeMetadata;
    let dependents = std::mem::take(&mut arena.get_mut(id).blocked_dependents);
    {
        let t = arena.get_mut(id);
        t.up_to_date = true;
        t.building = false;
        t.state = TargetState::UpToDate;
    }
    for dependent in dependents {
        dependency_updated(arena, dependent, ready);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dependency::Dependency,
        kind::{ExecutablePayload, TargetKind},
        target::Target,
    };

    fn exe(name: &str, deps: Vec<Dependency>) -> Target {
        Target::new(
            Some(name.to_string()),
            None,
            deps,
            TargetKind::Executable(ExecutablePayload::default()),
        )
    }

    #[test]
    fn leaf_target_becomes_ready_synchronously() {
        let mut arena = TargetArena::new();
        let a = arena.insert(exe("a", Vec::new())).unwrap();
        let mut ready = Vec::new();
        start_build(&mut arena, a, None, &mut ready);
        assert_eq!(ready, vec![a]);
        assert_eq!(arena.get(a).state, TargetState::DependenciesReady);
    }

    #[test]
    fn chain_becomes_ready_leaf_first_then_propagates_on_finalize() {
        let mut arena = TargetArena::new();
        let a = arena.insert(exe("a", Vec::new())).unwrap();
        let b = arena.insert(exe("b", vec![Dependency::Target(a)])).unwrap();

        let mut ready = Vec::new();
        start_build(&mut arena, b, None, &mut ready);
        // Only the leaf is ready; b is still waiting on a.
        assert_eq!(ready, vec![a]);
        assert_eq!(arena.get(b).blocking_dependencies, 1);

        ready.clear();
        finalize_metadata(&mut arena, a, &mut ready);
        assert_eq!(ready, vec![b]);
        assert!(arena.get(a).up_to_date);
        assert_eq!(arena.get(b).blocking_dependencies, 0);
    }

    #[test]
    fn diamond_dependency_builds_shared_target_once() {
        // b and c both depend on a; d depends on b and c.
        let mut arena = TargetArena::new();
        let a = arena.insert(exe("a", Vec::new())).unwrap();
        let b = arena.insert(exe("b", vec![Dependency::Target(a)])).unwrap();
        let c = arena.insert(exe("c", vec![Dependency::Target(a)])).unwrap();
        let d = arena
            .insert(exe("d", vec![Dependency::Target(b), Dependency::Target(c)]))
            .unwrap();

        let mut ready = Vec::new();
        start_build(&mut arena, d, None, &mut ready);
        // a is fanned out to from both b and c, but start_build on it the
        // second time is a no-op because `building` is already true.
        assert_eq!(ready, vec![a]);

        ready.clear();
        finalize_metadata(&mut arena, a, &mut ready);
        // a's single finalize releases both b and c exactly once each.
        assert_eq!(ready, vec![b, c]);

        ready.clear();
        finalize_metadata(&mut arena, b, &mut ready);
        assert!(ready.is_empty());
        finalize_metadata(&mut arena, c, &mut ready);
        assert_eq!(ready, vec![d]);
    }

    #[test]
    fn already_up_to_date_target_notifies_dependent_immediately() {
        let mut arena = TargetArena::new();
        let a = arena.insert(exe("a", Vec::new())).unwrap();
        let b = arena.insert(exe("b", vec![Dependency::Target(a)])).unwrap();

        let mut ready = Vec::new();
        finalize_metadata(&mut arena, a, &mut ready); // pretend a finished in an earlier pass
        ready.clear();

        arena.get_mut(b).blocking_dependencies = 1;
        arena.get_mut(b).state = TargetState::WaitingDeps;
        start_build(&mut arena, a, Some(b), &mut ready);
        assert_eq!(ready, vec![b]);
    }
}
