use crate::{arena::TargetArena, dependency::Dependency};

/// Resolves every `UndeterminedLib` placeholder to either a `Target` (if a
/// target by that name exists) or a `ForeignLib` (spec §3: "resolved during
/// validation to either a known Target or a ForeignLib").
pub fn resolve_undetermined_libs(arena: &mut TargetArena) {
    for id in arena.ids() {
        let deps = arena.get(id).dependencies.clone();
        let mut changed = false;
        let resolved: Vec<Dependency> = deps
            .into_iter()
            .map(|dep| match dep {
                Dependency::UndeterminedLib(name) => {
                    changed = true;
                    match arena.find_by_name(&name) {
                        Some(target_id) => Dependency::Target(target_id),
                        None => Dependency::ForeignLib(name),
                    }
                }
                other => other,
            })
            .collect();
        if changed {
            arena.get_mut(id).dependencies = resolved;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        kind::{ExecutablePayload, TargetKind},
        target::Target,
    };

    #[test]
    fn undetermined_lib_resolves_to_known_target() {
        let mut arena = TargetArena::new();
        let greet = arena
            .insert(Target::new(
                Some("greet".to_string()),
                None,
                Vec::new(),
                TargetKind::DynLib(crate::kind::DynLibPayload::for_name("greet")),
            ))
            .unwrap();
        let hello = arena
            .insert(Target::new(
                Some("hello".to_string()),
                None,
                vec![Dependency::UndeterminedLib("greet".to_string())],
                TargetKind::Executable(ExecutablePayload::default()),
            ))
            .unwrap();

        resolve_undetermined_libs(&mut arena);
        assert_eq!(arena.get(hello).dependencies, vec![Dependency::Target(greet)]);
    }

    #[test]
    fn undetermined_lib_with_no_matching_target_becomes_foreign() {
        let mut arena = TargetArena::new();
        let hello = arena
            .insert(Target::new(
                Some("hello".to_string()),
                None,
                vec![Dependency::UndeterminedLib("pthread".to_string())],
                TargetKind::Executable(ExecutablePayload::default()),
            ))
            .unwrap();

        resolve_undetermined_libs(&mut arena);
        assert_eq!(
            arena.get(hello).dependencies,
            vec![Dependency::ForeignLib("pthread".to_string())]
        );
    }
}
