use std::collections::HashMap;

use crate::arena::{TargetArena, TargetId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCycle {
    /// Every node on the cycle, in order (spec §8 property 1, scenario S2).
    pub cycle: Vec<TargetId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// DFS over target indices (spec §9: "cycle detection is then a DFS over
/// index sets", replacing the original's weak-reference back-pointers).
/// Returns the first cycle found, in the order the DFS walked it.
pub fn find_cycle(arena: &TargetArena) -> Option<DependencyCycle> {
    let mut color: HashMap<TargetId, Color> = arena.ids().map(|id| (id, Color::White)).collect();
    let mut stack = Vec::new();
    for id in arena.ids() {
        if color[&id] == Color::White {
            if let Some(cycle) = visit(arena, id, &mut color, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

fn visit(
    arena: &TargetArena,
    id: TargetId,
    color: &mut HashMap<TargetId, Color>,
    stack: &mut Vec<TargetId>,
) -> Option<DependencyCycle> {
    color.insert(id, Color::Gray);
    stack.push(id);
    for dep_id in arena.get(id).target_dependencies() {
        match color[&dep_id] {
            Color::White => {
                if let Some(cycle) = visit(arena, dep_id, color, stack) {
                    return Some(cycle);
                }
            }
            Color::Gray => {
                let start = stack.iter().position(|x| *x == dep_id).expect("gray node is on stack");
                return Some(DependencyCycle {
                    cycle: stack[start..].to_vec(),
                });
            }
            Color::Black => {}
        }
    }
    stack.pop();
    color.insert(id, Color::Black);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dependency::Dependency,
        kind::{ExecutablePayload, TargetKind},
        target::Target,
    };

    fn named_exe(name: &str, deps: Vec<Dependency>) -> Target {
        Target::new(
            Some(name.to_string()),
            None,
            deps,
            TargetKind::Executable(ExecutablePayload::default()),
        )
    }

    #[test]
    fn acyclic_graph_reports_none() {
        let mut arena = TargetArena::new();
        let a = arena.insert(named_exe("a", Vec::new())).unwrap();
        arena.insert(named_exe("b", vec![Dependency::Target(a)])).unwrap();
        assert!(find_cycle(&arena).is_none());
    }

    #[test]
    fn three_node_cycle_reported_in_order() {
        let mut arena = TargetArena::new();
        // Reserve ids first since each target's dependency list needs the
        // others' ids up front; insert placeholders then patch dependencies.
        let a = arena.insert(named_exe("a", Vec::new())).unwrap();
        let b = arena.insert(named_exe("b", Vec::new())).unwrap();
        let c = arena.insert(named_exe("c", Vec::new())).unwrap();
        arena.get_mut(a).dependencies.push(Dependency::Target(b));
        arena.get_mut(b).dependencies.push(Dependency::Target(c));
        arena.get_mut(c).dependencies.push(Dependency::Target(a));

        let cycle = find_cycle(&arena).expect("cycle must be detected");
        assert_eq!(cycle.cycle, vec![a, b, c]);
    }

    #[test]
    fn self_loop_is_a_cycle_of_one() {
        let mut arena = TargetArena::new();
        let a = arena.insert(named_exe("a", Vec::new())).unwrap();
        arena.get_mut(a).dependencies.push(Dependency::Target(a));
        let cycle = find_cycle(&arena).unwrap();
        assert_eq!(cycle.cycle, vec![a]);
    }
}
