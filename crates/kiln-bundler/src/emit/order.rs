//! Emission order of a chunk's members.

use kiln_graph::{ModuleGraph, ModuleId};
use rustc_hash::FxHashSet;

use crate::chunk::Chunk;

/// Depth-first post-order over static edges between members of `chunk`.
///
/// Dependencies come before their importers; ties follow discovery order and
/// a visited set breaks cycles.
pub fn member_order(graph: &ModuleGraph, chunk: &Chunk) -> Vec<ModuleId> {
    let members: FxHashSet<&ModuleId> = chunk.modules.iter().collect();
    let mut visited: FxHashSet<ModuleId> = FxHashSet::default();
    let mut order = Vec::with_capacity(chunk.modules.len());

    for start in &chunk.modules {
        if visited.contains(start) {
            continue;
        }
        visited.insert(start.clone());

        // (module, its in-chunk dependencies, next dependency index)
        let mut stack = vec![(start.clone(), in_chunk_deps(graph, start, &members), 0usize)];
        while let Some((module, deps, next)) = stack.last_mut() {
            if let Some(dep) = deps.get(*next) {
                *next += 1;
                if visited.insert(dep.clone()) {
                    let dep = dep.clone();
                    let dep_deps = in_chunk_deps(graph, &dep, &members);
                    stack.push((dep, dep_deps, 0));
                }
            } else {
                order.push(module.clone());
                stack.pop();
            }
        }
    }

    order
}

fn in_chunk_deps(
    graph: &ModuleGraph,
    id: &ModuleId,
    members: &FxHashSet<&ModuleId>,
) -> Vec<ModuleId> {
    graph
        .static_dependencies(id)
        .into_iter()
        .filter(|dep| members.contains(dep))
        .collect()
}
