//! Query methods for ModuleGraph.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use super::super::{Module, ModuleId};
use super::graph::ModuleGraph;
use crate::error::{GraphError, Result};

impl ModuleGraph {
    /// Retrieve a module by ID.
    pub fn module(&self, id: &ModuleId) -> Option<Arc<Module>> {
        self.inner.read().modules.get(id).cloned()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.inner.read().modules.contains_key(id)
    }

    /// All modules in discovery order.
    pub fn modules(&self) -> Vec<Arc<Module>> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.modules.get(id).cloned())
            .collect()
    }

    /// All module ids in discovery order.
    pub fn module_ids(&self) -> Vec<ModuleId> {
        self.inner.read().order.clone()
    }

    /// Eager dependencies of a module, in source order.
    pub fn static_dependencies(&self, id: &ModuleId) -> Vec<ModuleId> {
        self.inner
            .read()
            .static_deps
            .get(id)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Lazy dependencies of a module, in source order.
    pub fn dynamic_dependencies(&self, id: &ModuleId) -> Vec<ModuleId> {
        self.inner
            .read()
            .dynamic_deps
            .get(id)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Modules importing `id` through either edge kind.
    pub fn dependents(&self, id: &ModuleId) -> Vec<ModuleId> {
        self.inner
            .read()
            .dependents
            .get(id)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every dynamic-import target, ordered by the target's discovery order.
    pub fn dynamic_targets(&self) -> Vec<ModuleId> {
        let inner = self.inner.read();
        let targets: IndexSet<&ModuleId> = inner.dynamic_deps.values().flatten().collect();
        inner
            .order
            .iter()
            .filter(|id| targets.contains(id))
            .cloned()
            .collect()
    }

    /// Named entries in declaration order.
    pub fn entry_points(&self) -> IndexMap<String, Vec<ModuleId>> {
        self.inner.read().entry_points.clone()
    }

    /// Entry modules across all entries, first occurrence wins.
    pub fn entry_modules(&self) -> Vec<ModuleId> {
        let inner = self.inner.read();
        let unique: IndexSet<&ModuleId> = inner.entry_points.values().flatten().collect();
        unique.into_iter().cloned().collect()
    }

    pub fn is_entry(&self, id: &ModuleId) -> bool {
        self.inner
            .read()
            .entry_points
            .values()
            .any(|modules| modules.contains(id))
    }

    /// Total number of modules in the graph.
    pub fn len(&self) -> usize {
        self.inner.read().modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().modules.is_empty()
    }

    /// Number of distinct edges, static plus dynamic.
    pub fn edge_count(&self) -> usize {
        let inner = self.inner.read();
        inner.static_deps.values().map(IndexSet::len).sum::<usize>()
            + inner.dynamic_deps.values().map(IndexSet::len).sum::<usize>()
    }

    /// Check that every edge endpoint and entry module exists and that no
    /// entry is empty.
    pub fn validate(&self) -> Result<()> {
        let inner = self.inner.read();

        for (from, deps) in inner.static_deps.iter().chain(inner.dynamic_deps.iter()) {
            for to in deps {
                if !inner.modules.contains_key(from) || !inner.modules.contains_key(to) {
                    return Err(GraphError::DanglingEdge {
                        from: from.clone(),
                        to: to.clone(),
                    });
                }
            }
        }

        for (name, modules) in &inner.entry_points {
            if modules.is_empty() {
                return Err(GraphError::EmptyEntry(name.clone()));
            }
            if let Some(missing) = modules.iter().find(|id| !inner.modules.contains_key(*id)) {
                return Err(GraphError::DanglingEntry {
                    entry: name.clone(),
                    module: missing.clone(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::SourceType;

    fn module(name: &str) -> Module {
        Module::builder(
            ModuleId::new_virtual(name),
            PathBuf::from(name),
            SourceType::JavaScript,
        )
        .build()
    }

    fn id(name: &str) -> ModuleId {
        ModuleId::new_virtual(name)
    }

    #[test]
    fn edges_keep_insertion_order_and_dedupe() {
        let graph = ModuleGraph::from_modules(["a", "c", "b"].map(module));
        graph.add_static_edge(id("a"), id("c")).unwrap();
        graph.add_static_edge(id("a"), id("b")).unwrap();
        graph.add_static_edge(id("a"), id("c")).unwrap();
        graph.add_dynamic_edge(id("c"), id("b")).unwrap();

        assert_eq!(graph.static_dependencies(&id("a")), vec![id("c"), id("b")]);
        assert_eq!(graph.dynamic_dependencies(&id("c")), vec![id("b")]);
        assert_eq!(graph.dependents(&id("b")), vec![id("a"), id("c")]);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.dynamic_targets(), vec![id("b")]);
    }

    #[test]
    fn edge_to_unknown_module_is_rejected() {
        let graph = ModuleGraph::from_modules([module("a")]);
        let err = graph.add_static_edge(id("a"), id("ghost")).unwrap_err();
        assert!(matches!(err, GraphError::DanglingEdge { .. }));
    }

    #[test]
    fn entries_mark_modules() {
        let graph = ModuleGraph::from_modules(["a", "b"].map(module));
        graph.add_entry_point("main", id("a")).unwrap();
        graph.add_entry_point("other", id("b")).unwrap();
        graph.add_entry_point("other", id("a")).unwrap();

        assert!(graph.module(&id("a")).unwrap().is_entry);
        assert_eq!(graph.entry_modules(), vec![id("a"), id("b")]);
        assert_eq!(
            graph.entry_points().keys().collect::<Vec<_>>(),
            vec!["main", "other"]
        );
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn modules_follow_insertion_order() {
        let graph = ModuleGraph::from_modules(["z", "a", "m"].map(module));
        let names: Vec<_> = graph
            .modules()
            .iter()
            .map(|m| m.id.to_string())
            .collect();
        assert_eq!(names, vec!["virtual:z", "virtual:a", "virtual:m"]);
    }
}
