//! Property tests for the usage analyzer.

use std::path::PathBuf;

use kiln_config::TreeShakingMode;
use kiln_graph::{
    Export, Import, ImportKind, ImportSpecifier, Liveness, Module, ModuleGraph, ModuleId,
    SourceSpan, SourceType, UsageAnalyzer,
};
use proptest::prelude::*;

const EXPORTS: [&str; 3] = ["a", "b", "c"];

/// (target index, kind selector, imported export index)
type EdgeSpec = (usize, u8, usize);

fn id(index: usize) -> ModuleId {
    ModuleId::new_virtual(format!("m{index}.js"))
}

/// Module `i` may only import modules with a larger index, plus optional
/// back edges, so every module is reachable from `m0`.
fn graph_from(size: usize, effects: &[bool], edges: &[Vec<EdgeSpec>]) -> ModuleGraph {
    let graph = ModuleGraph::new();
    let mut wiring = Vec::new();

    for index in 0..size {
        let mut imports = Vec::new();
        if index + 1 < size {
            imports.push(
                Import::new(
                    format!("./m{}.js", index + 1),
                    vec![],
                    ImportKind::Static,
                    SourceSpan::default(),
                )
                .resolved(id(index + 1)),
            );
        }
        for (target, kind, export) in edges.get(index).into_iter().flatten() {
            let target = target % size;
            let (kind, specifiers) = match kind % 4 {
                0 => (
                    ImportKind::Static,
                    vec![ImportSpecifier::Named(EXPORTS[export % 3].to_string())],
                ),
                1 => (
                    ImportKind::Static,
                    vec![ImportSpecifier::Namespace("ns".to_string())],
                ),
                2 => (ImportKind::Require, vec![]),
                _ => (ImportKind::Dynamic, vec![]),
            };
            imports.push(
                Import::new(format!("./m{target}.js"), specifiers, kind, SourceSpan::default())
                    .resolved(id(target)),
            );
        }
        for import in &imports {
            if let Some(to) = &import.resolved_to {
                wiring.push((id(index), to.clone(), import.kind.is_dynamic()));
            }
        }

        let exports = EXPORTS
            .iter()
            .map(|name| Export::named(*name, *name, SourceSpan::default()))
            .collect();
        graph.add_module(
            Module::builder(id(index), PathBuf::from(format!("m{index}.js")), SourceType::JavaScript)
                .imports(imports)
                .exports(exports)
                .side_effects(effects.get(index).copied().unwrap_or(false))
                .build(),
        );
    }

    for (from, to, dynamic) in wiring {
        if dynamic {
            graph.add_dynamic_edge(from, to).unwrap();
        } else {
            graph.add_static_edge(from, to).unwrap();
        }
    }
    graph.add_entry_point("main", id(0)).unwrap();
    graph
}

fn liveness(graph: &ModuleGraph) -> Vec<(ModuleId, String, Liveness)> {
    graph
        .modules()
        .iter()
        .flat_map(|module| {
            module
                .exports_iter()
                .map(|export| (module.id.clone(), export.name.clone(), export.liveness))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn edges_strategy() -> impl Strategy<Value = Vec<Vec<EdgeSpec>>> {
    prop::collection::vec(
        prop::collection::vec((0usize..8, 0u8..4, 0usize..3), 0..3),
        1..8,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: analyzing twice yields identical liveness marks.
    #[test]
    fn analysis_is_idempotent(
        size in 1usize..8,
        effects in prop::collection::vec(any::<bool>(), 8),
        edges in edges_strategy(),
        aggressive in any::<bool>(),
    ) {
        let graph = graph_from(size, &effects, &edges);
        let mode = if aggressive { TreeShakingMode::Aggressive } else { TreeShakingMode::Conservative };
        let analyzer = UsageAnalyzer::new(mode);

        let first = analyzer.analyze(&graph);
        graph.apply_usage(&first);
        let marks = liveness(&graph);

        let second = analyzer.analyze(&graph);
        graph.apply_usage(&second);

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(marks, liveness(&graph));
    }

    /// Property: every entry and dynamic target is retained, and in
    /// conservative mode so is every side-effecting module.
    #[test]
    fn roots_and_side_effects_are_retained(
        size in 1usize..8,
        effects in prop::collection::vec(any::<bool>(), 8),
        edges in edges_strategy(),
    ) {
        let graph = graph_from(size, &effects, &edges);
        let report = UsageAnalyzer::new(TreeShakingMode::Conservative).analyze(&graph);

        prop_assert!(report.retained(&id(0)));
        for target in graph.dynamic_targets() {
            prop_assert!(report.retained(&target));
        }
        for module in graph.modules() {
            if module.has_side_effects {
                prop_assert!(report.retained(&module.id));
            }
        }
    }
}
