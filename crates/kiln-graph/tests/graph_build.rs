//! End-to-end graph construction over in-memory and on-disk sources.

#![allow(clippy::disallowed_methods)]

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use kiln_config::{EntrySpec, ResolveOptions};
use kiln_graph::{
    GraphBuilder, GraphError, ImportKind, MemoryRuntime, ModuleGraph, ModuleId, NativeRuntime,
    SourceTransform, TransformError, TransformPipeline, ModuleSource,
};

fn entries(pairs: &[(&str, &str)]) -> IndexMap<String, EntrySpec> {
    pairs
        .iter()
        .map(|(name, spec)| (name.to_string(), EntrySpec::from(*spec)))
        .collect()
}

fn id(path: &str) -> ModuleId {
    ModuleId::from_resolved(path)
}

async fn build(runtime: MemoryRuntime, pairs: &[(&str, &str)]) -> Result<ModuleGraph, GraphError> {
    GraphBuilder::new(Arc::new(runtime), "/app", ResolveOptions::default())
        .build(&entries(pairs))
        .await
}

#[tokio::test]
async fn static_cycle_terminates() {
    let runtime = MemoryRuntime::new("/app")
        .with_file("main.js", "import { x } from './x.js'; console.log(x);")
        .with_file("x.js", "import { y } from './y.js'; export const x = () => y;")
        .with_file("y.js", "import { x } from './x.js'; export const y = () => x;");

    let graph = build(runtime, &[("main", "./main.js")]).await.unwrap();

    assert_eq!(graph.len(), 3);
    assert_eq!(
        graph.find_static_cycles(),
        vec![vec![id("/app/x.js"), id("/app/y.js")]]
    );
}

#[tokio::test]
async fn dynamic_imports_become_dynamic_edges() {
    let runtime = MemoryRuntime::new("/app")
        .with_file(
            "main.js",
            "import { a } from './a.js';\n\
             if (location.hash) { import(/* webpackChunkName: \"b\" */ './b.js'); }",
        )
        .with_file("a.js", "export const a = 1;")
        .with_file("b.js", "import { a } from './a.js'; export default a;");

    let graph = build(runtime, &[("main", "./main.js")]).await.unwrap();

    assert_eq!(graph.static_dependencies(&id("/app/main.js")), vec![id("/app/a.js")]);
    assert_eq!(graph.dynamic_dependencies(&id("/app/main.js")), vec![id("/app/b.js")]);
    assert_eq!(graph.static_dependencies(&id("/app/b.js")), vec![id("/app/a.js")]);

    let main = graph.module(&id("/app/main.js")).unwrap();
    let lazy = main.dynamic_imports().next().unwrap();
    assert_eq!(lazy.chunk_hint.as_deref(), Some("b"));
    assert_eq!(lazy.resolved_to, Some(id("/app/b.js")));
}

#[tokio::test]
async fn unresolvable_import_aborts_with_origin() {
    let runtime = MemoryRuntime::new("/app").with_file("main.js", "import './missing';");

    let err = build(runtime, &[("main", "./main.js")]).await.unwrap_err();
    match err {
        GraphError::Resolution(err) => {
            assert_eq!(err.specifier, "./missing");
            assert_eq!(err.origin, Path::new("/app/main.js"));
        }
        other => panic!("expected resolution error, got {other}"),
    }
}

#[tokio::test]
async fn syntax_error_reports_location() {
    let runtime = MemoryRuntime::new("/app")
        .with_file("main.js", "import './a.js';")
        .with_file("a.js", "export const ok = 1;\nexport const = ;");

    let err = build(runtime, &[("main", "./main.js")]).await.unwrap_err();
    match err {
        GraphError::Parse(err) => {
            assert_eq!(err.module, id("/app/a.js"));
            assert_eq!(err.line, 2);
        }
        other => panic!("expected parse error, got {other}"),
    }
}

#[tokio::test]
async fn type_only_imports_are_not_followed() {
    let runtime = MemoryRuntime::new("/app")
        .with_file("main.ts", "import type { Props } from './types';\nexport const p = 1;");

    let graph = build(runtime, &[("main", "./main.ts")]).await.unwrap();
    let main = graph.module(&id("/app/main.ts")).unwrap();
    assert_eq!(graph.len(), 1);
    assert_eq!(main.imports[0].kind, ImportKind::TypeOnly);
    assert!(main.imports[0].resolved_to.is_none());
}

#[tokio::test]
async fn repeated_builds_are_identical() {
    let runtime = MemoryRuntime::new("/app")
        .with_file("a.js", "import './shared.js'; import './only-a.js';")
        .with_file("b.js", "import './shared.js'; import('./lazy.js');")
        .with_file("shared.js", "export const s = 1;")
        .with_file("only-a.js", "export const o = 1;")
        .with_file("lazy.js", "import './shared.js';");

    let pairs = [("a", "./a.js"), ("b", "./b.js")];
    let first = build(runtime.clone(), &pairs).await.unwrap();
    let second = GraphBuilder::new(Arc::new(runtime), "/app", ResolveOptions::default())
        .parallel_jobs(1)
        .build(&entries(&pairs))
        .await
        .unwrap();

    let snapshot = |graph: &ModuleGraph| {
        graph
            .modules()
            .iter()
            .map(|m| (m.id.clone(), m.discovery_order, graph.static_dependencies(&m.id)))
            .collect::<Vec<_>>()
    };
    assert_eq!(snapshot(&first), snapshot(&second));
    assert_eq!(
        first.entry_points().keys().collect::<Vec<_>>(),
        vec!["a", "b"]
    );
}

struct ReplaceMarker;

impl SourceTransform for ReplaceMarker {
    fn name(&self) -> &str {
        "replace-marker"
    }

    fn transform(&self, mut source: ModuleSource) -> Result<ModuleSource, TransformError> {
        source.code = source.code.replace("__DEP__", "./dep.js");
        Ok(source)
    }
}

#[tokio::test]
async fn transforms_run_before_parsing() {
    let runtime = MemoryRuntime::new("/app")
        .with_file("main.js", "import '__DEP__';")
        .with_file("dep.js", "");

    let mut pipeline = TransformPipeline::new();
    pipeline.push(Arc::new(ReplaceMarker));

    let graph = GraphBuilder::new(Arc::new(runtime), "/app", ResolveOptions::default())
        .transforms(pipeline)
        .build(&entries(&[("main", "./main.js")]))
        .await
        .unwrap();
    assert!(graph.contains(&id("/app/dep.js")));
}

#[tokio::test]
async fn builds_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("node_modules/react")).unwrap();
    std::fs::write(
        root.join("node_modules/react/package.json"),
        r#"{"main": "index.js"}"#,
    )
    .unwrap();
    std::fs::write(root.join("node_modules/react/index.js"), "module.exports = {};").unwrap();
    std::fs::write(
        root.join("page.js"),
        "var React = require('react');\nexport default React;",
    )
    .unwrap();

    let graph = GraphBuilder::new(Arc::new(NativeRuntime::new()), root, ResolveOptions::default())
        .build(&entries(&[("page", "./page.js"), ("react", "react")]))
        .await
        .unwrap();

    let react = ModuleId::from_resolved(root.join("node_modules/react/index.js"));
    assert!(graph.is_entry(&react));
    assert_eq!(graph.entry_modules().len(), 2);
    assert_eq!(graph.dependents(&react).len(), 1);
}
