//! Dependency graph construction.
//!
//! A coordinator owns the visited set and is the only writer; module tasks
//! run on a `JoinSet` bounded by a semaphore and each reads, transforms,
//! parses and resolves one module. Completion order is nondeterministic, so
//! the finished graph is assembled afterwards in a fixed breadth-first order,
//! and module depth (for the depth guard) is measured there as well.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use kiln_config::{BundleOptions, EntrySpec, ResolveOptions};
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{GraphError, Result};
use crate::parser::{ModuleParser, OxcParser};
use crate::resolver::ModuleResolver;
use crate::runtime::Runtime;
use crate::transform::{ModuleSource, TransformPipeline};
use crate::{CancelFlag, Module, ModuleGraph, ModuleId, SourceType};

/// Builds a [`ModuleGraph`] from named entries.
#[derive(Clone)]
pub struct GraphBuilder {
    runtime: Arc<dyn Runtime>,
    resolver: Arc<ModuleResolver>,
    parser: Arc<dyn ModuleParser>,
    transforms: TransformPipeline,
    max_depth: usize,
    parallel_jobs: usize,
    cancel: CancelFlag,
}

/// Shared state handed to every module task.
struct LoadContext {
    runtime: Arc<dyn Runtime>,
    resolver: Arc<ModuleResolver>,
    parser: Arc<dyn ModuleParser>,
    transforms: TransformPipeline,
    cancel: CancelFlag,
}

impl GraphBuilder {
    pub fn new(runtime: Arc<dyn Runtime>, cwd: impl Into<PathBuf>, resolve: ResolveOptions) -> Self {
        let resolver = Arc::new(ModuleResolver::new(Arc::clone(&runtime), cwd, resolve));
        Self {
            runtime,
            resolver,
            parser: Arc::new(OxcParser::new()),
            transforms: TransformPipeline::new(),
            max_depth: 1024,
            parallel_jobs: num_cpus::get(),
            cancel: CancelFlag::new(),
        }
    }

    /// Builder configured from bundle options. The project root is
    /// `options.cwd`, anchored at the runtime's working directory when
    /// relative or absent.
    pub fn from_options(runtime: Arc<dyn Runtime>, options: &BundleOptions) -> Result<Self> {
        let runtime_cwd = runtime.get_cwd().map_err(|source| GraphError::Runtime {
            path: PathBuf::from("."),
            source,
        })?;
        let cwd = match &options.cwd {
            Some(cwd) if cwd.is_absolute() => cwd.clone(),
            Some(cwd) => runtime_cwd.join(cwd),
            None => runtime_cwd,
        };
        Ok(Self::new(runtime, cwd, options.resolve.clone()).max_depth(options.max_depth))
    }

    pub fn parser(mut self, parser: Arc<dyn ModuleParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn transforms(mut self, transforms: TransformPipeline) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Worker pool size; zero is treated as one.
    pub fn parallel_jobs(mut self, jobs: usize) -> Self {
        self.parallel_jobs = jobs.max(1);
        self
    }

    pub fn cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cwd(&self) -> &Path {
        self.resolver.cwd()
    }

    /// Resolve the entries, then load every module reachable from them.
    pub async fn build(&self, entries: &IndexMap<String, EntrySpec>) -> Result<ModuleGraph> {
        let mut roots: Vec<(String, Vec<ModuleId>)> = Vec::with_capacity(entries.len());
        for (name, spec) in entries {
            let mut ids = Vec::new();
            for specifier in spec.specifiers() {
                let id = self.resolver.resolve_entry(specifier).await?;
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            if ids.is_empty() {
                return Err(GraphError::EmptyEntry(name.clone()));
            }
            roots.push((name.clone(), ids));
        }
        tracing::info!(entries = roots.len(), "resolved entries");

        let loaded = self.load_all(&roots).await?;
        let graph = assemble(&roots, loaded, self.max_depth)?;

        tracing::info!(
            modules = graph.len(),
            edges = graph.edge_count(),
            "module graph built"
        );
        Ok(graph)
    }

    async fn load_all(&self, roots: &[(String, Vec<ModuleId>)]) -> Result<FxHashMap<ModuleId, Module>> {
        let context = Arc::new(LoadContext {
            runtime: Arc::clone(&self.runtime),
            resolver: Arc::clone(&self.resolver),
            parser: Arc::clone(&self.parser),
            transforms: self.transforms.clone(),
            cancel: self.cancel.clone(),
        });
        let semaphore = Arc::new(Semaphore::new(self.parallel_jobs));
        let mut join_set: JoinSet<Result<Module>> = JoinSet::new();
        let mut visited: FxHashSet<ModuleId> = FxHashSet::default();
        let mut loaded: FxHashMap<ModuleId, Module> = FxHashMap::default();

        let spawn = |join_set: &mut JoinSet<Result<Module>>, id: ModuleId| {
            let context = Arc::clone(&context);
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| GraphError::Worker(e.to_string()))?;
                load_module(&context, id).await
            });
        };

        for id in roots.iter().flat_map(|(_, ids)| ids) {
            if visited.insert(id.clone()) {
                spawn(&mut join_set, id.clone());
            }
        }

        while let Some(joined) = join_set.join_next().await {
            let module = match joined {
                Ok(Ok(module)) => module,
                Ok(Err(err)) => {
                    join_set.abort_all();
                    return Err(err);
                }
                Err(join_err) => {
                    join_set.abort_all();
                    return Err(GraphError::Worker(join_err.to_string()));
                }
            };

            if self.cancel.is_cancelled() {
                join_set.abort_all();
                return Err(GraphError::Cancelled);
            }

            for target in module.imports_iter().filter_map(|imp| imp.resolved_to.as_ref()) {
                if visited.insert(target.clone()) {
                    spawn(&mut join_set, target.clone());
                }
            }

            tracing::debug!(module = %module.id, imports = module.imports.len(), "loaded module");
            loaded.insert(module.id.clone(), module);
        }

        if self.cancel.is_cancelled() {
            return Err(GraphError::Cancelled);
        }
        Ok(loaded)
    }
}

impl std::fmt::Debug for GraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("cwd", &self.resolver.cwd())
            .field("transforms", &self.transforms.len())
            .field("max_depth", &self.max_depth)
            .field("parallel_jobs", &self.parallel_jobs)
            .finish_non_exhaustive()
    }
}

/// Read, transform, parse and resolve a single module.
async fn load_module(context: &LoadContext, id: ModuleId) -> Result<Module> {
    if context.cancel.is_cancelled() {
        return Err(GraphError::Cancelled);
    }

    let path = id.as_path().to_path_buf();
    let bytes = context
        .runtime
        .read_file(&path)
        .await
        .map_err(|source| GraphError::Runtime {
            path: path.clone(),
            source,
        })?;
    let code = String::from_utf8(bytes).map_err(|_| GraphError::InvalidUtf8 { path: path.clone() })?;

    let source = context.transforms.apply(ModuleSource {
        id: id.clone(),
        source_type: SourceType::from_path(&path),
        code,
    })?;

    let parsed = context
        .parser
        .parse(&id, &source.code, source.source_type)?;

    let mut imports = Vec::with_capacity(parsed.imports.len());
    for mut import in parsed.imports {
        if import.kind.is_runtime() {
            let target = context.resolver.resolve(&import.source, &id).await?;
            import.resolved_to = Some(target);
        }
        imports.push(import);
    }

    Ok(Module::builder(id, path, source.source_type)
        .source(source.code)
        .imports(imports)
        .exports(parsed.exports)
        .side_effects(parsed.has_side_effects)
        .build())
}

/// Entry-to-module chain along breadth-first parents.
fn chain_to(parents: &FxHashMap<ModuleId, ModuleId>, id: &ModuleId) -> Vec<ModuleId> {
    let mut chain = vec![id.clone()];
    let mut current = parents.get(id);
    while let Some(parent) = current {
        if chain.contains(parent) {
            break;
        }
        chain.push(parent.clone());
        current = parents.get(parent);
    }
    chain.reverse();
    chain
}

/// Insert modules in breadth-first order from the entries (declaration
/// order, imports in source order), then edges and entries.
///
/// A module's depth is its distance from the nearest entry along that
/// order; anything deeper than `max_depth` fails the build.
fn assemble(
    roots: &[(String, Vec<ModuleId>)],
    mut loaded: FxHashMap<ModuleId, Module>,
    max_depth: usize,
) -> Result<ModuleGraph> {
    let mut order: Vec<ModuleId> = Vec::with_capacity(loaded.len());
    let mut depths: FxHashMap<ModuleId, usize> = FxHashMap::default();
    let mut parents: FxHashMap<ModuleId, ModuleId> = FxHashMap::default();
    let mut queue: VecDeque<ModuleId> = VecDeque::new();
    for id in roots.iter().flat_map(|(_, ids)| ids) {
        if !depths.contains_key(id) {
            depths.insert(id.clone(), 0);
            queue.push_back(id.clone());
        }
    }

    while let Some(id) = queue.pop_front() {
        if let Some(module) = loaded.get(&id) {
            let depth = depths.get(&id).copied().unwrap_or(0) + 1;
            for target in module.imports_iter().filter_map(|imp| imp.resolved_to.as_ref()) {
                if depths.contains_key(target) {
                    continue;
                }
                if depth > max_depth {
                    let mut path = chain_to(&parents, &id);
                    path.push(target.clone());
                    return Err(GraphError::CycleDepthExceeded { max_depth, path });
                }
                depths.insert(target.clone(), depth);
                parents.insert(target.clone(), id.clone());
                queue.push_back(target.clone());
            }
        }
        order.push(id);
    }

    let graph = ModuleGraph::new();
    let mut edges = Vec::new();
    for (index, id) in order.iter().enumerate() {
        let Some(mut module) = loaded.remove(id) else {
            continue;
        };
        module.discovery_order = u32::try_from(index).unwrap_or(u32::MAX);
        for import in module.imports_iter() {
            if let Some(target) = &import.resolved_to {
                edges.push((id.clone(), target.clone(), import.kind.is_dynamic()));
            }
        }
        graph.add_module(module);
    }

    for (from, to, dynamic) in edges {
        if dynamic {
            graph.add_dynamic_edge(from, to)?;
        } else {
            graph.add_static_edge(from, to)?;
        }
    }

    for (name, ids) in roots {
        for id in ids {
            graph.add_entry_point(name.clone(), id.clone())?;
        }
    }

    graph.validate()?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MemoryRuntime;

    fn entries(pairs: &[(&str, &str)]) -> IndexMap<String, EntrySpec> {
        pairs
            .iter()
            .map(|(name, spec)| (name.to_string(), EntrySpec::from(*spec)))
            .collect()
    }

    fn builder(runtime: MemoryRuntime) -> GraphBuilder {
        GraphBuilder::new(Arc::new(runtime), "/app", ResolveOptions::default())
    }

    #[tokio::test]
    async fn discovery_order_is_breadth_first() {
        let runtime = MemoryRuntime::new("/app")
            .with_file("main.js", "import './b.js';\nimport './a.js';")
            .with_file("a.js", "import './c.js';")
            .with_file("b.js", "import './c.js';")
            .with_file("c.js", "export const c = 1;");

        let graph = builder(runtime)
            .build(&entries(&[("main", "./main.js")]))
            .await
            .unwrap();

        let order: Vec<_> = graph
            .modules()
            .iter()
            .map(|m| (m.id.file_stem(), m.discovery_order))
            .collect();
        assert_eq!(
            order,
            vec![
                ("main".to_string(), 0),
                ("b".to_string(), 1),
                ("a".to_string(), 2),
                ("c".to_string(), 3),
            ]
        );
    }

    #[tokio::test]
    async fn depth_guard_reports_chain() {
        let runtime = MemoryRuntime::new("/app")
            .with_file("a.js", "import './b.js';")
            .with_file("b.js", "import './c.js';")
            .with_file("c.js", "");

        let err = builder(runtime)
            .max_depth(1)
            .build(&entries(&[("main", "./a.js")]))
            .await
            .unwrap_err();

        match err {
            GraphError::CycleDepthExceeded { max_depth, path } => {
                assert_eq!(max_depth, 1);
                let stems: Vec<_> = path.iter().map(ModuleId::file_stem).collect();
                assert_eq!(stems, vec!["a", "b", "c"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn depth_is_measured_along_the_shortest_path() {
        let runtime = MemoryRuntime::new("/app")
            .with_file("main.js", "import './long1.js';\nimport './shared.js';")
            .with_file("long1.js", "import './long2.js';")
            .with_file("long2.js", "import './shared.js';")
            .with_file("shared.js", "import './leaf.js';")
            .with_file("leaf.js", "");

        for jobs in [1, 4, 1, 4] {
            let graph = builder(runtime.clone())
                .max_depth(2)
                .parallel_jobs(jobs)
                .build(&entries(&[("main", "./main.js")]))
                .await
                .unwrap();
            assert_eq!(graph.len(), 5);
        }
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let runtime = MemoryRuntime::new("/app").with_file("a.js", "");
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = builder(runtime)
            .cancel_flag(cancel)
            .build(&entries(&[("main", "./a.js")]))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Cancelled));
    }
}
