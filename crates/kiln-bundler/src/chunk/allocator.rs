//! Module-to-chunk partitioning.
//!
//! Entry chunks first, then one lazy chunk per dynamic-import target, then
//! shared-chunk extraction by cache group. A lazy chunk never takes a module
//! its importers already loaded through `require.include`. Every step walks
//! modules and chunks in a fixed order, so identical graphs produce
//! identical plans.

use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use kiln_config::{CacheGroup, SplitChunksOptions};
use kiln_graph::{ImportKind, Module, ModuleGraph, ModuleId, UsageReport};
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

use super::{AllocationError, Chunk, ChunkId, ChunkKind, ChunkPlan};

/// Partitions an analyzed graph into chunks.
#[derive(Debug, Clone)]
pub struct ChunkAllocator {
    groups: Vec<CacheGroup>,
    root: Option<PathBuf>,
}

struct CompiledGroup<'a> {
    group: &'a CacheGroup,
    test: Option<Regex>,
}

impl CompiledGroup<'_> {
    fn qualifies(&self, module: &Module, referencing: usize) -> bool {
        referencing >= self.group.min_chunks
            && module.original_size > self.group.min_size
            && self
                .test
                .as_ref()
                .is_none_or(|test| test.is_match(&module.path.to_string_lossy()))
    }
}

impl ChunkAllocator {
    pub fn new(options: &SplitChunksOptions) -> Self {
        Self {
            groups: options.cache_groups(),
            root: None,
        }
    }

    /// Project root used to derive stable generated chunk names.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn allocate(
        &self,
        graph: &ModuleGraph,
        usage: &UsageReport,
    ) -> Result<ChunkPlan, AllocationError> {
        let groups = self.compile_groups()?;
        let mut state = Allocation::default();

        for (name, modules) in graph.entry_points() {
            let chunk = state.chunk_named(&name, ChunkKind::Entry);
            for module in &modules {
                state.add_root(chunk, module);
            }
        }

        let hints = chunk_hints(graph);
        for target in graph.dynamic_targets() {
            if state.root_chunks.contains_key(&target) {
                continue;
            }
            let name = match hints.get(&target) {
                Some(hint) => hint.clone(),
                None => self.generated_name(&target),
            };
            let chunk = state.chunk_named(&name, ChunkKind::Async);
            state.add_root(chunk, &target);
        }

        let reach: Vec<IndexSet<ModuleId>> = state
            .chunks
            .iter()
            .map(|chunk| graph.static_closure(&chunk.roots))
            .collect();
        let preloaded = preloaded_modules(graph, &state.chunks, &reach);

        for module in graph.modules() {
            if state.root_chunks.contains_key(&module.id) {
                continue;
            }

            let mut referencing: Vec<ChunkId> = reach
                .iter()
                .enumerate()
                .filter(|(_, set)| set.contains(&module.id))
                .map(|(index, _)| ChunkId(index))
                .collect();
            if referencing
                .iter()
                .any(|id| !preloaded[id.0].contains(&module.id))
            {
                referencing.retain(|id| !preloaded[id.0].contains(&module.id));
            }
            let Some(&first) = referencing.first() else {
                continue;
            };

            if !usage.retained(&module.id) {
                state.assign(&module.id, first);
                state.chunks[first.0].eliminated.push(module.id.clone());
                continue;
            }

            if let Some((group, scoped)) = best_candidate(&groups, &state, &module, &referencing) {
                let name = match &group.group.name {
                    Some(name) => name.clone(),
                    None => scoped
                        .iter()
                        .map(|id| state.chunks[id.0].name.as_str())
                        .collect::<Vec<_>>()
                        .join("~"),
                };
                let target = state.chunk_named(&name, ChunkKind::Shared);
                debug!(module = %module.id, chunk = %name, "Extracted shared module");
                state.assign(&module.id, target);
                continue;
            }

            if referencing.len() == 1 {
                state.assign(&module.id, first);
            } else {
                warn!(
                    module = %module.id,
                    size = module.original_size,
                    chunks = referencing.len(),
                    "Duplicating module below the shared-chunk thresholds"
                );
                for chunk in &referencing {
                    state.assign(&module.id, *chunk);
                }
                state.duplicated.insert(module.id.clone());
            }
        }

        state.fill_members(graph, usage);
        state.link(graph, usage, &preloaded);
        state.check(graph)?;

        let plan = state.finish();
        info!(
            chunks = plan.len(),
            shared = plan
                .chunks()
                .iter()
                .filter(|chunk| chunk.kind == ChunkKind::Shared)
                .count(),
            duplicated = plan.duplicated().count(),
            "Allocated chunks"
        );
        Ok(plan)
    }

    fn compile_groups(&self) -> Result<Vec<CompiledGroup<'_>>, AllocationError> {
        self.groups
            .iter()
            .map(|group| {
                let test = group
                    .test
                    .as_deref()
                    .map(|pattern| {
                        Regex::new(pattern).map_err(|err| AllocationError::InvalidGroupTest {
                            pattern: pattern.to_string(),
                            message: err.to_string(),
                        })
                    })
                    .transpose()?;
                Ok(CompiledGroup { group, test })
            })
            .collect()
    }

    fn generated_name(&self, target: &ModuleId) -> String {
        let key = match &self.root {
            Some(root) => target.relative_key(root),
            None => target.relative_key(Path::new("")),
        };
        let hash = blake3::hash(key.as_bytes()).to_hex();
        format!("{}-{}", target.file_stem(), &hash.as_str()[..8])
    }
}

/// Modules already loaded whenever each chunk executes.
///
/// A lazy chunk can rely on what every chunk importing it pulled in through
/// `require.include`, plus whatever those chunks could rely on themselves.
/// Plain static imports of the importer do not count: the importer may
/// still hand them to a shared chunk.
fn preloaded_modules(
    graph: &ModuleGraph,
    chunks: &[Chunk],
    reach: &[IndexSet<ModuleId>],
) -> Vec<FxHashSet<ModuleId>> {
    let included: Vec<IndexSet<ModuleId>> = reach
        .iter()
        .map(|set| {
            let targets: Vec<ModuleId> = set
                .iter()
                .filter_map(|id| graph.module(id))
                .flat_map(|module| {
                    module
                        .imports_iter()
                        .filter(|import| import.kind == ImportKind::Include)
                        .filter_map(|import| import.resolved_to.clone())
                        .collect::<Vec<_>>()
                })
                .collect();
            graph.static_closure(&targets)
        })
        .collect();

    let mut preloaded: Vec<FxHashSet<ModuleId>> = vec![FxHashSet::default(); chunks.len()];
    for (index, chunk) in chunks.iter().enumerate() {
        if chunk.kind != ChunkKind::Async {
            continue;
        }

        let mut common: Option<FxHashSet<ModuleId>> = None;
        for (parent, set) in reach.iter().enumerate() {
            let imports_chunk = parent != index
                && set.iter().any(|id| {
                    graph
                        .dynamic_dependencies(id)
                        .iter()
                        .any(|target| chunk.roots.contains(target))
                });
            if !imports_chunk {
                continue;
            }

            let available: FxHashSet<ModuleId> = included[parent]
                .iter()
                .chain(preloaded[parent].iter())
                .cloned()
                .collect();
            common = Some(match common {
                None => available,
                Some(current) => current.intersection(&available).cloned().collect(),
            });
        }
        preloaded[index] = common.unwrap_or_default();
    }
    preloaded
}

/// First chunk-name hint per dynamic target, importers in discovery order.
fn chunk_hints(graph: &ModuleGraph) -> FxHashMap<ModuleId, String> {
    let mut hints = FxHashMap::default();
    for module in graph.modules() {
        for import in module.dynamic_imports() {
            if let (Some(target), Some(hint)) = (&import.resolved_to, &import.chunk_hint) {
                hints.entry(target.clone()).or_insert_with(|| hint.clone());
            }
        }
    }
    hints
}

/// Best extraction target: the larger referencing set wins, then the set
/// with the earliest-declared chunks, then the earlier group.
fn best_candidate<'g, 'a>(
    groups: &'g [CompiledGroup<'a>],
    state: &Allocation,
    module: &Module,
    referencing: &[ChunkId],
) -> Option<(&'g CompiledGroup<'a>, Vec<ChunkId>)> {
    let mut best: Option<(&CompiledGroup<'a>, Vec<ChunkId>)> = None;

    for group in groups {
        let scoped: Vec<ChunkId> = referencing
            .iter()
            .copied()
            .filter(|id| {
                group
                    .group
                    .chunks
                    .includes(state.chunks[id.0].kind.is_initial())
            })
            .collect();
        if !group.qualifies(module, scoped.len()) {
            continue;
        }

        let better = match &best {
            None => true,
            Some((_, current)) => {
                scoped.len() > current.len() || (scoped.len() == current.len() && scoped < *current)
            }
        };
        if better {
            best = Some((group, scoped));
        }
    }

    best
}

#[derive(Default)]
struct Allocation {
    chunks: Vec<Chunk>,
    by_name: FxHashMap<String, ChunkId>,
    root_chunks: FxHashMap<ModuleId, ChunkId>,
    assignment: IndexMap<ModuleId, Vec<ChunkId>>,
    duplicated: IndexSet<ModuleId>,
}

impl Allocation {
    /// Existing chunk with this name, or a new one of `kind`.
    fn chunk_named(&mut self, name: &str, kind: ChunkKind) -> ChunkId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }

        let id = ChunkId(self.chunks.len());
        self.chunks.push(Chunk {
            id,
            name: name.to_string(),
            kind,
            roots: Vec::new(),
            modules: Vec::new(),
            eliminated: Vec::new(),
            imports: Vec::new(),
            dynamic_imports: Vec::new(),
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Seed `chunk` with `module`. A module seeding several chunks is owned
    /// by the first; the others load it from there.
    fn add_root(&mut self, chunk: ChunkId, module: &ModuleId) {
        let roots = &mut self.chunks[chunk.0].roots;
        if !roots.contains(module) {
            roots.push(module.clone());
        }
        if !self.root_chunks.contains_key(module) {
            self.root_chunks.insert(module.clone(), chunk);
            self.assign(module, chunk);
        }
    }

    fn assign(&mut self, module: &ModuleId, chunk: ChunkId) {
        let chunks = self.assignment.entry(module.clone()).or_default();
        if !chunks.contains(&chunk) {
            chunks.push(chunk);
        }
    }

    /// Emitted members of every chunk, in discovery order.
    fn fill_members(&mut self, graph: &ModuleGraph, usage: &UsageReport) {
        for module in graph.modules() {
            if !usage.retained(&module.id) {
                continue;
            }
            if let Some(chunks) = self.assignment.get(&module.id) {
                for chunk in chunks {
                    self.chunks[chunk.0].modules.push(module.id.clone());
                }
            }
        }
    }

    /// Load-order edges and dynamic-import targets.
    fn link(
        &mut self,
        graph: &ModuleGraph,
        usage: &UsageReport,
        preloaded: &[FxHashSet<ModuleId>],
    ) {
        for index in 0..self.chunks.len() {
            let current = ChunkId(index);
            let chunk = &self.chunks[index];
            let reach = graph.static_closure(chunk.roots.iter().chain(chunk.modules.iter()));
            let available = preloaded.get(index);

            let mut imports: IndexSet<ChunkId> = IndexSet::new();
            for module in &reach {
                if !usage.retained(module)
                    || self.duplicated.contains(module)
                    || available.is_some_and(|set| set.contains(module))
                {
                    continue;
                }
                if let Some(owners) = self.assignment.get(module) {
                    imports.extend(owners.iter().copied().filter(|owner| *owner != current));
                }
            }

            let mut dynamic: IndexSet<ChunkId> = IndexSet::new();
            for module in &chunk.modules {
                for target in graph.dynamic_dependencies(module) {
                    if let Some(owner) = self.root_chunks.get(&target) {
                        if *owner != current {
                            dynamic.insert(*owner);
                        }
                    }
                }
            }

            let mut imports: Vec<ChunkId> = imports.into_iter().collect();
            imports.sort();
            let chunk = &mut self.chunks[index];
            chunk.imports = imports;
            chunk.dynamic_imports = dynamic.into_iter().collect();
            debug!(
                chunk = %chunk.name,
                kind = %chunk.kind,
                modules = chunk.modules.len(),
                eliminated = chunk.eliminated.len(),
                imports = chunk.imports.len(),
                "Chunk linked"
            );
        }
    }

    /// Every module assigned at least once, and more than once only when
    /// duplicated.
    fn check(&self, graph: &ModuleGraph) -> Result<(), AllocationError> {
        for id in graph.module_ids() {
            let chunks = self.assignment.get(&id).map_or(&[][..], Vec::as_slice);
            if chunks.is_empty() || (chunks.len() > 1 && !self.duplicated.contains(&id)) {
                return Err(AllocationError::ChunkAllocationConflict {
                    module: id,
                    chunks: chunks
                        .iter()
                        .map(|chunk| self.chunks[chunk.0].name.clone())
                        .collect(),
                });
            }
        }
        Ok(())
    }

    fn finish(self) -> ChunkPlan {
        ChunkPlan {
            chunks: self.chunks,
            assignment: self.assignment,
            duplicated: self.duplicated,
            root_chunks: self.root_chunks,
        }
    }
}
