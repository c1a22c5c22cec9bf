//! Artifact generation.
//!
//! Each chunk is rendered in a fixed member order, passed through the emit
//! hooks, hashed, and named from the output templates. The manifest is built
//! from the finished artifacts.

mod manifest;
mod order;
mod render;
mod shake;
mod template;

use std::path::PathBuf;
use std::sync::Arc;

use kiln_config::OutputOptions;
use kiln_graph::{ModuleGraph, UsageReport};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::chunk::{Chunk, ChunkId, ChunkKind, ChunkPlan};

pub use manifest::{Manifest, ManifestChunk};
pub use order::member_order;
pub use template::{FileNameTemplate, TemplateData};

use render::ChunkRenderer;

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("emit hook '{hook}' failed on chunk '{chunk}': {message}")]
    Hook {
        hook: String,
        chunk: String,
        message: String,
    },

    #[error("chunks '{first}' and '{second}' both write to '{file_name}'")]
    FileNameCollision {
        first: String,
        second: String,
        file_name: String,
    },

    #[error("failed to serialize manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl EmitError {
    pub fn hook(hook: impl Into<String>, chunk: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hook {
            hook: hook.into(),
            chunk: chunk.into(),
            message: message.into(),
        }
    }
}

/// Rewrites a chunk's rendered code before it is hashed.
pub trait EmitHook: Send + Sync {
    fn name(&self) -> &str;

    fn process(&self, chunk: &Chunk, code: String) -> Result<String, EmitError>;
}

/// Ordered list of emit hooks, applied first to last.
#[derive(Clone, Default)]
pub struct EmitPipeline {
    hooks: Vec<Arc<dyn EmitHook>>,
}

impl EmitPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hook: Arc<dyn EmitHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn apply(&self, chunk: &Chunk, mut code: String) -> Result<String, EmitError> {
        for hook in &self.hooks {
            code = hook.process(chunk, code)?;
            debug!(hook = hook.name(), chunk = %chunk.name, "Emit hook applied");
        }
        Ok(code)
    }
}

impl std::fmt::Debug for EmitPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|hook| hook.name()))
            .finish()
    }
}

/// One output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub chunk: ChunkId,
    pub name: String,
    pub kind: ChunkKind,
    /// Path relative to the output directory, `/`-separated.
    pub file_name: String,
    pub code: String,
    /// blake3 hex digest of `code`.
    pub hash: String,
}

#[derive(Debug, Clone)]
pub struct EmittedBuild {
    pub artifacts: Vec<Artifact>,
    pub manifest: Manifest,
}

impl EmittedBuild {
    pub fn artifact(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|artifact| artifact.name == name)
    }
}

/// Serializes a chunk plan into artifacts and a manifest.
#[derive(Debug, Clone)]
pub struct Emitter {
    root: PathBuf,
    filename: FileNameTemplate,
    chunk_filename: FileNameTemplate,
    hooks: EmitPipeline,
}

impl Emitter {
    /// `root` is the directory module keys are made relative to.
    pub fn new(root: impl Into<PathBuf>, output: &OutputOptions) -> Self {
        Self {
            root: root.into(),
            filename: FileNameTemplate::parse(&output.filename),
            chunk_filename: FileNameTemplate::parse(&output.chunk_filename),
            hooks: EmitPipeline::new(),
        }
    }

    pub fn hooks(mut self, hooks: EmitPipeline) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn emit(
        &self,
        graph: &ModuleGraph,
        usage: &UsageReport,
        plan: &ChunkPlan,
    ) -> Result<EmittedBuild, EmitError> {
        let renderer = ChunkRenderer {
            graph,
            usage,
            plan,
            root: &self.root,
        };

        let mut rendered = Vec::with_capacity(plan.len());
        for chunk in plan.chunks() {
            let order = member_order(graph, chunk);
            let code = self.hooks.apply(chunk, renderer.render(chunk, &order))?;
            let hash = blake3::hash(code.as_bytes()).to_hex().to_string();
            let keys = order
                .iter()
                .map(|id| id.relative_key(&self.root))
                .collect::<Vec<_>>();
            rendered.push((chunk, code, hash, keys));
        }

        let mut hasher = blake3::Hasher::new();
        for (_, _, hash, _) in &rendered {
            hasher.update(hash.as_bytes());
        }
        let build_hash = hasher.finalize().to_hex().to_string();

        let mut artifacts = Vec::with_capacity(rendered.len());
        let mut modules = Vec::with_capacity(rendered.len());
        let mut owners: FxHashMap<String, String> = FxHashMap::default();
        for (chunk, code, hash, keys) in rendered {
            let template = if chunk.kind.is_initial() {
                &self.filename
            } else {
                &self.chunk_filename
            };
            let file_name = template.render(&TemplateData {
                name: &chunk.name,
                id: chunk.id.0,
                chunk_hash: &hash,
                content_hash: &hash,
                build_hash: &build_hash,
            });

            if let Some(first) = owners.insert(file_name.clone(), chunk.name.clone()) {
                return Err(EmitError::FileNameCollision {
                    first,
                    second: chunk.name.clone(),
                    file_name,
                });
            }

            debug!(chunk = %chunk.name, file = %file_name, bytes = code.len(), "Chunk emitted");
            artifacts.push(Artifact {
                chunk: chunk.id,
                name: chunk.name.clone(),
                kind: chunk.kind,
                file_name,
                code,
                hash,
            });
            modules.push(keys);
        }

        let manifest = build_manifest(graph, plan, &artifacts, modules, build_hash);
        info!(
            artifacts = artifacts.len(),
            bytes = artifacts.iter().map(|a| a.code.len()).sum::<usize>(),
            "Emitted chunks"
        );
        Ok(EmittedBuild {
            artifacts,
            manifest,
        })
    }
}

fn build_manifest(
    graph: &ModuleGraph,
    plan: &ChunkPlan,
    artifacts: &[Artifact],
    modules: Vec<Vec<String>>,
    hash: String,
) -> Manifest {
    let names = |ids: &[ChunkId]| -> Vec<String> {
        ids.iter().map(|id| plan.chunk_name(*id).to_string()).collect()
    };

    let mut manifest = Manifest {
        hash,
        ..Manifest::default()
    };
    for (artifact, modules) in artifacts.iter().zip(modules) {
        let Some(chunk) = plan.chunk(artifact.chunk) else {
            continue;
        };
        manifest.chunks.insert(
            artifact.name.clone(),
            ManifestChunk {
                file: artifact.file_name.clone(),
                hash: artifact.hash.clone(),
                kind: artifact.kind,
                imports: names(&chunk.imports),
                dynamic_imports: names(&chunk.dynamic_imports),
                modules,
            },
        );
    }

    for (entry, roots) in graph.entry_points() {
        let chunk = plan
            .chunk_by_name(&entry)
            .map(|chunk| chunk.name.clone())
            .or_else(|| {
                roots
                    .first()
                    .and_then(|root| plan.root_chunk(root))
                    .map(|id| plan.chunk_name(id).to_string())
            });
        if let Some(chunk) = chunk {
            manifest.entries.insert(entry, chunk);
        }
    }

    manifest
}
