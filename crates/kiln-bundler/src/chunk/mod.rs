//! Chunks and the module-to-chunk plan.

mod allocator;

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use kiln_graph::ModuleId;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use allocator::ChunkAllocator;

/// Index of a chunk in its [`ChunkPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChunkId(pub usize);

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Seeded by a declared entry; loaded eagerly.
    Entry,
    /// Seeded by a dynamic import; loaded on demand.
    Async,
    /// Extracted because several chunks reference its modules.
    Shared,
}

impl ChunkKind {
    pub fn is_initial(&self) -> bool {
        matches!(self, Self::Entry)
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry => write!(f, "entry"),
            Self::Async => write!(f, "async"),
            Self::Shared => write!(f, "shared"),
        }
    }
}

/// A unit of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: ChunkId,
    pub name: String,
    pub kind: ChunkKind,
    /// Modules that seeded the chunk (entry modules or dynamic targets).
    pub roots: Vec<ModuleId>,
    /// Emitted members in discovery order.
    pub modules: Vec<ModuleId>,
    /// Tree-shaken members: assigned here, never emitted.
    pub eliminated: Vec<ModuleId>,
    /// Chunks that must be loaded before this one executes.
    pub imports: Vec<ChunkId>,
    /// Chunks this one may load at runtime.
    pub dynamic_imports: Vec<ChunkId>,
}

impl Chunk {
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Output of chunk allocation. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct ChunkPlan {
    chunks: Vec<Chunk>,
    assignment: IndexMap<ModuleId, Vec<ChunkId>>,
    duplicated: IndexSet<ModuleId>,
    root_chunks: FxHashMap<ModuleId, ChunkId>,
}

impl ChunkPlan {
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.chunks.get(id.0)
    }

    pub fn chunk_by_name(&self, name: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|chunk| chunk.name == name)
    }

    /// Chunks a module was assigned to, emitted or eliminated.
    pub fn chunks_of(&self, id: &ModuleId) -> &[ChunkId] {
        self.assignment.get(id).map_or(&[], Vec::as_slice)
    }

    pub fn is_duplicated(&self, id: &ModuleId) -> bool {
        self.duplicated.contains(id)
    }

    pub fn duplicated(&self) -> impl Iterator<Item = &ModuleId> {
        self.duplicated.iter()
    }

    /// Chunk seeded by `id`, for entry modules and dynamic targets.
    pub fn root_chunk(&self, id: &ModuleId) -> Option<ChunkId> {
        self.root_chunks.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunk_name(&self, id: ChunkId) -> &str {
        self.chunk(id).map_or("", |chunk| chunk.name.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AllocationError {
    /// A module ended up in no chunk, or in several without being marked
    /// duplicated. Indicates a bug in the allocator.
    #[error("module {module} assigned to chunks {chunks:?}")]
    ChunkAllocationConflict {
        module: ModuleId,
        chunks: Vec<String>,
    },

    #[error("invalid cache group test '{pattern}': {message}")]
    InvalidGroupTest { pattern: String, message: String },
}
