//! Shared-chunk extraction options.

use serde::{Deserialize, Serialize};

use super::helpers::{default_min_chunks, default_min_size};
use super::types::ChunkScope;

/// Shared/vendor chunk extraction.
///
/// The top-level fields form the default cache group; `groups` adds more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitChunksOptions {
    /// Fixed name for the default shared chunk (e.g. `vendor`). When unset,
    /// one shared chunk is produced per set of referencing chunks.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub chunks: ChunkScope,

    /// Modules must be strictly larger than this (bytes) to be extracted.
    #[serde(default = "default_min_size")]
    pub min_size: usize,

    /// Modules must be referenced by at least this many chunks.
    #[serde(default = "default_min_chunks")]
    pub min_chunks: usize,

    #[serde(default)]
    pub groups: Vec<CacheGroup>,
}

impl Default for SplitChunksOptions {
    fn default() -> Self {
        Self {
            name: None,
            chunks: ChunkScope::default(),
            min_size: default_min_size(),
            min_chunks: default_min_chunks(),
            groups: Vec::new(),
        }
    }
}

impl SplitChunksOptions {
    /// The default group followed by the configured groups, in declaration order.
    pub fn cache_groups(&self) -> Vec<CacheGroup> {
        let mut groups = Vec::with_capacity(self.groups.len() + 1);
        groups.push(CacheGroup {
            name: self.name.clone(),
            test: None,
            chunks: self.chunks,
            min_size: self.min_size,
            min_chunks: self.min_chunks,
        });
        groups.extend(self.groups.iter().cloned());
        groups
    }
}

/// An extra extraction rule, e.g. everything under `node_modules` into `vendor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheGroup {
    #[serde(default)]
    pub name: Option<String>,

    /// Regex matched against the module path.
    #[serde(default)]
    pub test: Option<String>,

    #[serde(default)]
    pub chunks: ChunkScope,

    #[serde(default = "default_min_size")]
    pub min_size: usize,

    #[serde(default = "default_min_chunks")]
    pub min_chunks: usize,
}
