//! Core bundle configuration types.

mod helpers;
mod split;
mod types;

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use split::{CacheGroup, SplitChunksOptions};
pub use types::{ChunkScope, TreeShakingMode};

use helpers::{
    default_extensions, default_filename, default_manifest, default_max_depth,
    default_output_dir, default_package_roots, default_true,
};

/// Main bundle configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleOptions {
    /// Named entry points in declaration order. Declaration order breaks
    /// ties during chunk allocation.
    #[serde(default)]
    pub entries: IndexMap<String, EntrySpec>,

    #[serde(default)]
    pub output: OutputOptions,

    #[serde(default)]
    pub split_chunks: SplitChunksOptions,

    #[serde(default)]
    pub tree_shaking: TreeShakingMode,

    #[serde(default)]
    pub resolve: ResolveOptions,

    /// Longest import chain (from an entry) the graph builder will follow.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Project root. Falls back to the runtime's working directory.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
            output: OutputOptions::default(),
            split_chunks: SplitChunksOptions::default(),
            tree_shaking: TreeShakingMode::default(),
            resolve: ResolveOptions::default(),
            max_depth: default_max_depth(),
            cwd: None,
        }
    }
}

impl BundleOptions {
    /// Add (or replace) a single-module entry.
    pub fn entry(mut self, name: impl Into<String>, specifier: impl Into<String>) -> Self {
        self.entries
            .insert(name.into(), EntrySpec::Single(specifier.into()));
        self
    }

    /// Entries as `(name, specifiers)` pairs in declaration order.
    pub fn entry_specifiers(&self) -> impl Iterator<Item = (&str, Vec<&str>)> {
        self.entries
            .iter()
            .map(|(name, spec)| (name.as_str(), spec.specifiers()))
    }
}

/// A single entry: one module specifier or a list bundled into the same chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntrySpec {
    Single(String),
    Multiple(Vec<String>),
}

impl EntrySpec {
    pub fn specifiers(&self) -> Vec<&str> {
        match self {
            Self::Single(spec) => vec![spec.as_str()],
            Self::Multiple(specs) => specs.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for EntrySpec {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

/// Artifact location and naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputOptions {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// File name template for entry chunks.
    #[serde(default = "default_filename")]
    pub filename: String,

    /// File name template for lazy and shared chunks.
    #[serde(default = "default_filename")]
    pub chunk_filename: String,

    /// Manifest file name, relative to `dir`.
    #[serde(default = "default_manifest")]
    pub manifest: String,

    /// Replace files left by a previous build.
    #[serde(default = "default_true")]
    pub overwrite: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            filename: default_filename(),
            chunk_filename: default_filename(),
            manifest: default_manifest(),
            overwrite: true,
        }
    }
}

/// Module resolution options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// Extensions tried, in order, for extension-less specifiers.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directories searched for bare package specifiers after the
    /// `node_modules` directories above the importing module.
    #[serde(default = "default_package_roots")]
    pub package_roots: Vec<PathBuf>,

    /// Specifier prefix rewrites (`@` -> `./src`).
    #[serde(default)]
    pub alias: IndexMap<String, String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            package_roots: default_package_roots(),
            alias: IndexMap::new(),
        }
    }
}
