use serde::{Deserialize, Serialize};

/// How aggressively unused modules are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeShakingMode {
    /// Modules with top-level side effects are kept even when none of their
    /// exports are used.
    #[default]
    Conservative,
    /// Modules are kept only when an export is used or they are a root.
    Aggressive,
}

/// Which chunks count as referencing chunks for shared-chunk extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkScope {
    /// Entry chunks only.
    Initial,
    /// Lazy chunks created at dynamic-import boundaries only.
    Async,
    /// Every chunk.
    #[default]
    All,
}

impl ChunkScope {
    /// Returns `true` when a chunk of the given flavour participates.
    pub fn includes(&self, is_entry_chunk: bool) -> bool {
        match self {
            Self::Initial => is_entry_chunk,
            Self::Async => !is_entry_chunk,
            Self::All => true,
        }
    }
}

impl std::fmt::Display for TreeShakingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conservative => write!(f, "conservative"),
            Self::Aggressive => write!(f, "aggressive"),
        }
    }
}
