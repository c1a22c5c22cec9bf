use std::path::PathBuf;

use thiserror::Error;

use crate::ModuleId;
use crate::parser::ParseError;
use crate::resolver::ResolutionError;
use crate::runtime::RuntimeError;
use crate::transform::TransformError;

pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while building or querying a module graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("failed to read '{}': {source}", path.display())]
    Runtime {
        path: PathBuf,
        #[source]
        source: RuntimeError,
    },

    #[error("'{}' is not valid UTF-8", path.display())]
    InvalidUtf8 { path: PathBuf },

    #[error("import chain exceeds max depth {max_depth}: {}", format_chain(path))]
    CycleDepthExceeded {
        max_depth: usize,
        path: Vec<ModuleId>,
    },

    #[error("edge {from} -> {to} references a module missing from the graph")]
    DanglingEdge { from: ModuleId, to: ModuleId },

    #[error("entry '{entry}' references a module missing from the graph: {module}")]
    DanglingEntry { entry: String, module: ModuleId },

    #[error("entry '{0}' has no modules")]
    EmptyEntry(String),

    #[error("graph worker failed: {0}")]
    Worker(String),

    #[error("build cancelled")]
    Cancelled,
}

fn format_chain(path: &[ModuleId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
