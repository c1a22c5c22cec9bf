#![cfg_attr(docsrs, feature(doc_cfg))]

//! # kiln-bundler
//!
//! Chunk allocation, deterministic emission and manifests on top of
//! `kiln-graph`.
//!
//! A build runs resolve/graph construction → usage analysis → chunk
//! allocation → emission, and only then touches the output directory.
//!
//! ```no_run
//! use kiln_bundler::{BundleOptions, Bundler};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = BundleOptions::default()
//!     .entry("pageA", "./src/pageA.js")
//!     .entry("pageB", "./src/pageB.js");
//!
//! let output = Bundler::new(options).build().await?;
//! for artifact in &output.artifacts {
//!     println!("{} -> {}", artifact.name, artifact.file_name);
//! }
//! output.write(&kiln_bundler::NativeRuntime::new()).await?;
//! # Ok(()) }
//! ```

// Re-export the foundation crates
pub use kiln_config::{
    BundleOptions, CacheGroup, ChunkScope, ConfigError, EntrySpec, GlobalSettings, KilnConfig,
    OutputOptions, ResolveOptions, SplitChunksOptions, TreeShakingMode,
};
pub use kiln_graph::{
    CancelFlag, GraphError, MemoryRuntime, ModuleGraph, ModuleId, ModuleParser, ModuleSource,
    NativeRuntime, OxcParser, ParseError, ResolutionError, Runtime, RuntimeError,
    SourceTransform, TransformError, UsageAnalyzer, UsageReport,
};

pub mod bundler;
pub mod chunk;
pub mod diagnostics;
pub mod emit;
pub mod output;
pub mod plugins;

pub use bundler::{BuildOutput, Bundler};
pub use chunk::{AllocationError, Chunk, ChunkAllocator, ChunkId, ChunkKind, ChunkPlan};
pub use diagnostics::{SourceDiagnostic, diagnose};
pub use emit::{
    Artifact, EmitError, EmitHook, EmitPipeline, EmittedBuild, Emitter, Manifest, ManifestChunk,
};
pub use plugins::{Plugin, PluginPhase, PluginRegistry};

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging, init_logging_from_env};

use std::path::PathBuf;

/// Error types for kiln-bundler operations.
///
/// Every variant aborts the build before anything is written.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A specifier could not be resolved from its importing module.
    #[error("Resolution error: {0}")]
    Resolution(ResolutionError),

    /// Malformed import/export syntax.
    #[error("Parse error: {0}")]
    Parse(ParseError),

    /// An import chain longer than `max_depth`.
    #[error("Import chain exceeds max depth {max_depth}: {}", format_chain(path))]
    CycleDepthExceeded {
        max_depth: usize,
        path: Vec<ModuleId>,
    },

    /// A module ended up in no chunk, or in several without being
    /// duplicated. Always a bundler bug.
    #[error("Chunk allocation conflict: module {module} assigned to {chunks:?}")]
    ChunkAllocationConflict { module: ModuleId, chunks: Vec<String> },

    /// A source transform failed.
    #[error("Transform error: {0}")]
    Transform(TransformError),

    /// Rendering or an emit hook failed.
    #[error("Emit error: {0}")]
    Emit(#[from] EmitError),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),

    /// File write operation failed.
    #[error("Write failure: {0}")]
    WriteFailure(String),

    /// Output file already exists and overwrite is disabled.
    #[error("Output exists: {0}")]
    OutputExists(String),

    /// A module could not be read.
    #[error("Failed to read '{}': {source}", path.display())]
    Runtime {
        path: PathBuf,
        #[source]
        source: RuntimeError,
    },

    /// Any other graph construction failure.
    #[error("Graph error: {0}")]
    Graph(GraphError),

    #[error("Build cancelled")]
    Cancelled,
}

/// Result type alias for kiln-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

fn format_chain(path: &[ModuleId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl From<GraphError> for Error {
    fn from(error: GraphError) -> Self {
        match error {
            GraphError::Resolution(err) => Error::Resolution(err),
            GraphError::Parse(err) => Error::Parse(err),
            GraphError::Transform(err) => Error::Transform(err),
            GraphError::CycleDepthExceeded { max_depth, path } => {
                Error::CycleDepthExceeded { max_depth, path }
            }
            GraphError::Runtime { path, source } => Error::Runtime { path, source },
            GraphError::Cancelled => Error::Cancelled,
            other => Error::Graph(other),
        }
    }
}

impl From<AllocationError> for Error {
    fn from(error: AllocationError) -> Self {
        match error {
            AllocationError::ChunkAllocationConflict { module, chunks } => {
                Error::ChunkAllocationConflict { module, chunks }
            }
            AllocationError::InvalidGroupTest { pattern, message } => {
                Error::Config(ConfigError::SchemaValidation {
                    message: format!("invalid split_chunks test '{pattern}': {message}"),
                    hint: None,
                })
            }
        }
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::Resolution(_) => "RESOLUTION_ERROR",
            Error::Parse(_) => "PARSE_ERROR",
            Error::CycleDepthExceeded { .. } => "CYCLE_DEPTH_EXCEEDED",
            Error::ChunkAllocationConflict { .. } => "CHUNK_ALLOCATION_CONFLICT",
            Error::Transform(_) => "TRANSFORM_ERROR",
            Error::Emit(_) => "EMIT_ERROR",
            Error::Config(_) => "INVALID_CONFIG",
            Error::InvalidOutputPath(_) => "INVALID_OUTPUT_PATH",
            Error::WriteFailure(_) => "WRITE_FAILURE",
            Error::OutputExists(_) => "OUTPUT_EXISTS",
            Error::Runtime { .. } => "IO_ERROR",
            Error::Graph(_) => "GRAPH_ERROR",
            Error::Cancelled => "CANCELLED",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::Resolution(err) => Some(Box::new(format!(
                "Check that '{}' exists relative to {} or is installed under a package root.",
                err.specifier,
                err.origin.display()
            ))),
            Error::CycleDepthExceeded { max_depth, .. } => Some(Box::new(format!(
                "The chain above is deeper than {max_depth} modules. Raise bundle.max_depth if this is intended."
            ))),
            Error::ChunkAllocationConflict { .. } => Some(Box::new(
                "This is a bug in kiln's chunk allocator. Please report it with the module graph that triggers it.",
            )),
            Error::Config(err) => err
                .hint()
                .map(|hint| Box::new(hint.to_string()) as Box<dyn std::fmt::Display>),
            Error::InvalidOutputPath(path) => Some(Box::new(format!(
                "The output path '{}' is invalid. Ensure it stays within the output directory and doesn't contain '..' components.",
                path
            ))),
            Error::WriteFailure(msg) => Some(Box::new(format!(
                "Failed to write file. Check disk space and permissions.\nError: {}",
                msg
            ))),
            Error::OutputExists(msg) => Some(Box::new(format!(
                "Output file already exists: {}\nSet output.overwrite = true to replace existing files.",
                msg
            ))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use miette::Diagnostic;

    use super::*;

    #[test]
    fn graph_errors_keep_their_category() {
        let err: Error = GraphError::Resolution(ResolutionError {
            specifier: "./missing".into(),
            origin: PathBuf::from("/app/main.js"),
            reason: "not found".into(),
        })
        .into();
        assert!(matches!(err, Error::Resolution(_)));
        assert_eq!(err.code().unwrap().to_string(), "RESOLUTION_ERROR");
        assert!(err.help().unwrap().to_string().contains("/app/main.js"));

        let err: Error = GraphError::Cancelled.into();
        assert!(matches!(err, Error::Cancelled));

        let err: Error = GraphError::EmptyEntry("main".into()).into();
        assert!(matches!(err, Error::Graph(_)));
    }

    #[test]
    fn depth_error_lists_chain() {
        let err: Error = GraphError::CycleDepthExceeded {
            max_depth: 1,
            path: vec![
                ModuleId::from_resolved(Path::new("/a.js")),
                ModuleId::from_resolved(Path::new("/b.js")),
            ],
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Import chain exceeds max depth 1: /a.js -> /b.js"
        );
    }

    #[test]
    fn invalid_group_test_is_a_config_error() {
        let err: Error = AllocationError::InvalidGroupTest {
            pattern: "(".into(),
            message: "unclosed group".into(),
        }
        .into();
        assert!(matches!(err, Error::Config(_)));
    }
}
