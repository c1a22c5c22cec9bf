//! Module graph for the kiln bundler.
//!
//! Resolution, import/export extraction, dependency graph construction and
//! usage analysis. Chunking and emission live in `kiln-bundler`.

pub mod builder;
pub mod cancel;
pub mod error;
pub mod export;
pub mod import;
pub mod memory;
pub mod module;
pub mod module_id;
pub mod parser;
pub mod resolver;
pub mod runtime;
pub mod span;
pub mod transform;
pub mod usage;

pub use builder::GraphBuilder;
pub use cancel::CancelFlag;
pub use error::{GraphError, Result};
pub use export::{Export, ExportKind, Liveness};
pub use import::{Import, ImportKind, ImportSpecifier};
pub use memory::ModuleGraph;
pub use module::{Module, ModuleBuilder, SourceType};
pub use module_id::{ModuleId, ModuleIdError};
pub use parser::{ModuleParser, OxcParser, ParseError, ParsedModule};
pub use resolver::{ModuleResolver, ResolutionError};
pub use runtime::{FileMetadata, MemoryRuntime, NativeRuntime, Runtime, RuntimeError, RuntimeResult};
pub use span::SourceSpan;
pub use transform::{ModuleSource, SourceTransform, TransformError, TransformPipeline};
pub use usage::{UsageAnalyzer, UsageReport};
