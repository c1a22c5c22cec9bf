//! Platform runtime abstraction.
//!
//! Every file-system access made by the graph builder, the resolver and the
//! output writer goes through the [`Runtime`] trait, so a build can run
//! against the real disk ([`NativeRuntime`]) or an in-memory file map
//! ([`MemoryRuntime`]).

mod memory;
mod native;

pub use memory::MemoryRuntime;
pub use native::NativeRuntime;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur during runtime operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Runtime error: {0}")]
    Other(String),
}

/// File metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// File size in bytes
    pub size: u64,
    pub is_dir: bool,
    pub is_file: bool,
    /// Last modified timestamp (milliseconds since epoch)
    pub modified: Option<u64>,
}

/// Platform runtime trait
///
/// Implementations must be cheap to share behind an `Arc` across worker
/// tasks.
#[async_trait]
pub trait Runtime: Send + Sync + std::fmt::Debug {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()>;

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata>;

    fn exists(&self, path: &Path) -> bool;

    async fn create_dir(&self, path: &Path, recursive: bool) -> RuntimeResult<()>;

    /// Move `from` to `to`, replacing `to` if it exists.
    async fn rename(&self, from: &Path, to: &Path) -> RuntimeResult<()>;

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()>;

    /// Working directory used to anchor entries and relative output paths.
    fn get_cwd(&self) -> RuntimeResult<PathBuf>;

    /// Returns `true` when `path` names an existing regular file.
    async fn is_file(&self, path: &Path) -> bool {
        self.metadata(path)
            .await
            .map(|meta| meta.is_file)
            .unwrap_or(false)
    }
}
