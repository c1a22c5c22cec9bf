//! Native filesystem runtime.

// NativeRuntime is the one place allowed to wrap std::fs
#![allow(clippy::disallowed_methods)]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::task;

use super::{FileMetadata, Runtime, RuntimeError, RuntimeResult};

/// Native filesystem Runtime implementation using `std::fs`.
///
/// Blocking calls run on tokio's blocking pool so workers never stall the
/// executor.
#[derive(Debug, Clone, Default)]
pub struct NativeRuntime {
    cwd: Option<PathBuf>,
}

impl NativeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `cwd` instead of the process working directory.
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
        }
    }
}

fn io_error(path: &Path, action: &str, err: std::io::Error) -> RuntimeError {
    if err.kind() == std::io::ErrorKind::NotFound {
        RuntimeError::FileNotFound(path.to_path_buf())
    } else {
        RuntimeError::Io(format!("Failed to {action} {}: {err}", path.display()))
    }
}

async fn blocking<T, F>(f: F) -> RuntimeResult<T>
where
    F: FnOnce() -> RuntimeResult<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| RuntimeError::Other(format!("Task join error: {e}")))?
}

#[async_trait]
impl Runtime for NativeRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let path = path.to_path_buf();
        blocking(move || std::fs::read(&path).map_err(|e| io_error(&path, "read", e))).await
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        let path = path.to_path_buf();
        let content = content.to_vec();
        blocking(move || std::fs::write(&path, content).map_err(|e| io_error(&path, "write", e)))
            .await
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let path = path.to_path_buf();
        blocking(move || {
            let metadata = std::fs::metadata(&path).map_err(|e| io_error(&path, "stat", e))?;
            Ok(FileMetadata {
                size: metadata.len(),
                is_dir: metadata.is_dir(),
                is_file: metadata.is_file(),
                modified: metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_millis() as u64),
            })
        })
        .await
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    async fn create_dir(&self, path: &Path, recursive: bool) -> RuntimeResult<()> {
        let path = path.to_path_buf();
        blocking(move || {
            let result = if recursive {
                std::fs::create_dir_all(&path)
            } else {
                std::fs::create_dir(&path)
            };
            result.map_err(|e| io_error(&path, "create directory", e))
        })
        .await
    }

    async fn rename(&self, from: &Path, to: &Path) -> RuntimeResult<()> {
        let from = from.to_path_buf();
        let to = to.to_path_buf();
        blocking(move || std::fs::rename(&from, &to).map_err(|e| io_error(&from, "rename", e)))
            .await
    }

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()> {
        let path = path.to_path_buf();
        blocking(move || std::fs::remove_file(&path).map_err(|e| io_error(&path, "remove", e)))
            .await
    }

    fn get_cwd(&self) -> RuntimeResult<PathBuf> {
        match &self.cwd {
            Some(cwd) => Ok(cwd.clone()),
            None => std::env::current_dir()
                .map_err(|e| RuntimeError::Io(format!("Failed to get current directory: {e}"))),
        }
    }
}
