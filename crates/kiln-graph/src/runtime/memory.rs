//! In-memory runtime for tests and embedders without a disk.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use path_clean::PathClean;

use super::{FileMetadata, Runtime, RuntimeError, RuntimeResult};

/// Runtime backed by a file map.
///
/// Relative paths are anchored at the runtime's working directory.
/// Directories exist when created explicitly or when a file lives below them;
/// `create_dir` does not check that parents exist.
/// Clones share the same file map.
#[derive(Debug, Clone)]
pub struct MemoryRuntime {
    cwd: PathBuf,
    state: Arc<Mutex<MemoryFs>>,
}

#[derive(Debug, Default)]
struct MemoryFs {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
}

impl MemoryFs {
    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
            || self
                .files
                .keys()
                .any(|file| file != path && file.starts_with(path))
    }
}

impl MemoryRuntime {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            state: Arc::new(Mutex::new(MemoryFs::default())),
        }
    }

    /// Add a file (builder style).
    pub fn with_file(self, path: impl AsRef<Path>, content: impl AsRef<[u8]>) -> Self {
        self.insert_file(path, content);
        self
    }

    pub fn insert_file(&self, path: impl AsRef<Path>, content: impl AsRef<[u8]>) {
        let path = self.absolute(path.as_ref());
        self.state
            .lock()
            .files
            .insert(path, content.as_ref().to_vec());
    }

    /// Contents of a file, if present.
    pub fn file(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let path = self.absolute(path.as_ref());
        self.state.lock().files.get(&path).cloned()
    }

    /// File contents as UTF-8, if present and valid.
    pub fn file_string(&self, path: impl AsRef<Path>) -> Option<String> {
        self.file(path).and_then(|bytes| String::from_utf8(bytes).ok())
    }

    /// All file paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.state.lock().files.keys().cloned().collect()
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.clean()
        } else {
            self.cwd.join(path).clean()
        }
    }
}

#[async_trait]
impl Runtime for MemoryRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let path = self.absolute(path);
        self.state
            .lock()
            .files
            .get(&path)
            .cloned()
            .ok_or(RuntimeError::FileNotFound(path))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        let path = self.absolute(path);
        let mut state = self.state.lock();
        if state.is_dir(&path) {
            return Err(RuntimeError::Io(format!(
                "Failed to write {}: is a directory",
                path.display()
            )));
        }
        state.files.insert(path, content.to_vec());
        Ok(())
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let path = self.absolute(path);
        let state = self.state.lock();
        if let Some(content) = state.files.get(&path) {
            return Ok(FileMetadata {
                size: content.len() as u64,
                is_dir: false,
                is_file: true,
                modified: None,
            });
        }
        if state.is_dir(&path) {
            return Ok(FileMetadata {
                size: 0,
                is_dir: true,
                is_file: false,
                modified: None,
            });
        }
        Err(RuntimeError::FileNotFound(path))
    }

    fn exists(&self, path: &Path) -> bool {
        let path = self.absolute(path);
        let state = self.state.lock();
        state.files.contains_key(&path) || state.is_dir(&path)
    }

    async fn create_dir(&self, path: &Path, recursive: bool) -> RuntimeResult<()> {
        let path = self.absolute(path);
        let mut state = self.state.lock();
        if state.files.contains_key(&path) {
            return Err(RuntimeError::Io(format!(
                "Failed to create directory {}: file exists",
                path.display()
            )));
        }
        let mut current = Some(path.as_path());
        while let Some(dir) = current {
            state.dirs.insert(dir.to_path_buf());
            if !recursive {
                break;
            }
            current = dir.parent();
        }
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> RuntimeResult<()> {
        let from = self.absolute(from);
        let to = self.absolute(to);
        let mut state = self.state.lock();
        let content = state
            .files
            .remove(&from)
            .ok_or_else(|| RuntimeError::FileNotFound(from.clone()))?;
        state.files.insert(to, content);
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()> {
        let path = self.absolute(path);
        self.state
            .lock()
            .files
            .remove(&path)
            .map(|_| ())
            .ok_or(RuntimeError::FileNotFound(path))
    }

    fn get_cwd(&self) -> RuntimeResult<PathBuf> {
        Ok(self.cwd.clone())
    }
}
