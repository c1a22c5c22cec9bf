//! Atomic artifact writing.
//!
//! Every file is first written to a `.tmp` sibling. Once all writes succeed,
//! files from a previous build are moved to `.bak` siblings and the new files
//! are renamed into place; the backups are dropped at the end. If any step
//! fails, files already placed are removed, the backups are moved back and
//! the temp files are deleted. All paths must stay inside the output
//! directory.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use kiln_graph::Runtime;
use path_clean::PathClean;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Writes `files` (relative name, contents) under `dir`.
///
/// Returns the final paths in input order.
pub async fn write_files_to(
    runtime: &dyn Runtime,
    dir: &Path,
    files: &[(&str, &[u8])],
    overwrite: bool,
) -> Result<Vec<PathBuf>> {
    let dir = normalize_dir(runtime, dir)?;

    let mut operations = Vec::with_capacity(files.len());
    for (name, content) in files {
        let target = validate_output_path(&dir, name)?;
        if !overwrite && runtime.exists(&target) {
            return Err(Error::OutputExists(format!(
                "File already exists: '{}'. Set output.overwrite = true to replace.",
                target.display()
            )));
        }
        operations.push((target, *content));
    }

    runtime.create_dir(&dir, true).await.map_err(|e| {
        Error::WriteFailure(format!(
            "Failed to create output directory '{}': {}",
            dir.display(),
            e
        ))
    })?;

    write_files_atomic(runtime, &operations).await?;
    debug!(dir = %dir.display(), files = operations.len(), "Output written");
    Ok(operations.into_iter().map(|(path, _)| path).collect())
}

fn normalize_dir(runtime: &dyn Runtime, dir: &Path) -> Result<PathBuf> {
    let cleaned = dir.clean();
    if cleaned.is_absolute() {
        return Ok(cleaned);
    }

    let cwd = runtime.get_cwd().map_err(|e| {
        Error::InvalidOutputPath(format!("Failed to get current directory: {}", e))
    })?;
    Ok(cwd.join(cleaned).clean())
}

/// Resolves `filename` under `base_dir`, rejecting NUL bytes and any path
/// that escapes the directory.
pub(crate) fn validate_output_path(base_dir: &Path, filename: &str) -> Result<PathBuf> {
    if filename.contains('\0') {
        return Err(Error::InvalidOutputPath(
            "Filename contains null byte".to_string(),
        ));
    }

    let full_path = base_dir.join(Path::new(filename).clean()).clean();
    if !full_path.starts_with(base_dir) || full_path == base_dir {
        return Err(Error::InvalidOutputPath(format!(
            "Path '{}' escapes output directory '{}' (resolved to '{}')",
            filename,
            base_dir.display(),
            full_path.display()
        )));
    }

    Ok(full_path)
}

/// `a.js` → `a.js.tmp`, so `a.js` and `a.css` never share a temp file.
fn temp_path(target: &Path) -> PathBuf {
    sibling(target, ".tmp")
}

fn backup_path(target: &Path) -> PathBuf {
    sibling(target, ".bak")
}

fn sibling(target: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

async fn write_files_atomic(runtime: &dyn Runtime, operations: &[(PathBuf, &[u8])]) -> Result<()> {
    let mut temp_files: Vec<(PathBuf, PathBuf)> = Vec::new();

    for (target, content) in operations {
        if let Some(parent) = target.parent() {
            if let Err(e) = runtime.create_dir(parent, true).await {
                cleanup_temp_files(runtime, &temp_files).await;
                return Err(Error::WriteFailure(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                )));
            }
        }

        let temp = temp_path(target);
        if let Err(e) = runtime.write_file(&temp, content).await {
            cleanup_temp_files(runtime, &temp_files).await;
            return Err(Error::WriteFailure(format!(
                "Failed to write temporary file '{}': {}",
                temp.display(),
                e
            )));
        }
        temp_files.push((temp, target.clone()));
    }

    let mut backups: Vec<(PathBuf, PathBuf)> = Vec::new();
    for (_, target) in &temp_files {
        if !runtime.exists(target) {
            continue;
        }
        let backup = backup_path(target);
        if let Err(e) = runtime.rename(target, &backup).await {
            restore_backups(runtime, &backups).await;
            cleanup_temp_files(runtime, &temp_files).await;
            return Err(Error::WriteFailure(format!(
                "Failed to move previous output '{}' aside: {}",
                target.display(),
                e
            )));
        }
        backups.push((backup, target.clone()));
    }

    let mut placed: Vec<&Path> = Vec::new();
    for (temp, target) in &temp_files {
        if let Err(e) = runtime.rename(temp, target).await {
            for path in &placed {
                if let Err(e) = runtime.remove_file(path).await {
                    warn!(path = %path.display(), error = %e, "Failed to remove partial output");
                }
            }
            restore_backups(runtime, &backups).await;
            cleanup_temp_files(runtime, &temp_files).await;
            return Err(Error::WriteFailure(format!(
                "Failed to rename '{}' to '{}': {}",
                temp.display(),
                target.display(),
                e
            )));
        }
        placed.push(target);
    }

    for (backup, _) in &backups {
        if let Err(e) = runtime.remove_file(backup).await {
            warn!(path = %backup.display(), error = %e, "Failed to remove backup of previous output");
        }
    }

    Ok(())
}

/// Best effort; we are already failing.
async fn restore_backups(runtime: &dyn Runtime, backups: &[(PathBuf, PathBuf)]) {
    for (backup, target) in backups {
        if let Err(e) = runtime.rename(backup, target).await {
            warn!(path = %target.display(), error = %e, "Failed to restore previous output");
        }
    }
}

/// Best effort; we are already failing.
async fn cleanup_temp_files(runtime: &dyn Runtime, temp_files: &[(PathBuf, PathBuf)]) {
    for (temp, _) in temp_files {
        if runtime.exists(temp) {
            if let Err(e) = runtime.remove_file(temp).await {
                warn!(path = %temp.display(), error = %e, "Failed to clean up temporary file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use kiln_graph::{FileMetadata, MemoryRuntime, RuntimeError, RuntimeResult};

    use super::*;

    #[test]
    fn test_validate_output_path_normal() {
        let base = Path::new("/tmp/output");
        let result = validate_output_path(base, "index.js");
        assert_eq!(result.unwrap(), Path::new("/tmp/output/index.js"));
    }

    #[test]
    fn test_validate_output_path_nested() {
        let base = Path::new("/tmp/output");
        let result = validate_output_path(base, "js/react.0123.js");
        assert_eq!(result.unwrap(), Path::new("/tmp/output/js/react.0123.js"));
    }

    #[test]
    fn test_validate_output_path_traversal() {
        let base = Path::new("/tmp/output");
        for name in ["../etc/passwd", "safe/../../../../etc/passwd", "."] {
            let result = validate_output_path(base, name);
            assert!(matches!(result, Err(Error::InvalidOutputPath(_))), "{name}");
        }
    }

    #[test]
    fn test_validate_output_path_null_byte() {
        let base = Path::new("/tmp/output");
        assert!(validate_output_path(base, "file\0name.js").is_err());
    }

    #[test]
    fn temp_names_keep_the_extension() {
        assert_eq!(temp_path(Path::new("/o/a.js")), Path::new("/o/a.js.tmp"));
        assert_ne!(temp_path(Path::new("/o/a.js")), temp_path(Path::new("/o/a.css")));
    }

    #[tokio::test]
    async fn writes_relative_to_runtime_cwd() {
        let runtime = MemoryRuntime::new("/project");
        let written = write_files_to(
            &runtime,
            Path::new("dist"),
            &[("js/a.js", b"a".as_slice()), ("manifest.json", b"{}".as_slice())],
            true,
        )
        .await
        .unwrap();

        assert_eq!(
            written,
            vec![
                PathBuf::from("/project/dist/js/a.js"),
                PathBuf::from("/project/dist/manifest.json")
            ]
        );
        assert_eq!(runtime.file_string("/project/dist/js/a.js").as_deref(), Some("a"));
        assert!(runtime.file("/project/dist/js/a.js.tmp").is_none());
    }

    #[tokio::test]
    async fn existing_files_block_when_overwrite_is_off() {
        let runtime = MemoryRuntime::new("/project").with_file("/project/dist/a.js", "old");
        let err = write_files_to(&runtime, Path::new("/project/dist"), &[("a.js", b"new".as_slice())], false)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::OutputExists(_)));
        assert_eq!(runtime.file_string("/project/dist/a.js").as_deref(), Some("old"));
    }

    /// Memory runtime whose renames onto one path fail.
    #[derive(Debug)]
    struct FailingRename {
        inner: MemoryRuntime,
        target: PathBuf,
    }

    #[async_trait]
    impl Runtime for FailingRename {
        async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
            self.inner.read_file(path).await
        }

        async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
            self.inner.write_file(path, content).await
        }

        async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
            self.inner.metadata(path).await
        }

        fn exists(&self, path: &Path) -> bool {
            self.inner.exists(path)
        }

        async fn create_dir(&self, path: &Path, recursive: bool) -> RuntimeResult<()> {
            self.inner.create_dir(path, recursive).await
        }

        async fn rename(&self, from: &Path, to: &Path) -> RuntimeResult<()> {
            if to == self.target.as_path() && from.extension().is_some_and(|ext| ext == "tmp") {
                return Err(RuntimeError::Io("disk full".into()));
            }
            self.inner.rename(from, to).await
        }

        async fn remove_file(&self, path: &Path) -> RuntimeResult<()> {
            self.inner.remove_file(path).await
        }

        fn get_cwd(&self) -> RuntimeResult<PathBuf> {
            self.inner.get_cwd()
        }
    }

    #[tokio::test]
    async fn failed_rename_restores_previous_build() {
        let inner = MemoryRuntime::new("/project")
            .with_file("/project/dist/a.js", "old a")
            .with_file("/project/dist/manifest.json", "old manifest");
        let runtime = FailingRename {
            inner: inner.clone(),
            target: PathBuf::from("/project/dist/manifest.json"),
        };

        let err = write_files_to(
            &runtime,
            Path::new("dist"),
            &[
                ("a.js", b"new a".as_slice()),
                ("b.js", b"new b".as_slice()),
                ("manifest.json", b"new manifest".as_slice()),
            ],
            true,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::WriteFailure(_)));
        assert_eq!(inner.file_string("/project/dist/a.js").as_deref(), Some("old a"));
        assert_eq!(
            inner.file_string("/project/dist/manifest.json").as_deref(),
            Some("old manifest")
        );
        assert!(inner.file("/project/dist/b.js").is_none());
        assert_eq!(inner.paths().len(), 2);
    }

    #[tokio::test]
    async fn successful_write_drops_backups() {
        let runtime = MemoryRuntime::new("/project").with_file("/project/dist/a.js", "old");
        write_files_to(&runtime, Path::new("dist"), &[("a.js", b"new".as_slice())], true)
            .await
            .unwrap();

        assert_eq!(runtime.file_string("/project/dist/a.js").as_deref(), Some("new"));
        assert_eq!(runtime.paths().len(), 1);
    }

    #[tokio::test]
    async fn escaping_path_writes_nothing() {
        let runtime = MemoryRuntime::new("/project");
        let err = write_files_to(
            &runtime,
            Path::new("dist"),
            &[("ok.js", b"ok".as_slice()), ("../evil.js", b"evil".as_slice())],
            true,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::InvalidOutputPath(_)));
        assert!(runtime.paths().is_empty());
    }
}
