//! Module resolution.
//!
//! Search order for a specifier:
//!
//! 1. `resolve.alias` entries (exact key or `key/` prefix), against the
//!    working directory
//! 2. relative and absolute paths, against the importing module's directory
//! 3. bare package names, in `node_modules` directories walking up from the
//!    importer, then in each configured package root
//!
//! Every candidate is tried as a file, then with each configured extension,
//! then as a directory (`package.json` entry fields, then `index`). The first
//! hit wins.

mod package;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexSet;
use kiln_config::ResolveOptions;
use path_clean::PathClean;
use thiserror::Error;

use crate::ModuleId;
use crate::runtime::Runtime;

use package::{PackageJson, split_bare_specifier};

/// A specifier that could not be mapped to a module.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot resolve '{specifier}' from {}: {reason}", origin.display())]
pub struct ResolutionError {
    pub specifier: String,
    /// Importing module, or the working directory for entries.
    pub origin: PathBuf,
    pub reason: String,
}

/// Memoizing resolver shared by every worker of one build.
#[derive(Debug)]
pub struct ModuleResolver {
    runtime: Arc<dyn Runtime>,
    cwd: PathBuf,
    options: ResolveOptions,
    cache: DashMap<(PathBuf, String), ModuleId>,
}

impl ModuleResolver {
    pub fn new(runtime: Arc<dyn Runtime>, cwd: impl Into<PathBuf>, options: ResolveOptions) -> Self {
        Self {
            runtime,
            cwd: cwd.into(),
            options,
            cache: DashMap::new(),
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Resolve an entry specifier relative to the working directory.
    ///
    /// Bare entries (`react`) resolve as packages, so `entries.react = ["react"]`
    /// bundles the installed package.
    pub async fn resolve_entry(&self, specifier: &str) -> Result<ModuleId, ResolutionError> {
        let cwd = self.cwd.clone();
        self.resolve_from(specifier, &cwd, &cwd).await
    }

    /// Resolve `specifier` as imported by `origin`.
    pub async fn resolve(
        &self,
        specifier: &str,
        origin: &ModuleId,
    ) -> Result<ModuleId, ResolutionError> {
        let dir = if origin.is_virtual() {
            self.cwd.clone()
        } else {
            origin
                .as_path()
                .parent()
                .map_or_else(|| self.cwd.clone(), Path::to_path_buf)
        };
        self.resolve_from(specifier, &dir, origin.as_path()).await
    }

    async fn resolve_from(
        &self,
        specifier: &str,
        dir: &Path,
        origin: &Path,
    ) -> Result<ModuleId, ResolutionError> {
        let key = (dir.to_path_buf(), specifier.to_string());
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }

        let error = |reason: String| ResolutionError {
            specifier: specifier.to_string(),
            origin: origin.to_path_buf(),
            reason,
        };

        if specifier.trim().is_empty() {
            return Err(error("empty specifier".to_string()));
        }

        let resolved = if let Some(aliased) = self.apply_alias(specifier) {
            self.resolve_path(&self.cwd.join(aliased).clean())
                .await
                .map_err(&error)?
        } else if is_path_like(specifier) {
            self.resolve_path(&dir.join(specifier).clean())
                .await
                .map_err(&error)?
        } else {
            self.resolve_bare(specifier, dir).await.map_err(&error)?
        };

        let Some(path) = resolved else {
            return Err(error("module not found".to_string()));
        };

        let id = ModuleId::from_resolved(path);
        tracing::trace!(specifier, module = %id, "resolved");
        self.cache.insert(key, id.clone());
        Ok(id)
    }

    fn apply_alias(&self, specifier: &str) -> Option<String> {
        self.options.alias.iter().find_map(|(key, target)| {
            if specifier == key {
                Some(target.clone())
            } else {
                specifier
                    .strip_prefix(key.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
                    .map(|rest| format!("{}/{rest}", target.trim_end_matches('/')))
            }
        })
    }

    async fn resolve_bare(&self, specifier: &str, dir: &Path) -> Result<Option<PathBuf>, String> {
        let Some((name, subpath)) = split_bare_specifier(specifier) else {
            return Err("invalid package specifier".to_string());
        };

        for root in self.package_roots(dir) {
            let package_dir = root.join(name);
            if !self.runtime.exists(&package_dir) {
                continue;
            }
            let found = match subpath {
                Some(subpath) => self.resolve_path(&package_dir.join(subpath).clean()).await?,
                None => self.resolve_path(&package_dir).await?,
            };
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    /// `node_modules` above `dir`, then configured roots, without repeats.
    fn package_roots(&self, dir: &Path) -> IndexSet<PathBuf> {
        let mut roots: IndexSet<PathBuf> = dir
            .ancestors()
            .map(|ancestor| ancestor.join("node_modules"))
            .collect();
        for root in &self.options.package_roots {
            let root = if root.is_absolute() {
                root.clean()
            } else {
                self.cwd.join(root).clean()
            };
            roots.insert(root);
        }
        roots
    }

    async fn resolve_path(&self, base: &Path) -> Result<Option<PathBuf>, String> {
        if let Some(file) = self.try_file(base).await {
            return Ok(Some(file));
        }

        let is_dir = self
            .runtime
            .metadata(base)
            .await
            .map(|meta| meta.is_dir)
            .unwrap_or(false);
        if !is_dir {
            return Ok(None);
        }

        if let Some(pkg) = PackageJson::load(self.runtime.as_ref(), base).await? {
            if let Some(entry) = pkg.entry() {
                let target = base.join(entry).clean();
                if let Some(file) = self.try_file(&target).await {
                    return Ok(Some(file));
                }
                if let Some(file) = self.try_index(&target).await {
                    return Ok(Some(file));
                }
            }
        }

        Ok(self.try_index(base).await)
    }

    async fn try_file(&self, base: &Path) -> Option<PathBuf> {
        if self.runtime.is_file(base).await {
            return Some(base.to_path_buf());
        }
        for ext in &self.options.extensions {
            let mut candidate = OsString::from(base.as_os_str());
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            if self.runtime.is_file(&candidate).await {
                return Some(candidate);
            }
        }
        None
    }

    async fn try_index(&self, dir: &Path) -> Option<PathBuf> {
        for ext in &self.options.extensions {
            let candidate = dir.join(format!("index{ext}"));
            if self.runtime.is_file(&candidate).await {
                return Some(candidate);
            }
        }
        None
    }
}

fn is_path_like(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || Path::new(specifier).is_absolute()
}
