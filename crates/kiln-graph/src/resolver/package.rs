//! Package directory handling for bare specifiers.

use std::path::Path;

use serde::Deserialize;

use crate::runtime::Runtime;

/// Maximum allowed size for package.json files (10MB)
const MAX_PACKAGE_JSON_SIZE: u64 = 10 * 1024 * 1024;

/// Entry-point fields of a package.json.
#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct PackageJson {
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
}

impl PackageJson {
    /// Load `dir/package.json`, `Ok(None)` when the directory has none.
    pub(super) async fn load(runtime: &dyn Runtime, dir: &Path) -> Result<Option<Self>, String> {
        let path = dir.join("package.json");
        let Ok(meta) = runtime.metadata(&path).await else {
            return Ok(None);
        };
        if !meta.is_file {
            return Ok(None);
        }
        if meta.size > MAX_PACKAGE_JSON_SIZE {
            return Err(format!("{} exceeds 10MB", path.display()));
        }

        let bytes = runtime
            .read_file(&path)
            .await
            .map_err(|e| e.to_string())?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| format!("invalid {}: {e}", path.display()))
    }

    /// `module` wins over `main`; empty fields are ignored.
    pub(super) fn entry(&self) -> Option<&str> {
        [self.module.as_deref(), self.main.as_deref()]
            .into_iter()
            .flatten()
            .find(|field| !field.trim().is_empty())
    }
}

/// Split a bare specifier into package name and optional subpath.
///
/// `lodash/join` -> (`lodash`, `join`), `@scope/pkg/x` -> (`@scope/pkg`, `x`).
pub(super) fn split_bare_specifier(specifier: &str) -> Option<(&str, Option<&str>)> {
    if specifier.is_empty() {
        return None;
    }

    let name_end = if specifier.starts_with('@') {
        let scope_end = specifier.find('/')?;
        specifier[scope_end + 1..]
            .find('/')
            .map_or(specifier.len(), |idx| scope_end + 1 + idx)
    } else {
        specifier.find('/').unwrap_or(specifier.len())
    };

    let name = &specifier[..name_end];
    let subpath = specifier
        .get(name_end + 1..)
        .filter(|subpath| !subpath.is_empty());
    Some((name, subpath))
}
