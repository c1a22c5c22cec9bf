use std::borrow::Cow;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use path_clean::PathClean;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const VIRTUAL_PREFIX: &str = "virtual:";

/// Canonical identifier for a module in the graph.
///
/// Identifiers are cleaned absolute paths, so `./a/../b.js` and `b.js` seen
/// from the same directory compare equal. Symlinks are not followed. Virtual
/// modules keep their `virtual:` prefix and are never cleaned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(PathBuf);

impl ModuleId {
    /// Create an identifier from a path, anchoring relative paths at the
    /// process working directory.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ModuleIdError> {
        let path = path.as_ref();

        if path.as_os_str().is_empty() {
            return Err(ModuleIdError::EmptyPath);
        }

        if looks_like_virtual(path) {
            return Ok(Self(path.to_path_buf()));
        }

        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|source| ModuleIdError::CurrentDir { source })?
                .join(path)
        };

        Ok(Self(joined.clean()))
    }

    /// Create an identifier from a path the resolver already made absolute.
    pub fn from_resolved(path: impl AsRef<Path>) -> Self {
        Self(path.as_ref().clean())
    }

    /// Create a module identifier for a virtual module (e.g. `virtual:runtime`).
    pub fn new_virtual(id: impl Into<String>) -> Self {
        let id = id.into();
        let normalized = if id.starts_with(VIRTUAL_PREFIX) {
            id
        } else {
            format!("{VIRTUAL_PREFIX}{id}")
        };
        Self(PathBuf::from(normalized))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn is_virtual(&self) -> bool {
        looks_like_virtual(&self.0)
    }

    /// Borrow the identifier as a string for logging/serialization.
    pub fn path_string(&self) -> Cow<'_, str> {
        self.0.to_string_lossy()
    }

    /// File name without its extension, `module` when there is none.
    pub fn file_stem(&self) -> String {
        let stem = self
            .0
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = match stem.strip_prefix(VIRTUAL_PREFIX) {
            Some(rest) => rest.to_string(),
            None => stem,
        };

        // `pkg/index.js` is more recognisable by its directory.
        if stem == "index" {
            if let Some(parent) = self.0.parent().and_then(Path::file_name) {
                return parent.to_string_lossy().into_owned();
            }
        }

        if stem.is_empty() {
            "module".to_string()
        } else {
            stem
        }
    }

    /// Stable `/`-separated key relative to `root`, used in emitted code.
    ///
    /// Paths outside `root` keep their absolute form.
    pub fn relative_key(&self, root: &Path) -> String {
        if self.is_virtual() {
            return self.path_string().into_owned();
        }

        match self.0.strip_prefix(root) {
            Ok(relative) => {
                let parts: Vec<Cow<'_, str>> = relative
                    .components()
                    .filter_map(|component| match component {
                        Component::Normal(part) => Some(part.to_string_lossy()),
                        _ => None,
                    })
                    .collect();
                format!("./{}", parts.join("/"))
            }
            Err(_) => self.path_string().replace('\\', "/"),
        }
    }
}

fn looks_like_virtual(path: &Path) -> bool {
    path.to_string_lossy().starts_with(VIRTUAL_PREFIX)
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_string())
    }
}

impl Serialize for ModuleId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.path_string())
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        if value.starts_with(VIRTUAL_PREFIX) {
            Ok(ModuleId::new_virtual(value))
        } else {
            Ok(ModuleId(PathBuf::from(value)))
        }
    }
}

/// Errors that can occur while constructing a [`ModuleId`].
#[derive(Debug, Error)]
pub enum ModuleIdError {
    #[error("module path cannot be empty")]
    EmptyPath,

    #[error("failed to read current working directory: {source}")]
    CurrentDir {
        #[source]
        source: std::io::Error,
    },
}
