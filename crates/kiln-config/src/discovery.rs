//! File-based config discovery and layered loading.
//!
//! Handles finding Kiln configuration files and merging them with defaults and
//! `KILN_` environment variables.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized, Toml},
};

use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::IgnoredAny;

use crate::config::KilnConfig;
use crate::error::{ConfigError, Result};

/// File names searched, in order.
pub const CONFIG_FILE_NAMES: [&str; 2] = ["kiln.toml", "kiln.json"];

/// File-based configuration discovery
///
/// # Example
///
/// ```no_run
/// use kiln_config::ConfigDiscovery;
///
/// let discovery = ConfigDiscovery::new(".");
/// let config = discovery.load().unwrap();
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find a config file in the root directory (`kiln.toml`, then `kiln.json`).
    pub fn find(&self) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| self.root.join(name))
            .find(|path| path.is_file())
    }

    /// Load config from the discovered file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no config file is found.
    pub fn load(&self) -> Result<KilnConfig> {
        let path = self
            .find()
            .ok_or_else(|| ConfigError::NotFound(self.root.clone()))?;
        load_config(&path)
    }

    /// Load config with profile merging
    pub fn load_with_profile(&self, profile: &str) -> Result<KilnConfig> {
        self.load()?.materialize_profile(Some(profile))
    }
}

/// Load a config file.
///
/// Priority: `KILN_*` environment variables > file > defaults. Nested keys use
/// a double underscore, e.g. `KILN_BUNDLE__TREE_SHAKING=aggressive`.
pub fn load_config(path: &Path) -> Result<KilnConfig> {
    let format = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => FileFormat::Toml,
        Some("json") => FileFormat::Json,
        other => {
            return Err(ConfigError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            ));
        }
    };

    // Config is loaded before any Runtime exists.
    #[allow(clippy::disallowed_methods)]
    let content = std::fs::read_to_string(path)?;

    let mut figment = Figment::new().merge(Serialized::defaults(KilnConfig::default()));
    figment = match format {
        FileFormat::Toml => figment.merge(Toml::string(&content)),
        FileFormat::Json => figment.merge(Json::string(&content)),
    };
    figment = figment.merge(Env::prefixed("KILN_").split("__"));

    let mut config: KilnConfig = figment.extract().map_err(|e| ConfigError::InvalidValue {
        field: "configuration".to_string(),
        message: e.to_string(),
    })?;

    restore_entry_order(&mut config, &declared_entry_order(format, &content)?);

    tracing::debug!(
        path = %path.display(),
        entries = config.bundle.entries.len(),
        "loaded configuration"
    );
    Ok(config)
}

#[derive(Clone, Copy)]
enum FileFormat {
    Toml,
    Json,
}

#[derive(Default, Deserialize)]
struct EntryOrder {
    #[serde(default)]
    bundle: BundleEntryOrder,
}

#[derive(Default, Deserialize)]
struct BundleEntryOrder {
    #[serde(default)]
    entries: IndexMap<String, IgnoredAny>,
}

/// Entry names in the order the file declares them.
fn declared_entry_order(format: FileFormat, content: &str) -> Result<Vec<String>> {
    let order: EntryOrder = match format {
        FileFormat::Toml => toml::from_str(content).map_err(|e| ConfigError::InvalidValue {
            field: "toml".to_string(),
            message: e.to_string(),
        })?,
        FileFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::InvalidValue {
                field: "json".to_string(),
                message: e.to_string(),
            })?
        }
    };
    Ok(order.bundle.entries.into_keys().collect())
}

/// Layered providers merge through sorted maps; entry declaration order is
/// significant for chunk allocation, so it is reapplied from the file.
fn restore_entry_order(config: &mut KilnConfig, declared: &[String]) {
    let mut entries = std::mem::take(&mut config.bundle.entries);
    let mut ordered = IndexMap::with_capacity(entries.len());
    for name in declared {
        if let Some(spec) = entries.shift_remove(name) {
            ordered.insert(name.clone(), spec);
        }
    }
    ordered.extend(entries);
    config.bundle.entries = ordered;
}

/// Discover and load config from the current directory.
pub fn discover() -> Result<KilnConfig> {
    let root = std::env::current_dir()?;
    ConfigDiscovery::new(&root).load()
}

/// Discover and load config with a profile applied.
pub fn discover_with_profile(profile: &str) -> Result<KilnConfig> {
    let root = std::env::current_dir()?;
    ConfigDiscovery::new(&root).load_with_profile(profile)
}
