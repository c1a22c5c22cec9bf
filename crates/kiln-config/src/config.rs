//! High-level configuration structure for Kiln.
//!
//! This module provides the main `KilnConfig` struct and profile merging logic.
//! A profile is a partial override merged over the base configuration, which is
//! how one base config fans out into several page builds.
//! For file discovery, see the `discovery` module.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bundle::BundleOptions;
use crate::error::{ConfigError, Result as ConfigResult};
use crate::settings::GlobalSettings;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KilnConfig {
    #[serde(default)]
    pub bundle: BundleOptions,

    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,

    #[serde(default)]
    pub settings: GlobalSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub bundle: Value,

    #[serde(default)]
    pub settings: Value,
}

impl KilnConfig {
    /// Create from serde_json::Value (for programmatic config)
    ///
    /// # Example
    ///
    /// ```
    /// use kiln_config::KilnConfig;
    /// use serde_json::json;
    ///
    /// let value = json!({
    ///     "bundle": {
    ///         "entries": { "app": "./src/app.js" },
    ///         "tree_shaking": "aggressive"
    ///     }
    /// });
    ///
    /// let config = KilnConfig::from_value(value).unwrap();
    /// assert_eq!(config.bundle.entries.len(), 1);
    /// ```
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            message: e.to_string(),
        })
    }

    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        toml::from_str(source).map_err(|e| ConfigError::InvalidValue {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Convert to serde_json::Value
    pub fn to_value(&self) -> ConfigResult<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            message: e.to_string(),
        })
    }

    /// Merge the named profile over the base configuration.
    ///
    /// Objects merge key by key; arrays and scalars in the profile replace the
    /// base value.
    pub fn materialize_profile(mut self, profile: Option<&str>) -> ConfigResult<Self> {
        let Some(name) = profile else {
            return Ok(self);
        };

        let profile_cfg = self
            .profiles
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?;

        if !profile_cfg.bundle.is_null() {
            self.bundle = merge_section(&self.bundle, &profile_cfg.bundle)?;
        }

        if !profile_cfg.settings.is_null() {
            self.settings = merge_section(&self.settings, &profile_cfg.settings)?;
        }

        tracing::debug!(profile = name, "materialized configuration profile");
        Ok(self)
    }

    /// Materialize every profile, sorted by name.
    pub fn materialize_all(&self) -> ConfigResult<Vec<(String, KilnConfig)>> {
        let mut names: Vec<&String> = self.profiles.keys().collect();
        names.sort();

        names
            .into_iter()
            .map(|name| {
                self.clone()
                    .materialize_profile(Some(name))
                    .map(|config| (name.clone(), config))
            })
            .collect()
    }
}

fn merge_section<T>(base: &T, update: &Value) -> ConfigResult<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let mut merged = serde_json::to_value(base).map_err(|err| {
        ConfigError::InvalidProfileOverride {
            message: err.to_string(),
        }
    })?;
    merge_values(&mut merged, update);
    serde_json::from_value(merged).map_err(|err| ConfigError::InvalidProfileOverride {
        message: err.to_string(),
    })
}

fn merge_values(target: &mut Value, update: &Value) {
    match (target, update) {
        (Value::Object(target_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_values(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target_slot, _) => {
            *target_slot = update.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{EntrySpec, TreeShakingMode};
    use serde_json::json;

    #[test]
    fn from_value_creates_config() {
        let value = json!({
            "bundle": {
                "entries": { "app": "./src/app.js" },
                "split_chunks": { "name": "vendor", "min_size": 100 }
            }
        });

        let config = KilnConfig::from_value(value).unwrap();
        assert_eq!(
            config.bundle.entries.get("app"),
            Some(&EntrySpec::Single("./src/app.js".to_string()))
        );
        assert_eq!(config.bundle.split_chunks.name.as_deref(), Some("vendor"));
        assert_eq!(config.bundle.split_chunks.min_size, 100);
        assert_eq!(config.bundle.split_chunks.min_chunks, 2);
    }

    #[test]
    fn to_value_serializes_config() {
        let mut config = KilnConfig::default();
        config.bundle.tree_shaking = TreeShakingMode::Aggressive;

        let value = config.to_value().unwrap();
        assert_eq!(value["bundle"]["tree_shaking"], json!("aggressive"));
    }

    #[test]
    fn profile_merging_keeps_base_entries() {
        let value = json!({
            "bundle": {
                "entries": { "react": ["react"] },
                "split_chunks": { "name": "react", "min_chunks": 2 }
            },
            "profiles": {
                "page-a": {
                    "bundle": { "entries": { "a": "./src/pages/a" } }
                }
            }
        });

        let config = KilnConfig::from_value(value)
            .unwrap()
            .materialize_profile(Some("page-a"))
            .unwrap();

        let names: Vec<&str> = config.bundle.entries.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["react", "a"]);
        assert_eq!(config.bundle.split_chunks.name.as_deref(), Some("react"));
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let err = KilnConfig::default()
            .materialize_profile(Some("missing"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile(name) if name == "missing"));
    }
}
