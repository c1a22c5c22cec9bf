//! Pluggable config validation strategies
//!
//! Separates filesystem validation (for CLI use) from schema validation (for library use).

use std::path::Path;

use regex::Regex;

use crate::bundle::BundleOptions;
use crate::error::{ConfigError, Result};
use crate::settings::GlobalSettings;

/// Placeholders that make a file name template unique per chunk.
const UNIQUE_PLACEHOLDERS: [&str; 5] = ["[name]", "[id]", "[chunkhash", "[contenthash", "[hash"];

/// Trait for pluggable config validation strategies
pub trait ConfigValidator {
    /// Validate bundle options
    fn validate(&self, config: &BundleOptions) -> Result<()>;
}

/// Schema-only validation (no filesystem checks)
///
/// # Example
///
/// ```
/// use kiln_config::{BundleOptions, ConfigValidator, SchemaValidator};
///
/// let config = BundleOptions::default().entry("main", "./src/index.js");
/// SchemaValidator.validate(&config).unwrap();
/// ```
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &BundleOptions) -> Result<()> {
        if config.entries.is_empty() {
            return Err(ConfigError::NoEntries);
        }

        for (name, spec) in &config.entries {
            if name.trim().is_empty() {
                return Err(ConfigError::schema(
                    "entry names cannot be empty",
                    "Give every entry a name, e.g. main = \"./src/index.js\"",
                ));
            }
            let specifiers = spec.specifiers();
            if specifiers.is_empty() || specifiers.iter().any(|s| s.trim().is_empty()) {
                return Err(ConfigError::schema(
                    format!("entry '{name}' has an empty module specifier"),
                    "Point every entry at at least one module",
                ));
            }
        }

        for (field, template) in [
            ("output.filename", &config.output.filename),
            ("output.chunk_filename", &config.output.chunk_filename),
        ] {
            if !UNIQUE_PLACEHOLDERS.iter().any(|p| template.contains(p)) {
                return Err(ConfigError::schema(
                    format!("{field} template '{template}' would give every chunk the same file name"),
                    "Include [name], [id] or a hash placeholder such as [chunkhash]",
                ));
            }
        }

        if config.output.manifest.trim().is_empty() {
            return Err(ConfigError::schema(
                "output.manifest cannot be empty",
                "Use the default manifest.json or another file name",
            ));
        }

        for group in config.split_chunks.cache_groups() {
            let label = group.name.as_deref().unwrap_or("<default>");
            if group.min_chunks == 0 {
                return Err(ConfigError::schema(
                    format!("split_chunks group '{label}' has min_chunks = 0"),
                    "min_chunks must be at least 1",
                ));
            }
            if let Some(test) = &group.test {
                if let Err(err) = Regex::new(test) {
                    return Err(ConfigError::schema(
                        format!("split_chunks group '{label}' has an invalid test pattern: {err}"),
                        "test is a regular expression matched against module paths",
                    ));
                }
            }
        }

        if config.max_depth == 0 {
            return Err(ConfigError::schema(
                "max_depth must be at least 1",
                "Remove max_depth to use the default of 1024",
            ));
        }

        Ok(())
    }
}

/// Validate global settings.
pub fn validate_settings(settings: &GlobalSettings) -> Result<()> {
    if settings.parallel_jobs == Some(0) {
        return Err(ConfigError::schema(
            "settings.parallel_jobs must be at least 1",
            "Remove parallel_jobs to use one job per CPU",
        ));
    }
    Ok(())
}

/// Filesystem validator (for CLI use)
///
/// Checks that relative entry specifiers point at files under the root.
/// Bare package specifiers are left to the resolver.
pub struct FsValidator {
    root: std::path::PathBuf,
}

impl FsValidator {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ConfigValidator for FsValidator {
    fn validate(&self, config: &BundleOptions) -> Result<()> {
        SchemaValidator.validate(config)?;

        for (_, specifiers) in config.entry_specifiers() {
            for specifier in specifiers {
                if !specifier.starts_with("./") && !specifier.starts_with("../") {
                    continue;
                }
                let path = self.root.join(specifier);
                let found = path.exists()
                    || config
                        .resolve
                        .extensions
                        .iter()
                        .any(|ext| self.root.join(format!("{specifier}{ext}")).exists());
                if !found {
                    return Err(ConfigError::EntryNotFound(path));
                }
            }
        }

        Ok(())
    }
}

/// Convenience function for schema-only validation
pub fn validate_schema(config: &BundleOptions) -> Result<()> {
    SchemaValidator.validate(config)
}

/// Convenience function for filesystem validation
pub fn validate_fs(config: &BundleOptions, root: impl AsRef<Path>) -> Result<()> {
    FsValidator::new(root).validate(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{CacheGroup, ChunkScope};

    fn valid() -> BundleOptions {
        BundleOptions::default().entry("main", "./src/index.js")
    }

    #[test]
    fn schema_validator_rejects_empty_entries() {
        let result = SchemaValidator.validate(&BundleOptions::default());
        assert!(matches!(result.unwrap_err(), ConfigError::NoEntries));
    }

    #[test]
    fn schema_validator_accepts_valid_config() {
        assert!(SchemaValidator.validate(&valid()).is_ok());
    }

    #[test]
    fn schema_validator_rejects_constant_filename() {
        let mut config = valid();
        config.output.chunk_filename = "bundle.js".to_string();
        let err = SchemaValidator.validate(&config).unwrap_err();
        assert!(err.to_string().contains("output.chunk_filename"));
        assert!(err.hint().is_some());
    }

    #[test]
    fn schema_validator_rejects_bad_group_regex() {
        let mut config = valid();
        config.split_chunks.groups.push(CacheGroup {
            name: Some("vendor".to_string()),
            test: Some("node_modules[".to_string()),
            chunks: ChunkScope::Initial,
            min_size: 0,
            min_chunks: 1,
        });
        let err = SchemaValidator.validate(&config).unwrap_err();
        assert!(err.to_string().contains("vendor"));
    }

    #[test]
    fn schema_validator_rejects_zero_min_chunks() {
        let mut config = valid();
        config.split_chunks.min_chunks = 0;
        assert!(SchemaValidator.validate(&config).is_err());
    }

    #[test]
    fn settings_reject_zero_parallel_jobs() {
        let settings = GlobalSettings {
            log_level: None,
            parallel_jobs: Some(0),
        };
        assert!(validate_settings(&settings).is_err());
        assert!(validate_settings(&GlobalSettings::default()).is_ok());
    }
}
