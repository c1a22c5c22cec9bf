//! Error types for configuration validation and loading.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    // Filesystem validation errors
    #[error("entry path not found: {0}")]
    EntryNotFound(PathBuf),

    // Config parsing/loading errors
    #[error("config not found in {0}")]
    NotFound(PathBuf),

    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid config value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("invalid profile override: {message}")]
    InvalidProfileOverride { message: String },

    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    // Schema validation errors (no filesystem checks)
    #[error("no entries specified")]
    NoEntries,

    #[error("schema validation failed: {message}")]
    SchemaValidation {
        message: String,
        hint: Option<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn schema(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::SchemaValidation {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    /// Help text attached to schema errors, if any.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::SchemaValidation { hint, .. } => hint.as_deref(),
            Self::NoEntries => Some("Add at least one entry under [bundle.entries]"),
            _ => None,
        }
    }
}
