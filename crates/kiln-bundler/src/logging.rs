//! Logging utilities for kiln-bundler
//!
//! This module is only available with the `logging` feature.
//!
//! For library users: kiln emits tracing events - install your own subscriber.
//! For application developers: use these convenience functions.

use std::sync::Once;

use kiln_config::GlobalSettings;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log level for kiln output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// No logging output
    Silent,
    /// Only errors
    Error,
    /// Errors and warnings (duplicated shared modules are reported here)
    Warn,
    /// One line per build phase (default)
    #[default]
    Info,
    /// Per-module and per-chunk detail
    Debug,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Silent => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    /// Level named by `settings.log_level`, or the default.
    pub fn from_settings(settings: &GlobalSettings) -> Result<Self, String> {
        settings
            .log_level
            .as_deref()
            .map_or(Ok(Self::default()), str::parse)
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" | "off" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(format!("Invalid log level: {}", other)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter())
    }
}

/// Initialize kiln logging with the given level.
///
/// `RUST_LOG` takes precedence when set. Only the first call in a process
/// has an effect, and an already-installed global subscriber is left alone.
///
/// # Example
///
/// ```rust,no_run
/// use kiln_bundler::logging::{init_logging, LogLevel};
///
/// init_logging(LogLevel::Info);
/// ```
pub fn init_logging(level: LogLevel) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));
        install(filter);
    });
}

/// Initialize logging from the `RUST_LOG` environment variable.
///
/// Falls back to Info level if RUST_LOG is not set or invalid.
pub fn init_logging_from_env() {
    init_logging(LogLevel::Info);
}

fn install(filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false).without_time())
        .try_init();
}
