//! Global configuration settings shared across profiles.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Log level name (`silent`, `error`, `warn`, `info`, `debug`).
    #[serde(default)]
    pub log_level: Option<String>,

    /// Upper bound on concurrent resolve/parse workers. Defaults to the core count.
    #[serde(default)]
    pub parallel_jobs: Option<usize>,
}
