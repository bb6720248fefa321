//! Engine-wide settings loaded from JSON.

use crate::error::{CollectorError, Result};
use crate::matching::MatchingConfig;
use crate::retry::RetryConfig;
use crate::statistics::statistics_timeout;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const CONFIG_SOURCE: &str = "config";

/// Default soft budget for statistics collection, in seconds.
pub const DEFAULT_STATISTICS_TIMEOUT_SECS: i64 = 60;

/// Retry, matching and statistics settings for one engine run.
///
/// Every field is optional in JSON; missing fields take their defaults.
///
/// ```json
/// {
///   "retry": { "max_retries": 2, "initial_backoff_ms": 100 },
///   "matching": { "pattern_type": "glob", "tables": { "exclude": ["*_tmp"] } },
///   "statistics_timeout_secs": 30
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Retry policy for driver calls
    pub retry: RetryConfig,
    /// Include/exclude filters for catalogs, schemas and tables
    pub matching: MatchingConfig,
    /// Soft statistics budget; zero or negative disables it
    pub statistics_timeout_secs: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            matching: MatchingConfig::default(),
            statistics_timeout_secs: DEFAULT_STATISTICS_TIMEOUT_SECS,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON document.
    ///
    /// Matching patterns are compiled once here so a malformed pattern is
    /// reported at load time rather than mid-collection.
    ///
    /// # Errors
    /// `INVALID_CONFIG` for malformed JSON, invalid retry settings or invalid
    /// patterns.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            CollectorError::invalid_config(
                CONFIG_SOURCE,
                "from_json_str",
                format!("invalid engine configuration: {e}"),
            )
            .with_cause(e)
        })?;
        config.matching.compile()?;
        Ok(config)
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    /// `NOT_FOUND` if the file does not exist, `INVALID_CONFIG` otherwise.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            let message = format!("failed to read {}: {e}", path.display());
            let err = if e.kind() == std::io::ErrorKind::NotFound {
                CollectorError::not_found(CONFIG_SOURCE, "from_file", message)
            } else {
                CollectorError::invalid_config(CONFIG_SOURCE, "from_file", message)
            };
            err.with_cause(e)
        })?;

        tracing::debug!(path = %path.display(), "loading engine configuration");
        Self::from_json_str(&contents)
    }

    /// The statistics budget as a duration.
    pub fn statistics_timeout(&self) -> Duration {
        statistics_timeout(self.statistics_timeout_secs)
    }
}
