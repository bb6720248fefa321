//! Source connection configuration.

use crate::error::{CollectorError, Result, redact_url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

const CONFIG_SOURCE: &str = "config";

/// Where and how a collector connects.
///
/// # Security
/// This struct intentionally does NOT store passwords or credentials.
/// Credentials must be handled separately and never logged or serialized.
///
/// # Example
/// ```rust
/// use metasurveyor_core::config::ConnectionConfig;
///
/// let config = ConnectionConfig::new("warehouse.internal")
///     .with_port(9000)
///     .with_database("analytics")
///     .with_username("reader");
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Source host address
    pub host: String,
    /// Optional port number
    pub port: Option<u16>,
    /// Optional database / catalog to connect to
    pub database: Option<String>,
    /// Optional username (password handled separately)
    pub username: Option<String>,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Per-query timeout duration
    pub query_timeout: Duration,
    /// Driver-specific options
    pub properties: BTreeMap<String, String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: None,
            database: None,
            username: None,
            connect_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(30),
            properties: BTreeMap::new(),
        }
    }
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ConnectionConfig({}{}{})",
            self.host,
            self.port.map_or_else(String::new, |p| format!(":{}", p)),
            self.database
                .as_ref()
                .map_or_else(String::new, |db| format!("/{}", db))
        )
        // Intentionally omit username and never include credentials
    }
}

impl ConnectionConfig {
    /// Creates a new connection config with safe defaults.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Parses host, port, database and username from a connection URL.
    ///
    /// Any password in the URL is discarded. Query parameters become
    /// `properties`.
    ///
    /// # Errors
    /// `INVALID_CONFIG` if the URL cannot be parsed or has no host. The URL is
    /// redacted in the error message.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = url::Url::parse(url).map_err(|e| {
            CollectorError::invalid_config(
                CONFIG_SOURCE,
                "parse_url",
                format!("invalid connection URL {}", redact_url(url)),
            )
            .with_cause(e)
        })?;

        let host = parsed.host_str().filter(|h| !h.is_empty()).ok_or_else(|| {
            CollectorError::invalid_config(
                CONFIG_SOURCE,
                "parse_url",
                format!("connection URL {} has no host", redact_url(url)),
            )
        })?;

        let database = parsed
            .path()
            .trim_start_matches('/')
            .split('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .map(str::to_string);
        let username = Some(parsed.username())
            .filter(|user| !user.is_empty())
            .map(str::to_string);
        let properties = parsed
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        Ok(Self {
            host: host.to_string(),
            port: parsed.port(),
            database,
            username,
            properties,
            ..Default::default()
        })
    }

    /// Validates connection configuration parameters.
    ///
    /// # Errors
    /// Returns `INVALID_CONFIG` if a value is empty or zero.
    pub fn validate(&self) -> Result<()> {
        let invalid =
            |message: &str| Err(CollectorError::invalid_config(CONFIG_SOURCE, "validate", message));

        if self.host.is_empty() {
            return invalid("host cannot be empty");
        }

        if self.port == Some(0) {
            return invalid("port must be greater than 0");
        }

        if self.connect_timeout.is_zero() {
            return invalid("connect_timeout must be greater than 0");
        }

        if self.query_timeout.is_zero() {
            return invalid("query_timeout must be greater than 0");
        }

        Ok(())
    }

    /// Builder method to set port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Builder method to set database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Builder method to set username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Builder method to set the query timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Builder method to add a driver-specific property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
