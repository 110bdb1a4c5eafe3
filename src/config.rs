//! Configuration management for the client
//!
//! Settings come from a TOML file, environment variables, or both. Missing
//! keys fall back to defaults that match a stock local server.
//!
//! ```toml
//! [connection]
//! host = "tsdb.example.com"
//! port = 4242
//! scheme = "http"
//! timeout_ms = 30000
//!
//! [logging]
//! log_level = "info"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Where the store lives
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Logging preferences
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Server host name or address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// URL scheme, `http` or `https`
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Logging configuration
///
/// The library only emits `tracing` events; installing a subscriber is left
/// to the application, which may read the level from here.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions
fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    4242
}
fn default_scheme() -> String {
    "http".to_string()
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            scheme: default_scheme(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ConnectionConfig {
    /// `scheme://host:port`, without a trailing slash
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Validate connection settings
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Configuration("Host cannot be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Configuration("Port cannot be 0".to_string()));
        }
        if self.scheme != "http" && self.scheme != "https" {
            return Err(Error::Configuration(format!(
                "Unsupported scheme '{}', expected http or https",
                self.scheme
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Configuration("Timeout must be > 0".to_string()));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {}: {}", path, e))
        })?;

        toml::from_str(&contents).map_err(|e| {
            Error::Configuration(format!("Failed to parse config file {}: {}", path, e))
        })
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    ///
    /// Reads `OPENTSDB_HOST`, `OPENTSDB_PORT`, `OPENTSDB_TIMEOUT_MS` and
    /// `RUST_LOG`. Values that fail to parse are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("OPENTSDB_HOST") {
            self.connection.host = host;
        }
        if let Ok(port) = std::env::var("OPENTSDB_PORT") {
            if let Ok(p) = port.parse() {
                self.connection.port = p;
            }
        }
        if let Ok(timeout) = std::env::var("OPENTSDB_TIMEOUT_MS") {
            if let Ok(t) = timeout.parse() {
                self.connection.timeout_ms = t;
            }
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.logging.log_level = log_level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.connection.validate()?;

        let level = self.logging.log_level.to_ascii_lowercase();
        if !matches!(
            level.as_str(),
            "error" | "warn" | "info" | "debug" | "trace" | "off"
        ) {
            return Err(Error::Configuration(format!(
                "Unknown log level '{}'",
                self.logging.log_level
            )));
        }

        Ok(())
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents).map_err(|e| {
            Error::Configuration(format!("Failed to write config file {}: {}", path, e))
        })
    }
}
