//! TOML configuration with environment overrides.
//!
//! Every field has a default, so a missing file section (or a missing file,
//! see [`Config::load`]) still yields a runnable server.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::broker::connection::ConnectionLimits;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7253";
pub const CONFIG_ENV: &str = "HOBBYQ_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("config parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Connections served at once; further clients wait in the listen backlog.
    pub max_connections: usize,
    pub handshake_timeout_ms: u64,
    /// Deadline for finishing a request frame once it has started. Idle time
    /// between requests is unbounded. 0 disables the deadline.
    pub frame_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_connections: 1024,
            handshake_timeout_ms: 5_000,
            frame_timeout_ms: 30_000,
        }
    }
}

impl ServerConfig {
    pub fn connection_limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            frame_timeout: match self.frame_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` (or `$HOBBYQ_CONFIG` when `path` is `None`), then applies
    /// environment overrides. With neither, defaults are used.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let effective_path = path.map(str::to_string).or_else(|| env::var(CONFIG_ENV).ok());
        let mut config = match effective_path {
            Some(p) => load_config(p)?,
            None => Config::default(),
        };

        if let Ok(v) = env::var("HOBBYQ_BIND_ADDR") {
            config.server.bind_addr = v;
        }
        if let Ok(v) = env::var("HOBBYQ_MAX_CONNECTIONS") {
            config.server.max_connections = v
                .parse()
                .map_err(|e| ConfigError::Parse(format!("HOBBYQ_MAX_CONNECTIONS: {e}")))?;
        }
        if let Ok(v) = env::var("HOBBYQ_LOG_LEVEL") {
            config.logging.level = v;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_connections == 0 {
            return Err(ConfigError::Parse(
                "server.max_connections must be at least 1".to_string(),
            ));
        }
        if self.server.handshake_timeout_ms == 0 {
            return Err(ConfigError::Parse(
                "server.handshake_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let raw: String = fs::read_to_string(path)?;
    Config::from_toml(&raw)
}
