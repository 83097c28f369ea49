//! Logger configuration

use serde::{Deserialize, Serialize};

use crate::{LoggingError, Result};

/// Default cap on retained entries
pub const DEFAULT_MAX_LOGS: usize = 1000;

/// Durable-store key holding the serialized log
pub const LOGS_STORAGE_KEY: &str = "cardiaVue_logs";

/// Session-store key holding the session token
pub const SESSION_STORAGE_KEY: &str = "cardiaVue_sessionId";

/// Event log configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Maximum number of retained entries; oldest are evicted first
    pub max_logs: usize,

    /// Development mode: mirror to the console sink, record debug entries,
    /// never forward to the remote sink
    pub development: bool,

    /// Mirror entries to the console sink (development mode only)
    pub enable_console: bool,

    /// Mirror the log to the durable store after every append
    pub enable_persistence: bool,

    /// Record an entry when the log is constructed
    pub announce_startup: bool,

    /// Redact sensitive values from messages and entry data
    pub sanitize: bool,

    /// Durable-store key for the serialized log
    pub storage_key: String,

    /// Session-store key for the session token
    pub session_key: String,

    /// Origin recorded on every entry
    pub origin: String,

    /// Client identifier recorded on every entry
    pub client_info: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            max_logs: DEFAULT_MAX_LOGS,
            development: cfg!(debug_assertions),
            enable_console: true,
            enable_persistence: true,
            announce_startup: true,
            sanitize: true,
            storage_key: LOGS_STORAGE_KEY.to_string(),
            session_key: SESSION_STORAGE_KEY.to_string(),
            origin: "http://localhost:3000/".to_string(),
            client_info: format!("cardia-logging/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl LoggerConfig {
    /// Development-mode configuration
    pub fn development() -> Self {
        Self {
            development: true,
            ..Default::default()
        }
    }

    /// Production-mode configuration
    pub fn production() -> Self {
        Self {
            development: false,
            ..Default::default()
        }
    }

    /// Defaults overlaid with `CARDIA_ENV`, `CARDIA_MAX_LOGS`, `CARDIA_ORIGIN`
    /// and `CARDIA_CLIENT_INFO`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LoggerConfig::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(env) = lookup("CARDIA_ENV") {
            config.development = match env.trim().to_ascii_lowercase().as_str() {
                "development" | "dev" => true,
                "production" | "prod" => false,
                other => {
                    return Err(LoggingError::Config(format!(
                        "Invalid value for CARDIA_ENV: {other}"
                    )));
                }
            };
        }

        if let Some(max_logs) = lookup("CARDIA_MAX_LOGS") {
            config.max_logs = max_logs.trim().parse().map_err(|e| {
                LoggingError::Config(format!("Invalid value for CARDIA_MAX_LOGS: {e}"))
            })?;
        }

        if let Some(origin) = lookup("CARDIA_ORIGIN") {
            config.origin = origin;
        }

        if let Some(client_info) = lookup("CARDIA_CLIENT_INFO") {
            config.client_info = client_info;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject a zero cap and empty storage keys
    pub fn validate(&self) -> Result<()> {
        if self.max_logs == 0 {
            return Err(LoggingError::Config(
                "max_logs must be greater than zero".to_string(),
            ));
        }
        if self.storage_key.is_empty() || self.session_key.is_empty() {
            return Err(LoggingError::Config(
                "storage keys must not be empty".to_string(),
            ));
        }
        if self.storage_key == self.session_key {
            return Err(LoggingError::Config(
                "storage_key and session_key must differ".to_string(),
            ));
        }
        Ok(())
    }
}
