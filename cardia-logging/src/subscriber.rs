//! `tracing` subscriber setup for binaries embedding the event log
//!
//! The event log reports its own failures as `tracing` events under
//! [`crate::DIAGNOSTICS_TARGET`]. Binaries install a subscriber with
//! [`SubscriberConfig::initialize`] to see them.

use serde::{Deserialize, Serialize};
use std::env;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::{LoggingError, Result};

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event
    Json,
    /// Multi-line, human-oriented
    Pretty,
    /// Single line per event
    Compact,
}

/// Stream the subscriber writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

impl LogOutput {
    fn make_writer(self) -> BoxMakeWriter {
        match self {
            LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
            LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        }
    }
}

/// Global subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Output stream
    pub output: LogOutput,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            output: LogOutput::Stdout,
        }
    }
}

impl SubscriberConfig {
    /// Install the global subscriber. Fails if one is already installed.
    pub fn initialize(&self) -> Result<()> {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| self.level.clone());
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&level))
            .map_err(|e| LoggingError::Tracing(format!("Invalid log level: {e}")))?;

        let writer = self.output.make_writer();
        let registry = tracing_subscriber::registry().with(filter);

        let result = match self.format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_writer(writer))
                .try_init(),
            LogFormat::Pretty => registry
                .with(fmt::layer().pretty().with_writer(writer))
                .try_init(),
            LogFormat::Compact => registry
                .with(fmt::layer().compact().with_writer(writer))
                .try_init(),
        };

        result.map_err(|e| LoggingError::Tracing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SubscriberConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.output, LogOutput::Stdout);
    }

    #[test]
    fn test_config_from_json() {
        let config: SubscriberConfig =
            serde_json::from_str(r#"{"format": "json", "output": "stderr"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::Stderr);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_second_initialize_fails() {
        let config = SubscriberConfig {
            level: "warn".to_string(),
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
        };
        // Another test may have installed a subscriber first
        let _ = config.initialize();
        assert!(matches!(config.initialize(), Err(LoggingError::Tracing(_))));
    }
}
