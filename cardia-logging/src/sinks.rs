//! Console and remote sinks
//!
//! The console sink mirrors entries in development mode. The remote sink
//! receives error entries in production. Neither may block the caller.

use tracing::{debug, error, info, warn};

use crate::DIAGNOSTICS_TARGET;
use crate::entry::{LogEntry, LogLevel};

/// `tracing` target used by [`TracingConsoleSink`]
pub const CONSOLE_TARGET: &str = "cardia_logging::console";

/// `tracing` target used by [`TracingRemoteSink`]
pub const REMOTE_TARGET: &str = "cardia_logging::remote";

/// Sink errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Forwarding needs a tokio runtime on the calling thread
    #[error("No async runtime available for remote forwarding")]
    NoRuntime,

    /// The entry could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The sink rejected the entry
    #[error("Forward error: {0}")]
    Forward(String),
}

/// Development-mode mirror, one call per entry
pub trait ConsoleSink: Send + Sync {
    /// Mirror one entry
    fn emit(&self, entry: &LogEntry);
}

/// Production error forwarding. Implementations must return without waiting
/// on the network.
pub trait RemoteSink: Send + Sync {
    /// Hand one error entry to the remote service
    fn forward(&self, entry: &LogEntry) -> Result<(), SinkError>;
}

/// Mirrors entries as `tracing` events at the matching level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConsoleSink;

impl ConsoleSink for TracingConsoleSink {
    fn emit(&self, entry: &LogEntry) {
        let data = serde_json::to_string(&entry.data).unwrap_or_default();
        let entry_type = entry.type_name().unwrap_or("");

        match entry.level {
            LogLevel::Error => error!(
                target: CONSOLE_TARGET,
                entry_id = %entry.id,
                entry_type,
                data = %data,
                error = ?entry.error,
                "[{}] {}", entry.level, entry.message
            ),
            LogLevel::Warn => warn!(
                target: CONSOLE_TARGET,
                entry_id = %entry.id,
                entry_type,
                data = %data,
                "[{}] {}", entry.level, entry.message
            ),
            LogLevel::Info => info!(
                target: CONSOLE_TARGET,
                entry_id = %entry.id,
                entry_type,
                data = %data,
                "[{}] {}", entry.level, entry.message
            ),
            LogLevel::Debug => debug!(
                target: CONSOLE_TARGET,
                entry_id = %entry.id,
                entry_type,
                data = %data,
                "[{}] {}", entry.level, entry.message
            ),
        }
    }
}

/// Drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRemoteSink;

impl RemoteSink for NullRemoteSink {
    fn forward(&self, _entry: &LogEntry) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Placeholder remote sink that records what would have been sent
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRemoteSink;

impl RemoteSink for TracingRemoteSink {
    fn forward(&self, entry: &LogEntry) -> Result<(), SinkError> {
        info!(
            target: REMOTE_TARGET,
            entry_id = %entry.id,
            session_id = %entry.session_id,
            entry_message = %entry.message,
            "Log entry would be sent to remote service"
        );
        Ok(())
    }
}

/// POSTs each entry as JSON to a collector endpoint
///
/// The request is spawned onto the current tokio runtime and never awaited by
/// the caller. Delivery failures are reported under the diagnostics target.
#[derive(Debug, Clone)]
pub struct HttpRemoteSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRemoteSink {
    /// Sink posting to `endpoint` with a default client
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    /// Sink posting to `endpoint` with a preconfigured client
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Collector URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl RemoteSink for HttpRemoteSink {
    fn forward(&self, entry: &LogEntry) -> Result<(), SinkError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| SinkError::NoRuntime)?;

        let body = serde_json::to_vec(entry)?;
        let request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        let entry_id = entry.id.clone();
        let endpoint = self.endpoint.clone();

        handle.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(entry_id = %entry_id, "Forwarded log entry to remote service");
                }
                Ok(response) => {
                    warn!(
                        target: DIAGNOSTICS_TARGET,
                        entry_id = %entry_id,
                        endpoint = %endpoint,
                        status = %response.status(),
                        "Remote log service rejected entry"
                    );
                }
                Err(e) => {
                    warn!(
                        target: DIAGNOSTICS_TARGET,
                        entry_id = %entry_id,
                        endpoint = %endpoint,
                        error = %e,
                        "Failed to send log to remote service"
                    );
                }
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryData, entry_timestamp};

    fn sample_entry(level: LogLevel) -> LogEntry {
        LogEntry {
            id: "1-deadbeef".to_string(),
            timestamp: entry_timestamp(),
            level,
            message: "sample".to_string(),
            data: EntryData::empty(),
            error: None,
            origin: "http://localhost:3000/".to_string(),
            client_info: "test".to_string(),
            session_id: "session_1_abc".to_string(),
        }
    }

    #[test]
    fn test_console_sink_handles_every_level() {
        for level in LogLevel::ALL {
            TracingConsoleSink.emit(&sample_entry(level));
        }
    }

    #[test]
    fn test_stub_sinks_accept_entries() {
        let entry = sample_entry(LogLevel::Error);
        assert!(NullRemoteSink.forward(&entry).is_ok());
        assert!(TracingRemoteSink.forward(&entry).is_ok());
    }

    #[test]
    fn test_http_sink_requires_runtime() {
        let sink = HttpRemoteSink::new("http://127.0.0.1:9/logs");
        let result = sink.forward(&sample_entry(LogLevel::Error));
        assert!(matches!(result, Err(SinkError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_http_sink_is_fire_and_forget() {
        // Nothing listens on the discard port; forward still returns at once
        let sink = HttpRemoteSink::new("http://127.0.0.1:9/logs");
        assert!(sink.forward(&sample_entry(LogLevel::Error)).is_ok());
        assert_eq!(sink.endpoint(), "http://127.0.0.1:9/logs");
    }
}
