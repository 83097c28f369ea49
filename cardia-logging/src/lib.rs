//! Client event log for the CardiaVue clinic dashboard
//!
//! This crate provides the dashboard's structured logging facility:
//! - A bounded, append-only event log mirrored to durable key-value storage
//! - A per-session correlation token attached to every entry
//! - Typed entry builders for user actions, authentication, navigation, API calls and faults
//! - Query views (level, type, time range) and JSON/CSV export
//! - Fault hooks that funnel panics and failed background tasks into the log
//!
//! # Example
//!
//! ```rust,no_run
//! use cardia_logging::{EntryData, EventLog, LoggerConfig, LogLevel};
//! use std::time::Duration;
//!
//! let log = EventLog::builder()
//!     .config(LoggerConfig::development())
//!     .build()
//!     .expect("valid logger configuration");
//!
//! log.navigation("/login", "/dashboard", "redirect");
//! log.api_call("/transmissions/stats/dashboard", "GET", 200, Duration::from_millis(84), serde_json::Value::Null);
//! log.info("Dashboard ready", EntryData::empty());
//!
//! assert!(!log.logs_by_level(LogLevel::Info).is_empty());
//! println!("{}", log.export_logs_as("csv").unwrap());
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod api;
pub mod auth;
pub mod builders;
pub mod config;
pub mod entry;
pub mod event_log;
pub mod export;
pub mod hooks;
pub mod metrics;
pub mod sanitization;
pub mod session;
pub mod sinks;
pub mod storage;
pub mod subscriber;

#[cfg(test)]
mod lib_tests;

// Re-export main types for convenience
pub use api::{ApiError, ClientConfig, DashboardClient, DashboardStats, DeviceTypeCounts};
pub use auth::{AuthRecord, CredentialStore};
pub use config::LoggerConfig;
pub use entry::{EntryData, ErrorCapture, EventData, LogEntry, LogLevel};
pub use event_log::{EventLog, EventLogBuilder, LogSummary};
pub use export::ExportFormat;
pub use hooks::{FaultHooks, monitor_task, spawn_monitored};
pub use metrics::{AppendReport, HealthSnapshot, LoggerHealth, PersistStatus, RemoteStatus};
pub use sanitization::{LogSanitizer, SanitizationConfig};
pub use session::SessionIdentity;
pub use sinks::{
    ConsoleSink, HttpRemoteSink, NullRemoteSink, RemoteSink, SinkError, TracingConsoleSink,
    TracingRemoteSink,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use subscriber::{LogFormat, LogOutput, SubscriberConfig};

/// `tracing` target for the logger's own failures. Events under this target
/// are never written back into the event log.
pub const DIAGNOSTICS_TARGET: &str = "cardia_logging::diagnostics";

/// Result type for logging operations
pub type Result<T> = std::result::Result<T, LoggingError>;

/// Logging error types
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Invalid logger configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key-value store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Export format other than json or csv
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    /// Free-form data used a reserved key
    #[error("Reserved data field: {0}")]
    ReservedField(String),

    /// Unknown level name
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    /// The global subscriber could not be installed
    #[error("Tracing error: {0}")]
    Tracing(String),
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
