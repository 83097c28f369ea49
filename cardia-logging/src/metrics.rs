//! Health counters for the event log
//!
//! Persistence and remote forwarding never fail from the caller's point of
//! view. These counters, plus the per-append [`AppendReport`], are how
//! operators see that durable storage or the remote sink is degraded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::lock_unpoisoned;

/// Outcome of mirroring the log to durable storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistStatus {
    /// Persistence is turned off or the append was skipped
    #[default]
    Disabled,
    /// The full sequence was written
    Written,
    /// The store rejected the write
    Failed,
}

/// Outcome of forwarding an entry to the remote sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    /// Not an error entry, or development mode
    #[default]
    Skipped,
    /// Handed to the remote sink
    Forwarded,
    /// The sink returned an error or panicked
    Failed,
    /// Recorded while the thread was panicking; forwarded later
    Deferred,
}

/// What happened to a single append
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppendReport {
    /// The entry was added to the log
    pub recorded: bool,
    /// Entries dropped from the front to stay within the cap
    pub evicted: usize,
    /// Outcome of the durable write
    pub persistence: PersistStatus,
    /// The entry was mirrored to the console sink
    pub mirrored: bool,
    /// Outcome of remote forwarding
    pub remote: RemoteStatus,
}

impl AppendReport {
    /// Report for an append that did not record anything
    pub fn skipped() -> Self {
        Self::default()
    }
}

/// Cumulative counters for one event log
#[derive(Debug)]
pub struct LoggerHealth {
    appended: AtomicU64,
    evicted: AtomicU64,
    persist_failures: AtomicU64,
    remote_forwards: AtomicU64,
    remote_failures: AtomicU64,
    persistence_healthy: AtomicBool,
    last_persist_error: Mutex<Option<String>>,
    last_remote_error: Mutex<Option<String>>,
}

/// Point-in-time copy of [`LoggerHealth`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Entries recorded
    pub appended: u64,
    /// Entries dropped to stay within the cap
    pub evicted: u64,
    /// Durable writes that failed
    pub persist_failures: u64,
    /// Entries handed to the remote sink
    pub remote_forwards: u64,
    /// Forwards that failed or panicked
    pub remote_failures: u64,
    /// Whether the most recent durable write succeeded
    pub persistence_healthy: bool,
    /// Most recent durable write error
    pub last_persist_error: Option<String>,
    /// Most recent forwarding error
    pub last_remote_error: Option<String>,
    /// When the snapshot was taken
    pub snapshot_timestamp: DateTime<Utc>,
}

impl Default for LoggerHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggerHealth {
    /// Counters at zero, persistence healthy
    pub fn new() -> Self {
        Self {
            appended: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
            remote_forwards: AtomicU64::new(0),
            remote_failures: AtomicU64::new(0),
            persistence_healthy: AtomicBool::new(true),
            last_persist_error: Mutex::new(None),
            last_remote_error: Mutex::new(None),
        }
    }

    pub(crate) fn record_append(&self, evicted: usize) {
        self.appended.fetch_add(1, Ordering::Relaxed);
        self.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_persist_success(&self) {
        self.persistence_healthy.store(true, Ordering::Relaxed);
    }

    pub(crate) fn record_persist_failure(&self, error: &str) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
        self.persistence_healthy.store(false, Ordering::Relaxed);
        *lock_unpoisoned(&self.last_persist_error) = Some(error.to_string());
    }

    pub(crate) fn record_remote_forward(&self) {
        self.remote_forwards.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_remote_failure(&self, error: &str) {
        self.remote_failures.fetch_add(1, Ordering::Relaxed);
        *lock_unpoisoned(&self.last_remote_error) = Some(error.to_string());
    }

    /// Copy the current counters
    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            appended: self.appended.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            remote_forwards: self.remote_forwards.load(Ordering::Relaxed),
            remote_failures: self.remote_failures.load(Ordering::Relaxed),
            persistence_healthy: self.persistence_healthy.load(Ordering::Relaxed),
            last_persist_error: lock_unpoisoned(&self.last_persist_error).clone(),
            last_remote_error: lock_unpoisoned(&self.last_remote_error).clone(),
            snapshot_timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let health = LoggerHealth::new();
        health.record_append(0);
        health.record_append(2);
        health.record_remote_forward();

        let snapshot = health.snapshot();
        assert_eq!(snapshot.appended, 2);
        assert_eq!(snapshot.evicted, 2);
        assert_eq!(snapshot.remote_forwards, 1);
        assert_eq!(snapshot.remote_failures, 0);
        assert!(snapshot.persistence_healthy);
    }

    #[test]
    fn test_persistence_recovers_after_failure() {
        let health = LoggerHealth::new();
        health.record_persist_failure("Quota exceeded");

        let degraded = health.snapshot();
        assert!(!degraded.persistence_healthy);
        assert_eq!(degraded.persist_failures, 1);
        assert_eq!(degraded.last_persist_error.as_deref(), Some("Quota exceeded"));

        health.record_persist_success();
        let recovered = health.snapshot();
        assert!(recovered.persistence_healthy);
        // Failure history is kept
        assert_eq!(recovered.persist_failures, 1);
    }

    #[test]
    fn test_skipped_report() {
        let report = AppendReport::skipped();
        assert!(!report.recorded);
        assert_eq!(report.persistence, PersistStatus::Disabled);
        assert_eq!(report.remote, RemoteStatus::Skipped);
    }
}
