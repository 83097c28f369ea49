//! The bounded event log
//!
//! [`EventLog`] keeps the most recent `max_logs` entries in insertion order and
//! mirrors the whole sequence to a durable [`KeyValueStore`] after every
//! append. Development builds mirror entries to a [`ConsoleSink`]; production
//! builds forward error entries to a [`RemoteSink`].

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::config::LoggerConfig;
use crate::entry::{EntryData, ErrorCapture, LogEntry, LogLevel, entry_timestamp, generate_entry_id};
use crate::export::ExportFormat;
use crate::metrics::{AppendReport, HealthSnapshot, LoggerHealth, PersistStatus, RemoteStatus};
use crate::sanitization::LogSanitizer;
use crate::session::SessionIdentity;
use crate::sinks::{ConsoleSink, RemoteSink, TracingConsoleSink, TracingRemoteSink};
use crate::storage::{KeyValueStore, MemoryStore};
use crate::{DIAGNOSTICS_TARGET, Result, lock_unpoisoned};

const STARTUP_MESSAGE: &str = "CardiaVue Application Initialized";
const CLEARED_MESSAGE: &str = "Logs cleared by user";

thread_local! {
    /// Logs the current thread is appending to, by address
    static APPENDING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks the current thread as inside `append` on one log until dropped
struct AppendGuard {
    log: usize,
}

impl AppendGuard {
    fn enter(log: &EventLog) -> Option<Self> {
        let key = log as *const EventLog as usize;
        APPENDING.with(|active| {
            let mut active = active.borrow_mut();
            if active.contains(&key) {
                None
            } else {
                active.push(key);
                Some(AppendGuard { log: key })
            }
        })
    }
}

impl Drop for AppendGuard {
    fn drop(&mut self) {
        APPENDING.with(|active| active.borrow_mut().retain(|key| *key != self.log));
    }
}

/// Entry counts for a log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSummary {
    /// Retained entries
    pub total: usize,
    /// Retained entries per level; absent levels have no key
    pub by_level: BTreeMap<LogLevel, usize>,
    /// Distinct session ids found in the entries, in first-seen order
    pub sessions: Vec<String>,
    /// Timestamp of the oldest retained entry
    pub oldest: Option<DateTime<Utc>>,
    /// Timestamp of the newest retained entry
    pub newest: Option<DateTime<Utc>>,
}

/// Bounded, append-only event log
///
/// Construct with [`EventLog::builder`] and share behind an `Arc`. All methods
/// take `&self`; appends are serialized by an internal lock.
pub struct EventLog {
    config: LoggerConfig,
    entries: Mutex<VecDeque<LogEntry>>,
    durable: Arc<dyn KeyValueStore>,
    session: SessionIdentity,
    console: Arc<dyn ConsoleSink>,
    remote: Arc<dyn RemoteSink>,
    sanitizer: LogSanitizer,
    health: LoggerHealth,
    /// Entries recorded while the thread was panicking, awaiting the sinks
    deferred: Mutex<Vec<LogEntry>>,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`EventLog`]
///
/// Unset collaborators default to in-memory stores, [`TracingConsoleSink`] and
/// [`TracingRemoteSink`].
#[derive(Default)]
pub struct EventLogBuilder {
    config: LoggerConfig,
    durable: Option<Arc<dyn KeyValueStore>>,
    session: Option<Arc<dyn KeyValueStore>>,
    console: Option<Arc<dyn ConsoleSink>>,
    remote: Option<Arc<dyn RemoteSink>>,
}

impl EventLogBuilder {
    /// Logger settings; defaults to [`LoggerConfig::default`]
    pub fn config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    /// Store that survives restarts; holds the serialized log
    pub fn durable_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.durable = Some(store);
        self
    }

    /// Store scoped to the browsing session; holds the session token
    pub fn session_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.session = Some(store);
        self
    }

    /// Where development builds mirror every entry
    pub fn console_sink(mut self, sink: Arc<dyn ConsoleSink>) -> Self {
        self.console = Some(sink);
        self
    }

    /// Where production builds forward error entries
    pub fn remote_sink(mut self, sink: Arc<dyn RemoteSink>) -> Self {
        self.remote = Some(sink);
        self
    }

    /// Validate the configuration, restore persisted entries and record the
    /// startup entry
    pub fn build(self) -> Result<EventLog> {
        self.config.validate()?;

        let durable = self
            .durable
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let session_store = self
            .session
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        let restored = load_persisted(durable.as_ref(), &self.config);
        let sanitizer = if self.config.sanitize {
            LogSanitizer::new()
        } else {
            LogSanitizer::disabled()
        };

        let log = EventLog {
            session: SessionIdentity::new(session_store, self.config.session_key.clone()),
            entries: Mutex::new(restored),
            durable,
            console: self.console.unwrap_or_else(|| Arc::new(TracingConsoleSink)),
            remote: self.remote.unwrap_or_else(|| Arc::new(TracingRemoteSink)),
            sanitizer,
            health: LoggerHealth::new(),
            deferred: Mutex::new(Vec::new()),
            config: self.config,
        };

        if log.config.announce_startup {
            let mut data = Map::new();
            data.insert(
                "timestamp".to_string(),
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
            log.info(STARTUP_MESSAGE, EntryData::Fields(data));
        }

        Ok(log)
    }
}

/// Read the durable copy once. Unreadable or malformed data starts an empty
/// log.
fn load_persisted(store: &dyn KeyValueStore, config: &LoggerConfig) -> VecDeque<LogEntry> {
    if !config.enable_persistence {
        return VecDeque::new();
    }

    let raw = match store.get(&config.storage_key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return VecDeque::new(),
        Err(e) => {
            warn!(target: DIAGNOSTICS_TARGET, error = %e, "Failed to read persisted logs");
            return VecDeque::new();
        }
    };

    match serde_json::from_str::<Vec<LogEntry>>(&raw) {
        Ok(mut entries) => {
            if entries.len() > config.max_logs {
                entries.drain(..entries.len() - config.max_logs);
            }
            debug!(restored = entries.len(), "Restored persisted logs");
            entries.into()
        }
        Err(e) => {
            warn!(
                target: DIAGNOSTICS_TARGET,
                error = %e,
                "Discarding malformed persisted logs"
            );
            VecDeque::new()
        }
    }
}

impl EventLog {
    /// Start configuring a log
    pub fn builder() -> EventLogBuilder {
        EventLogBuilder::default()
    }

    /// Log with in-memory stores and the default sinks
    pub fn in_memory(config: LoggerConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Settings the log was built with
    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Session token stamped on every entry
    pub fn session_id(&self) -> String {
        self.session.session_id()
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.entries).len()
    }

    /// Whether no entries are retained
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record an entry
    ///
    /// Never fails. Storage and sink problems are reported in the returned
    /// [`AppendReport`], in [`EventLog::health`] and under the diagnostics
    /// target. A nested append to this log from the same thread (for example
    /// from a sink that logs) is skipped.
    ///
    /// While the thread is panicking the sinks are not called, since a second
    /// panic there would abort the process. The entry is still stored and its
    /// sink delivery waits for the next append or [`EventLog::flush_deferred`].
    pub fn append(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        data: EntryData,
        error: Option<ErrorCapture>,
    ) -> AppendReport {
        let Some(_guard) = AppendGuard::enter(self) else {
            return AppendReport::skipped();
        };

        let entry = self.build_entry(level, message.into(), data, error);
        let mut report = AppendReport {
            recorded: true,
            ..Default::default()
        };

        {
            let mut entries = lock_unpoisoned(&self.entries);
            entries.push_back(entry.clone());
            while entries.len() > self.config.max_logs {
                entries.pop_front();
                report.evicted += 1;
            }
            self.health.record_append(report.evicted);

            if self.config.enable_persistence {
                report.persistence = self.persist(&entries);
            }
        }

        if std::thread::panicking() {
            if self.wants_sinks(&entry) {
                if !self.config.development {
                    report.remote = RemoteStatus::Deferred;
                }
                lock_unpoisoned(&self.deferred).push(entry);
            }
            return report;
        }

        self.dispatch_deferred();
        let (mirrored, remote) = self.dispatch(&entry);
        report.mirrored = mirrored;
        report.remote = remote;
        report
    }

    fn wants_sinks(&self, entry: &LogEntry) -> bool {
        if self.config.development {
            self.config.enable_console
        } else {
            entry.level == LogLevel::Error
        }
    }

    /// Mirror to the console or forward to the remote sink, as the mode
    /// requires. Must not run while the thread is panicking.
    fn dispatch(&self, entry: &LogEntry) -> (bool, RemoteStatus) {
        let mut mirrored = false;
        let mut remote = RemoteStatus::Skipped;

        if self.config.development && self.config.enable_console {
            let console = Arc::clone(&self.console);
            mirrored = catch_unwind(AssertUnwindSafe(|| console.emit(entry))).is_ok();
        }
        if !self.config.development && entry.level == LogLevel::Error {
            remote = self.forward(entry);
        }

        (mirrored, remote)
    }

    fn dispatch_deferred(&self) -> usize {
        let pending = std::mem::take(&mut *lock_unpoisoned(&self.deferred));
        for entry in &pending {
            self.dispatch(entry);
        }
        pending.len()
    }

    /// Hand entries recorded during a panic to the sinks now. Returns how
    /// many were delivered; does nothing while the thread is panicking.
    pub fn flush_deferred(&self) -> usize {
        if std::thread::panicking() {
            return 0;
        }
        let Some(_guard) = AppendGuard::enter(self) else {
            return 0;
        };
        self.dispatch_deferred()
    }

    fn build_entry(
        &self,
        level: LogLevel,
        message: String,
        data: EntryData,
        error: Option<ErrorCapture>,
    ) -> LogEntry {
        let timestamp = entry_timestamp();
        LogEntry {
            id: generate_entry_id(&timestamp),
            timestamp,
            level,
            message: self.sanitizer.sanitize(&message),
            data: self.sanitizer.sanitize_data(data),
            error: error.map(|capture| self.sanitizer.sanitize_capture(capture)),
            origin: self.config.origin.clone(),
            client_info: self.config.client_info.clone(),
            session_id: self.session.session_id(),
        }
    }

    /// Write the full sequence. Called with the entries lock held.
    fn persist(&self, entries: &VecDeque<LogEntry>) -> PersistStatus {
        let result = serde_json::to_string(entries)
            .map_err(|e| e.to_string())
            .and_then(|serialized| {
                self.durable
                    .set(&self.config.storage_key, &serialized)
                    .map_err(|e| e.to_string())
            });

        match result {
            Ok(()) => {
                self.health.record_persist_success();
                PersistStatus::Written
            }
            Err(e) => {
                warn!(target: DIAGNOSTICS_TARGET, error = %e, "Failed to persist logs");
                self.health.record_persist_failure(&e);
                PersistStatus::Failed
            }
        }
    }

    fn forward(&self, entry: &LogEntry) -> RemoteStatus {
        let remote = Arc::clone(&self.remote);
        let outcome = catch_unwind(AssertUnwindSafe(|| remote.forward(entry)));

        let error = match outcome {
            Ok(Ok(())) => {
                self.health.record_remote_forward();
                return RemoteStatus::Forwarded;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => "remote sink panicked".to_string(),
        };

        warn!(
            target: DIAGNOSTICS_TARGET,
            entry_id = %entry.id,
            error = %error,
            "Failed to send log to remote service"
        );
        self.health.record_remote_failure(&error);
        RemoteStatus::Failed
    }

    /// Error entry
    pub fn error(&self, message: impl Into<String>, data: EntryData) -> AppendReport {
        self.append(LogLevel::Error, message, data, None)
    }

    /// Error entry carrying a captured fault
    pub fn error_with(
        &self,
        message: impl Into<String>,
        data: EntryData,
        error: ErrorCapture,
    ) -> AppendReport {
        self.append(LogLevel::Error, message, data, Some(error))
    }

    /// Warning entry
    pub fn warn(&self, message: impl Into<String>, data: EntryData) -> AppendReport {
        self.append(LogLevel::Warn, message, data, None)
    }

    /// Informational entry
    pub fn info(&self, message: impl Into<String>, data: EntryData) -> AppendReport {
        self.append(LogLevel::Info, message, data, None)
    }

    /// Recorded in development mode only
    pub fn debug(&self, message: impl Into<String>, data: EntryData) -> AppendReport {
        if !self.config.development {
            return AppendReport::skipped();
        }
        self.append(LogLevel::Debug, message, data, None)
    }

    /// Copy of every retained entry, oldest first
    pub fn all_logs(&self) -> Vec<LogEntry> {
        lock_unpoisoned(&self.entries).iter().cloned().collect()
    }

    fn filtered(&self, predicate: impl Fn(&LogEntry) -> bool) -> Vec<LogEntry> {
        lock_unpoisoned(&self.entries)
            .iter()
            .filter(|entry| predicate(entry))
            .cloned()
            .collect()
    }

    /// Entries at exactly `level`
    pub fn logs_by_level(&self, level: LogLevel) -> Vec<LogEntry> {
        self.filtered(|entry| entry.level == level)
    }

    /// Level given by name, any case
    pub fn logs_by_level_str(&self, level: &str) -> Result<Vec<LogEntry>> {
        Ok(self.logs_by_level(level.parse()?))
    }

    /// Entries whose category matches `entry_type` (e.g. `"api_call"`)
    pub fn logs_by_type(&self, entry_type: &str) -> Vec<LogEntry> {
        self.filtered(|entry| entry.type_name() == Some(entry_type))
    }

    /// Entries with `start <= timestamp <= end`
    pub fn logs_by_time_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<LogEntry> {
        self.filtered(|entry| entry.timestamp >= start && entry.timestamp <= end)
    }

    /// Render every retained entry
    pub fn export_logs(&self, format: ExportFormat) -> Result<String> {
        let entries = self.all_logs();
        format.render(&entries)
    }

    /// Export by format name (`"json"` or `"csv"`, any case)
    pub fn export_logs_as(&self, format: &str) -> Result<String> {
        self.export_logs(format.parse()?)
    }

    /// Empty the log and its durable copy, then record the clear
    pub fn clear_logs(&self) -> AppendReport {
        {
            let mut entries = lock_unpoisoned(&self.entries);
            entries.clear();

            if self.config.enable_persistence {
                if let Err(e) = self.durable.remove(&self.config.storage_key) {
                    warn!(target: DIAGNOSTICS_TARGET, error = %e, "Failed to remove persisted logs");
                    self.health.record_persist_failure(&e.to_string());
                }
            }
        }

        self.info(CLEARED_MESSAGE, EntryData::empty())
    }

    /// Cumulative persistence and forwarding counters
    pub fn health(&self) -> HealthSnapshot {
        self.health.snapshot()
    }

    /// Counts, time span and sessions of the retained entries
    pub fn summary(&self) -> LogSummary {
        let entries = lock_unpoisoned(&self.entries);
        let mut by_level = BTreeMap::new();
        let mut sessions: Vec<String> = Vec::new();
        for entry in entries.iter() {
            *by_level.entry(entry.level).or_insert(0) += 1;
            if !sessions.contains(&entry.session_id) {
                sessions.push(entry.session_id.clone());
            }
        }

        LogSummary {
            total: entries.len(),
            by_level,
            sessions,
            oldest: entries.front().map(|entry| entry.timestamp),
            newest: entries.back().map(|entry| entry.timestamp),
        }
    }
}
