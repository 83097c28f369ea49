//! Operator CLI for a persisted CardiaVue event log
//!
//! Reads the durable store a dashboard instance writes to, so support staff
//! can list, export and clear entries without opening the dashboard.

use anyhow::{Context, Result, bail};
use cardia_logging::{
    EventLog, ExportFormat, FileStore, LogEntry, LogFormat, LogLevel, LogOutput, LoggerConfig,
    MemoryStore, NullRemoteSink, PersistStatus, SubscriberConfig,
};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Parser)]
#[command(name = "cardia-logs")]
#[command(about = "Inspect, export and clear a persisted CardiaVue event log")]
#[command(version)]
struct Cli {
    /// Directory holding the durable log store
    #[arg(short, long, env = "CARDIA_LOG_STORE")]
    store: Option<PathBuf>,

    /// Diagnostics filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List entries, oldest first
    List {
        /// Only entries at this level (error, warn, info, debug)
        #[arg(short, long)]
        level: Option<LogLevel>,

        /// Only entries of this category (e.g. api_call)
        #[arg(short = 't', long = "type")]
        entry_type: Option<String>,

        /// Only entries at or after this RFC 3339 instant
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// Only entries at or before this RFC 3339 instant
        #[arg(long)]
        until: Option<DateTime<Utc>>,

        /// Show at most this many of the most recent matches
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Export every entry
    Export {
        /// Output format (json, csv)
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete every entry; a single "Logs cleared by user" entry remains
    Clear,

    /// Show entry counts, time span and the sessions found in the store
    Health,
}

fn main() {
    let cli = Cli::parse();

    let subscriber = SubscriberConfig {
        level: cli.log_level.clone(),
        format: LogFormat::Compact,
        output: LogOutput::Stderr,
    };
    if let Err(e) = subscriber.initialize() {
        eprintln!("Failed to initialize logging: {e}");
    }

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = run(cli, &mut stdout) {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli, out: &mut dyn Write) -> Result<()> {
    let store_dir = match cli.store {
        Some(dir) => dir,
        None => default_store_dir()?,
    };
    let log = open_log(&store_dir)?;

    match cli.command {
        Commands::List {
            level,
            entry_type,
            since,
            until,
            limit,
        } => {
            let entries = select_entries(&log, level, entry_type.as_deref(), since, until, limit);
            for entry in &entries {
                writeln!(out, "{}", format_entry(entry))?;
            }
        }
        Commands::Export { format, output } => {
            let rendered = log.export_logs(format)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    writeln!(out, "Exported {} entries to {}", log.len(), path.display())?;
                }
                None => writeln!(out, "{rendered}")?,
            }
        }
        Commands::Clear => {
            let removed = log.len();
            let report = log.clear_logs();
            if report.persistence == PersistStatus::Failed {
                bail!(
                    "Cleared in memory but the store could not be updated: {}",
                    log.health().last_persist_error.unwrap_or_default()
                );
            }
            writeln!(out, "Cleared {removed} entries")?;
        }
        Commands::Health => {
            let summary = log.summary();
            let report = serde_json::json!({
                "store": store_dir.display().to_string(),
                "total": summary.total,
                "by_level": summary.by_level,
                "oldest": summary.oldest,
                "newest": summary.newest,
                "sessions": summary.sessions,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        }
    }

    Ok(())
}

fn default_store_dir() -> Result<PathBuf> {
    dirs::data_local_dir()
        .map(|dir| dir.join("cardiavue"))
        .context("No local data directory; pass --store")
}

/// Open the log without announcing startup, mirroring to the console or
/// forwarding anywhere
fn open_log(store_dir: &Path) -> Result<EventLog> {
    let durable = FileStore::open(store_dir)
        .with_context(|| format!("Failed to open log store at {}", store_dir.display()))?;

    let config = LoggerConfig {
        announce_startup: false,
        enable_console: false,
        ..LoggerConfig::from_env()?
    };
    debug!(store = %store_dir.display(), "Opening event log");

    Ok(EventLog::builder()
        .config(config)
        .durable_store(Arc::new(durable))
        .session_store(Arc::new(MemoryStore::new()))
        .remote_sink(Arc::new(NullRemoteSink))
        .build()?)
}

fn select_entries(
    log: &EventLog,
    level: Option<LogLevel>,
    entry_type: Option<&str>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    limit: Option<usize>,
) -> Vec<LogEntry> {
    let mut entries = match (since, until) {
        (None, None) => log.all_logs(),
        (since, until) => log.logs_by_time_range(
            since.unwrap_or(DateTime::<Utc>::MIN_UTC),
            until.unwrap_or(DateTime::<Utc>::MAX_UTC),
        ),
    };

    if let Some(level) = level {
        entries.retain(|entry| entry.level == level);
    }
    if let Some(entry_type) = entry_type {
        entries.retain(|entry| entry.type_name() == Some(entry_type));
    }
    if let Some(limit) = limit {
        let skip = entries.len().saturating_sub(limit);
        entries = entries.split_off(skip);
    }
    entries
}

fn format_entry(entry: &LogEntry) -> String {
    let timestamp = entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
    match entry.type_name() {
        Some(entry_type) => format!(
            "{timestamp} [{}] {} ({entry_type})",
            entry.level, entry.message
        ),
        None => format!("{timestamp} [{}] {}", entry.level, entry.message),
    }
}
