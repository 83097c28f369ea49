//! JSON and CSV export

use chrono::SecondsFormat;
use std::fmt;
use std::str::FromStr;

use crate::entry::LogEntry;
use crate::{LoggingError, Result};

/// CSV header row
pub const CSV_HEADER: &str = "timestamp,level,message,type,url";

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Pretty-printed JSON array of entries
    Json,
    /// One row per entry under [`CSV_HEADER`]
    Csv,
}

impl ExportFormat {
    /// Render `entries` in this format
    pub fn render(&self, entries: &[LogEntry]) -> Result<String> {
        match self {
            ExportFormat::Json => to_json(entries),
            ExportFormat::Csv => Ok(to_csv(entries)),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(LoggingError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => f.write_str("json"),
            ExportFormat::Csv => f.write_str("csv"),
        }
    }
}

/// Pretty-printed JSON array
pub fn to_json(entries: &[LogEntry]) -> Result<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}

/// The message column is always quoted with inner quotes doubled. The type
/// column is empty for free-form entries.
pub fn to_csv(entries: &[LogEntry]) -> String {
    let mut out = String::from(CSV_HEADER);
    for entry in entries {
        out.push('\n');
        out.push_str(&format!(
            "{},{},{},{},{}",
            entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            entry.level,
            quote(&entry.message),
            entry.type_name().unwrap_or(""),
            entry.origin
        ));
    }
    out
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryData, EventData, LogLevel, entry_timestamp};

    fn entry(message: &str, data: EntryData) -> LogEntry {
        LogEntry {
            id: "1-00000000".to_string(),
            timestamp: entry_timestamp(),
            level: LogLevel::Info,
            message: message.to_string(),
            data,
            error: None,
            origin: "http://localhost:3000/dashboard".to_string(),
            client_info: "test".to_string(),
            session_id: "session_1_abc".to_string(),
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!(matches!(
            "xml".parse::<ExportFormat>(),
            Err(LoggingError::UnsupportedFormat(ref f)) if f == "xml"
        ));
    }

    #[test]
    fn test_empty_csv_is_header_only() {
        assert_eq!(to_csv(&[]), CSV_HEADER);
    }

    #[test]
    fn test_csv_row_layout() {
        let data = EntryData::Event(EventData::Navigation {
            from: "/login".to_string(),
            to: "/dashboard".to_string(),
            method: "redirect".to_string(),
        });
        let e = entry("Navigation: /login → /dashboard", data);
        let csv = to_csv(std::slice::from_ref(&e));
        let row = csv.lines().nth(1).unwrap();

        let expected = format!(
            "{},INFO,\"Navigation: /login → /dashboard\",navigation,http://localhost:3000/dashboard",
            e.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        assert_eq!(row, expected);
    }

    #[test]
    fn test_csv_free_form_entry_has_empty_type() {
        let csv = to_csv(&[entry("Dashboard ready", EntryData::empty())]);
        assert!(csv.lines().nth(1).unwrap().contains("\"Dashboard ready\",,http"));
    }

    #[test]
    fn test_json_export_is_pretty_array() {
        let json = to_json(&[entry("one", EntryData::empty())]).unwrap();
        assert!(json.starts_with("[\n"));
        let parsed: Vec<LogEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0].message, "one");
    }
}
