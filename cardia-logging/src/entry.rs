//! Log entry schema
//!
//! Every entry shares one envelope ([`LogEntry`]). The category-specific part
//! lives in [`EntryData`], which is either a tagged [`EventData`] variant
//! (serialized with a `type` discriminator) or free-form context fields.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::LoggingError;

/// Key reserved for the entry category discriminator
pub const TYPE_KEY: &str = "type";

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Failures
    Error,
    /// Unexpected but handled conditions
    Warn,
    /// Normal activity
    Info,
    /// Development-only detail
    Debug,
}

impl LogLevel {
    /// All levels, most severe first
    pub const ALL: [LogLevel; 4] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
    ];

    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LoggingError::InvalidLevel(s.to_string()))
    }
}

/// Structured capture of a caught fault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCapture {
    /// Error type name
    pub name: String,
    /// Error display text
    pub message: String,
    /// Backtrace or `source()` chain
    pub stack_trace: Option<String>,
}

impl ErrorCapture {
    /// Capture without a stack trace
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack_trace: None,
        }
    }

    /// Attach a stack trace
    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }

    /// Capture an error value. The name is the error's type name and the
    /// stack trace is its `source()` chain, when it has one.
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {cause}"));
            source = cause.source();
        }

        Self {
            name: short_type_name(std::any::type_name::<E>()).to_string(),
            message: error.to_string(),
            stack_trace: (!causes.is_empty()).then(|| causes.join("\n")),
        }
    }
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Category-specific entry payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum EventData {
    /// Something the user did
    UserAction {
        /// Action name, e.g. `Open Patient`
        action: String,
        /// Free-form context
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        details: Map<String, Value>,
    },
    /// Login, logout or token refresh
    Authentication {
        /// `login`, `logout` and so on
        event: String,
        /// User the event concerns
        username: String,
        /// Whether the attempt succeeded
        success: bool,
        /// Free-form context such as the rejection reason
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        details: Map<String, Value>,
    },
    /// Route change
    Navigation {
        /// Route left
        from: String,
        /// Route entered
        to: String,
        /// How the change happened
        method: String,
    },
    /// Completed backend request
    ApiCall {
        /// Path relative to the API root
        endpoint: String,
        /// HTTP method
        method: String,
        /// Response status
        status_code: u16,
        /// Round-trip time
        duration_ms: u64,
        /// Sanitized request body
        #[serde(default)]
        request_data: Value,
    },
    /// Timing or resource sample
    Performance {
        /// Metric name
        metric: String,
        /// `None` when the sample was not a finite number
        value: Option<f64>,
        /// Free-form context
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        context: Map<String, Value>,
    },
    /// Action on an implanted device record
    DeviceInteraction {
        /// Device category
        device_type: String,
        /// What was done
        action: String,
        /// Patient the device belongs to
        patient_id: String,
        /// Free-form context
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        details: Map<String, Value>,
    },
    /// View component failure
    ComponentError {
        /// Component that failed
        component_name: String,
        /// Extra context from the component
        #[serde(default)]
        error_info: Value,
    },
    /// Request that never got a response
    NetworkError {
        /// Full request URL
        url: String,
        /// HTTP method
        method: String,
    },
    /// Rejected form input
    FormValidation {
        /// Form name
        form_name: String,
        /// Field that failed
        field: String,
        /// Message shown to the user
        validation_error: String,
    },
    /// Uncaught fault
    GlobalError {
        /// Source file, when known
        filename: Option<String>,
        /// Source line, when known
        lineno: Option<u32>,
        /// Source column, when known
        colno: Option<u32>,
    },
    /// Background task failure nobody awaited
    UnhandledRejection {
        /// Task name, when known
        task: Option<String>,
    },
}

impl EventData {
    /// Value of the `type` discriminator
    pub fn type_name(&self) -> &'static str {
        match self {
            EventData::UserAction { .. } => "user_action",
            EventData::Authentication { .. } => "authentication",
            EventData::Navigation { .. } => "navigation",
            EventData::ApiCall { .. } => "api_call",
            EventData::Performance { .. } => "performance",
            EventData::DeviceInteraction { .. } => "device_interaction",
            EventData::ComponentError { .. } => "component_error",
            EventData::NetworkError { .. } => "network_error",
            EventData::FormValidation { .. } => "form_validation",
            EventData::GlobalError { .. } => "global_error",
            EventData::UnhandledRejection { .. } => "unhandled_rejection",
        }
    }
}

/// Entry payload: a typed event or free-form context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryData {
    /// Typed, categorized event
    Event(EventData),
    /// Free-form context without a category
    Fields(Map<String, Value>),
}

impl EntryData {
    /// No context at all
    pub fn empty() -> Self {
        EntryData::Fields(Map::new())
    }

    /// Free-form context. The `type` key is reserved for typed events and is
    /// rejected here.
    pub fn fields(fields: Map<String, Value>) -> crate::Result<Self> {
        if fields.contains_key(TYPE_KEY) {
            return Err(LoggingError::ReservedField(TYPE_KEY.to_string()));
        }
        Ok(EntryData::Fields(fields))
    }

    /// Category of the entry, `None` for free-form context
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            EntryData::Event(event) => Some(event.type_name()),
            EntryData::Fields(_) => None,
        }
    }

    /// Typed event, `None` for free-form context
    pub fn event(&self) -> Option<&EventData> {
        match self {
            EntryData::Event(event) => Some(event),
            EntryData::Fields(_) => None,
        }
    }
}

impl Default for EntryData {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<EventData> for EntryData {
    fn from(event: EventData) -> Self {
        EntryData::Event(event)
    }
}

impl TryFrom<Value> for EntryData {
    type Error = LoggingError;

    /// Objects become free-form fields, `null` becomes empty context and any
    /// other value is stored under `value`.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => EntryData::fields(map),
            Value::Null => Ok(EntryData::empty()),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Ok(EntryData::Fields(map))
            }
        }
    }
}

/// A single recorded event. Entries are never modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Unique id: millisecond epoch plus random suffix
    pub id: String,
    /// Creation time, millisecond precision
    pub timestamp: DateTime<Utc>,
    /// Severity
    pub level: LogLevel,
    /// Human-readable summary
    pub message: String,
    /// Category payload or free-form context
    #[serde(default)]
    pub data: EntryData,
    /// Captured fault, for error entries
    pub error: Option<ErrorCapture>,
    /// Page or origin active when the entry was recorded
    #[serde(rename = "url")]
    pub origin: String,
    /// Identifying string of the reporting client
    #[serde(rename = "userAgent")]
    pub client_info: String,
    /// Session token of the process that recorded it
    pub session_id: String,
}

impl LogEntry {
    /// Category of the entry, `None` for free-form context
    pub fn type_name(&self) -> Option<&'static str> {
        self.data.type_name()
    }
}

/// Current instant at millisecond precision, matching the ISO strings the
/// dashboard emits.
pub(crate) fn entry_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// `<unix millis>-<8 hex chars>`
pub(crate) fn generate_entry_id(timestamp: &DateTime<Utc>) -> String {
    let uuid = Uuid::new_v4();
    format!(
        "{}-{}",
        timestamp.timestamp_millis(),
        hex::encode(&uuid.as_bytes()[..4])
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_parsing_is_case_insensitive() {
        assert_eq!("error".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert_eq!("Warn".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(" INFO ".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert!(matches!(
            "trace".parse::<LogLevel>(),
            Err(LoggingError::InvalidLevel(_))
        ));
    }

    #[test]
    fn test_level_serializes_upper_case() {
        assert_eq!(serde_json::to_value(LogLevel::Debug).unwrap(), json!("DEBUG"));
    }

    #[test]
    fn test_event_data_type_tag() {
        let event = EventData::ApiCall {
            endpoint: "/auth/login".to_string(),
            method: "POST".to_string(),
            status_code: 401,
            duration_ms: 12,
            request_data: Value::Null,
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "api_call");
        assert_eq!(value["statusCode"], 401);
        assert_eq!(value["durationMs"], 12);
        assert_eq!(event.type_name(), "api_call");
    }

    #[test]
    fn test_fields_reject_reserved_type_key() {
        let mut map = Map::new();
        map.insert("type".to_string(), json!("user_action"));

        let result = EntryData::fields(map);
        assert!(matches!(result, Err(LoggingError::ReservedField(ref key)) if key == "type"));
    }

    #[test]
    fn test_entry_data_deserializes_both_shapes() {
        let typed: EntryData = serde_json::from_value(json!({
            "type": "navigation",
            "from": "/login",
            "to": "/dashboard",
            "method": "redirect"
        }))
        .unwrap();
        assert_eq!(typed.type_name(), Some("navigation"));

        let free: EntryData = serde_json::from_value(json!({"totalPatients": 12})).unwrap();
        assert_eq!(free.type_name(), None);
        assert!(matches!(free, EntryData::Fields(ref map) if map["totalPatients"] == 12));
    }

    #[test]
    fn test_entry_data_from_scalar_value() {
        let data = EntryData::try_from(json!(42)).unwrap();
        assert!(matches!(data, EntryData::Fields(ref map) if map["value"] == 42));

        assert_eq!(EntryData::try_from(Value::Null).unwrap(), EntryData::empty());
    }

    #[test]
    fn test_error_capture_records_source_chain() {
        #[derive(Debug)]
        struct Outer(std::io::Error);

        impl fmt::Display for Outer {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "stats request failed")
            }
        }

        impl std::error::Error for Outer {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                Some(&self.0)
            }
        }

        let error = Outer(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        let capture = ErrorCapture::from_error(&error);

        assert_eq!(capture.name, "Outer");
        assert_eq!(capture.message, "stats request failed");
        assert_eq!(
            capture.stack_trace.as_deref(),
            Some("caused by: connection refused")
        );
    }

    #[test]
    fn test_error_capture_serializes_stack_trace_camel_case() {
        let capture = ErrorCapture::new("TypeError", "x is undefined").with_stack_trace("at f");
        let value = serde_json::to_value(&capture).unwrap();
        assert_eq!(value["stackTrace"], "at f");
    }

    #[test]
    fn test_entry_id_format() {
        let timestamp = entry_timestamp();
        let id = generate_entry_id(&timestamp);
        let (millis, suffix) = id.split_once('-').unwrap();

        assert_eq!(millis, timestamp.timestamp_millis().to_string());
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_entry_timestamp_has_millisecond_precision() {
        let timestamp = entry_timestamp();
        assert_eq!(timestamp.timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
