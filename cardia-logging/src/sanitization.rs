//! Log sanitization
//!
//! Entry builders record request bodies and free-form context supplied by
//! the dashboard. The login request body carries a password, so messages and
//! data pass through a [`LogSanitizer`] before they are stored.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::entry::{EntryData, ErrorCapture, EventData};

/// Regex patterns for detecting sensitive information
static PASSWORD_REGEX: OnceLock<Regex> = OnceLock::new();
static TOKEN_REGEX: OnceLock<Regex> = OnceLock::new();
static API_KEY_REGEX: OnceLock<Regex> = OnceLock::new();
static IP_REGEX: OnceLock<Regex> = OnceLock::new();

/// Initialize sanitization regex patterns
fn init_sanitization_patterns() {
    PASSWORD_REGEX.get_or_init(|| {
        Regex::new(
            r#"(?i)(["']?)(password|passwd|pwd)(["']?)[\s]*[=:][\s]*["`']?([^'"`\s,}]+)"#,
        )
        .expect("Invalid password regex")
    });

    TOKEN_REGEX.get_or_init(|| {
        Regex::new(r#"(?i)(?:(["']?)(token)(["']?)[\s]*[=:][\s]*['"]?([a-zA-Z0-9._-]+)|(bearer)[\s]+([a-zA-Z0-9._-]+))"#)
            .expect("Invalid token regex")
    });

    API_KEY_REGEX.get_or_init(|| {
        Regex::new(r#"(?i)(["']?)(api[_-]?key|apikey)(["']?)[\s]*[=:][\s]*['"]?([a-zA-Z0-9._-]+)"#)
            .expect("Invalid API key regex")
    });

    IP_REGEX.get_or_init(|| {
        Regex::new(r"\b(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\b")
            .expect("Invalid IP regex")
    });
}

/// Sanitization configuration
#[derive(Debug, Clone)]
pub struct SanitizationConfig {
    /// Turn redaction on or off
    pub enabled: bool,

    /// Keep IP addresses (clinic workstations are identified by address)
    pub preserve_ips: bool,

    /// Replacement string for sensitive data
    pub replacement: String,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            preserve_ips: true,
            replacement: "[REDACTED]".to_string(),
        }
    }
}

/// Redacts credentials from messages and entry data
#[derive(Debug, Clone)]
pub struct LogSanitizer {
    config: SanitizationConfig,
}

impl LogSanitizer {
    /// Sanitizer with the default rules
    pub fn new() -> Self {
        Self::with_config(SanitizationConfig::default())
    }

    /// Sanitizer with custom rules
    pub fn with_config(config: SanitizationConfig) -> Self {
        init_sanitization_patterns();
        Self { config }
    }

    /// Sanitizer that passes everything through
    pub fn disabled() -> Self {
        Self::with_config(SanitizationConfig {
            enabled: false,
            ..Default::default()
        })
    }

    /// Whether redaction is on
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Redact `password=`, `token=`, `api_key=` and `Bearer` values in free text
    pub fn sanitize(&self, message: &str) -> String {
        if !self.config.enabled {
            return message.to_string();
        }

        let mut sanitized = message.to_string();

        for regex in [PASSWORD_REGEX.get(), API_KEY_REGEX.get()].into_iter().flatten() {
            sanitized = regex
                .replace_all(&sanitized, |caps: &regex::Captures| {
                    caps[0].replace(&caps[4], &self.config.replacement)
                })
                .to_string();
        }

        if let Some(regex) = TOKEN_REGEX.get() {
            sanitized = regex
                .replace_all(&sanitized, |caps: &regex::Captures| {
                    let full_match = &caps[0];
                    // token=value or bearer value
                    let value = caps.get(4).or_else(|| caps.get(6)).map_or("", |m| m.as_str());
                    if value.is_empty() {
                        full_match.to_string()
                    } else {
                        full_match.replace(value, &self.config.replacement)
                    }
                })
                .to_string();
        }

        if !self.config.preserve_ips {
            if let Some(regex) = IP_REGEX.get() {
                sanitized = regex.replace_all(&sanitized, "[IP_REDACTED]").to_string();
            }
        }

        sanitized
    }

    /// Replace values under sensitive keys and sanitize nested strings
    pub fn sanitize_value(&self, value: &Value) -> Value {
        if !self.config.enabled {
            return value.clone();
        }

        match value {
            Value::Object(map) => Value::Object(self.sanitize_map(map)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.sanitize_value(v)).collect())
            }
            Value::String(s) => Value::String(self.sanitize(s)),
            other => other.clone(),
        }
    }

    /// Replace sensitive keys and redact string values, recursively
    pub fn sanitize_map(&self, map: &Map<String, Value>) -> Map<String, Value> {
        if !self.config.enabled {
            return map.clone();
        }

        map.iter()
            .map(|(key, value)| {
                let sanitized = if is_sensitive_field(key) {
                    Value::String(self.config.replacement.clone())
                } else {
                    self.sanitize_value(value)
                };
                (key.clone(), sanitized)
            })
            .collect()
    }

    /// Redact the message and stack trace of a capture
    pub fn sanitize_capture(&self, capture: ErrorCapture) -> ErrorCapture {
        if !self.config.enabled {
            return capture;
        }

        ErrorCapture {
            message: self.sanitize(&capture.message),
            stack_trace: capture.stack_trace.map(|trace| self.sanitize(&trace)),
            ..capture
        }
    }

    /// Sanitize the open-ended parts of an entry payload. Typed identifiers
    /// (usernames, endpoints, patient ids) are left as recorded.
    pub fn sanitize_data(&self, data: EntryData) -> EntryData {
        if !self.config.enabled {
            return data;
        }

        match data {
            EntryData::Fields(map) => EntryData::Fields(self.sanitize_map(&map)),
            EntryData::Event(event) => EntryData::Event(match event {
                EventData::UserAction { action, details } => EventData::UserAction {
                    action,
                    details: self.sanitize_map(&details),
                },
                EventData::Authentication {
                    event,
                    username,
                    success,
                    details,
                } => EventData::Authentication {
                    event,
                    username,
                    success,
                    details: self.sanitize_map(&details),
                },
                EventData::ApiCall {
                    endpoint,
                    method,
                    status_code,
                    duration_ms,
                    request_data,
                } => EventData::ApiCall {
                    endpoint,
                    method,
                    status_code,
                    duration_ms,
                    request_data: self.sanitize_value(&request_data),
                },
                EventData::Performance {
                    metric,
                    value,
                    context,
                } => EventData::Performance {
                    metric,
                    value,
                    context: self.sanitize_map(&context),
                },
                EventData::DeviceInteraction {
                    device_type,
                    action,
                    patient_id,
                    details,
                } => EventData::DeviceInteraction {
                    device_type,
                    action,
                    patient_id,
                    details: self.sanitize_map(&details),
                },
                EventData::ComponentError {
                    component_name,
                    error_info,
                } => EventData::ComponentError {
                    component_name,
                    error_info: self.sanitize_value(&error_info),
                },
                EventData::NetworkError { url, method } => EventData::NetworkError {
                    url: self.sanitize(&url),
                    method,
                },
                other => other,
            }),
        }
    }
}

impl Default for LogSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if a field name indicates sensitive data
fn is_sensitive_field(field_name: &str) -> bool {
    let lower_name = field_name.to_lowercase();
    if matches!(
        lower_name.as_str(),
        "password" | "passwd" | "pwd" | "secret" | "authorization" | "bearer"
    ) {
        return true;
    }

    lower_name.contains("password")
        || lower_name.contains("token")
        || lower_name.contains("secret")
        || lower_name.contains("api_key")
        || lower_name.contains("apikey")
        || lower_name.contains("credential")
        || lower_name.contains("private_key")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_password_sanitization() {
        let sanitizer = LogSanitizer::new();

        let result = sanitizer.sanitize("Login retry with password=hunter2 for alice");
        assert!(result.contains("[REDACTED]"));
        assert!(!result.contains("hunter2"));
        assert!(result.contains("alice"));
    }

    #[test]
    fn test_bearer_token_sanitization() {
        let sanitizer = LogSanitizer::new();

        let result = sanitizer.sanitize("Authorization: Bearer eyJhbGciOi.abc.def");
        assert_eq!(result, "Authorization: Bearer [REDACTED]");
    }

    #[test]
    fn test_ordinary_messages_untouched() {
        let sanitizer = LogSanitizer::new();

        for message in [
            "Authentication login: alice",
            "API Call: POST /auth/login - 200",
            "Navigation: /login → /dashboard",
            "Device Interaction: interrogate on pacemaker",
        ] {
            assert_eq!(sanitizer.sanitize(message), message);
        }
    }

    #[test]
    fn test_ip_redaction_when_not_preserved() {
        let sanitizer = LogSanitizer::with_config(SanitizationConfig {
            preserve_ips: false,
            ..Default::default()
        });

        let result = sanitizer.sanitize("Workstation 10.0.4.17 connected");
        assert_eq!(result, "Workstation [IP_REDACTED] connected");
    }

    #[test]
    fn test_disabled_sanitization() {
        let sanitizer = LogSanitizer::disabled();
        let message = "password=secret123 api_key=abc123";

        assert!(!sanitizer.is_enabled());
        assert_eq!(sanitizer.sanitize(message), message);
    }

    #[test]
    fn test_request_body_sanitization() {
        let sanitizer = LogSanitizer::new();
        let data = EntryData::Event(EventData::ApiCall {
            endpoint: "/auth/login".to_string(),
            method: "POST".to_string(),
            status_code: 200,
            duration_ms: 40,
            request_data: json!({"username": "alice", "password": "hunter2"}),
        });

        match sanitizer.sanitize_data(data) {
            EntryData::Event(EventData::ApiCall { request_data, .. }) => {
                assert_eq!(request_data["username"], "alice");
                assert_eq!(request_data["password"], "[REDACTED]");
            }
            other => panic!("unexpected data: {other:?}"),
        }
    }

    #[test]
    fn test_nested_fields_sanitization() {
        let sanitizer = LogSanitizer::new();
        let mut map = Map::new();
        map.insert(
            "session".to_string(),
            json!({"accessToken": "tok-1", "clinic": "North"}),
        );

        let sanitized = sanitizer.sanitize_map(&map);
        assert_eq!(sanitized["session"]["accessToken"], "[REDACTED]");
        assert_eq!(sanitized["session"]["clinic"], "North");
    }

    #[test]
    fn test_error_capture_sanitization() {
        let sanitizer = LogSanitizer::new();
        let capture = ErrorCapture::new("AuthError", "rejected token=abc.def");

        let sanitized = sanitizer.sanitize_capture(capture);
        assert_eq!(sanitized.name, "AuthError");
        assert_eq!(sanitized.message, "rejected token=[REDACTED]");
    }
}
