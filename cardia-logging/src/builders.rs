//! Typed entry builders
//!
//! Each builder fixes the level, message wording and [`EventData`] variant
//! for one category of dashboard event.

use serde_json::{Map, Value};
use std::error::Error;
use std::time::Duration;

use crate::entry::{EntryData, ErrorCapture, EventData, LogLevel};
use crate::event_log::EventLog;
use crate::metrics::AppendReport;

impl EventLog {
    /// Something the user did, with free-form details
    pub fn user_action(&self, action: &str, details: Map<String, Value>) -> AppendReport {
        self.info(
            format!("User Action: {action}"),
            EventData::UserAction {
                action: action.to_string(),
                details,
            }
            .into(),
        )
    }

    /// INFO on success, WARN otherwise
    pub fn authentication(
        &self,
        event: &str,
        username: &str,
        success: bool,
        details: Map<String, Value>,
    ) -> AppendReport {
        let level = if success { LogLevel::Info } else { LogLevel::Warn };
        let data = EventData::Authentication {
            event: event.to_string(),
            username: username.to_string(),
            success,
            details,
        };
        self.append(level, format!("Authentication {event}: {username}"), data.into(), None)
    }

    /// Route change; `method` is how it happened (click, redirect, back)
    pub fn navigation(&self, from: &str, to: &str, method: &str) -> AppendReport {
        self.info(
            format!("Navigation: {from} → {to}"),
            EventData::Navigation {
                from: from.to_string(),
                to: to.to_string(),
                method: method.to_string(),
            }
            .into(),
        )
    }

    /// ERROR when `status_code >= 400`, INFO otherwise
    pub fn api_call(
        &self,
        endpoint: &str,
        method: &str,
        status_code: u16,
        duration: Duration,
        request_data: Value,
    ) -> AppendReport {
        let level = if status_code >= 400 {
            LogLevel::Error
        } else {
            LogLevel::Info
        };
        let data = EventData::ApiCall {
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            status_code,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            request_data,
        };
        self.append(
            level,
            format!("API Call: {method} {endpoint} - {status_code}"),
            data.into(),
            None,
        )
    }

    /// Non-finite samples are recorded without a value
    pub fn performance(&self, metric: &str, value: f64, context: Map<String, Value>) -> AppendReport {
        self.info(
            format!("Performance: {metric}"),
            EventData::Performance {
                metric: metric.to_string(),
                value: value.is_finite().then_some(value),
                context,
            }
            .into(),
        )
    }

    /// Action taken on an implanted device record
    pub fn device_interaction(
        &self,
        device_type: &str,
        action: &str,
        patient_id: &str,
        details: Map<String, Value>,
    ) -> AppendReport {
        self.info(
            format!("Device Interaction: {action} on {device_type}"),
            EventData::DeviceInteraction {
                device_type: device_type.to_string(),
                action: action.to_string(),
                patient_id: patient_id.to_string(),
                details,
            }
            .into(),
        )
    }

    /// A view component failed to render
    pub fn log_component_error<E: Error + ?Sized>(
        &self,
        error: &E,
        error_info: Value,
        component_name: &str,
    ) -> AppendReport {
        self.error_with(
            format!("Component Error in {component_name}"),
            EventData::ComponentError {
                component_name: component_name.to_string(),
                error_info,
            }
            .into(),
            ErrorCapture::from_error(error),
        )
    }

    /// Request that failed before a response arrived
    pub fn log_network_error<E: Error + ?Sized>(
        &self,
        url: &str,
        method: &str,
        error: &E,
    ) -> AppendReport {
        self.error_with(
            format!("Network Error: {method} {url}"),
            EventData::NetworkError {
                url: url.to_string(),
                method: method.to_string(),
            }
            .into(),
            ErrorCapture::from_error(error),
        )
    }

    /// Rejected form input; logged as WARN
    pub fn log_form_validation(
        &self,
        form_name: &str,
        field: &str,
        validation_error: &str,
    ) -> AppendReport {
        self.warn(
            format!("Form Validation Error: {form_name}.{field}"),
            EventData::FormValidation {
                form_name: form_name.to_string(),
                field: field.to_string(),
                validation_error: validation_error.to_string(),
            }
            .into(),
        )
    }

    /// Uncaught fault with its source location, recorded by the panic hook
    pub fn global_error(
        &self,
        filename: Option<&str>,
        lineno: Option<u32>,
        colno: Option<u32>,
        error: ErrorCapture,
    ) -> AppendReport {
        let data = EventData::GlobalError {
            filename: filename.map(str::to_string),
            lineno,
            colno,
        };
        self.error_with("Global Error", EntryData::from(data), error)
    }

    /// Background task that failed with nobody awaiting its result
    pub fn unhandled_rejection(&self, task: Option<&str>, reason: ErrorCapture) -> AppendReport {
        let data = EventData::UnhandledRejection {
            task: task.map(str::to_string),
        };
        self.error_with("Unhandled Task Failure", EntryData::from(data), reason)
    }
}
