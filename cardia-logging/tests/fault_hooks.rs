//! Panic hook installation. The hook is process-wide, so this file holds a
//! single test.

use cardia_logging::{EventData, EventLog, FaultHooks, LogLevel, LoggerConfig};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
#[error("telemetry upload rejected")]
struct UploadError;

#[test]
fn test_fault_hooks_record_and_uninstall() {
    let log = Arc::new(
        EventLog::in_memory(LoggerConfig {
            announce_startup: false,
            enable_console: false,
            ..LoggerConfig::development()
        })
        .unwrap(),
    );

    let hooks = FaultHooks::install(Arc::clone(&log));

    let result = std::thread::spawn(|| panic!("device list out of range")).join();
    assert!(result.is_err());

    let entries = log.logs_by_type("global_error");
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.level, LogLevel::Error);
    assert_eq!(entry.message, "Global Error");

    match entry.data.event() {
        Some(EventData::GlobalError {
            filename,
            lineno,
            colno,
        }) => {
            assert!(filename.as_deref().unwrap().ends_with("fault_hooks.rs"));
            assert!(lineno.is_some());
            assert!(colno.is_some());
        }
        other => panic!("unexpected data: {other:?}"),
    }
    let capture = entry.error.as_ref().unwrap();
    assert_eq!(capture.name, "Panic");
    assert_eq!(capture.message, "device list out of range");

    hooks.report_unhandled(Some("upload"), &UploadError);
    let rejections = log.logs_by_type("unhandled_rejection");
    assert_eq!(rejections.len(), 1);
    assert_eq!(
        rejections[0].error.as_ref().unwrap().message,
        "telemetry upload rejected"
    );

    drop(hooks);

    let _ = std::thread::spawn(|| panic!("after uninstall")).join();
    assert_eq!(log.logs_by_type("global_error").len(), 1);
}
