//! Unit tests for the crate root: error type and re-exports

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::io;

    #[test]
    fn test_logging_error_config() {
        let error = LoggingError::Config("max_logs must be greater than zero".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: max_logs must be greater than zero"
        );

        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("Config"));
    }

    #[test]
    fn test_logging_error_io() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = LoggingError::from(io_error);

        match error {
            LoggingError::Io(ref e) => {
                assert_eq!(e.kind(), io::ErrorKind::NotFound);
                assert_eq!(e.to_string(), "File not found");
            }
            _ => panic!("Expected Io error variant"),
        }

        assert!(error.to_string().contains("I/O error"));
    }

    #[test]
    fn test_logging_error_serialization() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error = LoggingError::from(json_error);

        assert!(matches!(error, LoggingError::Serialization(_)));
        assert!(error.to_string().contains("Serialization error"));
    }

    #[test]
    fn test_logging_error_from_storage() {
        let error = LoggingError::from(StorageError::QuotaExceeded { size: 10, max: 5 });
        assert_eq!(
            error.to_string(),
            "Storage error: Quota exceeded: 10 bytes (max: 5)"
        );
    }

    #[test]
    fn test_error_display_formatting() {
        let errors = vec![
            LoggingError::UnsupportedFormat("xml".to_string()),
            LoggingError::ReservedField("type".to_string()),
            LoggingError::InvalidLevel("trace".to_string()),
            LoggingError::Tracing("subscriber already set".to_string()),
        ];

        for error in errors {
            let display = error.to_string();
            assert!(!display.is_empty());
            assert!(display.contains(':'));
        }
    }

    #[test]
    fn test_error_chain() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "Access denied");
        let logging_error = LoggingError::from(StorageError::from(io_error));

        use std::error::Error;
        let storage = logging_error.source().unwrap();
        assert!(storage.source().is_some());
    }

    #[test]
    fn test_reexports() {
        let _sanitizer = LogSanitizer::new();
        let _store = MemoryStore::new();
        let _config = LoggerConfig::default();
        let _client = ClientConfig::default();
        let _stats = DashboardStats::default();
        let _report = AppendReport::skipped();
        let _health = LoggerHealth::new().snapshot();

        assert_eq!(ExportFormat::Csv.to_string(), "csv");
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
        assert_eq!(DIAGNOSTICS_TARGET, "cardia_logging::diagnostics");
    }

    #[test]
    fn test_lock_unpoisoned_recovers() {
        use std::sync::{Arc, Mutex};

        let mutex = Arc::new(Mutex::new(1));
        let poisoner = Arc::clone(&mutex);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();

        assert!(mutex.is_poisoned());
        *lock_unpoisoned(&mutex) += 1;
        assert_eq!(*lock_unpoisoned(&mutex), 2);
    }
}
