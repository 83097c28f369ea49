//! Stored dashboard credentials
//!
//! The bearer token and the signed-in user's record live under two keys of
//! the durable store. Both are required; a half-present or unreadable pair is
//! evicted on read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::DIAGNOSTICS_TARGET;
use crate::storage::{KeyValueStore, StorageError};

/// Key holding the bearer token
pub const AUTH_TOKEN_KEY: &str = "authToken";

/// Key holding the serialized [`AuthRecord`]
pub const AUTH_RECORD_KEY: &str = "cardiaVueAuth";

/// Signed-in user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRecord {
    /// Name the user signed in with
    pub username: String,
    /// When the token was issued
    pub login_time: DateTime<Utc>,
    /// Token scheme reported by the backend, usually `bearer`
    pub token_type: String,
}

impl AuthRecord {
    /// Record for a login happening now
    pub fn new(username: impl Into<String>, token_type: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            login_time: Utc::now(),
            token_type: token_type.into(),
        }
    }
}

/// Credential pair over a [`KeyValueStore`]
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    /// Credentials kept in `store`
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Store the token and the user record
    pub fn login(&self, record: &AuthRecord, token: &str) -> Result<(), StorageError> {
        let serialized = serde_json::to_string(record)
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))?;
        self.store.set(AUTH_TOKEN_KEY, token)?;
        self.store.set(AUTH_RECORD_KEY, &serialized)
    }

    /// The signed-in user, if both keys are present and the record parses
    pub fn current(&self) -> Option<AuthRecord> {
        let token = self.read(AUTH_TOKEN_KEY);
        let raw = self.read(AUTH_RECORD_KEY);

        match (token, raw) {
            (Some(_), Some(raw)) => match serde_json::from_str(&raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(target: DIAGNOSTICS_TARGET, error = %e, "Clearing unreadable auth record");
                    self.evict();
                    None
                }
            },
            (None, None) => None,
            _ => {
                self.evict();
                None
            }
        }
    }

    /// Bearer token, if one is stored
    pub fn token(&self) -> Option<String> {
        self.read(AUTH_TOKEN_KEY)
    }

    /// Whether a complete, readable credential pair is stored
    pub fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    /// Forget the signed-in user
    pub fn logout(&self) {
        self.evict();
    }

    /// Remove both keys, ignoring storage failures
    pub fn evict(&self) {
        for key in [AUTH_TOKEN_KEY, AUTH_RECORD_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(target: DIAGNOSTICS_TARGET, key, error = %e, "Failed to remove credential");
            }
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(target: DIAGNOSTICS_TARGET, key, error = %e, "Failed to read credential");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn credentials() -> (Arc<MemoryStore>, CredentialStore) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), CredentialStore::new(store))
    }

    #[test]
    fn test_login_then_current() {
        let (_, credentials) = credentials();
        let record = AuthRecord::new("alice", "bearer");
        credentials.login(&record, "tok-1").unwrap();

        assert_eq!(credentials.current(), Some(record));
        assert_eq!(credentials.token().as_deref(), Some("tok-1"));
        assert!(credentials.is_authenticated());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let value = serde_json::to_value(AuthRecord::new("alice", "bearer")).unwrap();
        assert!(value.get("loginTime").is_some());
        assert_eq!(value["tokenType"], "bearer");
    }

    #[test]
    fn test_unreadable_record_is_evicted() {
        let (store, credentials) = credentials();
        store.set(AUTH_TOKEN_KEY, "tok-1").unwrap();
        store.set(AUTH_RECORD_KEY, "{not json").unwrap();

        assert_eq!(credentials.current(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_token_without_record_is_evicted() {
        let (store, credentials) = credentials();
        store.set(AUTH_TOKEN_KEY, "tok-1").unwrap();

        assert!(!credentials.is_authenticated());
        assert_eq!(store.get(AUTH_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_logout_clears_both_keys() {
        let (store, credentials) = credentials();
        credentials
            .login(&AuthRecord::new("alice", "bearer"), "tok-1")
            .unwrap();

        credentials.logout();
        assert!(store.is_empty());
        assert_eq!(credentials.token(), None);
    }
}
