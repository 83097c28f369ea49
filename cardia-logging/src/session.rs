//! Session identity provider
//!
//! One correlation token per browsing session, created on first demand and
//! kept in the session-scoped store. The token only correlates entries; it
//! is not a credential.

use chrono::Utc;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::storage::KeyValueStore;
use crate::{DIAGNOSTICS_TARGET, lock_unpoisoned};

/// Lazily created, persisted session token
pub struct SessionIdentity {
    store: Arc<dyn KeyValueStore>,
    key: String,
    /// Token kept in memory when the session store cannot hold it
    fallback: Mutex<Option<String>>,
}

impl SessionIdentity {
    /// Session token kept under `key` in `store`
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            fallback: Mutex::new(None),
        }
    }

    /// Current session token, created and stored on first call
    pub fn session_id(&self) -> String {
        let mut fallback = lock_unpoisoned(&self.fallback);

        match self.store.get(&self.key) {
            Ok(Some(token)) if !token.is_empty() => return token,
            Ok(_) => {}
            Err(e) => {
                warn!(target: DIAGNOSTICS_TARGET, error = %e, "Failed to read session token");
            }
        }

        if let Some(token) = fallback.as_ref() {
            return token.clone();
        }

        let token = generate_session_token();
        match self.store.set(&self.key, &token) {
            Ok(()) => debug!(session_id = %token, "Started new session"),
            Err(e) => {
                warn!(
                    target: DIAGNOSTICS_TARGET,
                    error = %e,
                    "Failed to persist session token, keeping it in memory"
                );
                *fallback = Some(token.clone());
            }
        }
        token
    }
}

/// `session_<unix millis>_<9 hex chars>`
fn generate_session_token() -> String {
    let uuid = Uuid::new_v4();
    let suffix = hex::encode(uuid.as_bytes());
    format!("session_{}_{}", Utc::now().timestamp_millis(), &suffix[..9])
}
