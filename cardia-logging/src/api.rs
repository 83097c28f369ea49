//! Dashboard backend client
//!
//! Every request is timed and recorded with [`EventLog::api_call`]. Transport
//! failures are recorded with [`EventLog::log_network_error`]. A 401 response
//! evicts the stored credentials so the dashboard returns to sign-in.

use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::auth::{AuthRecord, CredentialStore};
use crate::entry::{EntryData, ErrorCapture};
use crate::event_log::EventLog;
use crate::storage::StorageError;

const LOGIN_PATH: &str = "/auth/login";
const DASHBOARD_STATS_PATH: &str = "/transmissions/stats/dashboard";

/// Dashboard client errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No stored token; the request was not sent
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The backend answered 401; stored credentials were evicted
    #[error("Unauthorized")]
    Unauthorized,

    /// Any other non-success status
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// Transport failure or timeout
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The credential store could not be updated
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API root, e.g. `http://localhost:8000/api`
    pub base_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Implanted-device counts by category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceTypeCounts {
    /// Pacemakers
    pub pacemaker: u64,
    /// Implantable cardioverter-defibrillators
    pub icd: u64,
    /// Cardiac resynchronization devices
    pub crt: u64,
    /// Implantable loop recorders
    #[serde(rename = "loop")]
    pub loop_recorder: u64,
}

/// Clinic overview shown on the dashboard. The default (all zeros) is what
/// the dashboard shows when stats cannot be loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DashboardStats {
    /// Patients enrolled at the clinic
    pub total_patients: u64,
    /// Devices currently transmitting
    pub active_devices: u64,
    /// Alerts raised since midnight
    pub alerts_today: u64,
    /// Transmissions received since midnight
    pub transmissions_today: u64,
    /// Open alerts at critical severity
    pub critical_alerts: u64,
    /// Active devices by category
    pub device_types: DeviceTypeCounts,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
}

/// Authenticated client for the clinic backend
pub struct DashboardClient {
    http: Client,
    config: ClientConfig,
    credentials: CredentialStore,
    log: Arc<EventLog>,
}

impl DashboardClient {
    /// Client that records its requests in `log`
    pub fn new(
        config: ClientConfig,
        credentials: CredentialStore,
        log: Arc<EventLog>,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            config,
            credentials,
            log,
        })
    }

    /// Credentials used for the bearer header
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Exchange a username and password for a bearer token and store it
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthRecord, ApiError> {
        let body = json!({ "username": username, "password": password });

        let response = match self.send(Method::POST, LOGIN_PATH, Some(&body)).await {
            Ok(response) => response,
            Err(e) => {
                if matches!(e, ApiError::Unauthorized | ApiError::Status(_)) {
                    let mut details = Map::new();
                    details.insert("reason".to_string(), Value::String(e.to_string()));
                    self.log.authentication("login", username, false, details);
                }
                return Err(e);
            }
        };

        let token: TokenResponse = decode(response).await?;
        let record = AuthRecord::new(username, token.token_type);
        self.credentials.login(&record, &token.access_token)?;
        self.log.authentication("login", username, true, Map::new());

        Ok(record)
    }

    /// Load the clinic overview; requires a stored token
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        self.log.user_action("Load Clinic Stats", Map::new());

        if !self.credentials.is_authenticated() {
            self.log.error("No authentication data found", EntryData::empty());
            return Err(ApiError::NotAuthenticated);
        }

        let response = self.send(Method::GET, DASHBOARD_STATS_PATH, None).await?;
        let stats: DashboardStats = decode(response).await?;

        let data = serde_json::to_value(&stats)
            .ok()
            .and_then(|value| EntryData::try_from(value).ok())
            .unwrap_or_default();
        self.log.info("Clinic stats loaded successfully", data);

        Ok(stats)
    }

    /// [`DashboardClient::dashboard_stats`], falling back to zeros on failure
    pub async fn dashboard_stats_or_default(&self) -> DashboardStats {
        match self.dashboard_stats().await {
            Ok(stats) => stats,
            Err(ApiError::NotAuthenticated) => DashboardStats::default(),
            Err(e) => {
                self.log.error_with(
                    "Failed to load clinic stats",
                    EntryData::empty(),
                    ErrorCapture::from_error(&e),
                );
                DashboardStats::default()
            }
        }
    }

    /// Sign out from the view at `from`
    pub fn logout(&self, from: &str) {
        let mut details = Map::new();
        details.insert("from".to_string(), Value::String(from.to_string()));
        self.log.user_action("Logout", details);

        let username = self
            .credentials
            .current()
            .map(|record| record.username)
            .unwrap_or_else(|| "unknown".to_string());
        self.log.authentication("logout", &username, true, Map::new());

        self.credentials.logout();
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.url(path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(token) = self.credentials.token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(method = %method, url = %url, "Sending dashboard request");
        let started = Instant::now();

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.log.log_network_error(&url, method.as_str(), &e);
                return Err(ApiError::Http(e));
            }
        };

        let status = response.status();
        self.log.api_call(
            path,
            method.as_str(),
            status.as_u16(),
            started.elapsed(),
            body.cloned().unwrap_or(Value::Null),
        );

        if status == StatusCode::UNAUTHORIZED {
            self.credentials.evict();
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        Ok(response)
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}
