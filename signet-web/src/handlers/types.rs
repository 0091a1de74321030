//! Request and response bodies

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub sessions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub is_new: bool,
    /// Seconds until expiry; absent for unlimited sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    pub values: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValueResponse {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteResponse {
    pub key: String,
    /// False when an immutable value already held the key
    pub stored: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct WriteParams {
    #[serde(default)]
    pub immutable: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CounterResponse {
    pub counter: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FlashRequest {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshParams {
    /// New TTL in seconds. Defaults to the configured TTL.
    pub ttl_secs: Option<i64>,
}
