//! Configuration data types

use serde::{Deserialize, Serialize};

/// Top-level sessions configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Re-inject a refreshed token into both the request and the response
    pub allow_reclaim: bool,
    /// Default session TTL in seconds. 0 = unlimited, negative = session-only
    pub expires_secs: i64,
    /// Which carrier transports the session credential
    pub carrier: CarrierMode,
    /// Whether OPTIONS requests are authenticated
    pub enable_auth_on_options: bool,
    pub codec: CodecConfig,
    pub cookie: CookieConfig,
}

/// Token codec material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Shared secret used by the default key getters
    pub secret: String,
    /// Pinned signing algorithm (e.g. "HS256"). Tokens with any other `alg` are rejected
    pub algorithm: Option<String>,
    /// Reject tokens whose `exp` claim is in the past
    pub check_expiration: bool,
    /// Clock skew tolerance for the expiration check
    pub leeway_secs: u64,
    /// Write an `exp` claim matching the session TTL into issued tokens
    pub embed_expiration: bool,
}

/// Cookie carrier options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    pub name: String,
    pub path: String,
    pub domain: Option<String>,
    /// Never set the Domain attribute, keeping the cookie on the exact host
    pub disable_subdomain_persistence: bool,
    /// Mark the cookie Secure when the request arrived over TLS
    pub secure_tls: bool,
    pub encoding: CookieEncodingMode,
}

/// Session credential transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarrierMode {
    Header,
    Cookie,
}

/// Encoding applied to cookie values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookieEncodingMode {
    None,
    Base64,
}
