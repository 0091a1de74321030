use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Session identifier
    pub session_id: String,
    /// Issued at (timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Expiration time (timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl SessionClaims {
    /// Claims for `session_id`, issued now, without expiration
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            iat: Some(Utc::now().timestamp()),
            exp: None,
        }
    }

    /// Expire `ttl` after the issue time. Non-positive TTLs leave the token unbounded.
    pub fn with_expiration(mut self, ttl: Duration) -> Self {
        if ttl > Duration::zero() {
            let issued = self.iat.unwrap_or_else(|| Utc::now().timestamp());
            self.exp = Some(issued.saturating_add(ttl.num_seconds()));
        }
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    /// Whether `exp` lies before now, allowing `leeway_secs` of clock skew
    pub fn is_expired(&self, leeway_secs: u64) -> bool {
        match self.exp {
            Some(exp) => {
                let leeway = i64::try_from(leeway_secs).unwrap_or(i64::MAX);
                exp.saturating_add(leeway) < Utc::now().timestamp()
            }
            None => false,
        }
    }
}
