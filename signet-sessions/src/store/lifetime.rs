use chrono::{DateTime, Duration, Utc};
use signet_core::MAX_TTL_SECS;

/// Limit `ttl` to `MAX_TTL_SECS` in either direction
pub fn clamp_ttl(ttl: Duration) -> Duration {
    let bound = Duration::seconds(MAX_TTL_SECS);
    ttl.clamp(-bound, bound)
}

fn deadline(ttl: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    now.checked_add_signed(clamp_ttl(ttl)).unwrap_or(now)
}

/// Expiration deadline of one session entry. `None` means the entry never expires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifeTime {
    pub expires_at: Option<DateTime<Utc>>,
}

impl LifeTime {
    /// A lifetime without deadline
    pub fn unlimited() -> Self {
        Self { expires_at: None }
    }

    /// Start a lifetime of `ttl` from now. Zero or negative TTLs never expire server-side.
    pub fn begin(ttl: Duration) -> Self {
        if ttl > Duration::zero() {
            Self {
                expires_at: Some(deadline(ttl)),
            }
        } else {
            Self::unlimited()
        }
    }

    /// Replace the deadline. Positive TTLs count from now, zero removes the deadline,
    /// negative TTLs expire the entry immediately.
    pub fn shift(&mut self, ttl: Duration) {
        self.expires_at = if ttl > Duration::zero() {
            Some(deadline(ttl))
        } else if ttl < Duration::zero() {
            Some(Utc::now())
        } else {
            None
        };
    }

    pub fn is_unlimited(&self) -> bool {
        self.expires_at.is_none()
    }

    pub fn has_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }

    /// Time remaining before expiry, `None` for unlimited lifetimes
    pub fn duration_left(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| (at - Utc::now()).max(Duration::zero()))
    }
}
