//! Carrier Abstraction - moves the session credential between client and server
//!
//! [`HeaderCarrier`] transports a signed token as an `Authorization: Bearer`
//! header. [`CookieCarrier`] transports the session identifier itself inside a
//! named cookie, optionally run through a [`CookieEncoding`].

pub mod cookie;
pub mod header;

pub use self::cookie::{Base64Encoding, CookieCarrier, CookieEncoding, FnEncoding};
pub use self::header::HeaderCarrier;

use crate::exchange::Exchange;
use chrono::Duration;
use signet_core::{CarrierMode, CookieEncodingMode, SessionResult, SessionsConfig};
use std::fmt;
use std::sync::Arc;

/// What the carrier transmits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// A token signed by the codec, carrying the identifier as a claim
    SignedToken,
    /// The raw session identifier
    Identifier,
}

/// When the carrier should re-send the credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Only when a new session is created
    OnCreate,
    /// On every resolved request, sliding the client-side expiry
    Always,
}

/// Read/write capability shared by all credential transports
pub trait Carrier: Send + Sync + fmt::Debug {
    fn kind(&self) -> CredentialKind;

    fn refresh_policy(&self) -> RefreshPolicy {
        RefreshPolicy::OnCreate
    }

    /// Credential presented by the request. `Ok(None)` when nothing was presented.
    fn extract(&self, exchange: &dyn Exchange) -> SessionResult<Option<String>>;

    /// Write `credential` to the exchange. `ttl` drives client-side expiry where the
    /// transport has one.
    fn inject(&self, exchange: &mut dyn Exchange, credential: &str, ttl: Duration);

    /// Invalidate the credential on both sides of the exchange
    fn revoke(&self, exchange: &mut dyn Exchange);
}

/// Build the carrier selected by `config.carrier`
pub fn from_config(config: &SessionsConfig) -> Arc<dyn Carrier> {
    match config.carrier {
        CarrierMode::Header => Arc::new(HeaderCarrier::new(config.allow_reclaim)),
        CarrierMode::Cookie => {
            let mut carrier = CookieCarrier::from_config(&config.cookie, config.allow_reclaim);
            if config.cookie.encoding == CookieEncodingMode::Base64 {
                carrier = carrier.encoding(Arc::new(Base64Encoding));
            }
            Arc::new(carrier)
        }
    }
}
