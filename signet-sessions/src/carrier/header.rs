use super::{Carrier, CredentialKind};
use crate::exchange::Exchange;
use chrono::Duration;
use http::header::AUTHORIZATION;
use signet_core::{SessionError, SessionResult};

/// `Authorization: Bearer <token>` transport
#[derive(Debug, Clone)]
pub struct HeaderCarrier {
    reclaim: bool,
}

impl HeaderCarrier {
    /// With `reclaim` disabled the carrier never writes tokens; applications hand
    /// them out themselves.
    pub fn new(reclaim: bool) -> Self {
        Self { reclaim }
    }

    pub fn reclaim(&self) -> bool {
        self.reclaim
    }
}

impl Default for HeaderCarrier {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Carrier for HeaderCarrier {
    fn kind(&self) -> CredentialKind {
        CredentialKind::SignedToken
    }

    fn extract(&self, exchange: &dyn Exchange) -> SessionResult<Option<String>> {
        let value = match exchange.request_header(AUTHORIZATION.as_str()) {
            Some(value) if !value.is_empty() => value,
            _ => return Ok(None),
        };

        let parts: Vec<&str> = value.split(' ').collect();
        if parts.len() != 2 || !parts[0].eq_ignore_ascii_case("bearer") {
            return Err(SessionError::MalformedAuthHeader);
        }

        if parts[1].is_empty() {
            return Ok(None);
        }
        Ok(Some(parts[1].to_string()))
    }

    fn inject(&self, exchange: &mut dyn Exchange, credential: &str, _ttl: Duration) {
        if !self.reclaim {
            return;
        }
        let value = format!("Bearer {}", credential);
        exchange.set_request_header(AUTHORIZATION.as_str(), &value);
        exchange.set_response_header(AUTHORIZATION.as_str(), &value);
    }

    fn revoke(&self, exchange: &mut dyn Exchange) {
        exchange.remove_request_header(AUTHORIZATION.as_str());
        exchange.remove_response_header(AUTHORIZATION.as_str());
    }
}
