use super::{Carrier, CredentialKind, RefreshPolicy};
use crate::exchange::Exchange;
use crate::store::clamp_ttl;
use ::cookie::time::{self, OffsetDateTime};
use ::cookie::Cookie;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Duration;
use signet_core::{CookieConfig, SessionResult, DEFAULT_COOKIE_NAME};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reversible transformation applied to cookie values.
///
/// Returning `None` from `decode` makes the carrier treat the cookie as absent.
pub trait CookieEncoding: Send + Sync + fmt::Debug {
    fn encode(&self, name: &str, value: &str) -> Option<String>;
    fn decode(&self, name: &str, value: &str) -> Option<String>;
}

/// URL-safe base64 without padding
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Encoding;

impl CookieEncoding for Base64Encoding {
    fn encode(&self, _name: &str, value: &str) -> Option<String> {
        Some(URL_SAFE_NO_PAD.encode(value))
    }

    fn decode(&self, _name: &str, value: &str) -> Option<String> {
        let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
        String::from_utf8(bytes).ok()
    }
}

type CodecFn = Arc<dyn Fn(&str, &str) -> Option<String> + Send + Sync>;

/// Encoding built from a pair of closures
#[derive(Clone)]
pub struct FnEncoding {
    encode: CodecFn,
    decode: CodecFn,
}

impl FnEncoding {
    pub fn new<E, D>(encode: E, decode: D) -> Self
    where
        E: Fn(&str, &str) -> Option<String> + Send + Sync + 'static,
        D: Fn(&str, &str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        }
    }
}

impl fmt::Debug for FnEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnEncoding").finish_non_exhaustive()
    }
}

impl CookieEncoding for FnEncoding {
    fn encode(&self, name: &str, value: &str) -> Option<String> {
        (self.encode)(name, value)
    }

    fn decode(&self, name: &str, value: &str) -> Option<String> {
        (self.decode)(name, value)
    }
}

/// Session identifier carried in a named cookie
#[derive(Debug, Clone)]
pub struct CookieCarrier {
    name: String,
    path: String,
    domain: Option<String>,
    disable_subdomain_persistence: bool,
    secure_tls: bool,
    reclaim: bool,
    encoding: Option<Arc<dyn CookieEncoding>>,
}

impl Default for CookieCarrier {
    fn default() -> Self {
        Self::new(DEFAULT_COOKIE_NAME)
    }
}

impl CookieCarrier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: "/".to_string(),
            domain: None,
            disable_subdomain_persistence: false,
            secure_tls: true,
            reclaim: true,
            encoding: None,
        }
    }

    pub fn from_config(config: &CookieConfig, reclaim: bool) -> Self {
        Self {
            name: config.name.clone(),
            path: config.path.clone(),
            domain: config.domain.clone(),
            disable_subdomain_persistence: config.disable_subdomain_persistence,
            secure_tls: config.secure_tls,
            reclaim,
            encoding: None,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn disable_subdomain_persistence(mut self, disabled: bool) -> Self {
        self.disable_subdomain_persistence = disabled;
        self
    }

    pub fn secure_tls(mut self, enabled: bool) -> Self {
        self.secure_tls = enabled;
        self
    }

    pub fn reclaim(mut self, enabled: bool) -> Self {
        self.reclaim = enabled;
        self
    }

    pub fn encoding(mut self, encoding: Arc<dyn CookieEncoding>) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cookie with every attribute except value and expiry set
    fn base_cookie(&self, exchange: &dyn Exchange, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::build((self.name.clone(), value))
            .path(self.path.clone())
            .http_only(true);

        if !self.disable_subdomain_persistence {
            if let Some(domain) = &self.domain {
                cookie = cookie.domain(domain.clone());
            }
        }
        if self.secure_tls && exchange.is_tls() {
            cookie = cookie.secure(true);
        }

        cookie.build()
    }

    fn removal_cookie(&self, exchange: &dyn Exchange) -> Cookie<'static> {
        let mut cookie = self.base_cookie(exchange, String::new());
        cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
        cookie.set_max_age(time::Duration::ZERO);
        cookie
    }
}

impl Carrier for CookieCarrier {
    fn kind(&self) -> CredentialKind {
        CredentialKind::Identifier
    }

    fn refresh_policy(&self) -> RefreshPolicy {
        RefreshPolicy::Always
    }

    fn extract(&self, exchange: &dyn Exchange) -> SessionResult<Option<String>> {
        let raw = match exchange.request_cookie(&self.name) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(None),
        };

        match &self.encoding {
            None => Ok(Some(raw)),
            Some(encoding) => match encoding.decode(&self.name, &raw) {
                Some(value) if !value.is_empty() => Ok(Some(value)),
                _ => {
                    debug!("Undecodable cookie {}, treating as absent", self.name);
                    Ok(None)
                }
            },
        }
    }

    fn inject(&self, exchange: &mut dyn Exchange, credential: &str, ttl: Duration) {
        if ttl < Duration::zero() {
            self.revoke(exchange);
            return;
        }

        let value = match &self.encoding {
            None => credential.to_string(),
            Some(encoding) => match encoding.encode(&self.name, credential) {
                Some(value) => value,
                None => {
                    warn!("Failed to encode cookie {}, not issuing it", self.name);
                    return;
                }
            },
        };

        let mut cookie = self.base_cookie(exchange, value.clone());
        if ttl > Duration::zero() {
            let max_age = time::Duration::seconds(clamp_ttl(ttl).num_seconds());
            if let Some(expires) = OffsetDateTime::now_utc().checked_add(max_age) {
                cookie.set_expires(expires);
            }
            cookie.set_max_age(max_age);
        }

        if self.reclaim {
            exchange.set_request_cookie(&self.name, &value);
        }
        exchange.set_response_cookie(cookie);
    }

    fn revoke(&self, exchange: &mut dyn Exchange) {
        exchange.remove_request_cookie(&self.name);
        let removal = self.removal_cookie(exchange);
        exchange.set_response_cookie(removal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::HttpExchange;
    use http::header::COOKIE;
    use http::{HeaderMap, HeaderValue, Method};

    fn exchange(cookie: Option<&str>) -> HttpExchange {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = cookie {
            headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        HttpExchange::new(Method::GET, headers)
    }

    fn issued(ex: &HttpExchange, name: &str) -> Cookie<'static> {
        ex.response_cookies()
            .into_iter()
            .find(|c| c.name() == name)
            .expect("cookie was issued")
    }

    #[test]
    fn test_extract_plain_cookie() {
        let carrier = CookieCarrier::new("sid");
        let ex = exchange(Some("theme=dark; sid=abc"));
        assert_eq!(carrier.extract(&ex).unwrap().as_deref(), Some("abc"));
        assert_eq!(carrier.extract(&exchange(None)).unwrap(), None);
    }

    #[test]
    fn test_positive_ttl_sets_expiry() {
        let carrier = CookieCarrier::new("sid").domain("example.com");
        let mut ex = exchange(None);
        carrier.inject(&mut ex, "abc", Duration::minutes(10));

        let cookie = issued(&ex, "sid");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(600)));
        assert!(cookie.expires_datetime().is_some());
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(ex.request_cookie("sid").as_deref(), Some("abc"));
    }

    #[test]
    fn test_huge_ttl_is_clamped() {
        let carrier = CookieCarrier::new("sid");
        let mut ex = exchange(None);
        carrier.inject(&mut ex, "abc", Duration::seconds(10_000_000_000_000));

        let cookie = issued(&ex, "sid");
        assert_eq!(
            cookie.max_age(),
            Some(time::Duration::seconds(signet_core::MAX_TTL_SECS))
        );
        assert!(cookie.expires_datetime().is_some());
    }

    #[test]
    fn test_zero_ttl_is_session_cookie() {
        let carrier = CookieCarrier::new("sid");
        let mut ex = exchange(None);
        carrier.inject(&mut ex, "abc", Duration::zero());

        let cookie = issued(&ex, "sid");
        assert!(cookie.max_age().is_none());
        assert!(cookie.expires_datetime().is_none());
    }

    #[test]
    fn test_negative_ttl_deletes_cookie() {
        let carrier = CookieCarrier::new("sid");
        let mut ex = exchange(Some("sid=abc"));
        carrier.inject(&mut ex, "abc", Duration::seconds(-1));

        let cookie = issued(&ex, "sid");
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
        assert_eq!(ex.request_cookie("sid"), None);
    }

    #[test]
    fn test_secure_only_over_tls() {
        let carrier = CookieCarrier::new("sid");

        let mut plain = exchange(None);
        carrier.inject(&mut plain, "abc", Duration::zero());
        assert_ne!(issued(&plain, "sid").secure(), Some(true));

        let mut tls = exchange(None).with_tls(true);
        carrier.inject(&mut tls, "abc", Duration::zero());
        assert_eq!(issued(&tls, "sid").secure(), Some(true));

        let mut opted_out = exchange(None).with_tls(true);
        carrier
            .clone()
            .secure_tls(false)
            .inject(&mut opted_out, "abc", Duration::zero());
        assert_ne!(issued(&opted_out, "sid").secure(), Some(true));
    }

    #[test]
    fn test_subdomain_persistence_can_be_disabled() {
        let carrier = CookieCarrier::new("sid")
            .domain("example.com")
            .disable_subdomain_persistence(true);
        let mut ex = exchange(None);
        carrier.inject(&mut ex, "abc", Duration::zero());
        assert_eq!(issued(&ex, "sid").domain(), None);
    }

    #[test]
    fn test_base64_encoding_round_trip() {
        let carrier = CookieCarrier::new("sid").encoding(Arc::new(Base64Encoding));
        let mut ex = exchange(None);
        carrier.inject(&mut ex, "session-42", Duration::zero());

        let cookie = issued(&ex, "sid");
        assert_ne!(cookie.value(), "session-42");

        let next = exchange(Some(&format!("sid={}", cookie.value())));
        assert_eq!(
            carrier.extract(&next).unwrap().as_deref(),
            Some("session-42")
        );
    }

    #[test]
    fn test_undecodable_cookie_is_absent() {
        let carrier = CookieCarrier::new("sid").encoding(Arc::new(Base64Encoding));
        let ex = exchange(Some("sid=!!not-base64!!"));
        assert_eq!(carrier.extract(&ex).unwrap(), None);

        let failing = CookieCarrier::new("sid").encoding(Arc::new(FnEncoding::new(
            |_, v| Some(v.to_string()),
            |_, _| None,
        )));
        assert_eq!(failing.extract(&exchange(Some("sid=abc"))).unwrap(), None);
    }

    #[test]
    fn test_revoke() {
        let carrier = CookieCarrier::new("sid");
        let mut ex = exchange(Some("sid=abc; theme=dark"));
        carrier.revoke(&mut ex);

        assert_eq!(ex.request_cookie("sid"), None);
        assert_eq!(ex.request_cookie("theme").as_deref(), Some("dark"));
        assert_eq!(issued(&ex, "sid").max_age(), Some(time::Duration::ZERO));
    }
}
