//! Session Manager - resolves, creates and destroys sessions per exchange

use super::{DestroyListener, Provider, Session};
use crate::carrier::{self, Carrier, CredentialKind, RefreshPolicy};
use crate::codec::{SessionClaims, TokenCodec};
use crate::exchange::Exchange;
use crate::store::{clamp_ttl, Database, LifeTime};
use chrono::{Duration, Utc};
use http::Method;
use signet_core::{config_error, ttl_in_range, SessionError, SessionResult, SessionsConfig};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Produces identifiers for new sessions
pub type SessionIdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

fn uuid_generator() -> SessionIdGenerator {
    Arc::new(|| uuid::Uuid::new_v4().to_string())
}

/// Builder for [`Sessions`]
pub struct SessionsBuilder {
    config: SessionsConfig,
    codec: Option<TokenCodec>,
    carrier: Option<Arc<dyn Carrier>>,
    generator: Option<SessionIdGenerator>,
    database: Option<Arc<dyn Database>>,
}

impl SessionsBuilder {
    pub fn new(config: SessionsConfig) -> Self {
        Self {
            config,
            codec: None,
            carrier: None,
            generator: None,
            database: None,
        }
    }

    /// Default TTL. Zero means unlimited, negative means session-only.
    pub fn expires(mut self, expires: Duration) -> Self {
        self.config.expires_secs = expires.num_seconds();
        self
    }

    pub fn allow_reclaim(mut self, enabled: bool) -> Self {
        self.config.allow_reclaim = enabled;
        self
    }

    pub fn enable_auth_on_options(mut self, enabled: bool) -> Self {
        self.config.enable_auth_on_options = enabled;
        self
    }

    /// Replace the codec built from `config.codec`
    pub fn codec(mut self, codec: TokenCodec) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Replace the carrier selected by `config.carrier`
    pub fn carrier(mut self, carrier: Arc<dyn Carrier>) -> Self {
        self.carrier = Some(carrier);
        self
    }

    pub fn session_id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// Backend used instead of the default [`MemDb`](crate::store::MemDb)
    pub fn database(mut self, database: Arc<dyn Database>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn build(self) -> SessionResult<Sessions> {
        if !ttl_in_range(self.config.expires_secs) {
            return Err(config_error!(
                format!("expires_secs out of range: {}", self.config.expires_secs),
                "sessions"
            ));
        }
        let codec = match self.codec {
            Some(codec) => codec.validate(),
            None => {
                self.config.validate()?;
                TokenCodec::from_config(&self.config.codec)?
            }
        };
        let carrier = self
            .carrier
            .unwrap_or_else(|| carrier::from_config(&self.config));
        let provider = match self.database {
            Some(database) => Provider::with_database(database),
            None => Provider::new(),
        };

        debug!(
            "Sessions configured: carrier={:?} expires={}s reclaim={}",
            carrier, self.config.expires_secs, self.config.allow_reclaim
        );

        Ok(Sessions {
            expires: Duration::seconds(self.config.expires_secs),
            allow_reclaim: self.config.allow_reclaim,
            enable_auth_on_options: self.config.enable_auth_on_options,
            embed_expiration: self.config.codec.embed_expiration,
            codec,
            carrier,
            generator: self.generator.unwrap_or_else(uuid_generator),
            provider,
        })
    }
}

/// Lifecycle manager for token- or cookie-addressed sessions
pub struct Sessions {
    expires: Duration,
    allow_reclaim: bool,
    enable_auth_on_options: bool,
    embed_expiration: bool,
    codec: TokenCodec,
    carrier: Arc<dyn Carrier>,
    generator: SessionIdGenerator,
    provider: Provider,
}

impl fmt::Debug for Sessions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sessions")
            .field("expires", &self.expires)
            .field("allow_reclaim", &self.allow_reclaim)
            .field("carrier", &self.carrier)
            .field("codec", &self.codec)
            .field("sessions", &self.provider.len())
            .finish()
    }
}

/// Client-side TTL for a lifetime, rounded up to whole seconds
fn client_ttl(lifetime: &LifeTime) -> Duration {
    match lifetime.duration_left() {
        None => Duration::zero(),
        Some(left) => Duration::seconds((left.num_milliseconds() + 999) / 1000),
    }
}

impl Sessions {
    pub fn builder(config: SessionsConfig) -> SessionsBuilder {
        SessionsBuilder::new(config)
    }

    pub fn new(config: SessionsConfig) -> SessionResult<Self> {
        SessionsBuilder::new(config).build()
    }

    pub fn expires(&self) -> Duration {
        self.expires
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn carrier(&self) -> &Arc<dyn Carrier> {
        &self.carrier
    }

    /// Whether requests with `method` go through session resolution
    pub fn should_authenticate(&self, method: &Method) -> bool {
        self.enable_auth_on_options || method != Method::OPTIONS
    }

    /// Session identifier presented by the exchange, validated by the codec
    pub fn resolve(&self, exchange: &dyn Exchange) -> SessionResult<Option<String>> {
        let credential = match self.carrier.extract(exchange)? {
            Some(credential) => credential,
            None => return Ok(None),
        };

        match self.carrier.kind() {
            CredentialKind::Identifier => Ok(Some(credential)),
            CredentialKind::SignedToken => Ok(self
                .codec
                .parse(&credential)?
                .map(|claims| claims.session_id)),
        }
    }

    fn resolve_lenient(&self, exchange: &dyn Exchange) -> Option<String> {
        match self.resolve(exchange) {
            Ok(sid) => sid,
            Err(e) => {
                e.log();
                None
            }
        }
    }

    /// Start the session for this exchange, treating any resolution failure as
    /// "no session presented"
    pub fn start(&self, exchange: &mut dyn Exchange) -> SessionResult<Arc<Session>> {
        let sid = self.resolve_lenient(exchange);
        self.start_with(exchange, sid)
    }

    /// Like [`start`](Self::start), but bad signatures, algorithm mismatches and
    /// expired tokens are returned instead of starting a new session
    pub fn start_strict(&self, exchange: &mut dyn Exchange) -> SessionResult<Arc<Session>> {
        let sid = match self.resolve(exchange) {
            Ok(sid) => sid,
            Err(e) if e.is_rejection() => {
                e.log();
                return Err(e);
            }
            Err(e) => {
                e.log();
                None
            }
        };
        self.start_with(exchange, sid)
    }

    fn start_with(
        &self,
        exchange: &mut dyn Exchange,
        sid: Option<String>,
    ) -> SessionResult<Arc<Session>> {
        let session = match sid {
            None => {
                let sid = (self.generator)();
                let session = self.provider.init(&sid, self.expires)?;
                info!("Started new session {}", sid);
                session
            }
            Some(sid) => self.provider.read(&sid, self.expires)?,
        };

        if session.is_new() || self.carrier.refresh_policy() == RefreshPolicy::Always {
            self.transmit(exchange, &session)?;
        }
        Ok(session)
    }

    fn transmit(&self, exchange: &mut dyn Exchange, session: &Session) -> SessionResult<()> {
        let ttl = client_ttl(&session.lifetime());
        match self.carrier.kind() {
            CredentialKind::Identifier => self.carrier.inject(exchange, session.id(), ttl),
            CredentialKind::SignedToken => {
                let token = self.issue_token(session)?;
                self.carrier.inject(exchange, &token, ttl);
            }
        }
        Ok(())
    }

    /// Signed token naming `session`, for applications that hand tokens out themselves
    pub fn issue_token(&self, session: &Session) -> SessionResult<String> {
        let mut claims = SessionClaims::new(session.id());
        if self.embed_expiration {
            claims = claims.with_expiration(client_ttl(&session.lifetime()));
        }
        self.codec.serialize(&claims)
    }

    /// Move the deadline of the exchange's session by the default TTL
    pub fn shift_expiration(&self, exchange: &mut dyn Exchange) -> SessionResult<()> {
        self.update_expiration(exchange, self.expires)
    }

    /// Replace the deadline of the exchange's session. TTLs beyond
    /// [`MAX_TTL_SECS`](signet_core::MAX_TTL_SECS) are clamped.
    ///
    /// Returns [`SessionError::NotFound`] when the exchange carries no valid
    /// session and [`SessionError::NotImplemented`] when the backend cannot
    /// track expiration. A cookie is still deleted when `expires` is negative.
    pub fn update_expiration(
        &self,
        exchange: &mut dyn Exchange,
        expires: Duration,
    ) -> SessionResult<()> {
        let expires = clamp_ttl(expires);
        let sid = self
            .resolve_lenient(exchange)
            .ok_or(SessionError::NotFound)?;

        let result = self.provider.update_expiration(&sid, expires);
        match (&result, self.provider.get(&sid)) {
            (Ok(()), Some(session)) => self.reissue(exchange, &session)?,
            (Err(_), _)
                if expires < Duration::zero()
                    && self.carrier.kind() == CredentialKind::Identifier =>
            {
                self.carrier.revoke(exchange)
            }
            _ => {}
        }
        result
    }

    pub fn update_expiration_by_id(&self, sid: &str, expires: Duration) -> SessionResult<()> {
        self.provider.update_expiration(sid, clamp_ttl(expires))
    }

    /// Write the credential of `session` again so the client sees its current
    /// deadline. Cookies are reissued or deleted; tokens only when they embed
    /// their expiration.
    pub fn reissue(&self, exchange: &mut dyn Exchange, session: &Session) -> SessionResult<()> {
        if self.carrier.kind() == CredentialKind::SignedToken && !self.embed_expiration {
            return Ok(());
        }
        if session.has_expired() || session.is_destroyed() {
            self.carrier.revoke(exchange);
            return Ok(());
        }
        self.transmit(exchange, session)
    }

    /// Destroy the exchange's session and revoke its credential on both sides
    pub fn destroy(&self, exchange: &mut dyn Exchange) -> SessionResult<()> {
        let result = match self.resolve_lenient(exchange) {
            Some(sid) => self.provider.destroy(&sid),
            None => Ok(()),
        };
        self.carrier.revoke(exchange);
        result
    }

    pub fn destroy_by_id(&self, sid: &str) -> SessionResult<()> {
        self.provider.destroy(sid)
    }

    pub fn destroy_all(&self) -> SessionResult<()> {
        self.provider.destroy_all()
    }

    /// Invalidate the credential without touching server-side state
    pub fn revoke(&self, exchange: &mut dyn Exchange) {
        self.carrier.revoke(exchange);
    }

    /// Register a destroy listener. Listeners run synchronously on the
    /// destroying thread; slow work belongs on another thread.
    pub fn on_destroy<F>(&self, listener: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let listener: DestroyListener = Arc::new(listener);
        self.provider.register_destroy_listener(listener);
    }

    /// Register a backend; it becomes the active one
    pub fn use_database(&self, database: Arc<dyn Database>) {
        self.provider.register_database(database);
    }

    pub fn purge_expired(&self) -> SessionResult<usize> {
        self.provider.purge_expired()
    }

    pub fn get(&self, sid: &str) -> Option<Arc<Session>> {
        self.provider.get(sid)
    }

    pub fn session_count(&self) -> usize {
        self.provider.len()
    }

    /// Seconds until `session` expires, `None` when unlimited
    pub fn remaining_secs(&self, session: &Session) -> Option<i64> {
        session
            .lifetime()
            .expires_at
            .map(|at| (at - Utc::now()).num_seconds().max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::CookieCarrier;
    use crate::exchange::HttpExchange;
    use http::header::{AUTHORIZATION, COOKIE};
    use http::{HeaderMap, HeaderValue};

    fn config() -> SessionsConfig {
        let mut config = SessionsConfig::default();
        config.codec.secret = "manager-secret".to_string();
        config
    }

    fn sessions() -> Sessions {
        Sessions::new(config()).unwrap()
    }

    fn request(authorization: Option<&str>) -> HttpExchange {
        let mut headers = HeaderMap::new();
        if let Some(value) = authorization {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        HttpExchange::new(Method::GET, headers)
    }

    fn bearer(ex: &HttpExchange) -> String {
        ex.response_headers()
            .get(AUTHORIZATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_build_requires_secret_for_header_carrier() {
        assert!(Sessions::new(SessionsConfig::default()).is_err());
    }

    #[test]
    fn test_custom_generator() {
        let sessions = Sessions::builder(config())
            .session_id_generator(|| "fixed-id".to_string())
            .build()
            .unwrap();
        let session = sessions.start(&mut request(None)).unwrap();
        assert_eq!(session.id(), "fixed-id");
    }

    #[test]
    fn test_start_then_resume() {
        let sessions = sessions();
        let mut first = request(None);
        let created = sessions.start(&mut first).unwrap();
        assert!(created.is_new());
        created.set("user", "ada").unwrap();

        let mut second = request(Some(&bearer(&first)));
        let resumed = sessions.start(&mut second).unwrap();
        assert!(!resumed.is_new());
        assert_eq!(resumed.id(), created.id());
        assert!(second.response_headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_strict_start_rejects_forged_token() {
        let sessions = sessions();
        let forger = TokenCodec::with_secret("other").validate();
        let token = forger.serialize(&SessionClaims::new("victim")).unwrap();
        let header = format!("Bearer {}", token);

        let err = sessions.start_strict(&mut request(Some(&header))).unwrap_err();
        assert!(err.is_rejection());

        // Lenient start opens a fresh session instead
        let session = sessions.start(&mut request(Some(&header))).unwrap();
        assert_ne!(session.id(), "victim");
        assert!(session.is_new());
    }

    #[test]
    fn test_strict_start_tolerates_format_errors() {
        let sessions = sessions();
        let session = sessions
            .start_strict(&mut request(Some("Basic abcdef")))
            .unwrap();
        assert!(session.is_new());
    }

    #[test]
    fn test_should_authenticate() {
        let sessions = sessions();
        assert!(sessions.should_authenticate(&Method::GET));
        assert!(!sessions.should_authenticate(&Method::OPTIONS));

        let strict = Sessions::builder(config())
            .enable_auth_on_options(true)
            .build()
            .unwrap();
        assert!(strict.should_authenticate(&Method::OPTIONS));
    }

    #[test]
    fn test_issue_token_without_reclaim() {
        let sessions = Sessions::builder(config())
            .allow_reclaim(false)
            .build()
            .unwrap();
        let mut ex = request(None);
        let session = sessions.start(&mut ex).unwrap();
        assert!(ex.response_headers().get(AUTHORIZATION).is_none());

        let token = sessions.issue_token(&session).unwrap();
        let mut next = request(Some(&format!("Bearer {}", token)));
        assert_eq!(sessions.start(&mut next).unwrap().id(), session.id());
    }

    #[test]
    fn test_embedded_expiration() {
        let mut config = config();
        config.codec.embed_expiration = true;
        let sessions = Sessions::builder(config)
            .expires(Duration::minutes(5))
            .build()
            .unwrap();

        let session = sessions.start(&mut request(None)).unwrap();
        let token = sessions.issue_token(&session).unwrap();
        let claims = sessions.codec().parse(&token).unwrap().unwrap();
        let ttl = claims.exp.unwrap() - claims.iat.unwrap();
        assert!((299..=300).contains(&ttl));
    }

    #[test]
    fn test_update_expiration_requires_session() {
        let sessions = sessions();
        assert!(matches!(
            sessions.update_expiration(&mut request(None), Duration::hours(1)),
            Err(SessionError::NotFound)
        ));

        let mut ex = request(None);
        let session = sessions.start(&mut ex).unwrap();
        sessions.update_expiration(&mut ex, Duration::hours(1)).unwrap();
        assert!(sessions.remaining_secs(&session).unwrap() > 3500);

        sessions.shift_expiration(&mut ex).unwrap();
        assert_eq!(sessions.remaining_secs(&session), None);
    }

    #[test]
    fn test_cookie_carrier_lifecycle() {
        let sessions = Sessions::builder(SessionsConfig::default())
            .codec(TokenCodec::default())
            .carrier(Arc::new(CookieCarrier::new("sid")))
            .expires(Duration::minutes(30))
            .build()
            .unwrap();

        let mut first = request(None);
        let created = sessions.start(&mut first).unwrap();
        let cookie = first
            .response_cookies()
            .into_iter()
            .find(|c| c.name() == "sid")
            .unwrap();
        assert_eq!(cookie.value(), created.id());
        assert!(cookie.max_age().is_some());

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("sid={}", created.id())).unwrap(),
        );
        let mut second = HttpExchange::new(Method::GET, headers);
        let resumed = sessions.start(&mut second).unwrap();
        assert!(!resumed.is_new());
        // Cookies slide on every request
        assert_eq!(second.response_cookies().len(), 1);

        sessions.destroy(&mut second).unwrap();
        assert_eq!(sessions.session_count(), 0);
        assert_eq!(second.request_cookie("sid"), None);
    }

    #[test]
    fn test_cookie_update_expiration_reissues_cookie() {
        let sessions = Sessions::builder(SessionsConfig::default())
            .codec(TokenCodec::default())
            .carrier(Arc::new(CookieCarrier::new("sid")))
            .build()
            .unwrap();

        let mut ex = request(None);
        sessions.start(&mut ex).unwrap();
        sessions
            .update_expiration(&mut ex, Duration::seconds(90))
            .unwrap();

        let cookie = ex
            .response_cookies()
            .into_iter()
            .find(|c| c.name() == "sid")
            .unwrap();
        assert_eq!(cookie.max_age().map(|d| d.whole_seconds()), Some(90));
    }

    #[test]
    fn test_negative_default_ttl_issues_session_cookie() {
        let sessions = Sessions::builder(SessionsConfig::default())
            .codec(TokenCodec::default())
            .carrier(Arc::new(CookieCarrier::new("sid")))
            .expires(Duration::seconds(-1))
            .build()
            .unwrap();

        let mut ex = request(None);
        let session = sessions.start(&mut ex).unwrap();
        assert!(session.lifetime().is_unlimited());

        let cookie = ex.response_cookies().into_iter().next().unwrap();
        assert_eq!(cookie.value(), session.id());
        assert!(cookie.max_age().is_none());
    }
}
