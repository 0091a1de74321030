//! Token codec: validates, parses and signs session tokens

use super::SessionClaims;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header};
use jsonwebtoken::Validation;
use signet_core::{config_error, CodecConfig, SessionError, SessionResult};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Resolves the key that verifies a token, given its decoded header
pub type ValidationKeyGetter =
    Arc<dyn Fn(&Header) -> SessionResult<DecodingKey> + Send + Sync>;

/// Resolves the key that signs a token. `Ok(None)` means no key is available.
pub type SigningKeyGetter =
    Arc<dyn Fn(&Header) -> SessionResult<Option<EncodingKey>> + Send + Sync>;

/// Signs and validates session tokens.
///
/// Validation order is fixed: structure, pinned algorithm, signature and
/// claims, then expiration. Each step gates trust in the next.
#[derive(Clone)]
pub struct TokenCodec {
    /// Bidirectional secret used by the default key getters
    secret: Option<Vec<u8>>,
    /// When set, tokens must carry exactly this `alg`
    signing_method: Option<Algorithm>,
    signing_key_getter: Option<SigningKeyGetter>,
    validation_key_getter: Option<ValidationKeyGetter>,
    check_expiration: bool,
    leeway_secs: u64,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("signing_method", &self.signing_method)
            .field("signing_key_getter", &self.signing_key_getter.is_some())
            .field("validation_key_getter", &self.validation_key_getter.is_some())
            .field("check_expiration", &self.check_expiration)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self {
            secret: None,
            signing_method: None,
            signing_key_getter: None,
            validation_key_getter: None,
            check_expiration: true,
            leeway_secs: 0,
        }
    }
}

impl TokenCodec {
    /// Codec backed by a shared HMAC secret
    pub fn with_secret(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: Some(secret.as_ref().to_vec()),
            ..Self::default()
        }
    }

    /// Build a codec from file configuration. Only HMAC algorithms are accepted
    /// since the keys come from `config.secret`.
    pub fn from_config(config: &CodecConfig) -> SessionResult<Self> {
        let signing_method = match &config.algorithm {
            Some(name) => {
                let algorithm = Algorithm::from_str(name).map_err(|e| {
                    config_error!(format!("Unknown signing algorithm {}", name), "codec", e)
                })?;
                if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
                    return Err(config_error!(
                        format!("{} needs key getters, not a shared secret", name),
                        "codec"
                    ));
                }
                Some(algorithm)
            }
            None => None,
        };

        let mut codec = Self {
            signing_method,
            check_expiration: config.check_expiration,
            leeway_secs: config.leeway_secs,
            ..Self::default()
        };
        if !config.secret.is_empty() {
            codec.secret = Some(config.secret.as_bytes().to_vec());
        }
        Ok(codec.validate())
    }

    /// Pin the accepted signing algorithm
    pub fn signing_method(mut self, algorithm: Algorithm) -> Self {
        self.signing_method = Some(algorithm);
        self
    }

    pub fn signing_key_getter(mut self, getter: SigningKeyGetter) -> Self {
        self.signing_key_getter = Some(getter);
        self
    }

    pub fn validation_key_getter(mut self, getter: ValidationKeyGetter) -> Self {
        self.validation_key_getter = Some(getter);
        self
    }

    pub fn check_expiration(mut self, enabled: bool) -> Self {
        self.check_expiration = enabled;
        self
    }

    pub fn leeway_secs(mut self, leeway: u64) -> Self {
        self.leeway_secs = leeway;
        self
    }

    pub fn pinned_algorithm(&self) -> Option<Algorithm> {
        self.signing_method
    }

    /// Fill missing key getters with ones that return the shared secret.
    /// Applying it again changes nothing.
    pub fn validate(mut self) -> Self {
        if self.signing_key_getter.is_none() {
            let secret = self.secret.clone();
            self.signing_key_getter = Some(Arc::new(move |_header: &Header| {
                Ok(secret.as_deref().map(EncodingKey::from_secret))
            }));
        }
        if self.validation_key_getter.is_none() {
            let secret = self.secret.clone();
            self.validation_key_getter = Some(Arc::new(move |_header: &Header| {
                secret
                    .as_deref()
                    .map(DecodingKey::from_secret)
                    .ok_or_else(|| SessionError::InvalidToken("no validation key".to_string()))
            }));
        }
        self
    }

    fn validation_key(&self, header: &Header) -> SessionResult<DecodingKey> {
        match &self.validation_key_getter {
            Some(getter) => getter(header),
            None => self
                .secret
                .as_deref()
                .map(DecodingKey::from_secret)
                .ok_or_else(|| SessionError::InvalidToken("no validation key".to_string())),
        }
    }

    fn signing_key(&self, header: &Header) -> SessionResult<Option<EncodingKey>> {
        match &self.signing_key_getter {
            Some(getter) => getter(header),
            None => Ok(self.secret.as_deref().map(EncodingKey::from_secret)),
        }
    }

    /// Parse and validate a token.
    ///
    /// An empty string means no session was presented and yields `Ok(None)`.
    pub fn parse(&self, token: &str) -> SessionResult<Option<SessionClaims>> {
        if token.is_empty() {
            return Ok(None);
        }

        // Structure
        if token.split('.').count() != 3 {
            return Err(SessionError::MalformedToken(
                "token must have three segments".to_string(),
            ));
        }
        let header =
            decode_header(token).map_err(|e| SessionError::MalformedToken(e.to_string()))?;

        // Algorithm pin, before any key lookup or signature check
        if let Some(expected) = self.signing_method {
            if header.alg != expected {
                return Err(SessionError::AlgorithmMismatch {
                    expected: format!("{:?}", expected),
                    actual: format!("{:?}", header.alg),
                });
            }
        }

        // Signature and claims
        let key = self.validation_key(&header)?;
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let claims = decode::<SessionClaims>(token, &key, &validation)
            .map_err(|e| {
                debug!("Token verification failed: {}", e);
                SessionError::InvalidToken(e.to_string())
            })?
            .claims;

        if claims.session_id.is_empty() {
            return Err(SessionError::InvalidToken(
                "empty session_id claim".to_string(),
            ));
        }

        // Expiration
        if self.check_expiration && claims.is_expired(self.leeway_secs) {
            return Err(SessionError::TokenExpired);
        }

        Ok(Some(claims))
    }

    /// Sign `claims` with the configured signing key
    pub fn serialize(&self, claims: &SessionClaims) -> SessionResult<String> {
        let header = Header::new(self.signing_method.unwrap_or(Algorithm::HS256));
        let key = self
            .signing_key(&header)?
            .ok_or(SessionError::MissingSigningKey)?;

        encode(&header, claims, &key).map_err(|e| SessionError::TokenCreation(e.to_string()))
    }
}
