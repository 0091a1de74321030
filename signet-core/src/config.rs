//! Configuration management

use crate::error::{ErrorContext, SessionError, SessionResult};
use crate::types::{CarrierMode, CodecConfig, CookieConfig, CookieEncodingMode, SessionsConfig};

use std::path::Path;

/// Algorithms accepted for `codec.algorithm`. Keys are derived from
/// `codec.secret`, so only HMAC methods can be configured from a file;
/// asymmetric keys go through `TokenCodec` key getters.
pub const SUPPORTED_ALGORITHMS: &[&str] = &["HS256", "HS384", "HS512"];

/// Largest TTL, in seconds, accepted in either direction (100 years)
pub const MAX_TTL_SECS: i64 = 100 * 365 * 24 * 60 * 60;

/// Whether `secs` lies within `-MAX_TTL_SECS..=MAX_TTL_SECS`
pub fn ttl_in_range(secs: i64) -> bool {
    secs.unsigned_abs() <= MAX_TTL_SECS.unsigned_abs()
}

/// Default cookie name
pub const DEFAULT_COOKIE_NAME: &str = "signet_sid";

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            allow_reclaim: true,
            expires_secs: 0,
            carrier: CarrierMode::Header,
            enable_auth_on_options: false,
            codec: CodecConfig::default(),
            cookie: CookieConfig::default(),
        }
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            algorithm: Some("HS256".to_string()),
            check_expiration: true,
            leeway_secs: 60,
            embed_expiration: false,
        }
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            path: "/".to_string(),
            domain: None,
            disable_subdomain_persistence: false,
            secure_tls: true,
            encoding: CookieEncodingMode::None,
        }
    }
}

impl SessionsConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> SessionResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SessionError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: SessionsConfig = toml::from_str(&content).map_err(|e| SessionError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> SessionResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| SessionError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| SessionError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Overlay `SIGNET_*` environment variables on top of this configuration.
    /// Unparseable values are ignored.
    pub fn from_env(mut self) -> Self {
        if let Ok(secret) = std::env::var("SIGNET_SECRET") {
            self.codec.secret = secret;
        }
        if let Ok(algorithm) = std::env::var("SIGNET_ALGORITHM") {
            self.codec.algorithm = Some(algorithm);
        }
        if let Some(expires) = env_parse::<i64>("SIGNET_EXPIRES_SECS") {
            self.expires_secs = expires;
        }
        if let Some(reclaim) = env_parse::<bool>("SIGNET_ALLOW_RECLAIM") {
            self.allow_reclaim = reclaim;
        }
        if let Ok(carrier) = std::env::var("SIGNET_CARRIER") {
            match carrier.to_ascii_lowercase().as_str() {
                "header" => self.carrier = CarrierMode::Header,
                "cookie" => self.carrier = CarrierMode::Cookie,
                _ => {}
            }
        }
        if let Ok(name) = std::env::var("SIGNET_COOKIE_NAME") {
            self.cookie.name = name;
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> SessionResult<()> {
        if self.carrier == CarrierMode::Header && self.codec.secret.is_empty() {
            return Err(SessionError::Config {
                message: "codec.secret must not be empty for the header carrier".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set codec.secret or the SIGNET_SECRET variable"),
            });
        }

        if let Some(algorithm) = &self.codec.algorithm {
            if !SUPPORTED_ALGORITHMS.contains(&algorithm.as_str()) {
                return Err(SessionError::Config {
                    message: format!("Unknown signing algorithm: {}", algorithm),
                    source: None,
                    context: ErrorContext::new("config")
                        .with_operation("validate")
                        .with_metadata("algorithm", algorithm)
                        .with_suggestion("Use one of HS256, HS384, HS512"),
                });
            }
        }

        if !ttl_in_range(self.expires_secs) {
            return Err(SessionError::Config {
                message: format!("expires_secs out of range: {}", self.expires_secs),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_metadata("expires_secs", &self.expires_secs.to_string())
                    .with_suggestion("Keep expires_secs within 100 years"),
            });
        }

        if self.carrier == CarrierMode::Cookie && self.cookie.name.trim().is_empty() {
            return Err(SessionError::Config {
                message: "cookie.name must not be empty".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set cookie.name to a non-empty value"),
            });
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> SessionsConfig {
        let mut config = SessionsConfig::default();
        config.codec.secret = "top-secret".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = SessionsConfig::default();
        assert!(config.allow_reclaim);
        assert_eq!(config.expires_secs, 0);
        assert_eq!(config.carrier, CarrierMode::Header);
        assert_eq!(config.codec.algorithm.as_deref(), Some("HS256"));
        assert_eq!(config.cookie.name, DEFAULT_COOKIE_NAME);
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let config = SessionsConfig::default();
        assert!(matches!(config.validate(), Err(SessionError::Config { .. })));
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_algorithm() {
        let mut config = valid_config();
        config.codec.algorithm = Some("none".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_asymmetric_algorithms() {
        for algorithm in ["RS256", "ES256", "EdDSA"] {
            let mut config = valid_config();
            config.codec.algorithm = Some(algorithm.to_string());
            assert!(config.validate().is_err(), "{} accepted", algorithm);
        }
        for algorithm in SUPPORTED_ALGORITHMS {
            let mut config = valid_config();
            config.codec.algorithm = Some(algorithm.to_string());
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_validate_bounds_expires() {
        let mut config = valid_config();
        config.expires_secs = MAX_TTL_SECS;
        assert!(config.validate().is_ok());

        config.expires_secs = 10_000_000_000_000;
        assert!(config.validate().is_err());

        config.expires_secs = i64::MIN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_cookie_name() {
        let mut config = valid_config();
        config.carrier = CarrierMode::Cookie;
        config.cookie.name = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_toml() {
        let toml = r#"
            expires_secs = 1800
            carrier = "cookie"

            [codec]
            secret = "abc"

            [cookie]
            name = "sid"
            encoding = "base64"
        "#;
        let config: SessionsConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.expires_secs, 1800);
        assert_eq!(config.carrier, CarrierMode::Cookie);
        assert_eq!(config.codec.secret, "abc");
        assert!(config.codec.check_expiration); // default
        assert_eq!(config.cookie.name, "sid");
        assert_eq!(config.cookie.path, "/"); // default
        assert_eq!(config.cookie.encoding, CookieEncodingMode::Base64);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.toml");

        let mut config = valid_config();
        config.expires_secs = -1;
        config.save_to_file(&path).unwrap();

        let loaded = SessionsConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = SessionsConfig::from_file("/definitely/not/here.toml").unwrap_err();
        let context = err.context().unwrap();
        assert_eq!(context.operation.as_deref(), Some("read_file"));
    }
}
