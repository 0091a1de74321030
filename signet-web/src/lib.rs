//! Signet Web
//!
//! Axum integration for signet sessions: a middleware that starts the session of
//! every request, a [`CurrentSession`] extractor, and demo routes.

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use extract::CurrentSession;
pub use server::{SignetServer, SignetServerBuilder};
pub use state::AppState;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Router,
};
use serde_json::json;
use signet_core::SessionError;
use std::path::PathBuf;
use tower_http::trace::TraceLayer;

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Configuration for the web server
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Sessions configuration file (TOML)
    pub config_path: Option<PathBuf>,
    /// Seconds between sweeps of expired sessions
    pub purge_interval_secs: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            config_path: None,
            purge_interval_secs: 60,
        }
    }
}

impl WebConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("SIGNET_HOST").unwrap_or(defaults.host),
            port: std::env::var("SIGNET_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            config_path: std::env::var("SIGNET_CONFIG").ok().map(PathBuf::from),
            purge_interval_secs: std::env::var("SIGNET_PURGE_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.purge_interval_secs),
        }
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Error types for the web server
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::Session(e) if e.is_rejection() => StatusCode::UNAUTHORIZED,
            WebError::Session(e) if e.is_format_error() => StatusCode::BAD_REQUEST,
            WebError::Session(SessionError::NotFound) => StatusCode::NOT_FOUND,
            WebError::Session(_) | WebError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            if let WebError::Session(e) = &self {
                e.log();
            } else {
                tracing::error!("Request failed: {}", self);
            }
        }

        let code = match status {
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::BAD_REQUEST => "bad_request",
            _ => "internal_error",
        };
        (
            status,
            Json(json!({
                "error": code,
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            WebError::from(SessionError::TokenExpired).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            WebError::from(SessionError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            WebError::from(SessionError::NotImplemented).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            WebError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = WebConfig::default();
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(config.purge_interval_secs, 60);
    }
}
