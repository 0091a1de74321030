//! Signet Web Server
//!
//! Main web server implementation using Axum.

use crate::{create_app, AppState, WebConfig, WebError, WebResult};
use axum::serve;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Demo session server
pub struct SignetServer {
    config: WebConfig,
    state: AppState,
}

impl SignetServer {
    /// Create a new server, loading the sessions configuration
    pub fn new(config: WebConfig) -> WebResult<Self> {
        let state = AppState::new(config.clone())?;
        Ok(Self { config, state })
    }

    pub fn with_state(config: WebConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Start the web server
    pub async fn start(self) -> WebResult<()> {
        let address = self.config.address();
        let app = create_app(self.state.clone());

        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;
        info!("Server listening on http://{}", address);

        // Sweep expired sessions
        let purge_state = self.state.clone();
        let period = Duration::from_secs(self.config.purge_interval_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let purged = purge_state.purge_expired();
                if purged > 0 {
                    debug!("Purged {} expired sessions", purged);
                }
            }
        });

        if let Err(e) = serve(listener, app).await {
            error!("Server error: {}", e);
            return Err(WebError::Server(e));
        }

        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Builder for SignetServer
pub struct SignetServerBuilder {
    config: WebConfig,
}

impl SignetServerBuilder {
    pub fn new() -> Self {
        Self {
            config: WebConfig::default(),
        }
    }

    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sessions configuration file
    pub fn config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.config_path = Some(path.into());
        self
    }

    pub fn purge_interval_secs(mut self, secs: u64) -> Self {
        self.config.purge_interval_secs = secs;
        self
    }

    pub fn build(self) -> WebResult<SignetServer> {
        SignetServer::new(self.config)
    }
}

impl Default for SignetServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
