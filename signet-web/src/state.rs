//! Shared application state

use crate::{WebConfig, WebResult};
use signet_core::{performance, SessionsConfig};
use signet_sessions::Sessions;
use std::sync::Arc;
use tracing::info;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<WebConfig>,
    pub sessions: Arc<Sessions>,
}

impl AppState {
    /// Load sessions configuration from `config.config_path` (if any) and the
    /// `SIGNET_*` environment, then build the session manager
    pub fn new(config: WebConfig) -> WebResult<Self> {
        let sessions_config = match &config.config_path {
            Some(path) => {
                info!("Loading sessions configuration from {}", path.display());
                SessionsConfig::from_file(path)?
            }
            None => SessionsConfig::default(),
        }
        .from_env();

        let sessions = Sessions::new(sessions_config)?;
        Ok(Self::with_sessions(config, sessions))
    }

    pub fn with_sessions(config: WebConfig, sessions: Sessions) -> Self {
        Self {
            config: Arc::new(config),
            sessions: Arc::new(sessions),
        }
    }

    /// Destroy expired sessions, logging failures
    pub fn purge_expired(&self) -> usize {
        match performance::measure_sync("purge_expired", || self.sessions.purge_expired()) {
            Ok(purged) => purged,
            Err(e) => {
                e.log();
                0
            }
        }
    }
}
