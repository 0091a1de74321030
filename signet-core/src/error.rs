//! Unified error handling for token-addressed sessions
//!
//! Errors fall into three classes: transport/format errors that callers treat as
//! "no session", cryptographic rejections that must surface distinctly, and store
//! errors that are returned to the caller of the failing operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

pub type SessionResult<T> = Result<T, SessionError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for session resolution, storage and lifecycle operations
#[derive(Error, Debug)]
pub enum SessionError {
    /// No active session to operate on
    #[error("session not found")]
    NotFound,

    /// The backend cannot honor the requested operation
    #[error("operation not implemented by the session database")]
    NotImplemented,

    #[error("authorization header format must be Bearer {{token}}")]
    MalformedAuthHeader,

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("expected {expected} signing method but token specified {actual}")]
    AlgorithmMismatch { expected: String, actual: String },

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token has expired")]
    TokenExpired,

    #[error("no signing key available")]
    MissingSigningKey,

    #[error("token creation failed: {0}")]
    TokenCreation(String),

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            SessionError::Storage { context, .. } => Some(context),
            SessionError::Config { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Cryptographic or validation failures. The integrating layer should answer
    /// these with an authentication rejection instead of starting a new session.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidToken(_)
                | SessionError::AlgorithmMismatch { .. }
                | SessionError::TokenExpired
        )
    }

    /// Transport or format errors, treated as "no session presented".
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            SessionError::MalformedAuthHeader | SessionError::MalformedToken(_)
        )
    }

    /// Errors raised by a store backend.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            SessionError::Storage { .. } | SessionError::NotImplemented | SessionError::Io(_)
        )
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            SessionError::Storage { .. } | SessionError::Io(_) => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Session store error"
                );
            }
            SessionError::Config { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Configuration error"
                );
            }
            e if e.is_rejection() => {
                warn!(error = %self, "Token rejected");
            }
            e if e.is_format_error() => {
                debug!(error = %self, "Ignoring malformed session credential");
            }
            _ => {
                warn!(error = %self, "Session error occurred");
            }
        }
    }
}

/// Build a storage error with context
#[macro_export]
macro_rules! storage_error {
    ($msg:expr, $component:expr) => {
        $crate::SessionError::Storage {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::SessionError::Storage {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::SessionError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your sessions configuration file"),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::SessionError::Config {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your sessions configuration file"),
        }
    };
}
