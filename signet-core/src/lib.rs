//! Signet Core - Error taxonomy, configuration and logging
//!
//! Shared by the session engine and the web integration. Holds no HTTP types.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use tracing;
