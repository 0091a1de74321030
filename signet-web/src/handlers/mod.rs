//! HTTP request handlers for the demo server

pub mod health;
pub mod session;
pub mod types;

pub use health::*;
pub use session::*;
pub use types::*;
