//! Session Lifecycle Manager
//!
//! [`Sessions`] resolves the session of each exchange through the carrier and
//! codec, creates sessions that are absent, and destroys them on request.
//! [`Provider`] owns the live sessions, the store backends and the destroy
//! listeners.

pub mod handle;
pub mod manager;
pub mod provider;

pub use handle::Session;
pub use manager::{SessionIdGenerator, Sessions, SessionsBuilder};
pub use provider::{Databases, DestroyListener, Provider};
