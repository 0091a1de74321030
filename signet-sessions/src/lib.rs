//! Signet Sessions - server-side sessions addressed by signed tokens or cookies
//!
//! The crate is built from four layers, leaves first:
//!
//! - **Codec** ([`codec`]): signs session identifiers into tokens and validates
//!   them back, checking structure, the pinned algorithm, the signature and
//!   expiration in that order
//! - **Carrier** ([`carrier`]): moves the credential between client and server,
//!   either as an `Authorization: Bearer` header or inside a cookie
//! - **Store** ([`store`]): the pluggable key/value backend behind every session
//! - **Sessions** ([`session`]): resolves, creates and destroys sessions for each
//!   [`Exchange`]
//!
//! ## Example
//!
//! ```
//! use http::{HeaderMap, Method};
//! use signet_core::SessionsConfig;
//! use signet_sessions::{HttpExchange, Sessions};
//!
//! let mut config = SessionsConfig::default();
//! config.codec.secret = "change-me".to_string();
//! let sessions = Sessions::new(config)?;
//!
//! let mut exchange = HttpExchange::new(Method::GET, HeaderMap::new());
//! let session = sessions.start(&mut exchange)?;
//! session.set("visits", 1)?;
//! assert!(session.is_new());
//! assert!(exchange.response_headers().contains_key("authorization"));
//! # Ok::<(), signet_core::SessionError>(())
//! ```

pub mod carrier;
pub mod codec;
pub mod exchange;
pub mod session;
pub mod store;

pub use carrier::{Carrier, CookieCarrier, CredentialKind, HeaderCarrier, RefreshPolicy};
pub use codec::{SessionClaims, TokenCodec};
pub use exchange::{Exchange, HttpExchange};
pub use session::{DestroyListener, Session, SessionIdGenerator, Sessions, SessionsBuilder};
pub use store::{Database, LifeTime, MemDb};

pub use signet_core::{SessionError, SessionResult};
