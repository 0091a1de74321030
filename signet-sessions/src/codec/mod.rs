//! Token Codec - signs session identifiers into tokens and validates them back
//!
//! The codec is a pure function of its key material; it holds no shared state
//! and is cheap to clone into every request.

pub mod claims;
pub mod parser;

pub use claims::SessionClaims;
pub use parser::{SigningKeyGetter, TokenCodec, ValidationKeyGetter};

/// Re-exported so callers can pin algorithms and build keys without a direct dependency
pub use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
