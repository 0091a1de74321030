//! Extractor for the session started by [`session_middleware`](crate::middleware::session_middleware)

use crate::WebError;
use axum::{extract::FromRequestParts, http::request::Parts};
use signet_core::SessionError;
use signet_sessions::Session;
use std::ops::Deref;
use std::sync::Arc;

/// The session of the current request
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Arc<Session>);

impl Deref for CurrentSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or(WebError::Session(SessionError::NotFound))
    }
}
