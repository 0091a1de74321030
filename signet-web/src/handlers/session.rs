//! Session handlers

use super::types::*;
use crate::{AppState, CurrentSession, WebError, WebResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{Map, Value};
use signet_core::{ttl_in_range, SessionError, MAX_TTL_SECS};
use tracing::info;

/// Describe the current session and its values
pub async fn get_session(
    State(state): State<AppState>,
    session: CurrentSession,
) -> WebResult<Json<SessionResponse>> {
    Ok(Json(SessionResponse {
        session_id: session.id().to_string(),
        is_new: session.is_new(),
        expires_in: state.sessions.remaining_secs(&session),
        values: session.get_all()?,
    }))
}

/// Destroy the current session. The middleware revokes the credential.
pub async fn destroy_session(
    State(state): State<AppState>,
    session: CurrentSession,
) -> WebResult<StatusCode> {
    state.sessions.destroy_by_id(session.id())?;
    info!("Session {} destroyed by request", session.id());
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_value(
    session: CurrentSession,
    Path(key): Path<String>,
) -> WebResult<Json<ValueResponse>> {
    let value = session
        .get(&key)?
        .ok_or(WebError::Session(SessionError::NotFound))?;
    Ok(Json(ValueResponse { key, value }))
}

pub async fn set_value(
    session: CurrentSession,
    Path(key): Path<String>,
    Query(params): Query<WriteParams>,
    Json(value): Json<Value>,
) -> WebResult<Json<WriteResponse>> {
    let stored = if params.immutable {
        session.set_immutable(&key, value)?
    } else {
        session.set(&key, value)?
    };
    Ok(Json(WriteResponse { key, stored }))
}

pub async fn delete_value(
    session: CurrentSession,
    Path(key): Path<String>,
) -> WebResult<StatusCode> {
    if session.delete(&key)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(WebError::Session(SessionError::NotFound))
    }
}

pub async fn clear_values(session: CurrentSession) -> WebResult<StatusCode> {
    session.clear()?;
    Ok(StatusCode::NO_CONTENT)
}

/// Increment the session's visit counter
pub async fn increment_counter(session: CurrentSession) -> WebResult<Json<CounterResponse>> {
    let counter = session.increment("counter", 1)?;
    Ok(Json(CounterResponse { counter }))
}

pub async fn set_flash(
    session: CurrentSession,
    Json(request): Json<FlashRequest>,
) -> WebResult<StatusCode> {
    if request.key.is_empty() {
        return Err(WebError::BadRequest("flash key must not be empty".to_string()));
    }
    session.set_flash(&request.key, request.value)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Read and consume every flash message
pub async fn get_flashes(session: CurrentSession) -> Json<Map<String, Value>> {
    Json(session.get_flashes())
}

/// Signed token for the current session
pub async fn issue_token(
    State(state): State<AppState>,
    session: CurrentSession,
) -> WebResult<Json<TokenResponse>> {
    let token = state.sessions.issue_token(&session)?;
    Ok(Json(TokenResponse {
        token,
        token_type: "Bearer".to_string(),
    }))
}

/// Replace the session deadline
pub async fn refresh_session(
    State(state): State<AppState>,
    session: CurrentSession,
    Query(params): Query<RefreshParams>,
) -> WebResult<Json<SessionResponse>> {
    let ttl = match params.ttl_secs {
        Some(secs) if !ttl_in_range(secs) => {
            return Err(WebError::BadRequest(format!(
                "ttl_secs must lie within ±{}",
                MAX_TTL_SECS
            )));
        }
        Some(secs) => chrono::Duration::seconds(secs),
        None => state.sessions.expires(),
    };
    // The middleware reissues the credential once the deadline moved
    state.sessions.update_expiration_by_id(session.id(), ttl)?;

    Ok(Json(SessionResponse {
        session_id: session.id().to_string(),
        is_new: session.is_new(),
        expires_in: state.sessions.remaining_secs(&session),
        values: session.get_all()?,
    }))
}
