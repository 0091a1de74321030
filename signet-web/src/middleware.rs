//! Session middleware
//!
//! Runs the session manager around every request: resolves or creates the
//! session, exposes it to handlers as a [`CurrentSession`] extension, and copies
//! refreshed credentials onto the response.

use crate::{AppState, CurrentSession, WebError};
use axum::{
    extract::{Request, State},
    http::{header, request::Parts, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use signet_sessions::HttpExchange;
use tracing::debug;

/// Whether the request reached us over TLS, directly or through a proxy
pub fn is_tls(parts: &Parts) -> bool {
    if parts.uri.scheme_str() == Some("https") {
        return true;
    }
    parts
        .headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

/// Start the session of the request.
///
/// Rejected tokens (bad signature, algorithm mismatch, expired) answer 401
/// without reaching the handler. OPTIONS requests pass through untouched unless
/// the manager authenticates them.
pub async fn session_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let sessions = state.sessions.clone();
    if !sessions.should_authenticate(request.method()) {
        debug!("Skipping session for {} {}", request.method(), request.uri());
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let tls = is_tls(&parts);
    let mut exchange =
        HttpExchange::new(parts.method.clone(), std::mem::take(&mut parts.headers)).with_tls(tls);

    let session = match sessions.start_strict(&mut exchange) {
        Ok(session) => session,
        Err(e) => return WebError::from(e).into_response(),
    };

    let (request_headers, outgoing) = exchange.into_headers();
    parts.headers = request_headers;
    parts.extensions.insert(CurrentSession(session.clone()));
    let lifetime = session.lifetime();

    let mut response = next.run(Request::from_parts(parts, body)).await;

    let mut finishing = HttpExchange::new(Method::GET, HeaderMap::new())
        .with_tls(tls)
        .with_response_headers(outgoing);
    if session.is_destroyed() {
        sessions.revoke(&mut finishing);
        // A handler may also have echoed the old credential
        response.headers_mut().remove(header::AUTHORIZATION);
    } else if session.lifetime() != lifetime {
        if let Err(e) = sessions.reissue(&mut finishing, &session) {
            e.log();
        }
    }

    merge_headers(response.headers_mut(), finishing.into_headers().1);
    response
}

/// Copy session headers onto the response. `Set-Cookie` values are appended to
/// the handler's; other session headers replace the handler's value.
fn merge_headers(target: &mut HeaderMap, outgoing: HeaderMap) {
    for name in outgoing.keys() {
        if name != header::SET_COOKIE {
            target.remove(name);
        }
    }
    for (name, value) in outgoing.iter() {
        target.append(name.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_tls_detection() {
        let (parts, _) = Request::builder()
            .uri("https://example.com/")
            .body(())
            .unwrap()
            .into_parts();
        assert!(is_tls(&parts));

        let (parts, _) = Request::builder()
            .uri("/")
            .header("x-forwarded-proto", "HTTPS")
            .body(())
            .unwrap()
            .into_parts();
        assert!(is_tls(&parts));

        let (parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        assert!(!is_tls(&parts));
    }

    #[test]
    fn test_merge_keeps_handler_cookies() {
        let mut target = HeaderMap::new();
        target.append(header::SET_COOKIE, "theme=dark".parse().unwrap());
        target.insert(header::AUTHORIZATION, "Bearer stale".parse().unwrap());

        let mut outgoing = HeaderMap::new();
        outgoing.append(header::SET_COOKIE, "sid=abc; Path=/".parse().unwrap());
        outgoing.insert(header::AUTHORIZATION, "Bearer fresh".parse().unwrap());
        merge_headers(&mut target, outgoing);

        let cookies: Vec<_> = target
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies, vec!["theme=dark", "sid=abc; Path=/"]);
        assert_eq!(target.get(header::AUTHORIZATION).unwrap(), "Bearer fresh");
    }
}
