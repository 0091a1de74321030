//! Route definitions for the demo server

use crate::{handlers, middleware::session_middleware, AppState};
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .nest("/session", session_routes(state))
}

/// Routes that run behind the session middleware
pub fn session_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::get_session).delete(handlers::destroy_session),
        )
        .route("/values", delete(handlers::clear_values))
        .route(
            "/values/{key}",
            get(handlers::get_value)
                .put(handlers::set_value)
                .delete(handlers::delete_value),
        )
        .route("/counter", post(handlers::increment_counter))
        .route(
            "/flash",
            get(handlers::get_flashes).post(handlers::set_flash),
        )
        .route("/token", get(handlers::issue_token))
        .route("/refresh", put(handlers::refresh_session))
        .layer(middleware::from_fn_with_state(state, session_middleware))
}
