//! Defines the proxy's routes.
//!
//! ## Structure
//! - **Open endpoints**
//!   - `GET /healthz`               liveness check
//!   - `GET /auth/google/login`     start the Google login
//!   - `GET /auth/google/callback`  finish the Google login
//!
//! - **Gated endpoints** (everything else)
//!   - `GET /{alias}/{*key}`  stream `key` from the bucket behind `alias`
//!   - any other path        informational page
//!   - other methods         405
//!
//! The gated part is a nested router installed as the fallback so the
//! session middleware wraps it and nothing else.

use crate::{
    handlers::{
        auth_handlers::{GOOGLE_OAUTH_CALLBACK_PATH, GOOGLE_OAUTH_LOGIN_PATH, callback, login},
        health_handlers::healthz,
        object_handlers::serve_from_buckets,
        session_gate::require_session,
    },
    state::AppState,
};
use axum::{Router, middleware, routing::get};

/// Build the complete application router.
pub fn routes(state: AppState) -> Router {
    let gated = Router::new()
        .fallback(get(serve_from_buckets))
        .layer(middleware::from_fn_with_state(state.clone(), require_session))
        .with_state(state.clone());

    Router::new()
        .route("/healthz", get(healthz))
        .route(GOOGLE_OAUTH_LOGIN_PATH, get(login))
        .route(GOOGLE_OAUTH_CALLBACK_PATH, get(callback))
        .fallback_service(gated)
        .with_state(state)
}
