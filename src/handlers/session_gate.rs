//! Middleware that guards every proxied request with the session cookie.
//!
//! - valid session, allowed domain -> inner handler
//! - valid session, other domain   -> 403
//! - no usable cookie              -> remember the URI, 307 to the login page

use crate::{
    cookies::SetCookie,
    errors::AppError,
    handlers::{
        auth_handlers::{GOOGLE_OAUTH_LOGIN_PATH, LOGIN_TARGET_COOKIE_NAME, encode_login_target},
        redirect_with_cookies,
    },
    services::session_service::SessionStatus,
    state::AppState,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, info, warn};

pub async fn require_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    match state.sessions.validate(request.headers()) {
        SessionStatus::Valid(domain) => {
            debug!(%domain, "session accepted");
            next.run(request).await
        }
        SessionStatus::Invalid(domain) => {
            warn!(%domain, path = %request.uri().path(), "hosted domain is not allowed");
            AppError::forbidden("Forbidden").into_response()
        }
        SessionStatus::Missing => {
            redirect_to_login(&state, &request).unwrap_or_else(IntoResponse::into_response)
        }
    }
}

fn redirect_to_login(state: &AppState, request: &Request) -> Result<Response, AppError> {
    let origin = state.origin(request.headers(), request.uri());
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    info!(login_target = target, "no session, redirecting to login");

    let target_cookie = SetCookie::new(LOGIN_TARGET_COOKIE_NAME, encode_login_target(target))
        .path("/")
        .http_only()
        .secure(origin.is_secure())
        .same_site_lax();

    redirect_with_cookies(&origin.resolve(GOOGLE_OAUTH_LOGIN_PATH), &[target_cookie])
}
