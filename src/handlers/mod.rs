//! HTTP handlers: the session gate, the OAuth endpoints, the bucket proxy
//! and the liveness check.

pub mod auth_handlers;
pub mod health_handlers;
pub mod object_handlers;
pub mod session_gate;

use crate::{cookies::SetCookie, errors::AppError};
use axum::{
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};

/// 307 to `location`, appending one `Set-Cookie` per cookie.
pub(crate) fn redirect_with_cookies(
    location: &str,
    cookies: &[SetCookie],
) -> Result<Response, AppError> {
    let values = cookies
        .iter()
        .map(|cookie| {
            cookie
                .to_header_value()
                .map(|value| (SET_COOKIE, value))
                .map_err(|_| AppError::internal("Internal server error"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((AppendHeaders(values), Redirect::temporary(location)).into_response())
}
