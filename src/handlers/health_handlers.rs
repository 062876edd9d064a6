//! Liveness endpoint for load balancers and orchestrators.
//!
//! Mounted beside the OAuth routes, outside the session gate, so health checks
//! need no cookie.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

#[derive(Serialize)]
struct Liveness {
    status: &'static str,
}

/// `GET /healthz`: answers `{"status":"ok"}` while the process is serving.
/// Never reaches a bucket or the identity provider, so an outage there
/// does not take the proxy out of rotation.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(Liveness { status: "ok" }))
}
