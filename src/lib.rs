//! gcs-proxy: a Google-login gated reverse proxy for object buckets.
//!
//! Requests pass through a signed-cookie session gate, then are mapped by
//! path alias onto a bucket and streamed back from an [`ObjectStore`].
//!
//! [`ObjectStore`]: services::object_store::ObjectStore

pub mod config;
pub mod cookies;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod origin;
pub mod routes;
pub mod services;
pub mod state;
