//! Services behind the HTTP handlers: object storage, session cookies and
//! the OAuth provider client.

pub mod filesystem_store;
pub mod gcs_store;
pub mod oauth_service;
pub mod object_store;
pub mod session_service;
