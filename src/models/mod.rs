//! Core data models for the proxy.
//!
//! Objects as reported by the backing store, the session carried in the
//! signed cookie, and the alias table used for routing.

pub mod alias;
pub mod object;
pub mod session;
