//! Router Module Index
//!
//! Routes are split by access level; the admin gate is applied to the whole
//! admin router in `create_router`, never per handler.

/// Routes accessible to every client.
pub mod public;

/// Game management routes, guarded by the admin bearer token.
pub mod admin;
