//! Database entity models.
//!
//! Two tables back the crate: `sessions`, which holds both session records and
//! single-use CSRF tokens keyed by token digest, and `users`, which holds the
//! credentials a session can be bound to.

/// Session entity model, keyed by token digest.
pub mod session;

/// User entity model holding login credentials.
pub mod user;
