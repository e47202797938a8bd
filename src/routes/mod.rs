//! Router Module Index
//!
//! Splits the post API by identity mode. Both routers are merged in
//! `crate::create_router`; only the authenticated one carries the
//! authentication `route_layer`.

/// Routes where identity is optional (anonymous callers allowed).
/// Paid-content gating happens inside the handlers.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
/// Requires a resolvable identity; ownership is checked in the handlers.
pub mod authenticated;
