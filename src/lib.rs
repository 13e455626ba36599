//! Liftlog auth - authentication core for the Liftlog fitness tracker
//!
//! This crate throttles sign-in and registration attempts with fixed-window
//! rate limiters, verifies credentials against a user store, issues signed
//! session tokens and decides, per request, whether a page may be served or
//! the caller must be redirected.

pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod ratelimit;
pub mod session;
