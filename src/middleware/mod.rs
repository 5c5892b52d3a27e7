//! Middleware module
//!
//! Contains the Tower middleware that authenticates gateway callers.

pub mod auth;
