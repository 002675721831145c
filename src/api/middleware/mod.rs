//! HTTP middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Access log — every request, including 404s and auth failures
//! 2. Basic auth — upload routes only

pub mod access;
pub mod auth;
