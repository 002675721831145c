//! HTTP surface of the gateway.
//!
//! `gateway_router()` returns a composable `Router`; `server` binds it and
//! handles graceful shutdown.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::gateway_router;
pub use server::{serve_on, ServerError};
pub use types::ApiContext;
