//! HTTP endpoint handlers.

pub mod data;
pub mod json;
pub mod root;

use std::future::Future;

use crate::api::error::ApiError;

/// Run `work` on its own task and wait for it.
///
/// A client that disconnects drops only the wait; the render and sync session
/// (and the customer lock it holds) runs to completion or to its tool timeout.
pub(crate) async fn run_detached<T, E, F>(work: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::spawn(work).await?.map_err(Into::into)
}
