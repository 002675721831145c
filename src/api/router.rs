//! Gateway HTTP router.
//!
//! `GET /` is open. `/json/` and `/data/` require basic auth.
//!
//! Middleware stack (outermost → innermost):
//! 1. Access log → 2. Extension(ApiContext) → 3. Basic auth

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::config::MAX_UPLOAD_BYTES;
use crate::core_state::CoreState;

/// Build the gateway router.
///
/// Middleware uses `Extension<ApiContext>`; handlers use `State<ApiContext>`.
pub fn gateway_router(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);

    // route_layer keeps auth off unmatched paths so they 404 instead of 401.
    let protected = Router::new()
        .route("/json", post(endpoints::json::ingest))
        .route("/json/", post(endpoints::json::ingest))
        .route("/data", post(endpoints::data::upload))
        .route("/data/", post(endpoints::data::upload))
        .with_state(ctx.clone())
        .route_layer(axum::middleware::from_fn(middleware::auth::require_basic_auth))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(axum::Extension(ctx));

    Router::new()
        .route("/", get(endpoints::root::banner))
        .merge(protected)
        .layer(axum::middleware::from_fn(middleware::access::log_request))
}
