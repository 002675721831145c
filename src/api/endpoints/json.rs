//! `POST /json/?customer=C&instance=I`: structured monitoring batch.
//!
//! The body is a JSON array of records. It is classified against the taxonomy,
//! rendered into the customer's report tree and synced, all under the
//! customer's lock.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde_json::Value;

use crate::api::endpoints::run_detached;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthenticatedUser, TargetQuery};
use crate::pipeline::{run_pipeline, PipelineReport};

pub async fn ingest(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<TargetQuery>,
    body: Bytes,
) -> Result<Json<PipelineReport>, ApiError> {
    let target = query.validate()?;
    let batch = decode_batch(&body)?;
    tracing::info!(
        user = %user.username,
        customer = %target.customer,
        instance = %target.instance,
        records = batch.len(),
        "Received JSON batch"
    );

    let core = Arc::clone(&ctx.core);
    let guard = core.locks().acquire(&target.customer).await;
    let report = run_detached(async move {
        run_pipeline(
            &guard,
            batch,
            &target.customer,
            &target.instance,
            core.taxonomy(),
            core.data_dir(),
            core.agent(),
        )
        .await
    })
    .await?;

    Ok(Json(report))
}

fn decode_batch(body: &[u8]) -> Result<Vec<Value>, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(error = %e, "Error decoding JSON batch");
        ApiError::BadRequest(format!("Error decoding JSON: {e}"))
    })
}
