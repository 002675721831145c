//! `POST /data/?customer=C&instance=I`: raw instance data.
//!
//! The body is stored verbatim as the instance's server file, then the
//! customer's workspace is synced.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Extension;

use crate::api::endpoints::run_detached;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthenticatedUser, TargetQuery};
use crate::store;

pub const SAVED_MESSAGE: &str = "Data saved\n";
pub const SYNCED_MESSAGE: &str = "Data synced with Perforce\n";

pub async fn upload(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<TargetQuery>,
    body: Bytes,
) -> Result<String, ApiError> {
    let target = query.validate()?;
    tracing::debug!(
        user = %user.username,
        customer = %target.customer,
        instance = %target.instance,
        bytes = body.len(),
        "Received raw data"
    );

    let core = Arc::clone(&ctx.core);
    let guard = core.locks().acquire(&target.customer).await;
    run_detached(async move {
        let _guard = guard;
        let data_dir = core.data_dir().to_path_buf();
        let (customer, instance) = (target.customer.clone(), target.instance.clone());
        tokio::task::spawn_blocking(move || store::save_data(&data_dir, &customer, &instance, &body))
            .await??;
        core.agent()
            .sync(&target.customer, &target.instance, core.data_dir())
            .await?;
        Ok::<_, ApiError>(())
    })
    .await?;

    Ok(format!("{SAVED_MESSAGE}{SYNCED_MESSAGE}"))
}
