//! Request access logging.
//!
//! Connection details at debug, one summary line per request at info. Every
//! response carries the request id in `X-Request-Id`.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::ConnectInfo;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

pub async fn log_request(req: Request<axum::body::Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    tracing::debug!(%request_id, remote = %remote, "Connection");
    tracing::debug!(%request_id, url = %req.uri(), "URL");
    tracing::debug!(%request_id, method = %method, "Method");

    let started = Instant::now();
    let mut response = next.run(req).await;
    let status = response.status().as_u16();

    tracing::info!(
        %request_id,
        method = %method,
        path = %path,
        status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Request handled"
    );

    if let Ok(val) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, val);
    }
    response
}
