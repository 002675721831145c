//! HTTP basic authentication middleware.
//!
//! Verifies `Authorization: Basic <base64(user:password)>` against the
//! `UserDirectory` and injects `AuthenticatedUser` for downstream handlers.

use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthenticatedUser};

/// Require valid basic-auth credentials.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
pub async fn require_basic_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_basic_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_basic_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let (username, password) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic_credentials)
        .ok_or(ApiError::Unauthorized)?;

    // bcrypt verification blocks for tens of milliseconds.
    let users = ctx.core.users().clone();
    let user = username.clone();
    let verified = tokio::task::spawn_blocking(move || users.verify(&user, &password))
        .await
        .map_err(|e| ApiError::Internal(format!("credential check panicked: {e}")))?;

    if !verified {
        tracing::warn!(user = %username, "Basic auth rejected");
        return Err(ApiError::Unauthorized);
    }
    tracing::debug!(user = %username, "Basic auth verified");

    req.extensions_mut().insert(AuthenticatedUser { username });
    Ok(next.run(req).await)
}

/// Split a `Basic` authorization value into user and password.
pub fn parse_basic_credentials(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}
