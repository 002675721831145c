//! Shared types for the HTTP layer.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::core_state::CoreState;

/// Customer and instance names are used as path components.
static VALID_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]+$").expect("static name pattern is valid")
});

// ═══════════════════════════════════════════════════════════
// API context
// ═══════════════════════════════════════════════════════════

/// Shared context for all routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// Basic-auth user, injected into request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub username: String,
}

// ═══════════════════════════════════════════════════════════
// Target query
// ═══════════════════════════════════════════════════════════

/// `?customer=...&instance=...` of the upload endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetQuery {
    pub customer: Option<String>,
    pub instance: Option<String>,
}

/// A validated customer/instance pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub customer: String,
    pub instance: String,
}

impl TargetQuery {
    pub fn validate(self) -> Result<Target, ApiError> {
        let (Some(customer), Some(instance)) = (self.customer, self.instance) else {
            return Err(ApiError::BadRequest(
                "Please specify customer and instance".into(),
            ));
        };
        if customer.is_empty() || instance.is_empty() {
            return Err(ApiError::BadRequest(
                "Please specify customer and instance".into(),
            ));
        }
        if !is_valid_name(&customer) || !is_valid_name(&instance) {
            return Err(ApiError::BadRequest(
                "Invalid characters in customer or instance name".into(),
            ));
        }
        Ok(Target { customer, instance })
    }
}

pub fn is_valid_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}
