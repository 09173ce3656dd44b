//! Custom Axum extractors
//!
//! Caller identity comes from the `x-stagepass-user` header (the upstream
//! gateway authenticates; this service only needs to know who is asking).
//! Admin operations additionally require `x-stagepass-admin-key`.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use stagepass_types::UserId;
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

pub const USER_HEADER: &str = "x-stagepass-user";
pub const ADMIN_KEY_HEADER: &str = "x-stagepass-admin-key";

/// The authenticated user a request acts as
#[derive(Debug, Clone)]
pub struct Caller(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| UserId::parse(s).ok())
            .map(Caller)
            .ok_or(ApiError::MissingIdentity(USER_HEADER))
    }
}

/// Gate for operator-only endpoints
#[derive(Debug, Clone, Copy)]
pub struct AdminGate;

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminGate {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if state.is_admin_key(presented) {
            Ok(AdminGate)
        } else {
            Err(ApiError::AdminRequired)
        }
    }
}
