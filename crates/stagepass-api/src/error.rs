//! API error handling
//!
//! Core errors cross the wire with their taxonomy code and a stable HTTP
//! status; transport-level failures (missing identity, bad webhook
//! signature) get their own variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use stagepass_types::StagepassError;
use thiserror::Error;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing or malformed {0} header")]
    MissingIdentity(&'static str),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(#[from] stagepass_processor::SignatureError),

    #[error("Admin key required")]
    AdminRequired,

    #[error(transparent)]
    Core(#[from] StagepassError),
}

impl ApiError {
    /// Stable machine-readable code carried in the response body
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingIdentity(_) => "unauthorized",
            Self::InvalidSignature(_) => "invalid_signature",
            Self::AdminRequired => "access_denied",
            Self::Core(err) => err.code(),
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingIdentity(_) | Self::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            Self::AdminRequired => StatusCode::FORBIDDEN,
            Self::Core(err) => match err.code() {
                "not_found" => StatusCode::NOT_FOUND,
                "access_denied" => StatusCode::FORBIDDEN,
                "insufficient_inventory" | "invalid_state" => StatusCode::CONFLICT,
                "validation_error" => StatusCode::BAD_REQUEST,
                "processor_error" => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

/// JSON error body: `{"code": ..., "message": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = ApiError::from(StagepassError::EventNotFound {
            event_id: "evt_x".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = ApiError::from(StagepassError::InsufficientInventory {
            ticket_id: "tkt_x".to_string(),
            requested: 3,
            available: 1,
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "insufficient_inventory");

        let err = ApiError::from(StagepassError::processor("timeout"));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_transport_errors_are_unauthorized() {
        assert_eq!(
            ApiError::MissingIdentity("x-stagepass-user").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::AdminRequired.status_code(), StatusCode::FORBIDDEN);
    }
}
