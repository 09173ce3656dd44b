//! Processor webhook endpoint
//!
//! The signature is verified against the raw body before anything is
//! parsed. Duplicate and ignored deliveries are acknowledged with 200 so
//! the processor stops retrying; reconciliation failures surface as error
//! statuses and stay in the logs.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use stagepass_core::SettlementDisposition;
use stagepass_processor::ProcessorEvent;
use std::sync::Arc;
use tracing::warn;

use crate::dto::WebhookAck;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-processor-signature";

pub async fn processor_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::MissingIdentity(SIGNATURE_HEADER))?;

    if let Err(e) = state.verifier.verify(&body, header) {
        warn!(error = %e, "webhook signature rejected");
        return Err(e.into());
    }

    let event = ProcessorEvent::parse(&body)?;
    let disposition = state.settlement.apply(&event).await?;

    Ok(Json(WebhookAck {
        received: true,
        disposition: match disposition {
            SettlementDisposition::Applied => "applied",
            SettlementDisposition::Duplicate => "duplicate",
            SettlementDisposition::Ignored => "ignored",
        }
        .to_string(),
    }))
}
