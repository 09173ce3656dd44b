//! Operator endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use stagepass_core::RefundReport;
use stagepass_types::EventId;
use std::sync::Arc;

use crate::dto::RefundEventRequest;
use crate::error::ApiResult;
use crate::extractors::AdminGate;
use crate::state::AppState;

/// Cancel an event and request refunds for all its eligible purchases.
/// The report is per-purchase; a processor failure on one purchase never
/// aborts the rest of the batch.
pub async fn refund_event(
    State(state): State<Arc<AppState>>,
    _gate: AdminGate,
    Path(event_id): Path<EventId>,
    Json(req): Json<RefundEventRequest>,
) -> ApiResult<Json<RefundReport>> {
    let report = state.refunds.refund_event(&event_id, &req.reason).await?;
    Ok(Json(report))
}
