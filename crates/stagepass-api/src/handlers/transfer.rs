//! Ownership transfer handler

use axum::{
    extract::{Path, State},
    Json,
};
use stagepass_types::{PurchaseId, Transfer, TransferMode};
use std::sync::Arc;

use crate::dto::TransferRequest;
use crate::error::ApiResult;
use crate::extractors::Caller;
use crate::state::AppState;

pub async fn transfer(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(purchase_id): Path<PurchaseId>,
    Json(req): Json<TransferRequest>,
) -> ApiResult<Json<Transfer>> {
    let mode = match req.quantity {
        Some(n) => TransferMode::Quantity(n),
        None => TransferMode::All,
    };
    let record = state
        .transfers
        .transfer(&caller, &purchase_id, &req.receiver, mode)
        .await?;
    Ok(Json(record))
}
