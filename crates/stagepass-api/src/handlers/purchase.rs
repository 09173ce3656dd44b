//! Purchase handlers: checkout, lookups, and door redemption

use axum::{
    extract::{Path, State},
    Json,
};
use stagepass_types::{CheckoutSession, Purchase, PurchaseId, StagepassError};
use std::sync::Arc;

use crate::dto::{CheckoutRequest, RedeemRequest};
use crate::error::ApiResult;
use crate::extractors::{AdminGate, Caller};
use crate::state::AppState;

/// Open a checkout. The response carries the client secret the buyer's app
/// needs to complete payment; the purchase stays pending until the
/// processor's settlement notification arrives.
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Json(req): Json<CheckoutRequest>,
) -> ApiResult<Json<CheckoutSession>> {
    let session = state
        .purchases
        .create_pending_purchase(&caller, &req.ticket_id, req.quantity)
        .await?;
    Ok(Json(session))
}

pub async fn my_purchases(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> ApiResult<Json<Vec<Purchase>>> {
    Ok(Json(state.catalog.purchases_for_buyer(&caller).await))
}

pub async fn get_purchase(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(purchase_id): Path<PurchaseId>,
) -> ApiResult<Json<Purchase>> {
    let purchase = state.catalog.purchase(&purchase_id).await?;
    if purchase.buyer != caller {
        return Err(StagepassError::access_denied("not your purchase").into());
    }
    Ok(Json(purchase))
}

/// Door scan: redeem an active purchase against its token digest
pub async fn redeem(
    State(state): State<Arc<AppState>>,
    _gate: AdminGate,
    Path(purchase_id): Path<PurchaseId>,
    Json(req): Json<RedeemRequest>,
) -> ApiResult<Json<Purchase>> {
    let purchase = state.purchases.redeem(&purchase_id, &req.digest).await?;
    Ok(Json(purchase))
}
