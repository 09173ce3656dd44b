//! Resale marketplace handlers

use axum::{
    extract::{Path, State},
    Json,
};
use stagepass_types::{Amount, CheckoutSession, ListingId, ResaleListing};
use std::sync::Arc;

use crate::dto::{CreateListingRequest, ListingCheckoutRequest, UpdateListingRequest};
use crate::error::ApiResult;
use crate::extractors::Caller;
use crate::state::AppState;

pub async fn create_listing(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Json(req): Json<CreateListingRequest>,
) -> ApiResult<Json<ResaleListing>> {
    let unit_price = Amount::new(req.unit_price, state.settlement_currency());
    let listing = state
        .resale
        .create_listing(&caller, &req.purchase_id, req.quantity, unit_price)
        .await?;
    Ok(Json(listing))
}

/// Buy from a listing. The offered price must match the current listing
/// price exactly; repricing races reject rather than surprise the buyer.
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(listing_id): Path<ListingId>,
    Json(req): Json<ListingCheckoutRequest>,
) -> ApiResult<Json<CheckoutSession>> {
    let offered = Amount::new(req.unit_price, state.settlement_currency());
    let session = state
        .resale
        .checkout(&listing_id, &caller, req.quantity, offered)
        .await?;
    Ok(Json(session))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(listing_id): Path<ListingId>,
    Json(req): Json<UpdateListingRequest>,
) -> ApiResult<Json<ResaleListing>> {
    let new_price = req
        .unit_price
        .map(|minor| Amount::new(minor, state.settlement_currency()));
    let listing = state
        .resale
        .update(&listing_id, &caller, new_price, req.quantity)
        .await?;
    Ok(Json(listing))
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(listing_id): Path<ListingId>,
) -> ApiResult<Json<ResaleListing>> {
    let listing = state.resale.cancel(&listing_id, &caller).await?;
    Ok(Json(listing))
}
