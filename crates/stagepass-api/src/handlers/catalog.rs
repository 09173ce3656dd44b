//! Catalog handlers: users, events, ticket minting, and public reads

use axum::{
    extract::{Path, Query, State},
    Json,
};
use stagepass_core::NewEvent;
use stagepass_types::{Amount, Event, EventId, ResaleListing, StagepassError, Ticket, User};
use std::sync::Arc;

use crate::dto::{CreateEventRequest, ListingsQuery, MintTicketRequest, RegisterUserRequest};
use crate::error::ApiResult;
use crate::extractors::Caller;
use crate::state::AppState;

pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterUserRequest>,
) -> ApiResult<Json<User>> {
    let user = state.catalog.register_user(&req.name).await?;
    Ok(Json(user))
}

pub async fn create_event(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Json(req): Json<CreateEventRequest>,
) -> ApiResult<Json<Event>> {
    let event = state
        .catalog
        .create_event(NewEvent {
            name: req.name,
            creator: caller,
            co_hosts: req.co_hosts,
            invited: req.invited,
            visibility: req.visibility,
            capacity: req.capacity,
        })
        .await?;
    Ok(Json(event))
}

pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<EventId>,
) -> ApiResult<Json<Event>> {
    Ok(Json(state.catalog.event(&event_id).await?))
}

pub async fn mint_ticket(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(event_id): Path<EventId>,
    Json(req): Json<MintTicketRequest>,
) -> ApiResult<Json<Ticket>> {
    let event = state.catalog.event(&event_id).await?;
    if event.creator != caller && !event.co_hosts.contains(&caller) {
        return Err(StagepassError::access_denied("only event hosts may mint tickets").into());
    }

    let price = Amount::new(req.price, state.settlement_currency());
    let ticket = state
        .catalog
        .mint_ticket(&event_id, &req.name, req.quantity, price, req.resellable)
        .await?;
    Ok(Json(ticket))
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(event_id): Path<EventId>,
) -> ApiResult<Json<Vec<Ticket>>> {
    Ok(Json(state.catalog.tickets_for_event(&event_id, &caller).await?))
}

pub async fn open_listings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListingsQuery>,
) -> ApiResult<Json<Vec<ResaleListing>>> {
    Ok(Json(state.catalog.open_listings(query.event_id.as_ref()).await))
}
