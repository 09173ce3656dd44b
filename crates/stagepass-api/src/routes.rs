//! API routes

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::state::AppState;

/// Create API v1 routes
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Directory
        .route("/users", post(handlers::catalog::register_user))
        // Catalog
        .route("/events", post(handlers::catalog::create_event))
        .route("/events/:event_id", get(handlers::catalog::get_event))
        .route(
            "/events/:event_id/tickets",
            post(handlers::catalog::mint_ticket).get(handlers::catalog::list_tickets),
        )
        // Operator surface
        .route("/events/:event_id/refund", post(handlers::admin::refund_event))
        // Purchases
        .route("/purchases/checkout", post(handlers::purchase::checkout))
        .route("/purchases", get(handlers::purchase::my_purchases))
        .route("/purchases/:purchase_id", get(handlers::purchase::get_purchase))
        .route("/purchases/:purchase_id/redeem", post(handlers::purchase::redeem))
        .route("/purchases/:purchase_id/transfer", post(handlers::transfer::transfer))
        // Resale marketplace
        .route(
            "/listings",
            post(handlers::resale::create_listing).get(handlers::catalog::open_listings),
        )
        .route(
            "/listings/:listing_id",
            put(handlers::resale::update).delete(handlers::resale::cancel),
        )
        .route("/listings/:listing_id/checkout", post(handlers::resale::checkout))
        // Inbound processor notifications
        .route("/webhooks/processor", post(handlers::webhook::processor_webhook))
}
