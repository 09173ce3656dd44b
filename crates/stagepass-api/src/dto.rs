//! Request and response shapes
//!
//! Domain types serialize directly where they are safe to expose; only
//! inbound request bodies need dedicated shapes. Prices arrive as integral
//! minor units; the server's configured currency applies.

use serde::{Deserialize, Serialize};
use stagepass_types::{EventVisibility, PurchaseId, TicketId, UserId};

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    #[serde(default)]
    pub co_hosts: Vec<UserId>,
    #[serde(default)]
    pub invited: Vec<UserId>,
    pub visibility: EventVisibility,
    pub capacity: u32,
}

#[derive(Debug, Deserialize)]
pub struct MintTicketRequest {
    pub name: String,
    pub quantity: u32,
    /// Unit price in minor currency units
    pub price: i64,
    pub resellable: bool,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub ticket_id: TicketId,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub purchase_id: PurchaseId,
    pub quantity: u32,
    /// Asking price per unit in minor currency units
    pub unit_price: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListingCheckoutRequest {
    pub quantity: u32,
    /// The price the buyer saw; a mismatch with the current listing price
    /// rejects the checkout
    pub unit_price: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateListingRequest {
    pub unit_price: Option<i64>,
    pub quantity: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub receiver: UserId,
    /// Omit to transfer everything still held
    pub quantity: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    /// The digest presented at the door, scanned from the buyer's token
    pub digest: String,
}

#[derive(Debug, Deserialize)]
pub struct RefundEventRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ListingsQuery {
    pub event_id: Option<stagepass_types::EventId>,
}

/// Acknowledgement returned to the processor for every verified delivery
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
    pub disposition: String,
}
