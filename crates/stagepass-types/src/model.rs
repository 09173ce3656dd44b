//! Domain model for StagePass ticketing
//!
//! Events own their ticket categories; purchases are buyer claims on ticket
//! units; listings, transfers, and transactions reference purchases without
//! owning them. Inventory counters are private fields mutated only through
//! the compare-and-update methods here.

use crate::error::{Result, StagepassError};
use crate::id::{EventId, ListingId, PurchaseId, TicketId, TransactionId, TransferId, UserId};
use crate::money::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Users
// ============================================================================

/// A platform user, as much of one as ticketing needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Who can see and buy into an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventVisibility {
    Public,
    Private,
}

/// Event lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Published,
    Cancelled,
}

/// An event with a fixed venue capacity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub creator: UserId,
    pub co_hosts: Vec<UserId>,
    pub invited: Vec<UserId>,
    pub visibility: EventVisibility,
    /// Upper bound on the sum of all ticket-category mints
    pub capacity: u32,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Whether a user may see (and buy into) this event
    pub fn is_visible_to(&self, user: &UserId) -> bool {
        match self.visibility {
            EventVisibility::Public => true,
            EventVisibility::Private => {
                self.creator == *user
                    || self.co_hosts.contains(user)
                    || self.invited.contains(user)
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == EventStatus::Cancelled
    }
}

// ============================================================================
// Tickets
// ============================================================================

/// A sellable ticket category within an event
///
/// `quantity` and `available` are private: the only way to move inventory is
/// through [`Ticket::debit`] and [`Ticket::release`], which keep
/// `0 <= available <= quantity` by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub event_id: EventId,
    pub name: String,
    quantity: u32,
    available: u32,
    pub price: Amount,
    pub resellable: bool,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Mint a new ticket category; everything starts available
    pub fn mint(
        event_id: EventId,
        name: impl Into<String>,
        quantity: u32,
        price: Amount,
        resellable: bool,
    ) -> Self {
        Self {
            id: TicketId::new(),
            event_id,
            name: name.into(),
            quantity,
            available: quantity,
            price,
            resellable,
            created_at: Utc::now(),
        }
    }

    /// Total units minted
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Units still unsold
    pub fn available(&self) -> u32 {
        self.available
    }

    /// Units sold so far
    pub fn sold(&self) -> u32 {
        self.quantity - self.available
    }

    /// Compare-and-decrement `available`; never goes negative
    pub fn debit(&mut self, units: u32) -> Result<()> {
        if units > self.available {
            return Err(StagepassError::InsufficientInventory {
                ticket_id: self.id.to_string(),
                requested: units,
                available: self.available,
            });
        }
        self.available -= units;
        Ok(())
    }

    /// Credit units back, capped at the original mint; returns what was credited
    pub fn release(&mut self, units: u32) -> u32 {
        let credited = units.min(self.quantity - self.available);
        self.available += credited;
        credited
    }
}

// ============================================================================
// Purchases
// ============================================================================

/// Purchase lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// Checkout opened, settlement not yet confirmed
    Pending,
    /// Settlement confirmed; the claim is real
    Active,
    /// Redeemed at the door
    Used,
    /// Fully handed to another user; quantity is 0
    Transferred,
    /// Money returned
    Refunded,
    /// Payment failed, was cancelled, or checkout expired
    Disabled,
}

impl PurchaseStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// States from which a refund may be requested
    pub fn is_refundable(&self) -> bool {
        matches!(self, Self::Active | Self::Used)
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Used => "used",
            Self::Transferred => "transferred",
            Self::Refunded => "refunded",
            Self::Disabled => "disabled",
        };
        write!(f, "{s}")
    }
}

/// How a purchase came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Bought directly from the event's inventory
    Standard,
    /// Bought from another user's resale listing
    Resale,
    /// Received through a transfer, no payment involved
    Transfer,
}

/// Opaque QR payload proving ownership at the door
///
/// The digest binds buyer, ticket, event, issue time, and a random nonce, so
/// the token cannot be forged from public fields or replayed onto another
/// purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionToken {
    pub buyer: UserId,
    pub ticket_id: TicketId,
    pub event_id: EventId,
    pub issued_at: DateTime<Utc>,
    /// Hex-encoded 128-bit random nonce
    pub nonce: String,
    /// Hex-encoded SHA-256 over the fields above
    pub digest: String,
}

/// A buyer's claim on some quantity of a ticket category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub ticket_id: TicketId,
    pub event_id: EventId,
    pub buyer: UserId,
    /// Current remaining allotment; only ever decreases
    pub quantity: u32,
    pub unit_price: Amount,
    pub total_price: Amount,
    pub provenance: Provenance,
    pub status: PurchaseStatus,
    /// Present exactly when the purchase has been active at some point
    pub token: Option<RedemptionToken>,
    /// Funding transaction; absent for transfer provenance
    pub transaction_id: Option<TransactionId>,
    /// Refund request annotation; status stays untouched until refund settles
    pub refund: Option<RefundRequest>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Purchase {
    /// A pending claim awaiting settlement
    pub fn pending(
        ticket_id: TicketId,
        event_id: EventId,
        buyer: UserId,
        quantity: u32,
        unit_price: Amount,
        total_price: Amount,
        transaction_id: TransactionId,
    ) -> Self {
        Self {
            id: PurchaseId::new(),
            ticket_id,
            event_id,
            buyer,
            quantity,
            unit_price,
            total_price,
            provenance: Provenance::Standard,
            status: PurchaseStatus::Pending,
            token: None,
            transaction_id: Some(transaction_id),
            refund: None,
            created_at: Utc::now(),
            settled_at: None,
        }
    }

    /// An immediately-active claim created by resale settlement or transfer
    pub fn settled(
        ticket_id: TicketId,
        event_id: EventId,
        buyer: UserId,
        quantity: u32,
        unit_price: Amount,
        total_price: Amount,
        provenance: Provenance,
        token: RedemptionToken,
        transaction_id: Option<TransactionId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PurchaseId::new(),
            ticket_id,
            event_id,
            buyer,
            quantity,
            unit_price,
            total_price,
            provenance,
            status: PurchaseStatus::Active,
            token: Some(token),
            transaction_id,
            refund: None,
            created_at: now,
            settled_at: Some(now),
        }
    }
}

// ============================================================================
// Resale listings
// ============================================================================

/// Resale listing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Available,
    Sold,
    Cancelled,
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Available => "available",
            Self::Sold => "sold",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// One confirmed partial sale of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResaleSale {
    pub buyer: UserId,
    pub purchase_id: PurchaseId,
    pub quantity: u32,
    pub sold_at: DateTime<Utc>,
}

/// An offer to sell part or all of a settled purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResaleListing {
    pub id: ListingId,
    pub purchase_id: PurchaseId,
    pub seller: UserId,
    pub ticket_id: TicketId,
    pub event_id: EventId,
    /// Units offered when the listing was created (or last updated)
    pub quantity: u32,
    /// Units still unsold; monotonically non-increasing
    pub available_quantity: u32,
    pub unit_price: Amount,
    pub status: ListingStatus,
    /// One entry per confirmed partial sale
    pub sales: Vec<ResaleSale>,
    pub created_at: DateTime<Utc>,
}

impl ResaleListing {
    pub fn new(purchase: &Purchase, quantity: u32, unit_price: Amount) -> Self {
        Self {
            id: ListingId::new(),
            purchase_id: purchase.id.clone(),
            seller: purchase.buyer.clone(),
            ticket_id: purchase.ticket_id.clone(),
            event_id: purchase.event_id.clone(),
            quantity,
            available_quantity: quantity,
            unit_price,
            status: ListingStatus::Available,
            sales: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn units_sold(&self) -> u32 {
        self.quantity - self.available_quantity
    }

    /// Record a confirmed sale: decrement availability, append the pair,
    /// flip to `sold` when nothing remains
    pub fn record_sale(&mut self, buyer: UserId, purchase_id: PurchaseId, quantity: u32) {
        self.available_quantity -= quantity;
        self.sales.push(ResaleSale {
            buyer,
            purchase_id,
            quantity,
            sold_at: Utc::now(),
        });
        if self.available_quantity == 0 {
            self.status = ListingStatus::Sold;
        }
    }
}

// ============================================================================
// Transfers
// ============================================================================

/// Transfer lifecycle status
///
/// Current flows complete immediately; the pending/accepted/rejected states
/// are reserved for an accept-reject handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

/// How much of a purchase to hand over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// Everything the sender still holds
    All,
    /// An explicit unit count
    Quantity(u32),
}

/// Ledger entry for a completed ownership move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub purchase_id: PurchaseId,
    pub sender: UserId,
    pub receiver: UserId,
    pub mode: TransferMode,
    /// Units actually moved
    pub quantity: u32,
    pub new_purchase_id: PurchaseId,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Transactions
// ============================================================================

/// Payment record status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Refunded,
    Cancelled,
}

impl TransactionStatus {
    /// Whether a settlement notification has already been applied
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// What a transaction funds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionReference {
    /// A direct ticket purchase
    TicketPurchase { purchase_id: PurchaseId },
    /// A resale order; the buyer's purchase is created at settlement.
    /// `unit_price` is the price the buyer was charged at checkout; a
    /// listing repriced after the fact must not change what settles.
    ResaleOrder {
        listing_id: ListingId,
        buyer: UserId,
        quantity: u32,
        unit_price: Amount,
    },
    /// A platform subscription (settled here, managed elsewhere)
    Subscription { subscription_id: String },
    /// A promotion payment (settled here, managed elsewhere)
    Promotion { promotion_id: String },
}

/// A recorded refund request, awaiting the processor's confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub amount: Amount,
    pub reason: String,
    /// Processor-side refund identifier, when the request succeeded
    pub processor_refund_id: Option<String>,
    pub requested_at: DateTime<Utc>,
}

/// The join point between settlement notifications and domain objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user: UserId,
    pub amount: Amount,
    pub status: TransactionStatus,
    /// The processor's payment-intent identifier; settlement lookups key on this
    pub payment_intent_id: String,
    pub reference: TransactionReference,
    /// Processor fee, learned from the settlement event when it carries one
    pub processor_fee: Option<Amount>,
    pub refund: Option<RefundRequest>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// A pending payment record awaiting settlement
    pub fn pending(
        user: UserId,
        amount: Amount,
        payment_intent_id: impl Into<String>,
        reference: TransactionReference,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            user,
            amount,
            status: TransactionStatus::Pending,
            payment_intent_id: payment_intent_id.into(),
            reference,
            processor_fee: None,
            refund: None,
            created_at: Utc::now(),
            settled_at: None,
        }
    }
}

// ============================================================================
// Checkout sessions
// ============================================================================

/// What the buyer gets back from opening a checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// The pending purchase, for direct ticket checkouts
    pub purchase_id: Option<PurchaseId>,
    /// The listing being bought from, for resale checkouts
    pub listing_id: Option<ListingId>,
    pub transaction_id: TransactionId,
    pub payment_intent_id: String,
    /// Client-side completion handle from the processor
    pub client_secret: String,
    pub amount: Amount,
}
