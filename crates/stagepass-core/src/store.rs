//! The shared state store
//!
//! All mutable ticketing state lives behind one `tokio::sync::RwLock`; a held
//! write guard is the atomic transaction. Operations that mutate more than
//! one of {Ticket, Purchase, ResaleListing, Transaction} do so inside a
//! single write-guard scope, so partial application cannot be observed.
//!
//! Nothing here calls the payment processor; engines validate under a guard,
//! drop it, perform their I/O, then re-acquire and re-validate.

use stagepass_types::{
    Event, EventId, ListingId, Purchase, PurchaseId, ResaleListing, Result, StagepassError,
    Ticket, TicketId, Transaction, TransactionId, Transfer, TransferId, User, UserId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Every collection the engines operate on
#[derive(Debug, Default)]
pub struct State {
    pub(crate) users: HashMap<UserId, User>,
    pub(crate) events: HashMap<EventId, Event>,
    pub(crate) tickets: HashMap<TicketId, Ticket>,
    pub(crate) purchases: HashMap<PurchaseId, Purchase>,
    pub(crate) listings: HashMap<ListingId, ResaleListing>,
    pub(crate) transfers: HashMap<TransferId, Transfer>,
    pub(crate) transactions: HashMap<TransactionId, Transaction>,
    /// payment_intent_id -> transaction; settlement lookups key on this
    pub(crate) intent_index: HashMap<String, TransactionId>,
}

impl State {
    pub(crate) fn user(&self, id: &UserId) -> Result<&User> {
        self.users.get(id).ok_or_else(|| StagepassError::UserNotFound {
            user_id: id.to_string(),
        })
    }

    pub(crate) fn event(&self, id: &EventId) -> Result<&Event> {
        self.events.get(id).ok_or_else(|| StagepassError::EventNotFound {
            event_id: id.to_string(),
        })
    }

    pub(crate) fn event_mut(&mut self, id: &EventId) -> Result<&mut Event> {
        self.events.get_mut(id).ok_or_else(|| StagepassError::EventNotFound {
            event_id: id.to_string(),
        })
    }

    pub(crate) fn ticket(&self, id: &TicketId) -> Result<&Ticket> {
        self.tickets.get(id).ok_or_else(|| StagepassError::TicketNotFound {
            ticket_id: id.to_string(),
        })
    }

    pub(crate) fn ticket_mut(&mut self, id: &TicketId) -> Result<&mut Ticket> {
        self.tickets.get_mut(id).ok_or_else(|| StagepassError::TicketNotFound {
            ticket_id: id.to_string(),
        })
    }

    pub(crate) fn purchase(&self, id: &PurchaseId) -> Result<&Purchase> {
        self.purchases.get(id).ok_or_else(|| StagepassError::PurchaseNotFound {
            purchase_id: id.to_string(),
        })
    }

    pub(crate) fn purchase_mut(&mut self, id: &PurchaseId) -> Result<&mut Purchase> {
        self.purchases.get_mut(id).ok_or_else(|| StagepassError::PurchaseNotFound {
            purchase_id: id.to_string(),
        })
    }

    pub(crate) fn listing(&self, id: &ListingId) -> Result<&ResaleListing> {
        self.listings.get(id).ok_or_else(|| StagepassError::ListingNotFound {
            listing_id: id.to_string(),
        })
    }

    pub(crate) fn listing_mut(&mut self, id: &ListingId) -> Result<&mut ResaleListing> {
        self.listings.get_mut(id).ok_or_else(|| StagepassError::ListingNotFound {
            listing_id: id.to_string(),
        })
    }

    /// Settlement entry point: resolve a transaction from the processor's
    /// payment-intent reference. A miss here is a reconciliation alert.
    pub(crate) fn transaction_by_intent(&self, payment_intent_id: &str) -> Result<&Transaction> {
        self.intent_index
            .get(payment_intent_id)
            .and_then(|id| self.transactions.get(id))
            .ok_or_else(|| StagepassError::TransactionNotFound {
                payment_intent_id: payment_intent_id.to_string(),
            })
    }

    pub(crate) fn transaction_mut(&mut self, id: &TransactionId) -> Result<&mut Transaction> {
        self.transactions.get_mut(id).ok_or_else(|| StagepassError::Internal {
            message: format!("transaction {id} vanished from the store"),
        })
    }

    /// Record a transaction and index its payment intent
    pub(crate) fn insert_transaction(&mut self, transaction: Transaction) {
        self.intent_index
            .insert(transaction.payment_intent_id.clone(), transaction.id.clone());
        self.transactions.insert(transaction.id.clone(), transaction);
    }

    /// The purchase funded by a given transaction, if any
    pub(crate) fn purchase_by_transaction(&self, transaction_id: &TransactionId) -> Option<&Purchase> {
        self.purchases
            .values()
            .find(|p| p.transaction_id.as_ref() == Some(transaction_id))
    }

    /// Sum of minted units across an event's ticket categories
    pub(crate) fn minted_for_event(&self, event_id: &EventId) -> u32 {
        self.tickets
            .values()
            .filter(|t| &t.event_id == event_id)
            .map(|t| t.quantity())
            .sum()
    }
}

/// Handle to the shared state; cheap to clone, engines each hold one
#[derive(Clone, Default)]
pub struct Store {
    state: Arc<RwLock<State>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a read guard; no mutation allowed
    pub async fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().await
    }

    /// Acquire a write guard; its scope is the atomic transaction
    pub async fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().await
    }
}
