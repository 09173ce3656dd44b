//! Catalog administration and read paths
//!
//! Users, events, and ticket minting, plus the read-only views the API
//! serves. Minting is where the event-capacity invariant is enforced:
//! the sum of all minted quantities never exceeds the event's capacity.

use stagepass_types::{
    Amount, Event, EventId, EventStatus, EventVisibility, ListingStatus, Purchase, ResaleListing,
    Result, StagepassError, Ticket, TicketId, User, UserId,
};
use chrono::Utc;
use tracing::info;

use crate::store::Store;

/// Parameters for creating an event
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,
    pub creator: UserId,
    pub co_hosts: Vec<UserId>,
    pub invited: Vec<UserId>,
    pub visibility: EventVisibility,
    pub capacity: u32,
}

/// Admin and read surface over the catalog
#[derive(Clone)]
pub struct Catalog {
    store: Store,
}

impl Catalog {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Register a user in the directory that access checks run against
    pub async fn register_user(&self, name: &str) -> Result<User> {
        if name.trim().is_empty() {
            return Err(StagepassError::validation("name", "must not be empty"));
        }
        let user = User::new(name.trim());
        let mut state = self.store.write().await;
        state.users.insert(user.id.clone(), user.clone());
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn create_event(&self, new_event: NewEvent) -> Result<Event> {
        if new_event.name.trim().is_empty() {
            return Err(StagepassError::validation("name", "must not be empty"));
        }
        if new_event.capacity == 0 {
            return Err(StagepassError::validation("capacity", "must be at least 1"));
        }

        let mut state = self.store.write().await;
        state.user(&new_event.creator)?;

        let event = Event {
            id: EventId::new(),
            name: new_event.name.trim().to_string(),
            creator: new_event.creator,
            co_hosts: new_event.co_hosts,
            invited: new_event.invited,
            visibility: new_event.visibility,
            capacity: new_event.capacity,
            status: EventStatus::Published,
            created_at: Utc::now(),
        };
        state.events.insert(event.id.clone(), event.clone());
        info!(event_id = %event.id, capacity = event.capacity, "event created");
        Ok(event)
    }

    /// Mint a ticket category; total minted units across the event must stay
    /// within its capacity
    pub async fn mint_ticket(
        &self,
        event_id: &EventId,
        name: &str,
        quantity: u32,
        price: Amount,
        resellable: bool,
    ) -> Result<Ticket> {
        if name.trim().is_empty() {
            return Err(StagepassError::validation("name", "must not be empty"));
        }
        if quantity == 0 {
            return Err(StagepassError::validation("quantity", "must be at least 1"));
        }
        if price.minor < 0 {
            return Err(StagepassError::validation("price", "must not be negative"));
        }

        let mut state = self.store.write().await;
        let event = state.event(event_id)?;
        if event.is_cancelled() {
            return Err(StagepassError::EventCancelled {
                event_id: event_id.to_string(),
            });
        }

        let minted = state.minted_for_event(event_id);
        let capacity = event.capacity;
        if minted + quantity > capacity {
            return Err(StagepassError::validation(
                "quantity",
                format!(
                    "minting {quantity} would exceed event capacity ({minted} of {capacity} already minted)"
                ),
            ));
        }

        let ticket = Ticket::mint(event_id.clone(), name.trim(), quantity, price, resellable);
        state.tickets.insert(ticket.id.clone(), ticket.clone());
        info!(ticket_id = %ticket.id, %event_id, quantity, "ticket category minted");
        Ok(ticket)
    }

    // ------------------------------------------------------------------
    // Read paths
    // ------------------------------------------------------------------

    pub async fn event(&self, event_id: &EventId) -> Result<Event> {
        Ok(self.store.read().await.event(event_id)?.clone())
    }

    pub async fn ticket(&self, ticket_id: &TicketId) -> Result<Ticket> {
        Ok(self.store.read().await.ticket(ticket_id)?.clone())
    }

    /// Ticket availability for an event, hidden entirely for private events
    /// the caller cannot see
    pub async fn tickets_for_event(
        &self,
        event_id: &EventId,
        caller: &UserId,
    ) -> Result<Vec<Ticket>> {
        let state = self.store.read().await;
        let event = state.event(event_id)?;
        if !event.is_visible_to(caller) {
            return Err(StagepassError::access_denied(
                "event is private and you are not invited",
            ));
        }
        Ok(state
            .tickets
            .values()
            .filter(|t| &t.event_id == event_id)
            .cloned()
            .collect())
    }

    pub async fn purchase(&self, purchase_id: &stagepass_types::PurchaseId) -> Result<Purchase> {
        Ok(self.store.read().await.purchase(purchase_id)?.clone())
    }

    pub async fn listing(
        &self,
        listing_id: &stagepass_types::ListingId,
    ) -> Result<ResaleListing> {
        Ok(self.store.read().await.listing(listing_id)?.clone())
    }

    pub async fn transaction(
        &self,
        transaction_id: &stagepass_types::TransactionId,
    ) -> Result<stagepass_types::Transaction> {
        let state = self.store.read().await;
        state
            .transactions
            .get(transaction_id)
            .cloned()
            .ok_or_else(|| StagepassError::Internal {
                message: format!("transaction {transaction_id} not found"),
            })
    }

    pub async fn purchases_for_buyer(&self, buyer: &UserId) -> Vec<Purchase> {
        let state = self.store.read().await;
        state
            .purchases
            .values()
            .filter(|p| &p.buyer == buyer)
            .cloned()
            .collect()
    }

    /// Open resale listings, optionally narrowed to one event
    pub async fn open_listings(&self, event_id: Option<&EventId>) -> Vec<ResaleListing> {
        let state = self.store.read().await;
        state
            .listings
            .values()
            .filter(|l| l.status == ListingStatus::Available)
            .filter(|l| event_id.map_or(true, |e| &l.event_id == e))
            .cloned()
            .collect()
    }
}
