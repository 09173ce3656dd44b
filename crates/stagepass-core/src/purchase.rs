//! Purchase lifecycle engine
//!
//! Opens checkouts (pending purchase + pending transaction + processor
//! intent), redeems active purchases at the door, and expires abandoned
//! checkouts. The transition out of `pending` is not here: only the
//! settlement router commits that, when the processor's notification
//! arrives.
//!
//! Checkout deliberately does NOT debit inventory. Abandoned checkouts must
//! never hold inventory hostage; the debit happens at settlement
//! confirmation, inside the same atomic unit as the status flip.

use chrono::{Duration, Utc};
use metrics::counter;
use stagepass_types::{
    CheckoutSession, Purchase, PurchaseId, PurchaseStatus, Result, StagepassError, TicketId,
    Transaction, TransactionReference, TransactionStatus, UserId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::store::Store;
use crate::token;
use stagepass_processor::{CreateIntentRequest, PaymentProcessor};

/// Opens and maintains buyer claims on ticket inventory
#[derive(Clone)]
pub struct PurchaseEngine {
    store: Store,
    processor: Arc<dyn PaymentProcessor>,
}

impl PurchaseEngine {
    pub fn new(store: Store, processor: Arc<dyn PaymentProcessor>) -> Self {
        Self { store, processor }
    }

    /// Open a checkout: validate, ask the processor for a payment intent,
    /// persist the pending purchase and transaction, and hand the buyer the
    /// completion handle.
    ///
    /// The store guard is dropped across the processor call; availability is
    /// re-checked when the pending records are committed.
    pub async fn create_pending_purchase(
        &self,
        buyer: &UserId,
        ticket_id: &TicketId,
        quantity: u32,
    ) -> Result<CheckoutSession> {
        if quantity == 0 {
            return Err(StagepassError::validation("quantity", "must be at least 1"));
        }

        // Validate and price under a read guard
        let (total, unit_price, event_id) = {
            let state = self.store.read().await;
            state.user(buyer)?;
            let ticket = state.ticket(ticket_id)?;
            let event = state.event(&ticket.event_id)?;

            if event.is_cancelled() {
                return Err(StagepassError::EventCancelled {
                    event_id: event.id.to_string(),
                });
            }
            if !event.is_visible_to(buyer) {
                return Err(StagepassError::access_denied(
                    "event is private and you are not invited",
                ));
            }
            if quantity > ticket.available() {
                return Err(StagepassError::InsufficientInventory {
                    ticket_id: ticket_id.to_string(),
                    requested: quantity,
                    available: ticket.available(),
                });
            }

            let total = ticket.price.checked_mul(quantity)?;
            (total, ticket.price, event.id.clone())
        };

        // No lock held across the processor call
        let mut metadata = HashMap::new();
        metadata.insert("ticket_id".to_string(), ticket_id.to_string());
        metadata.insert("quantity".to_string(), quantity.to_string());
        let intent = self
            .processor
            .create_intent(CreateIntentRequest {
                amount: total,
                customer: buyer.clone(),
                metadata,
            })
            .await?;

        // Re-acquire and re-validate before committing the pending records
        let mut state = self.store.write().await;
        let ticket = state.ticket(ticket_id)?;
        if quantity > ticket.available() {
            return Err(StagepassError::InsufficientInventory {
                ticket_id: ticket_id.to_string(),
                requested: quantity,
                available: ticket.available(),
            });
        }
        if state.event(&event_id)?.is_cancelled() {
            return Err(StagepassError::EventCancelled {
                event_id: event_id.to_string(),
            });
        }

        let mut transaction = Transaction::pending(
            buyer.clone(),
            total,
            intent.id.clone(),
            // Placeholder reference; replaced below once the purchase id exists
            TransactionReference::TicketPurchase {
                purchase_id: PurchaseId::new(),
            },
        );
        let purchase = Purchase::pending(
            ticket_id.clone(),
            event_id,
            buyer.clone(),
            quantity,
            unit_price,
            total,
            transaction.id.clone(),
        );
        transaction.reference = TransactionReference::TicketPurchase {
            purchase_id: purchase.id.clone(),
        };

        let session = CheckoutSession {
            purchase_id: Some(purchase.id.clone()),
            listing_id: None,
            transaction_id: transaction.id.clone(),
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
            amount: total,
        };

        info!(
            purchase_id = %purchase.id,
            %buyer,
            %ticket_id,
            quantity,
            amount = %total,
            "checkout opened"
        );
        counter!("stagepass_purchases_opened_total").increment(1);

        state.purchases.insert(purchase.id.clone(), purchase);
        state.insert_transaction(transaction);
        Ok(session)
    }

    /// Redeem an active purchase at the door; single-shot
    pub async fn redeem(&self, purchase_id: &PurchaseId, presented_digest: &str) -> Result<Purchase> {
        let mut state = self.store.write().await;
        let purchase = state.purchase_mut(purchase_id)?;

        if purchase.status != PurchaseStatus::Active {
            return Err(StagepassError::InvalidPurchaseState {
                purchase_id: purchase_id.to_string(),
                status: purchase.status.to_string(),
                expected: "active",
            });
        }

        let stored = purchase.token.as_ref().ok_or_else(|| StagepassError::Internal {
            message: format!("active purchase {purchase_id} has no redemption token"),
        })?;
        if !token::verify(stored) || stored.digest != presented_digest {
            return Err(StagepassError::access_denied("redemption token mismatch"));
        }

        purchase.status = PurchaseStatus::Used;
        info!(%purchase_id, "purchase redeemed");
        Ok(purchase.clone())
    }

    /// Disable pending purchases older than the checkout window and cancel
    /// their transactions. Advisory cleanup: pending never holds inventory,
    /// so there is nothing to credit back. Returns how many were expired.
    pub async fn expire_pending(&self, checkout_ttl: Duration) -> usize {
        let cutoff = Utc::now() - checkout_ttl;
        let mut state = self.store.write().await;

        let stale: Vec<PurchaseId> = state
            .purchases
            .values()
            .filter(|p| p.status == PurchaseStatus::Pending && p.created_at < cutoff)
            .map(|p| p.id.clone())
            .collect();

        for purchase_id in &stale {
            if let Some(purchase) = state.purchases.get_mut(purchase_id) {
                purchase.status = PurchaseStatus::Disabled;
                let transaction_id = purchase.transaction_id.clone();
                if let Some(txn_id) = transaction_id {
                    if let Some(txn) = state.transactions.get_mut(&txn_id) {
                        if txn.status == TransactionStatus::Pending {
                            txn.status = TransactionStatus::Cancelled;
                            txn.settled_at = Some(Utc::now());
                        }
                    }
                }
                warn!(%purchase_id, "pending purchase expired");
            }
        }

        if !stale.is_empty() {
            counter!("stagepass_purchases_expired_total").increment(stale.len() as u64);
        }
        stale.len()
    }
}
