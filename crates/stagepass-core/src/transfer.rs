//! Transfer engine
//!
//! Moves ownership of already-settled inventory between users with no
//! payment and no inventory ledger mutation. The receiver gets a fresh
//! active purchase at price zero; the sender's allotment shrinks by the same
//! amount, so units are conserved by construction.

use chrono::Utc;
use metrics::counter;
use stagepass_types::{
    Amount, Provenance, Purchase, PurchaseId, PurchaseStatus, Result, StagepassError, Transfer,
    TransferId, TransferMode, TransferStatus, UserId,
};
use tracing::info;

use crate::store::Store;
use crate::token;

#[derive(Clone)]
pub struct TransferEngine {
    store: Store,
}

impl TransferEngine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Hand all or part of an active purchase to another user.
    ///
    /// Runs entirely inside one write-guard scope: the receiver purchase is
    /// created and the sender purchase shrunk (or marked transferred) in the
    /// same atomic unit.
    pub async fn transfer(
        &self,
        sender: &UserId,
        purchase_id: &PurchaseId,
        receiver: &UserId,
        mode: TransferMode,
    ) -> Result<Transfer> {
        if sender == receiver {
            return Err(StagepassError::validation(
                "receiver",
                "cannot transfer to yourself",
            ));
        }
        if let TransferMode::Quantity(0) = mode {
            return Err(StagepassError::validation("quantity", "must be at least 1"));
        }

        let mut state = self.store.write().await;
        state.user(receiver)?;

        let (ticket_id, event_id, remaining) = {
            let purchase = state.purchase(purchase_id)?;
            if &purchase.buyer != sender {
                return Err(StagepassError::access_denied(
                    "only the purchase owner may transfer it",
                ));
            }
            if purchase.status != PurchaseStatus::Active {
                return Err(StagepassError::InvalidPurchaseState {
                    purchase_id: purchase_id.to_string(),
                    status: purchase.status.to_string(),
                    expected: "active",
                });
            }
            // The money behind this purchase is on its way back to the
            // sender; handing the units to someone else would strand them
            if purchase.refund.is_some() {
                return Err(StagepassError::InvalidPurchaseState {
                    purchase_id: purchase_id.to_string(),
                    status: "awaiting refund settlement".to_string(),
                    expected: "active with no refund requested",
                });
            }
            (
                purchase.ticket_id.clone(),
                purchase.event_id.clone(),
                purchase.quantity,
            )
        };

        let event = state.event(&event_id)?;
        if event.is_cancelled() {
            return Err(StagepassError::EventCancelled {
                event_id: event.id.to_string(),
            });
        }

        let transfer_quantity = match mode {
            TransferMode::All => remaining,
            TransferMode::Quantity(n) => {
                if n > remaining {
                    return Err(StagepassError::InsufficientAllotment {
                        purchase_id: purchase_id.to_string(),
                        requested: n,
                        held: remaining,
                    });
                }
                n
            }
        };

        // Receiver side: fresh token, price forced to zero
        let currency = state.purchase(purchase_id)?.unit_price.currency;
        let new_purchase = Purchase::settled(
            ticket_id.clone(),
            event_id.clone(),
            receiver.clone(),
            transfer_quantity,
            Amount::zero(currency),
            Amount::zero(currency),
            Provenance::Transfer,
            token::issue(receiver, &ticket_id, &event_id),
            None,
        );
        let new_purchase_id = new_purchase.id.clone();

        // Sender side: shrink, or mark fully transferred
        let sender_purchase = state.purchase_mut(purchase_id)?;
        if transfer_quantity == remaining {
            sender_purchase.status = PurchaseStatus::Transferred;
            sender_purchase.quantity = 0;
        } else {
            sender_purchase.quantity -= transfer_quantity;
        }

        let record = Transfer {
            id: TransferId::new(),
            purchase_id: purchase_id.clone(),
            sender: sender.clone(),
            receiver: receiver.clone(),
            mode,
            quantity: transfer_quantity,
            new_purchase_id: new_purchase_id.clone(),
            status: TransferStatus::Completed,
            created_at: Utc::now(),
        };

        state.purchases.insert(new_purchase_id.clone(), new_purchase);
        state.transfers.insert(record.id.clone(), record.clone());

        info!(
            %purchase_id,
            %sender,
            %receiver,
            quantity = transfer_quantity,
            %new_purchase_id,
            "transfer completed"
        );
        counter!("stagepass_transfers_completed_total").increment(1);
        Ok(record)
    }
}
