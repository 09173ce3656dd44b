//! Settlement webhook router
//!
//! The only component permitted to transition a purchase out of `pending`.
//! Checkout paths request transitions by writing pending records; this
//! router commits them when the processor's notification arrives. The
//! finalize helpers are private to this module, so no other path can fake a
//! settlement.
//!
//! Every application runs inside one write-guard scope: the idempotency
//! check, the inventory debit, and the status writes land in the same atomic
//! unit, so concurrent duplicate deliveries serialize and the first one
//! wins.

use chrono::Utc;
use metrics::counter;
use stagepass_types::{
    Amount, Currency, PurchaseStatus, Result, StagepassError, TransactionReference,
    TransactionStatus,
};
use tracing::{debug, error, info};

use crate::inventory;
use crate::resale;
use crate::store::{State, Store};
use crate::token;
use stagepass_processor::{ProcessorEvent, ProcessorEventType};

/// What applying an event amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementDisposition {
    /// The event changed state
    Applied,
    /// The transaction was already settled; no-op
    Duplicate,
    /// Event kind carries no ticketing semantics
    Ignored,
}

#[derive(Clone)]
pub struct SettlementRouter {
    store: Store,
    /// The single currency ticketing flows settle in
    currency: Currency,
}

impl SettlementRouter {
    pub fn new(store: Store, currency: Currency) -> Self {
        Self { store, currency }
    }

    /// Apply a verified processor event.
    ///
    /// Duplicates are acknowledged no-ops. Genuine inconsistencies (unknown
    /// payment intent, amount/currency mismatch, oversell race losses,
    /// refunds with no recorded request) return errors the caller surfaces
    /// as reconciliation alerts.
    pub async fn apply(&self, event: &ProcessorEvent) -> Result<SettlementDisposition> {
        if event.event_type.is_ignored() {
            debug!(event_id = %event.id, event_type = ?event.event_type, "event acknowledged and ignored");
            counter!("stagepass_settlements_ignored_total").increment(1);
            return Ok(SettlementDisposition::Ignored);
        }

        let mut state = self.store.write().await;
        let result = match event.event_type {
            ProcessorEventType::SettlementSucceeded => self.apply_success(&mut state, event),
            ProcessorEventType::SettlementFailed => {
                self.apply_reversal(&mut state, event, TransactionStatus::Failed)
            }
            ProcessorEventType::SettlementCancelled => {
                self.apply_reversal(&mut state, event, TransactionStatus::Cancelled)
            }
            ProcessorEventType::RefundSettled => self.apply_refund_settled(&mut state, event),
            _ => unreachable!("ignored kinds handled above"),
        };

        match &result {
            Ok(SettlementDisposition::Applied) => {
                counter!("stagepass_settlements_applied_total").increment(1);
            }
            Ok(SettlementDisposition::Duplicate) => {
                info!(event_id = %event.id, payment_intent_id = %event.payment_intent_id, "duplicate settlement delivery");
                counter!("stagepass_settlements_duplicate_total").increment(1);
            }
            Ok(SettlementDisposition::Ignored) => {}
            Err(e) => {
                error!(
                    event_id = %event.id,
                    payment_intent_id = %event.payment_intent_id,
                    error = %e,
                    "settlement reconciliation alert"
                );
                counter!("stagepass_settlement_alerts_total").increment(1);
            }
        }
        result
    }

    fn apply_success(
        &self,
        state: &mut State,
        event: &ProcessorEvent,
    ) -> Result<SettlementDisposition> {
        let (transaction_id, reference, recorded) = {
            let transaction = state.transaction_by_intent(&event.payment_intent_id)?;
            if transaction.status.is_settled() {
                return Ok(SettlementDisposition::Duplicate);
            }
            (
                transaction.id.clone(),
                transaction.reference.clone(),
                transaction.amount,
            )
        };

        // Hard validation: single configured currency, exact amount. No
        // best-effort conversion.
        let event_currency = Currency::parse(&event.currency)?;
        if event_currency != self.currency || event_currency != recorded.currency {
            return Err(StagepassError::CurrencyMismatch {
                expected: self.currency.code().to_string(),
                actual: event.currency.clone(),
            });
        }
        if event.amount != recorded.minor {
            return Err(StagepassError::validation(
                "amount",
                format!("event amount {} does not match recorded {}", event.amount, recorded.minor),
            ));
        }

        let fee = event.fee.map(|f| Amount::new(f, event_currency));

        match reference {
            TransactionReference::TicketPurchase { purchase_id } => {
                let (ticket_id, buyer, event_id, quantity, status) = {
                    let purchase = state.purchase(&purchase_id)?;
                    (
                        purchase.ticket_id.clone(),
                        purchase.buyer.clone(),
                        purchase.event_id.clone(),
                        purchase.quantity,
                        purchase.status,
                    )
                };
                if status != PurchaseStatus::Pending {
                    // Purchase already finalized by an earlier delivery
                    return Ok(SettlementDisposition::Duplicate);
                }

                // Debit-at-confirmation: the oversell race is decided here
                if let Err(e) = inventory::debit(state, &ticket_id, quantity) {
                    let purchase = state.purchase_mut(&purchase_id)?;
                    purchase.status = PurchaseStatus::Disabled;
                    let transaction = state.transaction_mut(&transaction_id)?;
                    transaction.status = TransactionStatus::Failed;
                    transaction.settled_at = Some(Utc::now());
                    // Money moved but no goods were assigned; operator must
                    // reconcile
                    return Err(e);
                }

                let redemption_token = token::issue(&buyer, &ticket_id, &event_id);
                let purchase = state.purchase_mut(&purchase_id)?;
                purchase.status = PurchaseStatus::Active;
                purchase.token = Some(redemption_token);
                purchase.settled_at = Some(Utc::now());
                info!(%purchase_id, %buyer, quantity, "purchase settled");
            }
            TransactionReference::ResaleOrder {
                listing_id,
                buyer,
                quantity,
                unit_price,
            } => {
                if let Err(e) = resale::apply_resale_settlement(
                    state,
                    &listing_id,
                    &buyer,
                    quantity,
                    unit_price,
                    &transaction_id,
                ) {
                    let transaction = state.transaction_mut(&transaction_id)?;
                    transaction.status = TransactionStatus::Failed;
                    transaction.settled_at = Some(Utc::now());
                    return Err(e);
                }
            }
            TransactionReference::Subscription { subscription_id } => {
                // Settled here, managed elsewhere
                debug!(subscription_id, "subscription payment settled");
            }
            TransactionReference::Promotion { promotion_id } => {
                debug!(promotion_id, "promotion payment settled");
            }
        }

        let transaction = state.transaction_mut(&transaction_id)?;
        transaction.status = TransactionStatus::Success;
        transaction.processor_fee = fee;
        transaction.settled_at = Some(Utc::now());
        Ok(SettlementDisposition::Applied)
    }

    fn apply_reversal(
        &self,
        state: &mut State,
        event: &ProcessorEvent,
        terminal: TransactionStatus,
    ) -> Result<SettlementDisposition> {
        let (transaction_id, reference) = {
            let transaction = state.transaction_by_intent(&event.payment_intent_id)?;
            if transaction.status.is_settled() {
                return Ok(SettlementDisposition::Duplicate);
            }
            (transaction.id.clone(), transaction.reference.clone())
        };

        if let TransactionReference::TicketPurchase { purchase_id } = reference {
            let purchase = state.purchase_mut(&purchase_id)?;
            if purchase.status == PurchaseStatus::Pending {
                purchase.status = PurchaseStatus::Disabled;
                info!(%purchase_id, "pending purchase disabled by settlement reversal");
            }
        }
        // Resale orders decremented nothing at checkout; nothing to undo

        let transaction = state.transaction_mut(&transaction_id)?;
        transaction.status = terminal;
        transaction.settled_at = Some(Utc::now());
        Ok(SettlementDisposition::Applied)
    }

    fn apply_refund_settled(
        &self,
        state: &mut State,
        event: &ProcessorEvent,
    ) -> Result<SettlementDisposition> {
        let (transaction_id, had_request) = {
            let transaction = state.transaction_by_intent(&event.payment_intent_id)?;
            if transaction.status == TransactionStatus::Refunded {
                return Ok(SettlementDisposition::Duplicate);
            }
            (transaction.id.clone(), transaction.refund.is_some())
        };

        if !had_request {
            return Err(StagepassError::internal(format!(
                "refund settled for intent {} with no recorded refund request",
                event.payment_intent_id
            )));
        }

        // Flip the funded purchase and credit its remaining units back
        let funded = state
            .purchase_by_transaction(&transaction_id)
            .map(|p| (p.id.clone(), p.ticket_id.clone(), p.quantity));
        if let Some((purchase_id, ticket_id, quantity)) = funded {
            let purchase = state.purchase_mut(&purchase_id)?;
            purchase.status = PurchaseStatus::Refunded;
            if quantity > 0 {
                inventory::release(state, &ticket_id, quantity)?;
            }
            info!(%purchase_id, quantity, "purchase refunded; inventory credited back");
        }

        let transaction = state.transaction_mut(&transaction_id)?;
        transaction.status = TransactionStatus::Refunded;
        transaction.settled_at = Some(Utc::now());
        Ok(SettlementDisposition::Applied)
    }
}
