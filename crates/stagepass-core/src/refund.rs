//! Refund processor
//!
//! Bulk-reverses an event's purchases. Each refund is only *requested* here:
//! the purchase and transaction are annotated and keep their status until
//! the processor's own refund-settled notification arrives through the
//! settlement router. One processor failure never aborts the batch; the
//! report carries per-purchase outcomes so partial success is visible.

use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use stagepass_types::{
    Amount, EventId, EventStatus, PurchaseId, RefundRequest, Result, TransactionId, UserId,
};
use std::sync::Arc;
use tracing::{error, info};

use crate::store::Store;
use stagepass_processor::{CreateRefundRequest, PaymentProcessor};

/// Outcome for one purchase in a refund batch
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefundOutcome {
    /// Refund requested from the processor; awaiting its confirmation
    Requested { refund_id: String, amount: Amount },
    /// Nothing to refund (no funding transaction, or already requested)
    Skipped { reason: String },
    /// Processor call failed; annotation not made
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundItem {
    pub purchase_id: PurchaseId,
    #[serde(flatten)]
    pub outcome: RefundOutcome,
}

/// Per-item report for a refund batch
#[derive(Debug, Clone, Serialize)]
pub struct RefundReport {
    pub event_id: EventId,
    pub requested: usize,
    pub skipped: usize,
    pub failed: usize,
    pub items: Vec<RefundItem>,
}

/// One purchase's snapshot taken under the guard, processed outside it
struct RefundCandidate {
    purchase_id: PurchaseId,
    buyer: UserId,
    funding: Option<Funding>,
}

struct Funding {
    transaction_id: TransactionId,
    payment_intent_id: String,
    charged: Amount,
    fee: Option<Amount>,
}

#[derive(Clone)]
pub struct RefundProcessor {
    store: Store,
    processor: Arc<dyn PaymentProcessor>,
}

impl RefundProcessor {
    pub fn new(store: Store, processor: Arc<dyn PaymentProcessor>) -> Self {
        Self { store, processor }
    }

    /// Cancel an event and request refunds for every purchase on it that is
    /// not already refunded, disabled, or still pending.
    pub async fn refund_event(&self, event_id: &EventId, reason: &str) -> Result<RefundReport> {
        if reason.trim().is_empty() {
            return Err(stagepass_types::StagepassError::validation(
                "reason",
                "must not be empty",
            ));
        }

        // Mark the event cancelled and snapshot the eligible purchases
        let candidates: Vec<RefundCandidate> = {
            let mut state = self.store.write().await;
            let event = state.event_mut(event_id)?;
            event.status = EventStatus::Cancelled;

            state
                .purchases
                .values()
                .filter(|p| &p.event_id == event_id)
                .filter(|p| {
                    use stagepass_types::PurchaseStatus::*;
                    !matches!(p.status, Refunded | Disabled | Pending)
                })
                .map(|p| {
                    let funding = p
                        .transaction_id
                        .as_ref()
                        .and_then(|id| state.transactions.get(id))
                        .map(|t| Funding {
                            transaction_id: t.id.clone(),
                            payment_intent_id: t.payment_intent_id.clone(),
                            charged: t.amount,
                            fee: t.processor_fee,
                        });
                    RefundCandidate {
                        purchase_id: p.id.clone(),
                        buyer: p.buyer.clone(),
                        funding,
                    }
                })
                .collect()
        };

        info!(%event_id, eligible = candidates.len(), "refund batch started");

        let mut items = Vec::with_capacity(candidates.len());
        let (mut requested, mut skipped, mut failed) = (0, 0, 0);

        // Each purchase independently; the processor is never called while a
        // guard is held
        for candidate in candidates {
            let outcome = self.refund_one(&candidate, reason).await;
            match &outcome {
                RefundOutcome::Requested { .. } => requested += 1,
                RefundOutcome::Skipped { .. } => skipped += 1,
                RefundOutcome::Failed { error } => {
                    failed += 1;
                    error!(purchase_id = %candidate.purchase_id, buyer = %candidate.buyer, error, "refund request failed");
                }
            }
            items.push(RefundItem {
                purchase_id: candidate.purchase_id.clone(),
                outcome,
            });
        }

        counter!("stagepass_refunds_requested_total").increment(requested as u64);
        info!(%event_id, requested, skipped, failed, "refund batch finished");

        Ok(RefundReport {
            event_id: event_id.clone(),
            requested,
            skipped,
            failed,
            items,
        })
    }

    async fn refund_one(&self, candidate: &RefundCandidate, reason: &str) -> RefundOutcome {
        let Some(funding) = &candidate.funding else {
            // Transfer provenance: no money ever moved for this purchase
            return RefundOutcome::Skipped {
                reason: "no funding transaction".to_string(),
            };
        };

        // Already annotated by an earlier batch run
        {
            let state = self.store.read().await;
            if let Ok(purchase) = state.purchase(&candidate.purchase_id) {
                if purchase.refund.is_some() {
                    return RefundOutcome::Skipped {
                        reason: "refund already requested".to_string(),
                    };
                }
            }
        }

        // Net of processor fees when fee data is available
        let amount = match funding.fee {
            Some(fee) => funding.charged.saturating_sub(fee),
            None => funding.charged,
        };

        let receipt = match self
            .processor
            .create_refund(CreateRefundRequest {
                payment_intent_id: funding.payment_intent_id.clone(),
                amount: Some(amount),
                reason: reason.to_string(),
            })
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                return RefundOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        // Annotate both records; status stays untouched until the processor's
        // refund-settled event arrives
        let request = RefundRequest {
            amount,
            reason: reason.to_string(),
            processor_refund_id: Some(receipt.refund_id.clone()),
            requested_at: Utc::now(),
        };
        let mut state = self.store.write().await;
        if let Ok(purchase) = state.purchase_mut(&candidate.purchase_id) {
            purchase.refund = Some(request.clone());
        }
        if let Ok(transaction) = state.transaction_mut(&funding.transaction_id) {
            transaction.refund = Some(request);
        }

        RefundOutcome::Requested {
            refund_id: receipt.refund_id,
            amount,
        }
    }
}
