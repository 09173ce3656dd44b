//! Recording in-memory processor for tests and local development

use async_trait::async_trait;
use dashmap::DashMap;
use rand::RngCore;
use stagepass_types::{Result, StagepassError};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::{CreateIntentRequest, CreateRefundRequest, PaymentIntent, PaymentProcessor, RefundReceipt};

/// In-memory processor that records every call and can be told to fail
///
/// Settlement never happens here; tests deliver webhook envelopes themselves
/// to exercise the async-confirmation path the same way production does.
#[derive(Debug, Default)]
pub struct MockProcessor {
    intents: DashMap<String, CreateIntentRequest>,
    refunds: DashMap<String, CreateRefundRequest>,
    fail_intents: AtomicBool,
    fail_refunds: AtomicBool,
}

impl MockProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent create_intent calls fail
    pub fn set_fail_intents(&self, fail: bool) {
        self.fail_intents.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent create_refund calls fail
    pub fn set_fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    /// The recorded intent for a given payment-intent id
    pub fn intent(&self, payment_intent_id: &str) -> Option<CreateIntentRequest> {
        self.intents.get(payment_intent_id).map(|r| r.clone())
    }

    pub fn intent_count(&self) -> usize {
        self.intents.len()
    }

    /// The recorded refund request for a given payment-intent id
    pub fn refund_for(&self, payment_intent_id: &str) -> Option<CreateRefundRequest> {
        self.refunds
            .iter()
            .find(|r| r.value().payment_intent_id == payment_intent_id)
            .map(|r| r.value().clone())
    }

    pub fn refund_count(&self) -> usize {
        self.refunds.len()
    }
}

#[async_trait]
impl PaymentProcessor for MockProcessor {
    async fn create_intent(&self, request: CreateIntentRequest) -> Result<PaymentIntent> {
        if self.fail_intents.load(Ordering::SeqCst) {
            return Err(StagepassError::processor("mock: intent creation failed"));
        }

        let id = format!("pi_{}", Uuid::new_v4().simple());
        let mut secret_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut secret_bytes);
        let client_secret = format!("{id}_secret_{}", hex::encode(secret_bytes));

        let amount = request.amount;
        self.intents.insert(id.clone(), request);

        Ok(PaymentIntent {
            id,
            client_secret,
            amount,
        })
    }

    async fn create_refund(&self, request: CreateRefundRequest) -> Result<RefundReceipt> {
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(StagepassError::processor("mock: refund creation failed"));
        }

        let refund_id = format!("re_{}", Uuid::new_v4().simple());
        let payment_intent_id = request.payment_intent_id.clone();
        self.refunds.insert(refund_id.clone(), request);

        Ok(RefundReceipt {
            refund_id,
            payment_intent_id,
        })
    }
}
