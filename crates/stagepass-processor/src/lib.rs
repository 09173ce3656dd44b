//! StagePass Processor - the payment-processor boundary
//!
//! Everything that talks to (or pretends to be) the external payment
//! processor lives here:
//!
//! - [`PaymentProcessor`]: the async trait the engines call for outbound
//!   money movement (create intent, create refund)
//! - [`HttpProcessor`]: the production client (bearer-authenticated JSON)
//! - [`MockProcessor`]: a recording in-memory implementation for tests and
//!   local development, with scriptable failures
//! - [`event`]: the inbound webhook envelope and its typed event kinds
//! - [`signature`]: HMAC-SHA256 envelope signing and verification
//!
//! The engines never learn which implementation they hold; settlement truth
//! only ever enters the system through a verified webhook envelope.

pub mod event;
pub mod http;
pub mod mock;
pub mod signature;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stagepass_types::{Amount, Result, UserId};
use std::collections::HashMap;

pub use event::{ProcessorEvent, ProcessorEventType};
pub use http::HttpProcessor;
pub use mock::MockProcessor;
pub use signature::{sign_payload, SignatureError, WebhookVerifier};

/// Request to open a payment intent with the processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIntentRequest {
    /// Amount in integral minor-currency units
    pub amount: Amount,
    pub customer: UserId,
    /// Free-form metadata echoed back on settlement events
    pub metadata: HashMap<String, String>,
}

/// An opened payment intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Processor-side identifier; settlement events are keyed on this
    pub id: String,
    /// Client-side completion handle handed to the buyer
    pub client_secret: String,
    pub amount: Amount,
}

/// Request to refund a settled payment intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRefundRequest {
    pub payment_intent_id: String,
    /// Partial refund amount; omit to refund the full charge
    pub amount: Option<Amount>,
    pub reason: String,
}

/// Acknowledgement of an accepted refund request
///
/// The money has not moved yet; the processor confirms with a
/// refund-settled event later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub refund_id: String,
    pub payment_intent_id: String,
}

/// The outbound seam to the external payment processor
///
/// Implementations must be safe to call concurrently. Callers must not hold
/// any in-memory lock across these calls.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Open a payment intent for the given amount
    async fn create_intent(&self, request: CreateIntentRequest) -> Result<PaymentIntent>;

    /// Request a refund against a previously settled intent
    async fn create_refund(&self, request: CreateRefundRequest) -> Result<RefundReceipt>;
}
