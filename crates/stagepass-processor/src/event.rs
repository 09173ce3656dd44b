//! Inbound webhook envelope from the payment processor
//!
//! The envelope is parsed only after its signature has been verified; no
//! field in here is trusted before that. Lookups key on
//! `payment_intent_id`, never on identities embedded in the payload.

use serde::{Deserialize, Serialize};
use stagepass_types::{Result, StagepassError};

/// Recognized processor event kinds
///
/// Anything the processor sends that we do not recognize deserializes to
/// `Unknown` and is acknowledged without effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessorEventType {
    SettlementSucceeded,
    SettlementFailed,
    SettlementCancelled,
    RefundSettled,
    SubscriptionUpdated,
    SubscriptionCancelled,
    #[serde(other)]
    Unknown,
}

impl ProcessorEventType {
    /// Event kinds that carry no ticketing semantics
    pub fn is_ignored(&self) -> bool {
        matches!(
            self,
            Self::SubscriptionUpdated | Self::SubscriptionCancelled | Self::Unknown
        )
    }
}

/// The signed event envelope the processor delivers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorEvent {
    /// Processor-side event identifier
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: ProcessorEventType,
    pub payment_intent_id: String,
    /// Amount in integral minor-currency units
    pub amount: i64,
    /// ISO 4217 code
    pub currency: String,
    /// Processor fee in minor units, when the event carries one
    #[serde(default)]
    pub fee: Option<i64>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl ProcessorEvent {
    /// Parse a raw (already signature-verified) envelope body
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| {
            StagepassError::validation("envelope", format!("malformed event body: {e}"))
        })
    }
}
