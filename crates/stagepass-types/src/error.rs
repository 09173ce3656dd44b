//! Error types for StagePass
//!
//! One taxonomy for every core operation. Validation and state errors are
//! detected before any mutation; processor errors are the only retriable kind.

use thiserror::Error;

/// Result type for StagePass operations
pub type Result<T> = std::result::Result<T, StagepassError>;

/// StagePass error types
#[derive(Debug, Clone, Error)]
pub enum StagepassError {
    // ========================================================================
    // Lookup Errors
    // ========================================================================

    /// Event not found
    #[error("Event {event_id} not found")]
    EventNotFound { event_id: String },

    /// Ticket not found
    #[error("Ticket {ticket_id} not found")]
    TicketNotFound { ticket_id: String },

    /// Purchase not found
    #[error("Purchase {purchase_id} not found")]
    PurchaseNotFound { purchase_id: String },

    /// Resale listing not found
    #[error("Resale listing {listing_id} not found")]
    ListingNotFound { listing_id: String },

    /// No transaction recorded for a payment intent
    #[error("No transaction found for payment intent {payment_intent_id}")]
    TransactionNotFound { payment_intent_id: String },

    /// User not found
    #[error("User {user_id} not found")]
    UserNotFound { user_id: String },

    // ========================================================================
    // Access Errors
    // ========================================================================

    /// Caller may not perform this operation
    #[error("Access denied: {reason}")]
    AccessDenied { reason: String },

    // ========================================================================
    // Inventory Errors
    // ========================================================================

    /// Oversell attempt against a ticket's remaining availability
    #[error(
        "Insufficient inventory for ticket {ticket_id}: requested {requested}, available {available}"
    )]
    InsufficientInventory {
        ticket_id: String,
        requested: u32,
        available: u32,
    },

    /// Attempt to list/transfer more units than the purchase still holds
    #[error("Purchase {purchase_id} holds {held} units, requested {requested}")]
    InsufficientAllotment {
        purchase_id: String,
        requested: u32,
        held: u32,
    },

    // ========================================================================
    // State Errors
    // ========================================================================

    /// Purchase is not in a valid source state for the operation
    #[error("Purchase {purchase_id} is {status}, expected {expected}")]
    InvalidPurchaseState {
        purchase_id: String,
        status: String,
        expected: &'static str,
    },

    /// Listing is not in a valid source state for the operation
    #[error("Listing {listing_id} is {status}, expected {expected}")]
    InvalidListingState {
        listing_id: String,
        status: String,
        expected: &'static str,
    },

    /// Event has been cancelled
    #[error("Event {event_id} is cancelled")]
    EventCancelled { event_id: String },

    /// Ticket category does not allow resale
    #[error("Ticket {ticket_id} is not resellable")]
    TicketNotResellable { ticket_id: String },

    // ========================================================================
    // Validation Errors
    // ========================================================================

    /// Malformed or out-of-range input
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Offered price no longer matches the listing price
    #[error("Price for listing {listing_id} is {current}, offered {offered}")]
    PriceMismatch {
        listing_id: String,
        offered: i64,
        current: i64,
    },

    /// Currency mismatch
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    /// Amount overflow during arithmetic
    #[error("Amount overflow during arithmetic operation")]
    AmountOverflow,

    /// Amount underflow during arithmetic
    #[error("Amount underflow during arithmetic operation")]
    AmountUnderflow,

    // ========================================================================
    // External Processor Errors
    // ========================================================================

    /// Payment processor call failed or returned an unexpected shape
    #[error("Payment processor error: {message}")]
    Processor { message: String },

    // ========================================================================
    // General Errors
    // ========================================================================

    /// Internal invariant breach
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StagepassError {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an access-denied error
    pub fn access_denied(reason: impl Into<String>) -> Self {
        Self::AccessDenied {
            reason: reason.into(),
        }
    }

    /// Create a processor error
    pub fn processor(message: impl Into<String>) -> Self {
        Self::Processor {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this is a retriable error
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Processor { .. } | Self::Internal { .. })
    }

    /// Get the taxonomy code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::EventNotFound { .. }
            | Self::TicketNotFound { .. }
            | Self::PurchaseNotFound { .. }
            | Self::ListingNotFound { .. }
            | Self::TransactionNotFound { .. }
            | Self::UserNotFound { .. } => "not_found",

            Self::AccessDenied { .. } => "access_denied",

            Self::InsufficientInventory { .. } | Self::InsufficientAllotment { .. } => {
                "insufficient_inventory"
            }

            Self::InvalidPurchaseState { .. }
            | Self::InvalidListingState { .. }
            | Self::EventCancelled { .. }
            | Self::TicketNotResellable { .. } => "invalid_state",

            Self::Validation { .. }
            | Self::PriceMismatch { .. }
            | Self::CurrencyMismatch { .. }
            | Self::AmountOverflow
            | Self::AmountUnderflow => "validation_error",

            Self::Processor { .. } => "processor_error",

            Self::Internal { .. } => "internal",
        }
    }
}
