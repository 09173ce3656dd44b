//! StagePass Types - Canonical domain types for event ticketing
//!
//! This crate contains all foundational types for StagePass with zero
//! dependencies on other stagepass crates:
//!
//! - Identity types (UserId, EventId, TicketId, PurchaseId, ...)
//! - Money in integral minor-currency units
//! - The ticketing domain model (events, tickets, purchases, listings,
//!   transfers, transactions)
//! - The error taxonomy shared by every core operation
//!
//! # Lifecycle invariants
//!
//! The types encode the rules the engines rely on:
//!
//! 1. Ticket inventory moves only through the compare-and-update methods
//! 2. A purchase becomes `active` only via confirmed settlement
//! 3. Purchase quantity only decreases; transfers and resales never mint
//! 4. Transactions reference their funded object through a tagged union

pub mod error;
pub mod id;
pub mod model;
pub mod money;

pub use error::*;
pub use id::*;
pub use model::*;
pub use money::*;
