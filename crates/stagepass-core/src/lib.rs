//! Ticketing core: inventory ledger, purchase lifecycle, resale
//! marketplace, transfers, refunds, and the settlement router.
//!
//! All state lives in a single in-memory [`Store`]; a held write guard is
//! the transaction boundary. Engines never hold a guard across processor
//! I/O: they validate, drop the guard, call out, then re-acquire and
//! re-validate before committing.

pub mod catalog;
mod inventory;
pub mod purchase;
pub mod refund;
pub mod resale;
pub mod settlement;
pub mod store;
pub mod token;
pub mod transfer;

pub use catalog::{Catalog, NewEvent};
pub use purchase::PurchaseEngine;
pub use refund::{RefundItem, RefundOutcome, RefundProcessor, RefundReport};
pub use resale::ResaleMarketplace;
pub use settlement::{SettlementDisposition, SettlementRouter};
pub use store::Store;
pub use transfer::TransferEngine;
