//! Application state shared across handlers

use std::sync::Arc;

use stagepass_core::{
    Catalog, PurchaseEngine, RefundProcessor, ResaleMarketplace, SettlementRouter, Store,
    TransferEngine,
};
use stagepass_processor::{PaymentProcessor, WebhookVerifier};
use stagepass_types::Currency;

/// Shared application state: one store, one engine per concern
pub struct AppState {
    pub catalog: Catalog,
    pub purchases: PurchaseEngine,
    pub resale: ResaleMarketplace,
    pub transfers: TransferEngine,
    pub refunds: RefundProcessor,
    pub settlement: SettlementRouter,
    pub verifier: WebhookVerifier,
    currency: Currency,
    admin_key: String,
}

impl AppState {
    pub fn new(
        store: Store,
        processor: Arc<dyn PaymentProcessor>,
        currency: Currency,
        verifier: WebhookVerifier,
        admin_key: impl Into<String>,
    ) -> Self {
        Self {
            catalog: Catalog::new(store.clone()),
            purchases: PurchaseEngine::new(store.clone(), processor.clone()),
            resale: ResaleMarketplace::new(store.clone(), processor.clone()),
            transfers: TransferEngine::new(store.clone()),
            refunds: RefundProcessor::new(store.clone(), processor),
            settlement: SettlementRouter::new(store, currency),
            verifier,
            currency,
            admin_key: admin_key.into(),
        }
    }

    /// The single currency all prices and settlements use
    pub fn settlement_currency(&self) -> Currency {
        self.currency
    }

    pub fn is_admin_key(&self, presented: &str) -> bool {
        !self.admin_key.is_empty() && presented == self.admin_key
    }
}
