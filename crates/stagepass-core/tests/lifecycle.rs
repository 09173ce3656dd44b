//! End-to-end lifecycle tests driving the engines the same way the API
//! does: checkouts through the engines, confirmations through the
//! settlement router, with the recording mock standing in for the
//! processor.

use std::sync::Arc;

use stagepass_core::{
    Catalog, NewEvent, PurchaseEngine, RefundOutcome, RefundProcessor, ResaleMarketplace,
    SettlementDisposition, SettlementRouter, Store, TransferEngine,
};
use stagepass_processor::{MockProcessor, PaymentProcessor, ProcessorEvent, ProcessorEventType};
use stagepass_types::{
    Amount, CheckoutSession, Currency, EventId, EventStatus, EventVisibility, ListingStatus,
    Provenance, PurchaseStatus, StagepassError, TicketId, TransactionStatus, TransferMode, UserId,
};

fn usd(minor: i64) -> Amount {
    Amount::new(minor, Currency::Usd)
}

struct Harness {
    processor: Arc<MockProcessor>,
    catalog: Catalog,
    purchases: PurchaseEngine,
    resale: ResaleMarketplace,
    transfers: TransferEngine,
    refunds: RefundProcessor,
    settlement: SettlementRouter,
}

impl Harness {
    fn new() -> Self {
        let store = Store::new();
        let processor = Arc::new(MockProcessor::new());
        let shared: Arc<dyn PaymentProcessor> = processor.clone();
        Self {
            processor,
            catalog: Catalog::new(store.clone()),
            purchases: PurchaseEngine::new(store.clone(), shared.clone()),
            resale: ResaleMarketplace::new(store.clone(), shared.clone()),
            transfers: TransferEngine::new(store.clone()),
            refunds: RefundProcessor::new(store.clone(), shared),
            settlement: SettlementRouter::new(store, Currency::Usd),
        }
    }

    async fn user(&self, name: &str) -> UserId {
        self.catalog.register_user(name).await.unwrap().id
    }

    async fn seeded_event(&self, capacity: u32, minted: u32, price: Amount) -> (EventId, TicketId) {
        let host = self.user("Host").await;
        let event = self
            .catalog
            .create_event(NewEvent {
                name: "Warehouse Show".to_string(),
                creator: host,
                co_hosts: vec![],
                invited: vec![],
                visibility: EventVisibility::Public,
                capacity,
            })
            .await
            .unwrap();
        let ticket = self
            .catalog
            .mint_ticket(&event.id, "GA", minted, price, true)
            .await
            .unwrap();
        (event.id, ticket.id)
    }

    async fn available(&self, ticket_id: &TicketId) -> u32 {
        self.catalog.ticket(ticket_id).await.unwrap().available()
    }
}

fn processor_event(
    kind: ProcessorEventType,
    payment_intent_id: &str,
    amount: i64,
) -> ProcessorEvent {
    ProcessorEvent {
        id: format!("evt_{payment_intent_id}"),
        event_type: kind,
        payment_intent_id: payment_intent_id.to_string(),
        amount,
        currency: "USD".to_string(),
        fee: Some(30),
        metadata: None,
    }
}

fn settlement_succeeded(session: &CheckoutSession) -> ProcessorEvent {
    processor_event(
        ProcessorEventType::SettlementSucceeded,
        &session.payment_intent_id,
        session.amount.minor,
    )
}

#[tokio::test]
async fn test_checkout_never_debits_inventory() {
    let h = Harness::new();
    let (_, ticket_id) = h.seeded_event(100, 100, usd(2000)).await;
    let buyer = h.user("Bea").await;

    let session = h
        .purchases
        .create_pending_purchase(&buyer, &ticket_id, 2)
        .await
        .unwrap();

    assert_eq!(h.available(&ticket_id).await, 100);
    let purchase = h
        .catalog
        .purchase(session.purchase_id.as_ref().unwrap())
        .await
        .unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Pending);
    assert!(purchase.token.is_none());
    assert_eq!(session.amount, usd(4000));
    assert_eq!(h.processor.intent_count(), 1);
}

#[tokio::test]
async fn test_settlement_activates_purchase_and_debits() {
    let h = Harness::new();
    let (_, ticket_id) = h.seeded_event(100, 100, usd(2000)).await;
    let buyer = h.user("Bea").await;

    let session = h
        .purchases
        .create_pending_purchase(&buyer, &ticket_id, 2)
        .await
        .unwrap();
    let disposition = h
        .settlement
        .apply(&settlement_succeeded(&session))
        .await
        .unwrap();
    assert_eq!(disposition, SettlementDisposition::Applied);

    let purchase = h
        .catalog
        .purchase(session.purchase_id.as_ref().unwrap())
        .await
        .unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Active);
    assert_eq!(purchase.provenance, Provenance::Standard);
    assert!(purchase.token.is_some());
    assert!(purchase.settled_at.is_some());
    assert_eq!(h.available(&ticket_id).await, 98);

    let transaction = h.catalog.transaction(&session.transaction_id).await.unwrap();
    assert_eq!(transaction.status, TransactionStatus::Success);
    assert_eq!(transaction.processor_fee, Some(usd(30)));
}

#[tokio::test]
async fn test_duplicate_delivery_debits_once() {
    let h = Harness::new();
    let (_, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let buyer = h.user("Bea").await;

    let session = h
        .purchases
        .create_pending_purchase(&buyer, &ticket_id, 3)
        .await
        .unwrap();
    let event = settlement_succeeded(&session);

    assert_eq!(
        h.settlement.apply(&event).await.unwrap(),
        SettlementDisposition::Applied
    );
    assert_eq!(
        h.settlement.apply(&event).await.unwrap(),
        SettlementDisposition::Duplicate
    );
    assert_eq!(h.available(&ticket_id).await, 7);
}

#[tokio::test]
async fn test_concurrent_duplicate_deliveries_apply_once() {
    let h = Harness::new();
    let (_, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let buyer = h.user("Bea").await;

    let session = h
        .purchases
        .create_pending_purchase(&buyer, &ticket_id, 2)
        .await
        .unwrap();
    let event = settlement_succeeded(&session);

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let router = h.settlement.clone();
        let event = event.clone();
        tasks.push(tokio::spawn(async move { router.apply(&event).await }));
    }

    let mut applied = 0;
    let mut duplicates = 0;
    for task in tasks {
        match task.await.unwrap().unwrap() {
            SettlementDisposition::Applied => applied += 1,
            SettlementDisposition::Duplicate => duplicates += 1,
            SettlementDisposition::Ignored => panic!("unexpected ignore"),
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(duplicates, 3);
    assert_eq!(h.available(&ticket_id).await, 8);
}

#[tokio::test]
async fn test_private_event_checkout_requires_invitation() {
    let h = Harness::new();
    let host = h.user("Host").await;
    let guest = h.user("Gia").await;
    let stranger = h.user("Sam").await;

    let event = h
        .catalog
        .create_event(NewEvent {
            name: "Loft Session".to_string(),
            creator: host,
            co_hosts: vec![],
            invited: vec![guest.clone()],
            visibility: EventVisibility::Private,
            capacity: 10,
        })
        .await
        .unwrap();
    let ticket = h
        .catalog
        .mint_ticket(&event.id, "GA", 10, usd(1000), true)
        .await
        .unwrap();

    // Rejected before any payment intent is opened
    let err = h
        .purchases
        .create_pending_purchase(&stranger, &ticket.id, 1)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "access_denied");
    assert_eq!(h.processor.intent_count(), 0);

    h.purchases
        .create_pending_purchase(&guest, &ticket.id, 1)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_settlement_failed_disables_pending_purchase() {
    let h = Harness::new();
    let (_, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let buyer = h.user("Bea").await;

    let session = h
        .purchases
        .create_pending_purchase(&buyer, &ticket_id, 2)
        .await
        .unwrap();
    let event = processor_event(
        ProcessorEventType::SettlementFailed,
        &session.payment_intent_id,
        session.amount.minor,
    );
    assert_eq!(
        h.settlement.apply(&event).await.unwrap(),
        SettlementDisposition::Applied
    );

    let purchase = h
        .catalog
        .purchase(session.purchase_id.as_ref().unwrap())
        .await
        .unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Disabled);
    let transaction = h.catalog.transaction(&session.transaction_id).await.unwrap();
    assert_eq!(transaction.status, TransactionStatus::Failed);
    assert_eq!(h.available(&ticket_id).await, 10);
}

#[tokio::test]
async fn test_oversell_race_loser_is_disabled_at_settlement() {
    let h = Harness::new();
    let (_, ticket_id) = h.seeded_event(5, 5, usd(1000)).await;
    let ana = h.user("Ana").await;
    let bob = h.user("Bob").await;

    // Both checkouts succeed while inventory is untouched
    let first = h
        .purchases
        .create_pending_purchase(&ana, &ticket_id, 4)
        .await
        .unwrap();
    let second = h
        .purchases
        .create_pending_purchase(&bob, &ticket_id, 3)
        .await
        .unwrap();
    assert_eq!(h.available(&ticket_id).await, 5);

    // First confirmation wins the units
    h.settlement
        .apply(&settlement_succeeded(&first))
        .await
        .unwrap();
    assert_eq!(h.available(&ticket_id).await, 1);

    // Second loses the race: its payment settled but the units are gone
    let err = h
        .settlement
        .apply(&settlement_succeeded(&second))
        .await
        .unwrap_err();
    assert!(matches!(err, StagepassError::InsufficientInventory { .. }));

    let loser = h
        .catalog
        .purchase(second.purchase_id.as_ref().unwrap())
        .await
        .unwrap();
    assert_eq!(loser.status, PurchaseStatus::Disabled);
    let transaction = h.catalog.transaction(&second.transaction_id).await.unwrap();
    assert_eq!(transaction.status, TransactionStatus::Failed);
    assert_eq!(h.available(&ticket_id).await, 1);
}

#[tokio::test]
async fn test_concurrent_confirmations_for_last_units_settle_exactly_one() {
    let h = Harness::new();
    let (_, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let ana = h.user("Ana").await;
    let bob = h.user("Bob").await;

    let first = h
        .purchases
        .create_pending_purchase(&ana, &ticket_id, 6)
        .await
        .unwrap();
    let second = h
        .purchases
        .create_pending_purchase(&bob, &ticket_id, 6)
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for session in [&first, &second] {
        let router = h.settlement.clone();
        let event = settlement_succeeded(session);
        tasks.push(tokio::spawn(async move { router.apply(&event).await }));
    }

    let mut applied = 0;
    let mut losses = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(SettlementDisposition::Applied) => applied += 1,
            Err(StagepassError::InsufficientInventory { .. }) => losses += 1,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(losses, 1);
    assert_eq!(h.available(&ticket_id).await, 4);

    let ana_status = h
        .catalog
        .purchase(first.purchase_id.as_ref().unwrap())
        .await
        .unwrap()
        .status;
    let bob_status = h
        .catalog
        .purchase(second.purchase_id.as_ref().unwrap())
        .await
        .unwrap()
        .status;
    assert!(matches!(
        (ana_status, bob_status),
        (PurchaseStatus::Active, PurchaseStatus::Disabled)
            | (PurchaseStatus::Disabled, PurchaseStatus::Active)
    ));
}

#[tokio::test]
async fn test_amount_mismatch_is_alert_not_settlement() {
    let h = Harness::new();
    let (_, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let buyer = h.user("Bea").await;

    let session = h
        .purchases
        .create_pending_purchase(&buyer, &ticket_id, 2)
        .await
        .unwrap();

    let mut tampered = settlement_succeeded(&session);
    tampered.amount -= 1;
    let err = h.settlement.apply(&tampered).await.unwrap_err();
    assert_eq!(err.code(), "validation_error");

    // The transaction stays pending; the correct delivery still settles
    let transaction = h.catalog.transaction(&session.transaction_id).await.unwrap();
    assert_eq!(transaction.status, TransactionStatus::Pending);
    assert_eq!(
        h.settlement
            .apply(&settlement_succeeded(&session))
            .await
            .unwrap(),
        SettlementDisposition::Applied
    );
}

#[tokio::test]
async fn test_currency_mismatch_is_alert() {
    let h = Harness::new();
    let (_, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let buyer = h.user("Bea").await;

    let session = h
        .purchases
        .create_pending_purchase(&buyer, &ticket_id, 1)
        .await
        .unwrap();
    let mut event = settlement_succeeded(&session);
    event.currency = "EUR".to_string();

    let err = h.settlement.apply(&event).await.unwrap_err();
    assert!(matches!(err, StagepassError::CurrencyMismatch { .. }));
    assert_eq!(h.available(&ticket_id).await, 10);
}

#[tokio::test]
async fn test_unknown_intent_is_reconciliation_alert() {
    let h = Harness::new();
    let event = processor_event(ProcessorEventType::SettlementSucceeded, "pi_never_seen", 500);
    let err = h.settlement.apply(&event).await.unwrap_err();
    assert!(matches!(err, StagepassError::TransactionNotFound { .. }));
}

#[tokio::test]
async fn test_unrecognized_event_kind_is_acknowledged() {
    let h = Harness::new();
    let event = processor_event(ProcessorEventType::Unknown, "pi_whatever", 500);
    assert_eq!(
        h.settlement.apply(&event).await.unwrap(),
        SettlementDisposition::Ignored
    );
}

#[tokio::test]
async fn test_expired_checkout_then_late_settlement_is_noop() {
    let h = Harness::new();
    let (_, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let buyer = h.user("Bea").await;

    let session = h
        .purchases
        .create_pending_purchase(&buyer, &ticket_id, 2)
        .await
        .unwrap();

    // Zero TTL: everything pending is stale
    assert_eq!(h.purchases.expire_pending(chrono::Duration::zero()).await, 1);
    let purchase = h
        .catalog
        .purchase(session.purchase_id.as_ref().unwrap())
        .await
        .unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Disabled);
    let transaction = h.catalog.transaction(&session.transaction_id).await.unwrap();
    assert_eq!(transaction.status, TransactionStatus::Cancelled);

    // The processor's late confirmation hits a terminal transaction
    assert_eq!(
        h.settlement
            .apply(&settlement_succeeded(&session))
            .await
            .unwrap(),
        SettlementDisposition::Duplicate
    );
    assert_eq!(h.available(&ticket_id).await, 10);
}

async fn settled_purchase(
    h: &Harness,
    buyer: &UserId,
    ticket_id: &TicketId,
    quantity: u32,
) -> stagepass_types::PurchaseId {
    let session = h
        .purchases
        .create_pending_purchase(buyer, ticket_id, quantity)
        .await
        .unwrap();
    h.settlement
        .apply(&settlement_succeeded(&session))
        .await
        .unwrap();
    session.purchase_id.unwrap()
}

#[tokio::test]
async fn test_resale_settlement_conserves_units() {
    let h = Harness::new();
    let (event_id, ticket_id) = h.seeded_event(100, 100, usd(2000)).await;
    let seller = h.user("Sara").await;
    let buyer = h.user("Bea").await;

    let seller_purchase = settled_purchase(&h, &seller, &ticket_id, 4).await;
    let listing = h
        .resale
        .create_listing(&seller, &seller_purchase, 3, usd(2500))
        .await
        .unwrap();

    // Listing moves nothing
    assert_eq!(h.available(&ticket_id).await, 96);
    assert_eq!(h.catalog.purchase(&seller_purchase).await.unwrap().quantity, 4);

    let session = h
        .resale
        .checkout(&listing.id, &buyer, 2, usd(2500))
        .await
        .unwrap();
    assert_eq!(session.amount, usd(5000));
    h.settlement
        .apply(&settlement_succeeded(&session))
        .await
        .unwrap();

    // Seller shrank, buyer grew, primary inventory untouched
    assert_eq!(h.catalog.purchase(&seller_purchase).await.unwrap().quantity, 2);
    let bought = h.catalog.purchases_for_buyer(&buyer).await;
    assert_eq!(bought.len(), 1);
    assert_eq!(bought[0].quantity, 2);
    assert_eq!(bought[0].status, PurchaseStatus::Active);
    assert_eq!(bought[0].provenance, Provenance::Resale);
    // Priced at what the buyer was actually charged
    assert_eq!(bought[0].unit_price, usd(2500));
    assert_eq!(bought[0].total_price, usd(5000));
    assert!(bought[0].token.is_some());
    assert_eq!(h.available(&ticket_id).await, 96);

    let refreshed = h.catalog.listing(&listing.id).await.unwrap();
    assert_eq!(refreshed.available_quantity, 1);
    assert_eq!(refreshed.status, ListingStatus::Available);

    // Conservation: units across all purchases plus open inventory == minted
    let seller_units = h.catalog.purchase(&seller_purchase).await.unwrap().quantity;
    assert_eq!(seller_units + bought[0].quantity + h.available(&ticket_id).await, 100);
}

#[tokio::test]
async fn test_resale_listing_sells_out() {
    let h = Harness::new();
    let (_, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let seller = h.user("Sara").await;
    let buyer = h.user("Bea").await;

    let seller_purchase = settled_purchase(&h, &seller, &ticket_id, 2).await;
    let listing = h
        .resale
        .create_listing(&seller, &seller_purchase, 2, usd(1500))
        .await
        .unwrap();

    let session = h
        .resale
        .checkout(&listing.id, &buyer, 2, usd(1500))
        .await
        .unwrap();
    h.settlement
        .apply(&settlement_succeeded(&session))
        .await
        .unwrap();

    let refreshed = h.catalog.listing(&listing.id).await.unwrap();
    assert_eq!(refreshed.status, ListingStatus::Sold);
    assert_eq!(refreshed.available_quantity, 0);

    // Sold listings accept no further checkouts
    let other = h.user("Omar").await;
    let err = h
        .resale
        .checkout(&listing.id, &other, 1, usd(1500))
        .await
        .unwrap_err();
    assert!(matches!(err, StagepassError::InvalidListingState { .. }));
}

#[tokio::test]
async fn test_resale_price_race_is_rejected() {
    let h = Harness::new();
    let (_, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let seller = h.user("Sara").await;
    let buyer = h.user("Bea").await;

    let seller_purchase = settled_purchase(&h, &seller, &ticket_id, 2).await;
    let listing = h
        .resale
        .create_listing(&seller, &seller_purchase, 2, usd(1500))
        .await
        .unwrap();

    // Seller repriced between the buyer's view and their checkout
    h.resale
        .update(&listing.id, &seller, Some(usd(1800)), None)
        .await
        .unwrap();
    let err = h
        .resale
        .checkout(&listing.id, &buyer, 1, usd(1500))
        .await
        .unwrap_err();
    assert!(matches!(err, StagepassError::PriceMismatch { .. }));

    // Sellers cannot buy from themselves
    let err = h
        .resale
        .checkout(&listing.id, &seller, 1, usd(1800))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation_error");
}

#[tokio::test]
async fn test_reprice_after_checkout_cannot_change_settled_terms() {
    let h = Harness::new();
    let (_, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let seller = h.user("Sara").await;
    let buyer = h.user("Bea").await;

    let seller_purchase = settled_purchase(&h, &seller, &ticket_id, 5).await;
    let listing = h
        .resale
        .create_listing(&seller, &seller_purchase, 5, usd(1500))
        .await
        .unwrap();

    // Buyer is charged at the listed price
    let session = h
        .resale
        .checkout(&listing.id, &buyer, 2, usd(1500))
        .await
        .unwrap();
    assert_eq!(session.amount, usd(3000));

    // Seller repriced while the buyer's payment was in flight
    h.resale
        .update(&listing.id, &seller, Some(usd(9999)), None)
        .await
        .unwrap();

    // The charge no longer matches the listing; settlement is an alert,
    // never a purchase recorded at a price the buyer did not pay
    let err = h
        .settlement
        .apply(&settlement_succeeded(&session))
        .await
        .unwrap_err();
    assert!(matches!(err, StagepassError::PriceMismatch { .. }));

    assert_eq!(h.catalog.purchase(&seller_purchase).await.unwrap().quantity, 5);
    assert!(h.catalog.purchases_for_buyer(&buyer).await.is_empty());
    let transaction = h.catalog.transaction(&session.transaction_id).await.unwrap();
    assert_eq!(transaction.status, TransactionStatus::Failed);
}

#[tokio::test]
async fn test_transfer_partial_then_full() {
    let h = Harness::new();
    let (_, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let ana = h.user("Ana").await;
    let bob = h.user("Bob").await;

    let purchase_id = settled_purchase(&h, &ana, &ticket_id, 4).await;

    let record = h
        .transfers
        .transfer(&ana, &purchase_id, &bob, TransferMode::Quantity(1))
        .await
        .unwrap();
    assert_eq!(record.quantity, 1);

    let sender = h.catalog.purchase(&purchase_id).await.unwrap();
    assert_eq!(sender.quantity, 3);
    assert_eq!(sender.status, PurchaseStatus::Active);

    let received = h.catalog.purchase(&record.new_purchase_id).await.unwrap();
    assert_eq!(received.quantity, 1);
    assert_eq!(received.status, PurchaseStatus::Active);
    assert_eq!(received.provenance, Provenance::Transfer);
    assert!(received.total_price.is_zero());
    assert!(received.transaction_id.is_none());
    assert!(received.token.is_some());
    assert_ne!(received.token, sender.token);

    // Hand over the rest
    let record = h
        .transfers
        .transfer(&ana, &purchase_id, &bob, TransferMode::All)
        .await
        .unwrap();
    assert_eq!(record.quantity, 3);
    let sender = h.catalog.purchase(&purchase_id).await.unwrap();
    assert_eq!(sender.status, PurchaseStatus::Transferred);
    assert_eq!(sender.quantity, 0);

    // Units conserved, inventory untouched
    let bob_units: u32 = h
        .catalog
        .purchases_for_buyer(&bob)
        .await
        .iter()
        .map(|p| p.quantity)
        .sum();
    assert_eq!(bob_units, 4);
    assert_eq!(h.available(&ticket_id).await, 6);
}

#[tokio::test]
async fn test_transfer_requires_ownership_and_active_status() {
    let h = Harness::new();
    let (_, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let ana = h.user("Ana").await;
    let bob = h.user("Bob").await;

    let purchase_id = settled_purchase(&h, &ana, &ticket_id, 2).await;

    let err = h
        .transfers
        .transfer(&bob, &purchase_id, &ana, TransferMode::All)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "access_denied");

    let err = h
        .transfers
        .transfer(&ana, &purchase_id, &ana, TransferMode::All)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation_error");

    h.transfers
        .transfer(&ana, &purchase_id, &bob, TransferMode::All)
        .await
        .unwrap();
    // Fully transferred purchases cannot be transferred again
    let err = h
        .transfers
        .transfer(&ana, &purchase_id, &bob, TransferMode::All)
        .await
        .unwrap_err();
    assert!(matches!(err, StagepassError::InvalidPurchaseState { .. }));
}

#[tokio::test]
async fn test_redeem_is_single_shot() {
    let h = Harness::new();
    let (_, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let buyer = h.user("Bea").await;

    let purchase_id = settled_purchase(&h, &buyer, &ticket_id, 1).await;
    let digest = h
        .catalog
        .purchase(&purchase_id)
        .await
        .unwrap()
        .token
        .unwrap()
        .digest;

    let err = h.purchases.redeem(&purchase_id, "bogus").await.unwrap_err();
    assert_eq!(err.code(), "access_denied");

    let redeemed = h.purchases.redeem(&purchase_id, &digest).await.unwrap();
    assert_eq!(redeemed.status, PurchaseStatus::Used);

    let err = h.purchases.redeem(&purchase_id, &digest).await.unwrap_err();
    assert!(matches!(err, StagepassError::InvalidPurchaseState { .. }));
}

#[tokio::test]
async fn test_refund_batch_annotates_and_reports() {
    let h = Harness::new();
    let (event_id, ticket_id) = h.seeded_event(20, 20, usd(2000)).await;
    let ana = h.user("Ana").await;
    let bob = h.user("Bob").await;
    let cam = h.user("Cam").await;

    let ana_purchase = settled_purchase(&h, &ana, &ticket_id, 2).await;
    settled_purchase(&h, &bob, &ticket_id, 1).await;
    // Cam holds a transfer-provenance purchase: no money ever moved
    h.transfers
        .transfer(&ana, &ana_purchase, &cam, TransferMode::Quantity(1))
        .await
        .unwrap();

    let report = h.refunds.refund_event(&event_id, "venue flooded").await.unwrap();
    assert_eq!(report.requested, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.items.len(), 3);
    assert_eq!(h.processor.refund_count(), 2);

    // Event cancelled, purchases annotated but statuses untouched
    let event = h.catalog.event(&event_id).await.unwrap();
    assert_eq!(event.status, EventStatus::Cancelled);
    let ana_view = h.catalog.purchase(&ana_purchase).await.unwrap();
    assert_eq!(ana_view.status, PurchaseStatus::Active);
    let request = ana_view.refund.expect("refund annotation");
    // Net of the processor fee carried on the settlement event
    assert_eq!(request.amount, usd(4000 - 30));
    assert!(request.processor_refund_id.is_some());

    // A second run skips everything already annotated
    let rerun = h.refunds.refund_event(&event_id, "venue flooded").await.unwrap();
    assert_eq!(rerun.requested, 0);
    assert_eq!(rerun.skipped, 3);
    assert_eq!(h.processor.refund_count(), 2);
}

#[tokio::test]
async fn test_refund_batch_survives_processor_failure() {
    let h = Harness::new();
    let (event_id, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let ana = h.user("Ana").await;
    let bob = h.user("Bob").await;

    settled_purchase(&h, &ana, &ticket_id, 1).await;
    settled_purchase(&h, &bob, &ticket_id, 1).await;

    h.processor.set_fail_refunds(true);
    let report = h.refunds.refund_event(&event_id, "venue flooded").await.unwrap();
    assert_eq!(report.failed, 2);
    assert_eq!(report.requested, 0);
    assert!(report
        .items
        .iter()
        .all(|item| matches!(item.outcome, RefundOutcome::Failed { .. })));

    // Failed requests left nothing annotated; a retry picks them all up
    h.processor.set_fail_refunds(false);
    let retry = h.refunds.refund_event(&event_id, "venue flooded").await.unwrap();
    assert_eq!(retry.requested, 2);
    assert_eq!(retry.failed, 0);
}

#[tokio::test]
async fn test_refund_settled_flips_status_and_credits_inventory() {
    let h = Harness::new();
    let (event_id, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let buyer = h.user("Bea").await;

    let session = h
        .purchases
        .create_pending_purchase(&buyer, &ticket_id, 3)
        .await
        .unwrap();
    h.settlement
        .apply(&settlement_succeeded(&session))
        .await
        .unwrap();
    assert_eq!(h.available(&ticket_id).await, 7);

    h.refunds.refund_event(&event_id, "venue flooded").await.unwrap();

    let event = processor_event(
        ProcessorEventType::RefundSettled,
        &session.payment_intent_id,
        session.amount.minor,
    );
    assert_eq!(
        h.settlement.apply(&event).await.unwrap(),
        SettlementDisposition::Applied
    );

    let purchase = h
        .catalog
        .purchase(session.purchase_id.as_ref().unwrap())
        .await
        .unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Refunded);
    let transaction = h.catalog.transaction(&session.transaction_id).await.unwrap();
    assert_eq!(transaction.status, TransactionStatus::Refunded);
    assert_eq!(h.available(&ticket_id).await, 10);

    // Second delivery of the same refund event changes nothing
    assert_eq!(
        h.settlement.apply(&event).await.unwrap(),
        SettlementDisposition::Duplicate
    );
    assert_eq!(h.available(&ticket_id).await, 10);
}

#[tokio::test]
async fn test_refund_settled_without_request_is_alert() {
    let h = Harness::new();
    let (_, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let buyer = h.user("Bea").await;

    let session = h
        .purchases
        .create_pending_purchase(&buyer, &ticket_id, 1)
        .await
        .unwrap();
    h.settlement
        .apply(&settlement_succeeded(&session))
        .await
        .unwrap();

    let event = processor_event(
        ProcessorEventType::RefundSettled,
        &session.payment_intent_id,
        session.amount.minor,
    );
    let err = h.settlement.apply(&event).await.unwrap_err();
    assert_eq!(err.code(), "internal");
}

#[tokio::test]
async fn test_refund_request_locks_transfer_and_relisting() {
    let h = Harness::new();
    let (event_id, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let ana = h.user("Ana").await;
    let pal = h.user("Pal").await;

    let purchase_id = settled_purchase(&h, &ana, &ticket_id, 3).await;
    h.refunds.refund_event(&event_id, "venue flooded").await.unwrap();

    // The annotated purchase can no longer be handed off or relisted:
    // its money is on the way back to Ana
    let err = h
        .transfers
        .transfer(&ana, &purchase_id, &pal, TransferMode::All)
        .await
        .unwrap_err();
    assert!(matches!(err, StagepassError::InvalidPurchaseState { .. }));
    let err = h
        .resale
        .create_listing(&ana, &purchase_id, 1, usd(1500))
        .await
        .unwrap_err();
    assert!(matches!(err, StagepassError::InvalidPurchaseState { .. }));

    // Refund settles: every unit returns to inventory, none stranded with
    // a third party
    let purchase = h.catalog.purchase(&purchase_id).await.unwrap();
    let transaction = h
        .catalog
        .transaction(&purchase.transaction_id.unwrap())
        .await
        .unwrap();
    let event = processor_event(
        ProcessorEventType::RefundSettled,
        &transaction.payment_intent_id,
        transaction.amount.minor,
    );
    h.settlement.apply(&event).await.unwrap();

    assert_eq!(
        h.catalog.purchase(&purchase_id).await.unwrap().status,
        PurchaseStatus::Refunded
    );
    assert_eq!(h.available(&ticket_id).await, 10);
    assert!(h.catalog.purchases_for_buyer(&pal).await.is_empty());
}

#[tokio::test]
async fn test_cancelled_event_blocks_transfer_even_without_annotation() {
    let h = Harness::new();
    let (event_id, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let ana = h.user("Ana").await;
    let pal = h.user("Pal").await;

    let purchase_id = settled_purchase(&h, &ana, &ticket_id, 2).await;

    // The refund request fails, so the purchase carries no annotation,
    // but the event itself is cancelled
    h.processor.set_fail_refunds(true);
    let report = h.refunds.refund_event(&event_id, "venue flooded").await.unwrap();
    assert_eq!(report.failed, 1);

    let err = h
        .transfers
        .transfer(&ana, &purchase_id, &pal, TransferMode::All)
        .await
        .unwrap_err();
    assert!(matches!(err, StagepassError::EventCancelled { .. }));
    let err = h
        .resale
        .create_listing(&ana, &purchase_id, 1, usd(1500))
        .await
        .unwrap_err();
    assert!(matches!(err, StagepassError::EventCancelled { .. }));
}

#[tokio::test]
async fn test_cancelled_event_rejects_new_checkouts() {
    let h = Harness::new();
    let (event_id, ticket_id) = h.seeded_event(10, 10, usd(1000)).await;
    let buyer = h.user("Bea").await;

    h.refunds.refund_event(&event_id, "venue flooded").await.unwrap();

    let err = h
        .purchases
        .create_pending_purchase(&buyer, &ticket_id, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, StagepassError::EventCancelled { .. }));
}
