//! Resale marketplace
//!
//! Listing a settled purchase moves nothing: no inventory, no money, and the
//! seller keeps their full allotment until a sale actually clears. The
//! seller's purchase quantity and the listing's availability both shrink at
//! settlement time, inside the settlement router's write-guard scope, via
//! [`apply_resale_settlement`].

use metrics::counter;
use stagepass_types::{
    CheckoutSession, ListingId, ListingStatus, Provenance, Purchase, PurchaseId, PurchaseStatus,
    ResaleListing, Result, StagepassError, Transaction, TransactionId, TransactionReference,
    UserId,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::store::{State, Store};
use crate::token;
use stagepass_processor::{CreateIntentRequest, PaymentProcessor};

/// Lists settled purchases and opens resale checkouts
#[derive(Clone)]
pub struct ResaleMarketplace {
    store: Store,
    processor: Arc<dyn PaymentProcessor>,
}

impl ResaleMarketplace {
    pub fn new(store: Store, processor: Arc<dyn PaymentProcessor>) -> Self {
        Self { store, processor }
    }

    /// Offer part or all of an active purchase for sale
    pub async fn create_listing(
        &self,
        seller: &UserId,
        purchase_id: &PurchaseId,
        quantity: u32,
        unit_price: stagepass_types::Amount,
    ) -> Result<ResaleListing> {
        if quantity == 0 {
            return Err(StagepassError::validation("quantity", "must be at least 1"));
        }
        if unit_price.minor < 1 {
            return Err(StagepassError::validation("price", "must be at least 1"));
        }

        let mut state = self.store.write().await;
        let purchase = state.purchase(purchase_id)?;

        if &purchase.buyer != seller {
            return Err(StagepassError::access_denied(
                "only the purchase owner may list it for resale",
            ));
        }
        if purchase.status != PurchaseStatus::Active {
            return Err(StagepassError::InvalidPurchaseState {
                purchase_id: purchase_id.to_string(),
                status: purchase.status.to_string(),
                expected: "active",
            });
        }
        // A purchase awaiting refund settlement cannot be relisted: the
        // money is on its way back to the buyer
        if purchase.refund.is_some() {
            return Err(StagepassError::InvalidPurchaseState {
                purchase_id: purchase_id.to_string(),
                status: "awaiting refund settlement".to_string(),
                expected: "active with no refund requested",
            });
        }
        if quantity > purchase.quantity {
            return Err(StagepassError::InsufficientAllotment {
                purchase_id: purchase_id.to_string(),
                requested: quantity,
                held: purchase.quantity,
            });
        }

        let event = state.event(&purchase.event_id)?;
        if event.is_cancelled() {
            return Err(StagepassError::EventCancelled {
                event_id: event.id.to_string(),
            });
        }

        let ticket = state.ticket(&purchase.ticket_id)?;
        if !ticket.resellable {
            return Err(StagepassError::TicketNotResellable {
                ticket_id: ticket.id.to_string(),
            });
        }

        let listing = ResaleListing::new(purchase, quantity, unit_price);
        info!(listing_id = %listing.id, %purchase_id, quantity, price = %unit_price, "resale listing created");
        state.listings.insert(listing.id.clone(), listing.clone());
        Ok(listing)
    }

    /// Open a resale checkout: a pending transaction referencing the listing.
    /// The buyer's purchase is created only when settlement confirms.
    pub async fn checkout(
        &self,
        listing_id: &ListingId,
        buyer: &UserId,
        quantity: u32,
        offered_price: stagepass_types::Amount,
    ) -> Result<CheckoutSession> {
        if quantity == 0 {
            return Err(StagepassError::validation("quantity", "must be at least 1"));
        }

        let total = {
            let state = self.store.read().await;
            state.user(buyer)?;
            let listing = state.listing(listing_id)?;

            if listing.status != ListingStatus::Available {
                return Err(StagepassError::InvalidListingState {
                    listing_id: listing_id.to_string(),
                    status: listing.status.to_string(),
                    expected: "available",
                });
            }
            if &listing.seller == buyer {
                return Err(StagepassError::validation(
                    "buyer",
                    "cannot buy from your own listing",
                ));
            }
            // Price races are rejected, not silently honored
            if offered_price != listing.unit_price {
                return Err(StagepassError::PriceMismatch {
                    listing_id: listing_id.to_string(),
                    offered: offered_price.minor,
                    current: listing.unit_price.minor,
                });
            }
            if quantity > listing.available_quantity {
                return Err(StagepassError::InsufficientInventory {
                    ticket_id: listing.ticket_id.to_string(),
                    requested: quantity,
                    available: listing.available_quantity,
                });
            }

            listing.unit_price.checked_mul(quantity)?
        };

        // No lock held across the processor call
        let mut metadata = HashMap::new();
        metadata.insert("listing_id".to_string(), listing_id.to_string());
        metadata.insert("quantity".to_string(), quantity.to_string());
        let intent = self
            .processor
            .create_intent(CreateIntentRequest {
                amount: total,
                customer: buyer.clone(),
                metadata,
            })
            .await?;

        // Re-validate before committing the pending transaction
        let mut state = self.store.write().await;
        let listing = state.listing(listing_id)?;
        if listing.status != ListingStatus::Available || quantity > listing.available_quantity {
            return Err(StagepassError::InvalidListingState {
                listing_id: listing_id.to_string(),
                status: listing.status.to_string(),
                expected: "available with enough units",
            });
        }
        // The seller may have repriced while the intent was being opened
        if listing.unit_price != offered_price {
            return Err(StagepassError::PriceMismatch {
                listing_id: listing_id.to_string(),
                offered: offered_price.minor,
                current: listing.unit_price.minor,
            });
        }

        // The charged unit price travels with the transaction; settlement
        // prices the buyer's purchase from it, never from the live listing
        let transaction = Transaction::pending(
            buyer.clone(),
            total,
            intent.id.clone(),
            TransactionReference::ResaleOrder {
                listing_id: listing_id.clone(),
                buyer: buyer.clone(),
                quantity,
                unit_price: offered_price,
            },
        );

        let session = CheckoutSession {
            purchase_id: None,
            listing_id: Some(listing_id.clone()),
            transaction_id: transaction.id.clone(),
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
            amount: total,
        };

        info!(%listing_id, %buyer, quantity, amount = %total, "resale checkout opened");
        state.insert_transaction(transaction);
        Ok(session)
    }

    /// Reprice or resize a listing; only while available and before any sale
    pub async fn update(
        &self,
        listing_id: &ListingId,
        seller: &UserId,
        new_price: Option<stagepass_types::Amount>,
        new_quantity: Option<u32>,
    ) -> Result<ResaleListing> {
        let mut state = self.store.write().await;

        let held = {
            let listing = state.listing(listing_id)?;
            state.purchase(&listing.purchase_id)?.quantity
        };

        let listing = state.listing_mut(listing_id)?;
        if &listing.seller != seller {
            return Err(StagepassError::access_denied(
                "only the seller may update a listing",
            ));
        }
        if listing.status != ListingStatus::Available {
            return Err(StagepassError::InvalidListingState {
                listing_id: listing_id.to_string(),
                status: listing.status.to_string(),
                expected: "available",
            });
        }
        // Any confirmed sub-sale locks the listing
        if listing.units_sold() > 0 {
            return Err(StagepassError::InvalidListingState {
                listing_id: listing_id.to_string(),
                status: "partially sold".to_string(),
                expected: "no units sold",
            });
        }

        if let Some(price) = new_price {
            if price.minor < 1 {
                return Err(StagepassError::validation("price", "must be at least 1"));
            }
            listing.unit_price = price;
        }
        if let Some(quantity) = new_quantity {
            if quantity == 0 {
                return Err(StagepassError::validation("quantity", "must be at least 1"));
            }
            if quantity > held {
                return Err(StagepassError::InsufficientAllotment {
                    purchase_id: listing.purchase_id.to_string(),
                    requested: quantity,
                    held,
                });
            }
            listing.quantity = quantity;
            listing.available_quantity = quantity;
        }

        info!(%listing_id, "resale listing updated");
        Ok(listing.clone())
    }

    /// Cancel an available listing. No inventory change: the seller's
    /// purchase was never debited.
    pub async fn cancel(&self, listing_id: &ListingId, seller: &UserId) -> Result<ResaleListing> {
        let mut state = self.store.write().await;
        let listing = state.listing_mut(listing_id)?;

        if &listing.seller != seller {
            return Err(StagepassError::access_denied(
                "only the seller may cancel a listing",
            ));
        }
        if listing.status != ListingStatus::Available {
            return Err(StagepassError::InvalidListingState {
                listing_id: listing_id.to_string(),
                status: listing.status.to_string(),
                expected: "available",
            });
        }

        listing.status = ListingStatus::Cancelled;
        info!(%listing_id, "resale listing cancelled");
        Ok(listing.clone())
    }
}

/// Apply a confirmed resale settlement inside the caller's write guard.
///
/// Decrements the listing's availability and the seller's purchase quantity
/// together, creates the buyer's active purchase with resale provenance
/// priced at the unit price the transaction recorded at checkout, and flips
/// the listing to `sold` when nothing remains. A listing that was cancelled
/// or repriced since checkout, or a seller who no longer holds enough units,
/// is an inconsistency the settlement router surfaces as an alert.
pub(crate) fn apply_resale_settlement(
    state: &mut State,
    listing_id: &ListingId,
    buyer: &UserId,
    quantity: u32,
    unit_price: stagepass_types::Amount,
    transaction_id: &TransactionId,
) -> Result<PurchaseId> {
    let (purchase_id, ticket_id, event_id) = {
        let listing = state.listing(listing_id)?;
        if listing.status != ListingStatus::Available {
            return Err(StagepassError::InvalidListingState {
                listing_id: listing_id.to_string(),
                status: listing.status.to_string(),
                expected: "available",
            });
        }
        // The buyer paid the checkout-time price; a listing that no longer
        // carries it must not settle against stale money
        if listing.unit_price != unit_price {
            return Err(StagepassError::PriceMismatch {
                listing_id: listing_id.to_string(),
                offered: unit_price.minor,
                current: listing.unit_price.minor,
            });
        }
        if quantity > listing.available_quantity {
            return Err(StagepassError::InsufficientInventory {
                ticket_id: listing.ticket_id.to_string(),
                requested: quantity,
                available: listing.available_quantity,
            });
        }
        (
            listing.purchase_id.clone(),
            listing.ticket_id.clone(),
            listing.event_id.clone(),
        )
    };

    // Seller must still hold what is being sold, with no refund in flight
    {
        let seller_purchase = state.purchase(&purchase_id)?;
        if seller_purchase.status != PurchaseStatus::Active
            || seller_purchase.quantity < quantity
        {
            return Err(StagepassError::InsufficientAllotment {
                purchase_id: purchase_id.to_string(),
                requested: quantity,
                held: seller_purchase.quantity,
            });
        }
        if seller_purchase.refund.is_some() {
            return Err(StagepassError::InvalidPurchaseState {
                purchase_id: purchase_id.to_string(),
                status: "awaiting refund settlement".to_string(),
                expected: "active with no refund requested",
            });
        }
    }

    let total = unit_price.checked_mul(quantity)?;
    let redemption_token = token::issue(buyer, &ticket_id, &event_id);

    let new_purchase = Purchase::settled(
        ticket_id,
        event_id,
        buyer.clone(),
        quantity,
        unit_price,
        total,
        Provenance::Resale,
        redemption_token,
        Some(transaction_id.clone()),
    );
    let new_purchase_id = new_purchase.id.clone();

    // Seller allotment and listing availability shrink at this same moment
    let seller_purchase = state.purchase_mut(&purchase_id)?;
    seller_purchase.quantity -= quantity;

    let listing = state.listing_mut(listing_id)?;
    listing.record_sale(buyer.clone(), new_purchase_id.clone(), quantity);

    state.purchases.insert(new_purchase_id.clone(), new_purchase);

    info!(%listing_id, %buyer, quantity, new_purchase_id = %new_purchase_id, "resale settlement applied");
    counter!("stagepass_resales_settled_total").increment(1);
    Ok(new_purchase_id)
}
