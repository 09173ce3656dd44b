//! Redemption token issuance and verification
//!
//! The token is the QR payload proving ownership at the door. Its digest is
//! SHA-256 over {buyer, ticket, event, issued_at, nonce}; the 128-bit random
//! nonce makes the digest unpredictable from public fields, and binding the
//! issue time prevents replaying one token onto another purchase.

use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use stagepass_types::{EventId, RedemptionToken, TicketId, UserId};

/// Issue a fresh token for a purchase becoming active
pub fn issue(buyer: &UserId, ticket_id: &TicketId, event_id: &EventId) -> RedemptionToken {
    let issued_at = Utc::now();
    let mut nonce_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = hex::encode(nonce_bytes);

    let digest = compute_digest(buyer, ticket_id, event_id, &issued_at, &nonce);

    RedemptionToken {
        buyer: buyer.clone(),
        ticket_id: ticket_id.clone(),
        event_id: event_id.clone(),
        issued_at,
        nonce,
        digest,
    }
}

/// Recompute the digest and check it against the stored one
pub fn verify(token: &RedemptionToken) -> bool {
    let expected = compute_digest(
        &token.buyer,
        &token.ticket_id,
        &token.event_id,
        &token.issued_at,
        &token.nonce,
    );
    expected == token.digest
}

fn compute_digest(
    buyer: &UserId,
    ticket_id: &TicketId,
    event_id: &EventId,
    issued_at: &DateTime<Utc>,
    nonce: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(buyer.to_string().as_bytes());
    hasher.update(ticket_id.to_string().as_bytes());
    hasher.update(event_id.to_string().as_bytes());
    hasher.update(issued_at.to_rfc3339().as_bytes());
    hasher.update(nonce.as_bytes());
    hex::encode(hasher.finalize())
}
