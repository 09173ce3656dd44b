//! The inventory ledger
//!
//! The only mutation path for `Ticket.available`. Both operations run inside
//! the caller's write-guard scope, so the compare-and-decrement and the
//! purchase status change it accompanies land in the same atomic unit.

use stagepass_types::{Result, TicketId};
use tracing::debug;

use crate::store::State;

/// Decrement `available` by `units`; fails with `InsufficientInventory`
/// rather than ever going negative. Returns the new availability.
pub(crate) fn debit(state: &mut State, ticket_id: &TicketId, units: u32) -> Result<u32> {
    let ticket = state.ticket_mut(ticket_id)?;
    ticket.debit(units)?;
    let available = ticket.available();
    debug!(%ticket_id, units, available, "inventory debited");
    Ok(available)
}

/// Credit `units` back, capped at the original mint. Returns how many units
/// were actually credited.
pub(crate) fn release(state: &mut State, ticket_id: &TicketId, units: u32) -> Result<u32> {
    let ticket = state.ticket_mut(ticket_id)?;
    let credited = ticket.release(units);
    debug!(%ticket_id, units, credited, available = ticket.available(), "inventory released");
    Ok(credited)
}
