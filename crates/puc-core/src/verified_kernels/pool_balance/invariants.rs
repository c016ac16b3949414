//! Invariant checker for pool_balance.

use super::{state::State, types::*};

/// Check all invariants. Returns Err if any violated.
pub fn check_invariants(state: &State) -> Result<(), Error> {
    // Conservation
    let accounted = state
        .remaining
        .checked_add(state.spent)
        .ok_or(Error::Overflow)?;
    if accounted != state.total {
        return Err(Error::InvariantViolation("TotalEqualsRemainingPlusSpent"));
    }

    // RemainingWithinTotal
    if state.remaining > state.total {
        return Err(Error::InvariantViolation("RemainingWithinTotal"));
    }

    Ok(())
}
