//! Step function for pool_balance.
//! Every change to a pool's balance goes through here.

use super::{command::Command, invariants::check_invariants, state::State, types::*};

/// Effects produced by a transition (data, not side effects).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Effects {
    /// Cents that left `remaining` (debit) or returned to it (credit).
    pub moved: u64,
}

/// Execute a transition: (state, command) -> Result<(new_state, effects), Error>
///
/// Invariants are checked pre and post; preconditions in guards.
pub fn step(state: &State, cmd: Command) -> Result<(State, Effects), Error> {
    check_invariants(state)?;

    let post = match cmd {
        Command::Debit { amt } => {
            if amt > state.remaining {
                return Err(Error::PreconditionFailed("debit guard"));
            }
            State {
                total: state.total,
                remaining: state.remaining.checked_sub(amt).ok_or(Error::Underflow)?,
                spent: state.spent.checked_add(amt).ok_or(Error::Overflow)?,
            }
        }
        Command::Credit { amt } => {
            if amt > state.spent {
                return Err(Error::PreconditionFailed("credit guard"));
            }
            State {
                total: state.total,
                remaining: state.remaining.checked_add(amt).ok_or(Error::Overflow)?,
                spent: state.spent.checked_sub(amt).ok_or(Error::Underflow)?,
            }
        }
    };

    check_invariants(&post)?;
    let moved = match cmd {
        Command::Debit { amt } | Command::Credit { amt } => amt,
    };
    Ok((post, Effects { moved }))
}
