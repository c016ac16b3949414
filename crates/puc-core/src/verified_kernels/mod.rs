//! Checked state machines for ledger balances.
//!
//! Each kernel is a pure `(state, command) -> Result<(state, effects)>` step function:
//! - Invariants are checked before and after every transition
//! - Guards reject a command before any field changes
//! - Fail-closed on overflow, underflow and domain violations

pub mod pool_balance;
