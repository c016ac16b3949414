//! pool_balance kernel module.
//!
//! Tracks one weekly pool's `{total, remaining, spent}` triple.

pub mod types;
pub mod state;
pub mod command;
pub mod invariants;
pub mod step;

#[cfg(test)]
mod tests;

pub use types::*;
pub use state::State;
pub use command::Command;
pub use step::{step, Effects};
pub use invariants::check_invariants;
