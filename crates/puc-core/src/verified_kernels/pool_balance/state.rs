//! State struct for pool_balance.

/// Balance triple in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State {
    pub total: u64,
    pub remaining: u64,
    pub spent: u64,
}

impl State {
    /// Freshly funded pool: nothing spent yet.
    pub fn funded(total: u64) -> Self {
        Self {
            total,
            remaining: total,
            spent: 0,
        }
    }
}
