//! Commands for pool_balance.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Move `amt` from remaining to spent.
    Debit { amt: u64 },
    /// Move `amt` from spent back to remaining.
    Credit { amt: u64 },
}
