//! # puc-core
//!
//! Weekly-pool earnings ledger for the Pull-Up Club.
//!
//! Each calendar week has a fixed cash pool. An approved video submission earns a flat
//! credit debited from the pool active at its approval time, clamped to what the pool
//! has left. Earnings roll up into one payout request per user per month.
//!
//! ## Modules
//!
//! - [`pool`]: weekly pool lookup, debit/credit and provisioning
//! - [`earnings`]: approval events to earnings
//! - [`payout`]: monthly payout requests derived from earnings
//! - [`audit`]: consistency checks and the drift they report
//! - [`store`]: the ledger tables and the transactional store trait
//! - [`verified_kernels`]: the pool balance state machine
//!
//! All state changes go through [`Ledger`], which runs each operation as one
//! [`LedgerStore::transact`] call.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub mod audit;
pub mod calendar;
pub mod config;
pub mod earnings;
pub mod ledger;
pub mod metrics;
pub mod money;
pub mod payout;
pub mod pool;
pub mod store;
pub mod verified_kernels;

pub use calendar::MonthKey;
pub use config::LedgerConfig;
pub use earnings::ApprovalReceipt;
pub use ledger::Ledger;
pub use money::Money;
pub use store::{InMemoryStore, LedgerStore, LedgerTables};

use verified_kernels::pool_balance;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self> {
                Uuid::parse_str(s.trim()).map(Self).map_err(|e| {
                    LedgerError::InvalidInput(format!(
                        concat!("invalid ", stringify!($name), " {:?}: {}"),
                        s, e
                    ))
                })
            }
        }
    };
}

uuid_id!(
    /// Member account identifier.
    UserId
);
uuid_id!(
    /// Video submission identifier (owned by the submission workflow).
    SubmissionId
);
uuid_id!(
    /// Weekly pool identifier.
    PoolId
);
uuid_id!(
    /// Earning row identifier.
    EarningId
);

/// A fixed cash budget for one calendar week.
///
/// Invariants:
/// - `total == remaining + spent`
/// - `week_start < week_end`; the pool covers `[week_start, week_end)` in UTC.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub week_start: NaiveDate,
    /// Exclusive.
    pub week_end: NaiveDate,
    pub total: Money,
    pub remaining: Money,
    pub spent: Money,
    pub created_at: DateTime<Utc>,
}

impl Pool {
    /// Whether `at` falls inside this pool's week.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        calendar::start_of_day(self.week_start) <= at && at < calendar::start_of_day(self.week_end)
    }

    pub fn overlaps(&self, week_start: NaiveDate, week_end: NaiveDate) -> bool {
        self.week_start < week_end && week_start < self.week_end
    }

    /// Month this pool's earnings are paid out in.
    pub fn month(&self) -> MonthKey {
        MonthKey::of(self.week_start)
    }

    pub fn balance(&self) -> pool_balance::State {
        pool_balance::State {
            total: self.total.cents(),
            remaining: self.remaining.cents(),
            spent: self.spent.cents(),
        }
    }

    /// Run one balance transition and write the result back.
    pub(crate) fn apply(&mut self, cmd: pool_balance::Command) -> Result<pool_balance::Effects> {
        let (post, effects) = pool_balance::step(&self.balance(), cmd)?;
        self.remaining = Money::from_cents(post.remaining);
        self.spent = Money::from_cents(post.spent);
        tracing::debug!(
            pool_id = %self.id,
            moved = %Money::from_cents(effects.moved),
            remaining = %self.remaining,
            "Pool balance updated"
        );
        Ok(effects)
    }
}

/// A dollar credit produced by one approved submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Earning {
    pub id: EarningId,
    pub user_id: UserId,
    pub pool_id: PoolId,
    pub submission_id: SubmissionId,
    /// Credited amount, already clamped to the pool's remaining balance.
    pub amount: Money,
    /// Amount the earning rules asked for before clamping.
    pub requested: Money,
    pub verified_count: u32,
    /// No earlier earning existed for this user in this pool.
    pub is_first_submission: bool,
    pub created_at: DateTime<Utc>,
}

impl Earning {
    pub fn was_clamped(&self) -> bool {
        self.amount < self.requested
    }
}

/// An approved submission as handed over by the review workflow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub user_id: UserId,
    pub verified_count: u32,
    pub approved_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Paid,
}

/// Amount owed to one user for one calendar month. Derived from earnings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyPayoutRequest {
    pub user_id: UserId,
    pub month: MonthKey,
    pub total: Money,
    pub status: PayoutStatus,
    /// PayPal address the payout is sent to.
    pub payee_email: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Member record as far as the ledger cares.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub full_name: String,
    pub paypal_email: Option<String>,
    /// Staff and influencer accounts never earn from the pool.
    #[serde(default)]
    pub excluded: bool,
}

// =============================================================================
// Errors
// =============================================================================

/// Ledger error type.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("No active pool at {at}")]
    NoActivePool { at: DateTime<Utc> },

    #[error("Insufficient funds: requested {requested}, remaining {remaining}")]
    InsufficientFunds { requested: Money, remaining: Money },

    #[error("Pool balance invariant: {0}")]
    PoolInvariant(#[from] pool_balance::Error),

    #[error("Pool not found: {id}")]
    PoolNotFound { id: PoolId },

    #[error("Week {week_start}..{week_end} overlaps existing pool {existing}")]
    OverlappingPool {
        week_start: NaiveDate,
        week_end: NaiveDate,
        existing: PoolId,
    },

    #[error("No payout request for user {user_id} in {month}")]
    PayoutNotFound { user_id: UserId, month: MonthKey },

    #[error("Payout request for user {user_id} in {month} is already paid")]
    PayoutAlreadyPaid { user_id: UserId, month: MonthKey },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn pool() -> Pool {
        Pool {
            id: PoolId::new_v4(),
            week_start: d(2025, 3, 3),
            week_end: d(2025, 3, 10),
            total: Money::from_dollars(250),
            remaining: Money::from_dollars(250),
            spent: Money::ZERO,
            created_at: calendar::start_of_day(d(2025, 3, 1)),
        }
    }

    #[test]
    fn pool_interval_is_half_open() {
        let p = pool();
        assert!(p.contains(calendar::start_of_day(d(2025, 3, 3))));
        assert!(p.contains(calendar::start_of_day(d(2025, 3, 10)) - chrono::Duration::seconds(1)));
        assert!(!p.contains(calendar::start_of_day(d(2025, 3, 10))));
        assert!(!p.contains(calendar::start_of_day(d(2025, 3, 2))));
    }

    #[test]
    fn overlap_detection() {
        let p = pool();
        assert!(p.overlaps(d(2025, 3, 9), d(2025, 3, 16)));
        assert!(!p.overlaps(d(2025, 3, 10), d(2025, 3, 17)));
        assert!(!p.overlaps(d(2025, 2, 24), d(2025, 3, 3)));
    }

    #[test]
    fn apply_failure_leaves_pool_untouched() {
        let mut p = pool();
        let before = p.clone();
        let err = p
            .apply(pool_balance::Command::Debit { amt: 25_001 })
            .unwrap_err();
        assert!(matches!(err, LedgerError::PoolInvariant(_)));
        assert_eq!(p, before);
    }

    #[test]
    fn ids_parse_from_strings() {
        let id = UserId::new_v4();
        assert_eq!(id.to_string().parse::<UserId>().unwrap(), id);
        assert!("not-a-uuid".parse::<SubmissionId>().is_err());
    }
}
