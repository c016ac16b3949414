//! Pool Ledger: weekly pool lookup, debit/credit and provisioning.
//!
//! Which pool is "current" is derived from its date range; there is no stored flag.

use crate::{
    calendar::{self, WEEK_DAYS},
    config::PoolConfig,
    store::LedgerTables,
    verified_kernels::pool_balance::Command,
    LedgerError, Money, Pool, PoolId, Result,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Precedence among pools covering the same instant; the smallest key wins.
fn precedence(pool: &Pool) -> (NaiveDate, DateTime<Utc>, PoolId) {
    (pool.week_start, pool.created_at, pool.id)
}

/// The pool whose `[week_start, week_end)` interval contains `now`.
pub fn current_pool(tables: &LedgerTables, now: DateTime<Utc>) -> Result<&Pool> {
    tables
        .pools()
        .filter(|p| p.contains(now))
        .min_by_key(|p| precedence(p))
        .ok_or(LedgerError::NoActivePool { at: now })
}

/// Move `amount` from the pool's remaining balance to spent.
///
/// Callers clamp; an amount above `remaining` is `InsufficientFunds`.
pub fn debit(pool: &mut Pool, amount: Money) -> Result<()> {
    if amount > pool.remaining {
        return Err(LedgerError::InsufficientFunds {
            requested: amount,
            remaining: pool.remaining,
        });
    }
    pool.apply(Command::Debit {
        amt: amount.cents(),
    })?;
    Ok(())
}

/// Return `amount` from spent to the pool's remaining balance.
pub fn credit(pool: &mut Pool, amount: Money) -> Result<()> {
    pool.apply(Command::Credit {
        amt: amount.cents(),
    })?;
    Ok(())
}

/// Result of provisioning one week.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Provisioned {
    pub pool: Pool,
    /// False when an identical week already existed.
    pub created: bool,
}

/// Create the pool for the week containing `date`, aligned to the configured week start.
///
/// Idempotent for an already provisioned week; any other overlap is rejected.
pub fn provision_week(
    tables: &mut LedgerTables,
    config: &PoolConfig,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Provisioned> {
    let week_start = calendar::align_to_week_start(date, config.week_start);
    let week_end = week_start + Duration::days(WEEK_DAYS);

    if let Some(existing) = tables.pools().find(|p| p.overlaps(week_start, week_end)) {
        if existing.week_start == week_start && existing.week_end == week_end {
            return Ok(Provisioned {
                pool: existing.clone(),
                created: false,
            });
        }
        return Err(LedgerError::OverlappingPool {
            week_start,
            week_end,
            existing: existing.id,
        });
    }

    let pool = Pool {
        id: PoolId::new_v4(),
        week_start,
        week_end,
        total: config.weekly_amount,
        remaining: config.weekly_amount,
        spent: Money::ZERO,
        created_at: now,
    };
    tables.insert_pool(pool.clone());
    tracing::info!(
        pool_id = %pool.id,
        week_start = %week_start,
        total = %pool.total,
        "Provisioned weekly pool"
    );
    Ok(Provisioned {
        pool,
        created: true,
    })
}

/// Provision the current week and the `weeks_ahead` following weeks.
///
/// Returns only the pools created by this call.
pub fn ensure_pools_ahead(
    tables: &mut LedgerTables,
    config: &PoolConfig,
    now: DateTime<Utc>,
    weeks_ahead: u32,
) -> Result<Vec<Pool>> {
    let first = now.date_naive();
    let mut created = Vec::new();
    for week in 0..=i64::from(weeks_ahead) {
        let date = first + Duration::days(week * WEEK_DAYS);
        let provisioned = provision_week(tables, config, date, now)?;
        if provisioned.created {
            created.push(provisioned.pool);
        }
    }
    Ok(created)
}

/// Pairs of pools whose weeks overlap.
pub fn overlapping_pools(tables: &LedgerTables) -> Vec<(PoolId, PoolId)> {
    let mut pools: Vec<&Pool> = tables.pools().collect();
    pools.sort_by_key(|p| precedence(p));
    let mut pairs = Vec::new();
    for (i, a) in pools.iter().enumerate() {
        for b in &pools[i + 1..] {
            if a.overlaps(b.week_start, b.week_end) {
                pairs.push((a.id, b.id));
            }
        }
    }
    pairs
}

/// Pools that repeat an earlier pool's exact week and never earned anything.
///
/// The earliest pool of each week is kept, so approvals keep resolving to the same pool.
pub fn removable_duplicates(tables: &LedgerTables) -> Vec<PoolId> {
    let mut pools: Vec<&Pool> = tables.pools().collect();
    pools.sort_by_key(|p| precedence(p));
    pools
        .iter()
        .enumerate()
        .filter(|(i, p)| {
            pools[..*i]
                .iter()
                .any(|k| k.week_start == p.week_start && k.week_end == p.week_end)
        })
        .filter(|(_, p)| tables.earnings_in_pool(&p.id).next().is_none())
        .map(|(_, p)| p.id)
        .collect()
}

/// Delete one pool reported by [`removable_duplicates`].
pub fn remove_duplicate(tables: &mut LedgerTables, id: &PoolId) -> Result<Pool> {
    if !removable_duplicates(tables).contains(id) {
        return Err(LedgerError::InvalidInput(format!(
            "pool {id} is not an unused duplicate week"
        )));
    }
    tables
        .remove_pool(id)
        .ok_or(LedgerError::PoolNotFound { id: *id })
}
