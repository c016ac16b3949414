//! Consistency audit over the ledger tables.
//!
//! Detects the drift a healthy ledger never shows: approved submissions without an
//! earning, payout requests that disagree with their earnings, pools whose balance
//! disagrees with the earnings debited from them, and overlapping pool weeks.
//! Detection is pure; the repairs live on [`crate::Ledger::repair`].

use crate::{
    config::LedgerConfig, payout, pool, store::LedgerTables,
    verified_kernels::pool_balance, LedgerError, MonthKey, Money, PayoutStatus, PoolId, Result,
    Submission, SubmissionId, UserId,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingEarning {
    pub submission_id: SubmissionId,
    pub user_id: UserId,
    pub verified_count: u32,
    pub approved_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutMismatch {
    pub user_id: UserId,
    pub month: MonthKey,
    /// Stored total, `None` when no request exists.
    pub current: Option<Money>,
    pub expected: Money,
    pub status: Option<PayoutStatus>,
}

impl PayoutMismatch {
    /// Paid requests are reported but never rewritten.
    pub fn is_repairable(&self) -> bool {
        self.status != Some(PayoutStatus::Paid)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolBalanceIssue {
    pub pool_id: PoolId,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub total: Money,
    pub remaining: Money,
    pub spent: Money,
    /// Sum of the earnings debited from this pool.
    pub earned: Money,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolOverlap {
    pub first: PoolId,
    pub second: PoolId,
}

/// Findings of one audit pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub missing_earnings: Vec<MissingEarning>,
    pub payout_mismatches: Vec<PayoutMismatch>,
    pub pool_balance_issues: Vec<PoolBalanceIssue>,
    pub overlapping_pools: Vec<PoolOverlap>,
}

impl AuditReport {
    pub fn issue_count(&self) -> usize {
        self.missing_earnings.len()
            + self.payout_mismatches.len()
            + self.pool_balance_issues.len()
            + self.overlapping_pools.len()
    }

    pub fn is_healthy(&self) -> bool {
        self.issue_count() == 0
    }
}

/// Run every check against the committed tables.
///
/// `approved` is the review workflow's list of approved submissions; the ledger does not
/// own submissions, so it cannot discover a missing earning on its own.
pub fn audit(
    tables: &LedgerTables,
    config: &LedgerConfig,
    approved: &[Submission],
) -> Result<AuditReport> {
    Ok(AuditReport {
        missing_earnings: missing_earnings(tables, config, approved),
        payout_mismatches: payout_mismatches(tables, config)?,
        pool_balance_issues: pool_balance_issues(tables),
        overlapping_pools: pool::overlapping_pools(tables)
            .into_iter()
            .map(|(first, second)| PoolOverlap { first, second })
            .collect(),
    })
}

pub fn missing_earnings(
    tables: &LedgerTables,
    config: &LedgerConfig,
    approved: &[Submission],
) -> Vec<MissingEarning> {
    approved
        .iter()
        .filter(|s| tables.earning_for(&s.id).is_none())
        .filter(|s| !payout::is_excluded(tables, config, &s.user_id))
        .map(|s| MissingEarning {
            submission_id: s.id,
            user_id: s.user_id,
            verified_count: s.verified_count,
            approved_at: s.approved_at,
        })
        .collect()
}

pub fn payout_mismatches(
    tables: &LedgerTables,
    config: &LedgerConfig,
) -> Result<Vec<PayoutMismatch>> {
    let mut keys: BTreeSet<(UserId, MonthKey)> =
        tables.payouts().map(|p| (p.user_id, p.month)).collect();
    for earning in tables.earnings() {
        if let Some(pool) = tables.pool(&earning.pool_id) {
            keys.insert((earning.user_id, pool.month()));
        }
    }

    let mut out = Vec::new();
    for (user, month) in keys {
        let expected = payout::expected_total(tables, config, &user, month)?;
        let stored = tables.payout(&user, month);
        let current = stored.map(|p| p.total);
        if current.unwrap_or(Money::ZERO) != expected {
            out.push(PayoutMismatch {
                user_id: user,
                month,
                current,
                expected,
                status: stored.map(|p| p.status),
            });
        }
    }
    Ok(out)
}

pub fn pool_balance_issues(tables: &LedgerTables) -> Vec<PoolBalanceIssue> {
    tables
        .pools()
        .filter_map(|p| {
            let earned: Money = tables.earnings_in_pool(&p.id).map(|e| e.amount).sum();
            let balanced = p.spent == earned
                && Some(p.remaining) == p.total.checked_sub(earned)
                && pool_balance::check_invariants(&p.balance()).is_ok();
            (!balanced).then(|| PoolBalanceIssue {
                pool_id: p.id,
                week_start: p.week_start,
                week_end: p.week_end,
                total: p.total,
                remaining: p.remaining,
                spent: p.spent,
                earned,
            })
        })
        .collect()
}

/// Reset a pool's `spent` to the sum of its earnings and `remaining` to the rest.
pub fn rederive_pool_balance(tables: &mut LedgerTables, pool_id: &PoolId) -> Result<()> {
    let earned: Money = tables.earnings_in_pool(pool_id).map(|e| e.amount).sum();
    let pool = tables.pool_mut(pool_id)?;
    let remaining = pool
        .total
        .checked_sub(earned)
        .ok_or(LedgerError::InsufficientFunds {
            requested: earned,
            remaining: pool.total,
        })?;
    pool.spent = earned;
    pool.remaining = remaining;
    pool_balance::check_invariants(&pool.balance())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{calendar, config::PoolConfig, earnings, Money, SubmissionId};
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        calendar::start_of_day(NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()) + Duration::hours(9)
    }

    fn setup() -> (LedgerTables, LedgerConfig) {
        let mut tables = LedgerTables::default();
        let config = LedgerConfig::default();
        pool::provision_week(&mut tables, &PoolConfig::default(), now().date_naive(), now())
            .unwrap();
        (tables, config)
    }

    fn submission() -> Submission {
        Submission {
            id: SubmissionId::new_v4(),
            user_id: UserId::new_v4(),
            verified_count: 12,
            approved_at: now(),
        }
    }

    #[test]
    fn clean_ledger_is_healthy() {
        let (mut tables, config) = setup();
        let sub = submission();
        earnings::record_approval(&mut tables, &config, &sub, now()).unwrap();

        let report = audit(&tables, &config, &[sub]).unwrap();
        assert!(report.is_healthy(), "{report:?}");
    }

    #[test]
    fn reports_approved_submission_without_earning() {
        let (tables, config) = setup();
        let sub = submission();
        let report = audit(&tables, &config, std::slice::from_ref(&sub)).unwrap();
        assert_eq!(report.missing_earnings.len(), 1);
        assert_eq!(report.missing_earnings[0].submission_id, sub.id);
    }

    #[test]
    fn reports_drifted_pool_and_rederives_it() {
        let (mut tables, config) = setup();
        let sub = submission();
        earnings::record_approval(&mut tables, &config, &sub, now()).unwrap();
        let pool_id = tables.earning_for(&sub.id).unwrap().pool_id;

        {
            let p = tables.pool_mut(&pool_id).unwrap();
            p.remaining = p.total;
            p.spent = Money::ZERO;
        }
        let issues = pool_balance_issues(&tables);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].earned, Money::from_dollars(5));

        rederive_pool_balance(&mut tables, &pool_id).unwrap();
        assert!(pool_balance_issues(&tables).is_empty());
        assert_eq!(tables.pool(&pool_id).unwrap().remaining, Money::from_dollars(245));
    }

    #[test]
    fn reports_missing_payout_request() {
        let (mut tables, _) = setup();
        let config = LedgerConfig::builder()
            .refresh_payouts_on_change(false)
            .build()
            .unwrap();
        let sub = submission();
        earnings::record_approval(&mut tables, &config, &sub, now()).unwrap();

        let mismatches = payout_mismatches(&tables, &config).unwrap();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].current, None);
        assert_eq!(mismatches[0].expected, Money::from_dollars(5));
        assert!(mismatches[0].is_repairable());
    }
}
