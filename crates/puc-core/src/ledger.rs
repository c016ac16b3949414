//! The ledger facade: one transaction per entry point, plus logging and metrics.
//!
//! # Example
//!
//! ```rust,ignore
//! use puc_core::{InMemoryStore, Ledger, LedgerConfig};
//!
//! let ledger = Ledger::new(InMemoryStore::new(), LedgerConfig::default())?;
//! ledger.ensure_pools_ahead(chrono::Utc::now(), 1)?;
//! let receipt = ledger.record_approval(&submission)?;
//! ```

use crate::{
    audit::{self, AuditReport},
    config::LedgerConfig,
    earnings::{self, ApprovalReceipt},
    metrics::{LedgerGauges, LedgerMetrics},
    payout, pool,
    store::LedgerStore,
    Earning, LedgerError, MonthKey, MonthlyPayoutRequest, Pool, PoolId, Result, Submission,
    SubmissionId, UserId, UserProfile,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Weekly-pool earnings ledger over a transactional store.
pub struct Ledger<S> {
    store: S,
    config: LedgerConfig,
    metrics: Arc<LedgerMetrics>,
}

/// What a failed repair step was working on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepairTarget {
    Submission { submission_id: SubmissionId },
    Payout { user_id: UserId, month: MonthKey },
    Pool { pool_id: PoolId },
}

impl fmt::Display for RepairTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submission { submission_id } => write!(f, "submission {submission_id}"),
            Self::Payout { user_id, month } => write!(f, "payout {user_id} {month}"),
            Self::Pool { pool_id } => write!(f, "pool {pool_id}"),
        }
    }
}

/// A repair step that failed. The rest of the pass still runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairFailure {
    pub target: RepairTarget,
    pub error: String,
}

/// Outcome of [`Ledger::repair`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairSummary {
    pub dry_run: bool,
    pub before: AuditReport,
    /// Findings left after the repairs (equal to `before` on a dry run).
    pub after: AuditReport,
    /// Duplicate pool weeks removed.
    pub duplicates_fixed: usize,
    pub earnings_fixed: usize,
    pub payouts_fixed: usize,
    pub pools_fixed: usize,
    pub failures: Vec<RepairFailure>,
}

impl RepairSummary {
    /// Nothing left to fix and no step failed.
    pub fn is_clean(&self) -> bool {
        self.after.is_healthy() && self.failures.is_empty()
    }

    fn fail(&mut self, target: RepairTarget, error: LedgerError) {
        error!(step = %target, error = %error, "Repair step failed");
        self.failures.push(RepairFailure {
            target,
            error: error.to_string(),
        });
    }
}

impl<S: LedgerStore> Ledger<S> {
    pub fn new(store: S, config: LedgerConfig) -> Result<Self> {
        Self::with_metrics(store, config, Arc::new(LedgerMetrics::new()))
    }

    pub fn with_metrics(store: S, config: LedgerConfig, metrics: Arc<LedgerMetrics>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            metrics,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn metrics(&self) -> Arc<LedgerMetrics> {
        Arc::clone(&self.metrics)
    }

    // =========================================================================
    // Earnings Recorder
    // =========================================================================

    /// Credit an approved submission from the pool active at its approval time.
    ///
    /// Safe to replay: a submission that already earned returns `Replayed` and changes
    /// nothing. Every failure is logged and returned; nothing is committed on failure.
    pub fn record_approval(&self, submission: &Submission) -> Result<ApprovalReceipt> {
        let now = Utc::now();
        let result = self
            .store
            .transact(|t| earnings::record_approval(t, &self.config, submission, now));

        match &result {
            Ok(ApprovalReceipt::Recorded(e)) => {
                self.metrics.approvals_recorded.inc();
                info!(
                    submission_id = %e.submission_id,
                    user_id = %e.user_id,
                    pool_id = %e.pool_id,
                    amount = %e.amount,
                    first_this_week = e.is_first_submission,
                    "Recorded earning"
                );
            }
            Ok(ApprovalReceipt::Clamped(e)) => {
                self.metrics.approvals_recorded.inc();
                self.metrics.approvals_clamped.inc();
                warn!(
                    submission_id = %e.submission_id,
                    user_id = %e.user_id,
                    pool_id = %e.pool_id,
                    requested = %e.requested,
                    credited = %e.amount,
                    "Pool short of funds, earning clamped"
                );
            }
            Ok(ApprovalReceipt::Replayed(e)) => {
                self.metrics.approvals_replayed.inc();
                debug!(submission_id = %e.submission_id, "Approval replayed, earning exists");
            }
            Ok(ApprovalReceipt::Excluded { user_id }) => {
                self.metrics.approvals_excluded.inc();
                info!(
                    submission_id = %submission.id,
                    user_id = %user_id,
                    "Excluded account, no earning recorded"
                );
            }
            Err(e @ LedgerError::NoActivePool { .. }) => {
                self.metrics.approvals_failed.inc();
                error!(
                    submission_id = %submission.id,
                    approved_at = %submission.approved_at,
                    error = %e,
                    "No pool covers approval time"
                );
            }
            Err(e) => {
                self.metrics.approvals_failed.inc();
                error!(submission_id = %submission.id, error = %e, "Failed to record approval");
            }
        }
        result
    }

    /// Remove a submission's earning and return its amount to the pool.
    pub fn reverse_approval(&self, submission: &SubmissionId) -> Result<Option<Earning>> {
        let now = Utc::now();
        let result = self
            .store
            .transact(|t| earnings::reverse_approval(t, &self.config, submission, now));

        match &result {
            Ok(Some(e)) => {
                self.metrics.reversals.inc();
                info!(
                    submission_id = %submission,
                    pool_id = %e.pool_id,
                    amount = %e.amount,
                    "Reversed earning"
                );
            }
            Ok(None) => debug!(submission_id = %submission, "Nothing to reverse"),
            Err(e) => error!(submission_id = %submission, error = %e, "Failed to reverse approval"),
        }
        result
    }

    // =========================================================================
    // Payout Aggregator
    // =========================================================================

    /// Re-derive `(user, month)`'s payout request from current earnings.
    pub fn recompute_monthly_payout(
        &self,
        user: UserId,
        month: MonthKey,
    ) -> Result<Option<MonthlyPayoutRequest>> {
        let now = Utc::now();
        let result = self.store.transact(|t| {
            payout::recompute_monthly_payout(t, &self.config, user, month, now)
        });
        match &result {
            Ok(_) => self.metrics.payouts_recomputed.inc(),
            Err(e) => error!(user_id = %user, month = %month, error = %e, "Payout recompute failed"),
        }
        result
    }

    /// Recompute every payout request in `month`.
    pub fn recompute_month(&self, month: MonthKey) -> Result<Vec<MonthlyPayoutRequest>> {
        let now = Utc::now();
        let requests = self
            .store
            .transact(|t| payout::recompute_month(t, &self.config, month, now))?;
        self.metrics.payouts_recomputed.inc();
        info!(month = %month, requests = requests.len(), "Recomputed month");
        Ok(requests)
    }

    pub fn mark_payout_paid(&self, user: UserId, month: MonthKey) -> Result<MonthlyPayoutRequest> {
        let now = Utc::now();
        let request = self
            .store
            .transact(|t| payout::mark_paid(t, user, month, now))?;
        info!(user_id = %user, month = %month, total = %request.total, "Payout marked paid");
        Ok(request)
    }

    pub fn payouts(&self, month: Option<MonthKey>) -> Result<Vec<MonthlyPayoutRequest>> {
        self.store.read(|t| {
            t.payouts()
                .filter(|p| month.map_or(true, |m| p.month == m))
                .cloned()
                .collect()
        })
    }

    // =========================================================================
    // Pools
    // =========================================================================

    /// The pool covering `now`.
    pub fn current_pool(&self, now: DateTime<Utc>) -> Result<Pool> {
        self.store
            .read(|t| pool::current_pool(t, now).cloned())?
    }

    pub fn pool(&self, id: &PoolId) -> Result<Pool> {
        self.store
            .read(|t| t.pool(id).cloned())?
            .ok_or(LedgerError::PoolNotFound { id: *id })
    }

    pub fn pools(&self) -> Result<Vec<Pool>> {
        self.store.read(|t| {
            let mut pools: Vec<Pool> = t.pools().cloned().collect();
            pools.sort_by_key(|p| p.week_start);
            pools
        })
    }

    pub fn provision_week(&self, date: NaiveDate) -> Result<pool::Provisioned> {
        let now = Utc::now();
        self.store
            .transact(|t| pool::provision_week(t, &self.config.pool, date, now))
    }

    /// Make sure the week containing `now` and the next `weeks_ahead` weeks have pools.
    pub fn ensure_pools_ahead(&self, now: DateTime<Utc>, weeks_ahead: u32) -> Result<Vec<Pool>> {
        self.store
            .transact(|t| pool::ensure_pools_ahead(t, &self.config.pool, now, weeks_ahead))
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub fn register_user(&self, profile: UserProfile) -> Result<()> {
        if profile.full_name.trim().is_empty() {
            return Err(LedgerError::InvalidInput("full_name must not be empty".into()));
        }
        let id = profile.id;
        let excluded = profile.excluded;
        self.store.transact(|t| {
            t.upsert_user(profile);
            Ok(())
        })?;
        info!(user_id = %id, excluded, "Registered user");
        Ok(())
    }

    pub fn earnings_for_user(&self, user: &UserId) -> Result<Vec<Earning>> {
        self.store.read(|t| {
            let mut out: Vec<Earning> = t.earnings_for_user(user).cloned().collect();
            out.sort_by_key(|e| e.created_at);
            out
        })
    }

    pub fn earning_for(&self, submission: &SubmissionId) -> Result<Option<Earning>> {
        self.store.read(|t| t.earning_for(submission).cloned())
    }

    pub fn gauges(&self, now: DateTime<Utc>) -> Result<LedgerGauges> {
        self.store.read(|t| LedgerGauges::sample(t, now))
    }

    // =========================================================================
    // Consistency
    // =========================================================================

    pub fn audit(&self, approved: &[Submission]) -> Result<AuditReport> {
        self.store
            .read(|t| audit::audit(t, &self.config, approved))?
    }

    /// Fix what the audit finds: drop duplicate pool weeks that never earned, reprocess
    /// missing earnings, recompute drifted pending payouts, then re-derive drifted pool
    /// balances. A failed step is recorded in `failures` and the pass goes on. With
    /// `dry_run` nothing is written.
    pub fn repair(&self, approved: &[Submission], dry_run: bool) -> Result<RepairSummary> {
        let before = self.audit(approved)?;
        let mut summary = RepairSummary {
            dry_run,
            before: before.clone(),
            after: before.clone(),
            ..Default::default()
        };
        if dry_run || before.is_healthy() {
            return Ok(summary);
        }

        let duplicates = self.store.read(pool::removable_duplicates)?;
        for pool_id in &duplicates {
            match self
                .store
                .transact(|t| pool::remove_duplicate(t, pool_id))
            {
                Ok(removed) => {
                    summary.duplicates_fixed += 1;
                    warn!(
                        pool_id = %pool_id,
                        week_start = %removed.week_start,
                        "Removed duplicate pool"
                    );
                }
                Err(e) => summary.fail(RepairTarget::Pool { pool_id: *pool_id }, e),
            }
        }

        for missing in &before.missing_earnings {
            let Some(submission) = approved.iter().find(|s| s.id == missing.submission_id) else {
                continue;
            };
            match self.record_approval(submission) {
                Ok(_) => summary.earnings_fixed += 1,
                Err(e) => summary.fail(
                    RepairTarget::Submission {
                        submission_id: submission.id,
                    },
                    e,
                ),
            }
        }

        let now = Utc::now();
        let mismatches = self
            .store
            .read(|t| audit::payout_mismatches(t, &self.config))??;
        for mismatch in mismatches.iter().filter(|m| m.is_repairable()) {
            match self.store.transact(|t| {
                payout::recompute_monthly_payout(t, &self.config, mismatch.user_id, mismatch.month, now)
            }) {
                Ok(_) => summary.payouts_fixed += 1,
                Err(e) => summary.fail(
                    RepairTarget::Payout {
                        user_id: mismatch.user_id,
                        month: mismatch.month,
                    },
                    e,
                ),
            }
        }

        let drifted = self.store.read(audit::pool_balance_issues)?;
        for issue in &drifted {
            match self
                .store
                .transact(|t| audit::rederive_pool_balance(t, &issue.pool_id))
            {
                Ok(()) => {
                    summary.pools_fixed += 1;
                    warn!(
                        pool_id = %issue.pool_id,
                        was_remaining = %issue.remaining,
                        earned = %issue.earned,
                        "Re-derived pool balance"
                    );
                }
                Err(e) => summary.fail(
                    RepairTarget::Pool {
                        pool_id: issue.pool_id,
                    },
                    e,
                ),
            }
        }

        summary.after = self.audit(approved)?;
        info!(
            found = before.issue_count(),
            remaining = summary.after.issue_count(),
            failures = summary.failures.len(),
            "Repair pass finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{calendar, store::LedgerTables, EarningId, InMemoryStore, Money};
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that fails every transaction after the first `budget`.
    struct FailingStore {
        inner: InMemoryStore,
        budget: AtomicUsize,
    }

    impl FailingStore {
        fn after(budget: usize) -> Self {
            Self {
                inner: InMemoryStore::new(),
                budget: AtomicUsize::new(budget),
            }
        }
    }

    impl LedgerStore for FailingStore {
        fn read<T>(&self, f: impl FnOnce(&LedgerTables) -> T) -> Result<T> {
            self.inner.read(f)
        }

        fn transact<T>(&self, f: impl FnOnce(&mut LedgerTables) -> Result<T>) -> Result<T> {
            let left = self.budget.load(Ordering::SeqCst);
            if left == 0 {
                return Err(LedgerError::StorageError("disk full".into()));
            }
            self.budget.store(left - 1, Ordering::SeqCst);
            self.inner.transact(f)
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn ledger() -> Ledger<InMemoryStore> {
        let ledger = Ledger::new(InMemoryStore::new(), LedgerConfig::default()).unwrap();
        ledger.provision_week(monday()).unwrap();
        ledger
    }

    fn approval(user: UserId) -> Submission {
        Submission {
            id: SubmissionId::new_v4(),
            user_id: user,
            verified_count: 18,
            approved_at: calendar::start_of_day(monday()) + Duration::hours(10),
        }
    }

    #[test]
    fn metrics_track_outcomes() {
        let ledger = ledger();
        let sub = approval(UserId::new_v4());
        ledger.record_approval(&sub).unwrap();
        ledger.record_approval(&sub).unwrap();

        let orphan = Submission {
            approved_at: calendar::start_of_day(monday()) - Duration::days(30),
            ..approval(UserId::new_v4())
        };
        assert!(ledger.record_approval(&orphan).is_err());

        let m = ledger.metrics().snapshot();
        assert_eq!(m.approvals_recorded, 1);
        assert_eq!(m.approvals_replayed, 1);
        assert_eq!(m.approvals_failed, 1);
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let mut config = LedgerConfig::default();
        config.earnings.flat_rate = Money::ZERO;
        assert!(Ledger::new(InMemoryStore::new(), config).is_err());
    }

    #[test]
    fn excluded_user_gets_no_earning_and_no_debit() {
        let ledger = ledger();
        let staff = UserId::new_v4();
        ledger
            .register_user(UserProfile {
                id: staff,
                full_name: "Coach".into(),
                paypal_email: None,
                excluded: true,
            })
            .unwrap();

        let sub = approval(staff);
        let receipt = ledger.record_approval(&sub).unwrap();
        assert_eq!(receipt, ApprovalReceipt::Excluded { user_id: staff });
        assert!(ledger.earning_for(&sub.id).unwrap().is_none());
        let pool = ledger.current_pool(sub.approved_at).unwrap();
        assert_eq!(pool.remaining, pool.total);
    }

    #[test]
    fn dry_run_repair_writes_nothing() {
        let ledger = ledger();
        let sub = approval(UserId::new_v4());
        let summary = ledger.repair(std::slice::from_ref(&sub), true).unwrap();
        assert_eq!(summary.before.missing_earnings.len(), 1);
        assert_eq!(summary.earnings_fixed, 0);
        assert!(ledger.earning_for(&sub.id).unwrap().is_none());
    }

    #[test]
    fn repair_reprocesses_missing_earnings() {
        let ledger = ledger();
        let sub = approval(UserId::new_v4());
        let summary = ledger.repair(std::slice::from_ref(&sub), false).unwrap();
        assert_eq!(summary.earnings_fixed, 1);
        assert!(summary.after.is_healthy(), "{:?}", summary.after);
        assert!(ledger.earning_for(&sub.id).unwrap().is_some());
    }

    #[test]
    fn repair_removes_unused_duplicate_week() {
        let ledger = ledger();
        let kept = ledger.current_pool(approval(UserId::new_v4()).approved_at).unwrap();
        let dup = Pool {
            id: PoolId::new_v4(),
            created_at: kept.created_at + Duration::seconds(1),
            ..kept.clone()
        };
        ledger
            .store()
            .transact(|t| {
                t.insert_pool(dup.clone());
                Ok(())
            })
            .unwrap();
        assert_eq!(ledger.audit(&[]).unwrap().overlapping_pools.len(), 1);

        let summary = ledger.repair(&[], false).unwrap();
        assert_eq!(summary.duplicates_fixed, 1);
        assert!(summary.is_clean(), "{summary:?}");
        let pools = ledger.pools().unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].id, kept.id);
    }

    #[test]
    fn duplicate_week_with_earnings_is_kept_and_reported() {
        let ledger = ledger();
        let sub = approval(UserId::new_v4());
        let kept = ledger.current_pool(sub.approved_at).unwrap();
        let dup = Pool {
            id: PoolId::new_v4(),
            created_at: kept.created_at + Duration::seconds(1),
            ..kept.clone()
        };
        // An earning already landed in the later pool, so it must stay.
        let earning = Earning {
            id: EarningId::new_v4(),
            user_id: sub.user_id,
            pool_id: dup.id,
            submission_id: sub.id,
            amount: Money::from_dollars(5),
            requested: Money::from_dollars(5),
            verified_count: sub.verified_count,
            is_first_submission: true,
            created_at: sub.approved_at,
        };
        ledger
            .store()
            .transact(|t| {
                t.insert_pool(dup.clone());
                pool::debit(t.pool_mut(&dup.id)?, earning.amount)?;
                t.insert_earning(earning.clone())
            })
            .unwrap();

        let summary = ledger.repair(std::slice::from_ref(&sub), false).unwrap();
        assert_eq!(summary.duplicates_fixed, 0);
        assert_eq!(summary.after.overlapping_pools.len(), 1);
        assert!(!summary.is_clean());
        assert_eq!(ledger.pools().unwrap().len(), 2);
    }

    #[test]
    fn failed_payout_step_is_recorded_and_pass_continues() {
        // Two transactions succeed: provisioning and the approval.
        let config = LedgerConfig::builder()
            .refresh_payouts_on_change(false)
            .build()
            .unwrap();
        let ledger = Ledger::new(FailingStore::after(2), config).unwrap();
        ledger.provision_week(monday()).unwrap();
        let user = UserId::new_v4();
        ledger.record_approval(&approval(user)).unwrap();

        let summary = ledger.repair(&[], false).unwrap();
        assert_eq!(summary.payouts_fixed, 0);
        assert_eq!(
            summary.failures,
            vec![RepairFailure {
                target: RepairTarget::Payout {
                    user_id: user,
                    month: MonthKey::new(2025, 3).unwrap(),
                },
                error: "Storage error: disk full".into(),
            }]
        );
        assert_eq!(summary.after.payout_mismatches.len(), 1);
        assert!(!summary.is_clean());
    }
}
