//! Earnings Recorder: approval events become pool-debited earnings.
//!
//! Both entry points here run inside a single store transaction opened by the caller,
//! so the earning row and the pool debit (or their reversal) commit together or not at
//! all.

use crate::{
    config::LedgerConfig, payout, pool, store::LedgerTables, Earning, EarningId, LedgerError,
    Money, Result, Submission, SubmissionId, UserId,
};
use chrono::{DateTime, Utc};

/// What an approval did to the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApprovalReceipt {
    /// New earning at the full requested amount.
    Recorded(Earning),
    /// New earning, capped at what the pool had left.
    Clamped(Earning),
    /// The submission already had an earning; nothing changed.
    Replayed(Earning),
    /// The account is excluded from earning; no row was written.
    Excluded { user_id: UserId },
}

impl ApprovalReceipt {
    pub fn earning(&self) -> Option<&Earning> {
        match self {
            Self::Recorded(e) | Self::Clamped(e) | Self::Replayed(e) => Some(e),
            Self::Excluded { .. } => None,
        }
    }

    pub fn is_clamped(&self) -> bool {
        matches!(self, Self::Clamped(_))
    }
}

/// Amount the earning rules grant before clamping.
pub fn requested_amount(config: &LedgerConfig, verified_count: u32) -> Money {
    if verified_count >= config.earnings.min_verified_count {
        config.earnings.flat_rate
    } else {
        Money::ZERO
    }
}

/// Record the earning for one approved submission.
pub fn record_approval(
    tables: &mut LedgerTables,
    config: &LedgerConfig,
    submission: &Submission,
    now: DateTime<Utc>,
) -> Result<ApprovalReceipt> {
    if let Some(existing) = tables.earning_for(&submission.id) {
        if existing.user_id != submission.user_id {
            return Err(LedgerError::InvalidInput(format!(
                "submission {} already credited to user {}, not {}",
                submission.id, existing.user_id, submission.user_id
            )));
        }
        return Ok(ApprovalReceipt::Replayed(existing.clone()));
    }

    if payout::is_excluded(tables, config, &submission.user_id) {
        return Ok(ApprovalReceipt::Excluded {
            user_id: submission.user_id,
        });
    }

    let pool_id = pool::current_pool(tables, submission.approved_at)?.id;
    let is_first_submission = tables
        .earnings_for_user(&submission.user_id)
        .all(|e| e.pool_id != pool_id);

    let pool = tables.pool_mut(&pool_id)?;
    let requested = requested_amount(config, submission.verified_count);
    let amount = requested.min(pool.remaining);
    pool::debit(pool, amount)?;
    let month = pool.month();

    let earning = Earning {
        id: EarningId::new_v4(),
        user_id: submission.user_id,
        pool_id,
        submission_id: submission.id,
        amount,
        requested,
        verified_count: submission.verified_count,
        is_first_submission,
        created_at: now,
    };
    tables.insert_earning(earning.clone())?;

    if config.earnings.refresh_payouts_on_change {
        payout::recompute_monthly_payout(tables, config, submission.user_id, month, now)?;
    }

    if earning.was_clamped() {
        Ok(ApprovalReceipt::Clamped(earning))
    } else {
        Ok(ApprovalReceipt::Recorded(earning))
    }
}

/// Undo the earning for `submission`, crediting its amount back to the pool.
///
/// Returns the removed earning, or `None` when the submission never earned.
pub fn reverse_approval(
    tables: &mut LedgerTables,
    config: &LedgerConfig,
    submission: &SubmissionId,
    now: DateTime<Utc>,
) -> Result<Option<Earning>> {
    let earning = match tables.remove_earning(submission) {
        Some(e) => e,
        None => return Ok(None),
    };

    let pool = tables.pool_mut(&earning.pool_id)?;
    pool::credit(pool, earning.amount)?;
    let month = pool.month();

    if config.earnings.refresh_payouts_on_change {
        payout::recompute_monthly_payout(tables, config, earning.user_id, month, now)?;
    }

    Ok(Some(earning))
}
