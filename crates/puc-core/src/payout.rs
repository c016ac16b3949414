//! Payout Aggregator: monthly payout requests derived from earnings.
//!
//! A payout request is a materialized sum, not a state machine of its own. Recomputing it
//! any number of times against unchanged earnings yields the same request. The only
//! authored transition is pending -> paid.

use crate::{
    config::LedgerConfig, store::LedgerTables, LedgerError, MonthKey, MonthlyPayoutRequest,
    Money, PayoutStatus, Result, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Whether `user` is permanently excluded from earning and payouts.
pub fn is_excluded(tables: &LedgerTables, config: &LedgerConfig, user: &UserId) -> bool {
    config.payout.excluded_users.contains(user)
        || tables.user(user).map(|u| u.excluded).unwrap_or(false)
}

/// Sum of `user`'s earnings whose pool week starts inside `month`.
pub fn expected_total(
    tables: &LedgerTables,
    config: &LedgerConfig,
    user: &UserId,
    month: MonthKey,
) -> Result<Money> {
    if is_excluded(tables, config, user) {
        return Ok(Money::ZERO);
    }
    let mut amounts = Vec::new();
    for earning in tables.earnings_for_user(user) {
        let pool = tables
            .pool(&earning.pool_id)
            .ok_or(LedgerError::PoolNotFound {
                id: earning.pool_id,
            })?;
        if pool.month() == month {
            amounts.push(earning.amount);
        }
    }
    Ok(amounts.into_iter().sum())
}

/// Recompute the payout request for `(user, month)` from current earnings.
///
/// - A zero total creates nothing and drops a stale pending request.
/// - A paid request is never rewritten; it is returned as is.
/// - An unchanged pending request is returned without touching `updated_at`.
pub fn recompute_monthly_payout(
    tables: &mut LedgerTables,
    config: &LedgerConfig,
    user: UserId,
    month: MonthKey,
    now: DateTime<Utc>,
) -> Result<Option<MonthlyPayoutRequest>> {
    let total = expected_total(tables, config, &user, month)?;

    if let Some(existing) = tables.payout(&user, month) {
        if existing.status == PayoutStatus::Paid {
            if existing.total != total {
                tracing::warn!(
                    user_id = %user,
                    month = %month,
                    paid = %existing.total,
                    expected = %total,
                    "Paid payout request differs from earnings"
                );
            }
            return Ok(Some(existing.clone()));
        }
    }

    if total.is_zero() {
        if tables.payout(&user, month).is_some() {
            tables.remove_payout(&user, month);
            tracing::info!(user_id = %user, month = %month, "Removed empty payout request");
        }
        return Ok(None);
    }

    let payee_email = tables.user(&user).and_then(|u| u.paypal_email.clone());
    if let Some(existing) = tables.payout(&user, month) {
        if existing.total == total && existing.payee_email == payee_email {
            return Ok(Some(existing.clone()));
        }
    }

    let request = MonthlyPayoutRequest {
        user_id: user,
        month,
        total,
        status: PayoutStatus::Pending,
        payee_email,
        updated_at: now,
        paid_at: None,
    };
    tables.upsert_payout(request.clone());
    tracing::info!(user_id = %user, month = %month, total = %total, "Upserted payout request");
    Ok(Some(request))
}

/// Recompute every user with earnings or a payout request in `month`.
pub fn recompute_month(
    tables: &mut LedgerTables,
    config: &LedgerConfig,
    month: MonthKey,
    now: DateTime<Utc>,
) -> Result<Vec<MonthlyPayoutRequest>> {
    let mut users: BTreeSet<UserId> = tables
        .payouts()
        .filter(|p| p.month == month)
        .map(|p| p.user_id)
        .collect();
    for earning in tables.earnings() {
        if tables.pool(&earning.pool_id).map(|p| p.month()) == Some(month) {
            users.insert(earning.user_id);
        }
    }

    let mut out = Vec::new();
    for user in users {
        if let Some(request) = recompute_monthly_payout(tables, config, user, month, now)? {
            out.push(request);
        }
    }
    Ok(out)
}

/// Record that the payout for `(user, month)` was sent.
pub fn mark_paid(
    tables: &mut LedgerTables,
    user: UserId,
    month: MonthKey,
    now: DateTime<Utc>,
) -> Result<MonthlyPayoutRequest> {
    let request = tables
        .payout_mut(&user, month)
        .ok_or(LedgerError::PayoutNotFound {
            user_id: user,
            month,
        })?;
    if request.status == PayoutStatus::Paid {
        return Err(LedgerError::PayoutAlreadyPaid {
            user_id: user,
            month,
        });
    }
    request.status = PayoutStatus::Paid;
    request.paid_at = Some(now);
    request.updated_at = now;
    Ok(request.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{calendar, config::PoolConfig, earnings, pool, Submission, SubmissionId, UserProfile};
    use chrono::{Duration, NaiveDate};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn approve(tables: &mut LedgerTables, config: &LedgerConfig, user: UserId, day: NaiveDate) {
        let sub = Submission {
            id: SubmissionId::new_v4(),
            user_id: user,
            verified_count: 20,
            approved_at: calendar::start_of_day(day) + Duration::hours(8),
        };
        earnings::record_approval(tables, config, &sub, sub.approved_at).unwrap();
    }

    fn setup() -> LedgerTables {
        let mut tables = LedgerTables::default();
        let now = calendar::start_of_day(d(2025, 3, 1));
        for week in [d(2025, 3, 24), d(2025, 3, 31), d(2025, 4, 7)] {
            pool::provision_week(&mut tables, &PoolConfig::default(), week, now).unwrap();
        }
        tables
    }

    #[test]
    fn straddling_week_counts_toward_its_start_month() {
        let config = LedgerConfig::builder()
            .refresh_payouts_on_change(false)
            .build()
            .unwrap();
        let mut tables = setup();
        let user = UserId::new_v4();
        approve(&mut tables, &config, user, d(2025, 3, 25));
        approve(&mut tables, &config, user, d(2025, 4, 2));
        approve(&mut tables, &config, user, d(2025, 4, 8));

        let march = MonthKey::new(2025, 3).unwrap();
        let april = MonthKey::new(2025, 4).unwrap();
        assert_eq!(expected_total(&tables, &config, &user, march).unwrap(), Money::from_dollars(10));
        assert_eq!(expected_total(&tables, &config, &user, april).unwrap(), Money::from_dollars(5));
    }

    #[test]
    fn payee_email_comes_from_profile() {
        let config = LedgerConfig::default();
        let mut tables = setup();
        let user = UserId::new_v4();
        tables.upsert_user(UserProfile {
            id: user,
            full_name: "Sam Rivera".into(),
            paypal_email: Some("sam@example.com".into()),
            excluded: false,
        });
        approve(&mut tables, &config, user, d(2025, 3, 25));

        let request = tables.payout(&user, MonthKey::new(2025, 3).unwrap()).unwrap();
        assert_eq!(request.payee_email.as_deref(), Some("sam@example.com"));
        assert_eq!(request.status, PayoutStatus::Pending);
    }

    #[test]
    fn mark_paid_is_one_way() {
        let config = LedgerConfig::default();
        let mut tables = setup();
        let user = UserId::new_v4();
        approve(&mut tables, &config, user, d(2025, 3, 25));
        let march = MonthKey::new(2025, 3).unwrap();
        let now = calendar::start_of_day(d(2025, 4, 1));

        let paid = mark_paid(&mut tables, user, march, now).unwrap();
        assert_eq!(paid.status, PayoutStatus::Paid);
        assert_eq!(paid.paid_at, Some(now));

        let err = mark_paid(&mut tables, user, march, now).unwrap_err();
        assert!(matches!(err, LedgerError::PayoutAlreadyPaid { .. }));
    }
}
