//! Ledger counters.
//!
//! Counts approval outcomes, reversals and payout recomputations so operators can tell a
//! quiet week from a broken approval path.
//!
//! # Usage
//!
//! ```rust,ignore
//! use puc_core::metrics::LedgerMetrics;
//!
//! let metrics = LedgerMetrics::new();
//! metrics.approvals_recorded.inc();
//! println!("{}", metrics.render_prometheus());
//! ```

use crate::{pool, store::LedgerTables, Money, PayoutStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A simple counter that can only increase.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counters for every ledger entry point.
#[derive(Debug, Default)]
pub struct LedgerMetrics {
    pub approvals_recorded: Counter,
    pub approvals_clamped: Counter,
    pub approvals_replayed: Counter,
    pub approvals_excluded: Counter,
    pub approvals_failed: Counter,
    pub reversals: Counter,
    pub payouts_recomputed: Counter,
}

/// Point-in-time copy of [`LedgerMetrics`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub approvals_recorded: u64,
    pub approvals_clamped: u64,
    pub approvals_replayed: u64,
    pub approvals_excluded: u64,
    pub approvals_failed: u64,
    pub reversals: u64,
    pub payouts_recomputed: u64,
}

impl LedgerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            approvals_recorded: self.approvals_recorded.get(),
            approvals_clamped: self.approvals_clamped.get(),
            approvals_replayed: self.approvals_replayed.get(),
            approvals_excluded: self.approvals_excluded.get(),
            approvals_failed: self.approvals_failed.get(),
            reversals: self.reversals.get(),
            payouts_recomputed: self.payouts_recomputed.get(),
        }
    }

    /// Render in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut out = String::new();

        out.push_str("# HELP puc_approvals_total Approval events by outcome.\n");
        out.push_str("# TYPE puc_approvals_total counter\n");
        for (outcome, value) in [
            ("recorded", s.approvals_recorded),
            ("clamped", s.approvals_clamped),
            ("replayed", s.approvals_replayed),
            ("excluded", s.approvals_excluded),
            ("failed", s.approvals_failed),
        ] {
            out.push_str(&format!(
                "puc_approvals_total{{outcome=\"{}\"}} {}\n",
                outcome, value
            ));
        }

        out.push_str("# HELP puc_reversals_total Approvals reversed.\n");
        out.push_str("# TYPE puc_reversals_total counter\n");
        out.push_str(&format!("puc_reversals_total {}\n", s.reversals));

        out.push_str("# HELP puc_payouts_recomputed_total Payout recomputations.\n");
        out.push_str("# TYPE puc_payouts_recomputed_total counter\n");
        out.push_str(&format!(
            "puc_payouts_recomputed_total {}\n",
            s.payouts_recomputed
        ));

        out
    }
}

/// Ledger-state gauges read from the committed tables.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerGauges {
    pub pools: u64,
    pub earnings: u64,
    /// `None` when no pool covers the sampling time.
    pub current_pool_remaining: Option<Money>,
    pub payouts_pending: u64,
    pub payouts_pending_total: Money,
    pub payouts_paid: u64,
}

impl LedgerGauges {
    pub fn sample(tables: &LedgerTables, now: DateTime<Utc>) -> Self {
        let pending: Vec<Money> = tables
            .payouts()
            .filter(|p| p.status == PayoutStatus::Pending)
            .map(|p| p.total)
            .collect();
        Self {
            pools: tables.pools().count() as u64,
            earnings: tables.earnings().count() as u64,
            current_pool_remaining: pool::current_pool(tables, now).ok().map(|p| p.remaining),
            payouts_pending: pending.len() as u64,
            payouts_pending_total: pending.into_iter().sum(),
            payouts_paid: tables
                .payouts()
                .filter(|p| p.status == PayoutStatus::Paid)
                .count() as u64,
        }
    }

    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        let mut gauge = |name: &str, help: &str, value: u64| {
            out.push_str(&format!("# HELP {name} {help}\n"));
            out.push_str(&format!("# TYPE {name} gauge\n"));
            out.push_str(&format!("{name} {value}\n"));
        };
        gauge("puc_pools", "Provisioned weekly pools.", self.pools);
        gauge("puc_earnings", "Recorded earnings.", self.earnings);
        if let Some(remaining) = self.current_pool_remaining {
            gauge(
                "puc_current_pool_remaining_cents",
                "Unspent balance of the active pool.",
                remaining.cents(),
            );
        }
        gauge(
            "puc_payouts_pending",
            "Pending monthly payout requests.",
            self.payouts_pending,
        );
        gauge(
            "puc_payouts_pending_cents",
            "Total owed by pending payout requests.",
            self.payouts_pending_total.cents(),
        );
        gauge("puc_payouts_paid", "Settled payout requests.", self.payouts_paid);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_increments() {
        let c = Counter::new();
        c.inc();
        c.inc();
        assert_eq!(c.get(), 2);
    }

    #[test]
    fn prometheus_output_labels_outcomes() {
        let metrics = LedgerMetrics::new();
        metrics.approvals_clamped.inc();
        metrics.reversals.inc();

        let text = metrics.render_prometheus();
        assert!(text.contains("puc_approvals_total{outcome=\"clamped\"} 1"));
        assert!(text.contains("puc_approvals_total{outcome=\"recorded\"} 0"));
        assert!(text.contains("puc_reversals_total 1"));
    }

    #[test]
    fn gauges_omit_current_pool_when_none_is_active() {
        let gauges = LedgerGauges::sample(&LedgerTables::default(), Utc::now());
        assert_eq!(gauges.pools, 0);
        assert_eq!(gauges.current_pool_remaining, None);

        let text = gauges.render_prometheus();
        assert!(text.contains("puc_payouts_pending 0"));
        assert!(!text.contains("puc_current_pool_remaining_cents"));
    }
}
