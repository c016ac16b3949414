//! `puc audit` command implementation

use anyhow::{Context, Result};
use puc_adapters::load_submissions;
use puc_core::{audit::AuditReport, LedgerConfig};
use std::path::Path;

use super::{open_ledger, print_json};

fn print_report(report: &AuditReport) {
    if report.is_healthy() {
        println!("✅ Ledger consistent");
        return;
    }

    println!("⚠️  {} issue(s)", report.issue_count());
    for m in &report.missing_earnings {
        println!(
            "   missing earning: submission {} by {} approved {}",
            m.submission_id, m.user_id, m.approved_at
        );
    }
    for m in &report.payout_mismatches {
        let current = m
            .current
            .map(|c| c.to_string())
            .unwrap_or_else(|| "none".into());
        let note = if m.is_repairable() { "" } else { " (paid, not repairable)" };
        println!(
            "   payout mismatch: {} {} stored {} expected {}{}",
            m.user_id, m.month, current, m.expected, note
        );
    }
    for p in &report.pool_balance_issues {
        println!(
            "   pool drift: {} ({}..{}) remaining {} spent {} earned {}",
            p.pool_id, p.week_start, p.week_end, p.remaining, p.spent, p.earned
        );
    }
    for o in &report.overlapping_pools {
        println!("   overlapping pools: {} and {}", o.first, o.second);
    }
}

/// Audit (and optionally repair) the ledger. Fails when issues were found or remain
/// after the repair, so scheduled runs can alert on the exit status.
pub fn run(
    ledger: &Path,
    config: LedgerConfig,
    submissions: &Path,
    repair: bool,
    dry_run: bool,
    format: &str,
) -> Result<()> {
    let approved = load_submissions(submissions)
        .with_context(|| format!("Failed to load submissions {}", submissions.display()))?;
    let ledger = open_ledger(ledger, config)?;

    if !repair {
        let report = ledger.audit(&approved)?;
        match format {
            "json" => print_json(&report)?,
            _ => print_report(&report),
        }
        if !report.is_healthy() {
            anyhow::bail!("audit found {} issue(s)", report.issue_count());
        }
        return Ok(());
    }

    let summary = ledger.repair(&approved, dry_run)?;
    if format == "json" {
        print_json(&summary)?;
    } else {
        print_report(&summary.before);
        println!();
        if summary.dry_run {
            println!("Dry run: nothing written");
        } else {
            println!(
                "Fixed: {} duplicate pool(s), {} earning(s), {} payout(s), {} pool balance(s)",
                summary.duplicates_fixed,
                summary.earnings_fixed,
                summary.payouts_fixed,
                summary.pools_fixed
            );
            for failure in &summary.failures {
                println!("   ❌ {}: {}", failure.target, failure.error);
            }
            println!();
            println!("After repair:");
            print_report(&summary.after);
        }
    }

    if !summary.is_clean() {
        anyhow::bail!(
            "{} issue(s) left, {} repair step(s) failed",
            summary.after.issue_count(),
            summary.failures.len()
        );
    }
    Ok(())
}
