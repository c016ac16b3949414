//! `puc approve` / `puc unapprove` command implementation

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use puc_adapters::load_submissions;
use puc_core::{ApprovalReceipt, LedgerConfig, Submission, SubmissionId, UserId};
use std::path::Path;

use super::open_ledger;

fn describe(receipt: &ApprovalReceipt) -> String {
    match receipt {
        ApprovalReceipt::Recorded(e) => format!("recorded {} for {}", e.amount, e.user_id),
        ApprovalReceipt::Clamped(e) => format!(
            "clamped: credited {} of {} for {} (pool short)",
            e.amount, e.requested, e.user_id
        ),
        ApprovalReceipt::Replayed(e) => format!("already recorded ({})", e.amount),
        ApprovalReceipt::Excluded { user_id } => format!("excluded account {user_id}"),
    }
}

pub fn approve(
    ledger: &Path,
    config: LedgerConfig,
    submission: SubmissionId,
    user: UserId,
    verified_count: u32,
    approved_at: DateTime<Utc>,
) -> Result<()> {
    let ledger = open_ledger(ledger, config)?;
    let receipt = ledger.record_approval(&Submission {
        id: submission,
        user_id: user,
        verified_count,
        approved_at,
    })?;
    println!("{submission}: {}", describe(&receipt));
    Ok(())
}

/// Record every submission in a feed. Failures are reported and do not stop the run.
pub fn approve_feed(ledger: &Path, config: LedgerConfig, feed: &Path) -> Result<()> {
    let submissions = load_submissions(feed)
        .with_context(|| format!("Failed to load feed {}", feed.display()))?;
    let ledger = open_ledger(ledger, config)?;

    let mut failed = 0usize;
    for submission in &submissions {
        match ledger.record_approval(submission) {
            Ok(receipt) => println!("{}: {}", submission.id, describe(&receipt)),
            Err(e) => {
                failed += 1;
                println!("{}: failed: {e}", submission.id);
            }
        }
    }

    println!();
    print!("{}", ledger.metrics().render_prometheus());

    if failed > 0 {
        anyhow::bail!("{failed} of {} approvals failed", submissions.len());
    }
    Ok(())
}

pub fn unapprove(ledger: &Path, config: LedgerConfig, submission: SubmissionId) -> Result<()> {
    let ledger = open_ledger(ledger, config)?;
    match ledger.reverse_approval(&submission)? {
        Some(earning) => println!(
            "{submission}: reversed, {} returned to pool {}",
            earning.amount, earning.pool_id
        ),
        None => println!("{submission}: no earning to reverse"),
    }
    Ok(())
}
