//! `puc payout` command implementation

use anyhow::Result;
use puc_core::{LedgerConfig, MonthKey, MonthlyPayoutRequest, UserId};
use std::path::Path;

use super::{open_ledger, print_json};

fn print_request(r: &MonthlyPayoutRequest) {
    let status = match r.status {
        puc_core::PayoutStatus::Pending => "pending",
        puc_core::PayoutStatus::Paid => "paid",
    };
    println!(
        "{}  {}  {:>10}  {:<7}  {}",
        r.month,
        r.user_id,
        r.total.to_string(),
        status,
        r.payee_email.as_deref().unwrap_or("-")
    );
}

pub fn recompute(ledger: &Path, config: LedgerConfig, user: UserId, month: MonthKey) -> Result<()> {
    let ledger = open_ledger(ledger, config)?;
    match ledger.recompute_monthly_payout(user, month)? {
        Some(request) => print_request(&request),
        None => println!("{user} earned nothing in {month}"),
    }
    Ok(())
}

pub fn recompute_month(ledger: &Path, config: LedgerConfig, month: MonthKey) -> Result<()> {
    let ledger = open_ledger(ledger, config)?;
    let requests = ledger.recompute_month(month)?;
    for request in &requests {
        print_request(request);
    }
    println!("{} request(s) for {month}", requests.len());
    Ok(())
}

pub fn mark_paid(ledger: &Path, config: LedgerConfig, user: UserId, month: MonthKey) -> Result<()> {
    let ledger = open_ledger(ledger, config)?;
    let request = ledger.mark_payout_paid(user, month)?;
    print_request(&request);
    Ok(())
}

pub fn list(
    ledger: &Path,
    config: LedgerConfig,
    month: Option<MonthKey>,
    format: &str,
) -> Result<()> {
    let ledger = open_ledger(ledger, config)?;
    let requests = ledger.payouts(month)?;

    match format {
        "json" => print_json(&requests)?,
        _ => {
            if requests.is_empty() {
                println!("No payout requests");
            }
            for request in &requests {
                print_request(request);
            }
        }
    }
    Ok(())
}
