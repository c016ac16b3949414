//! `puc pool` command implementation

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use puc_core::{LedgerConfig, Pool};
use std::path::Path;

use super::{open_ledger, print_json};

fn print_pool(pool: &Pool) {
    println!(
        "{}  {} .. {}  total {}  remaining {}  spent {}",
        pool.id, pool.week_start, pool.week_end, pool.total, pool.remaining, pool.spent
    );
}

pub fn provision(ledger: &Path, config: LedgerConfig, week: NaiveDate) -> Result<()> {
    let ledger = open_ledger(ledger, config)?;
    let provisioned = ledger.provision_week(week)?;
    if !provisioned.created {
        println!("Pool already exists");
    }
    print_pool(&provisioned.pool);
    Ok(())
}

pub fn ensure(ledger: &Path, config: LedgerConfig, weeks_ahead: u32) -> Result<()> {
    let ledger = open_ledger(ledger, config)?;
    let created = ledger.ensure_pools_ahead(Utc::now(), weeks_ahead)?;
    println!("Created {} pool(s)", created.len());
    for pool in &created {
        print_pool(pool);
    }
    Ok(())
}

pub fn current(ledger: &Path, config: LedgerConfig, at: Option<DateTime<Utc>>) -> Result<()> {
    let ledger = open_ledger(ledger, config)?;
    let pool = ledger.current_pool(at.unwrap_or_else(Utc::now))?;
    print_pool(&pool);
    Ok(())
}

pub fn list(ledger: &Path, config: LedgerConfig, format: &str) -> Result<()> {
    let ledger = open_ledger(ledger, config)?;
    let pools = ledger.pools()?;

    match format {
        "json" => print_json(&pools)?,
        _ => {
            if pools.is_empty() {
                println!("No pools provisioned");
            }
            for pool in &pools {
                print_pool(pool);
            }
        }
    }
    Ok(())
}
