//! `puc metrics` command implementation

use anyhow::Result;
use chrono::Utc;
use puc_core::LedgerConfig;
use std::path::Path;

use super::open_ledger;

pub fn run(ledger: &Path, config: LedgerConfig) -> Result<()> {
    let ledger = open_ledger(ledger, config)?;
    print!("{}", ledger.gauges(Utc::now())?.render_prometheus());
    Ok(())
}
