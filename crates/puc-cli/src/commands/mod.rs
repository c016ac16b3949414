//! CLI Command Implementations

pub mod approval;
pub mod audit;
pub mod init;
pub mod metrics;
pub mod payout;
pub mod pool;
pub mod user;

use anyhow::{Context, Result};
use puc_adapters::JsonFileStore;
use puc_core::{Ledger, LedgerConfig};
use std::path::Path;

/// Load config from file (or defaults), overlay `PUC_*` environment variables, validate.
pub fn load_config(path: Option<&Path>) -> Result<LedgerConfig> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => LedgerConfig::default(),
    };
    config.apply_env(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

/// Open the ledger file. A missing file starts empty and is written on the first change.
pub fn open_ledger(path: &Path, config: LedgerConfig) -> Result<Ledger<JsonFileStore>> {
    let store = JsonFileStore::open(path)
        .with_context(|| format!("Failed to open ledger {}", path.display()))?;
    Ok(Ledger::new(store, config)?)
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
