//! `puc init` command implementation

use anyhow::{Context, Result};
use puc_adapters::JsonFileStore;
use std::path::Path;

pub fn run(ledger: &Path) -> Result<()> {
    JsonFileStore::create(ledger)
        .with_context(|| format!("Failed to create ledger {}", ledger.display()))?;

    println!("✅ Ledger created: {}", ledger.display());
    println!();
    println!("Next steps:");
    println!("  puc pool ensure --weeks-ahead 2");
    println!("  puc user add --name \"Jane Doe\" --paypal-email jane@example.com");
    Ok(())
}
