//! `puc user` command implementation

use anyhow::Result;
use puc_core::{LedgerConfig, UserId, UserProfile};
use std::path::Path;

use super::open_ledger;

pub fn add(
    ledger: &Path,
    config: LedgerConfig,
    name: String,
    paypal_email: Option<String>,
    id: Option<UserId>,
    excluded: bool,
) -> Result<()> {
    let ledger = open_ledger(ledger, config)?;
    let id = id.unwrap_or_else(UserId::new_v4);
    ledger.register_user(UserProfile {
        id,
        full_name: name,
        paypal_email,
        excluded,
    })?;

    println!("{id}");
    Ok(())
}
