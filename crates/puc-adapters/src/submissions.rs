//! Approved-submission feed.
//!
//! The review workflow exports approved submissions as a JSON array of
//! `{id, user_id, verified_count, approved_at}` objects.

use puc_core::{LedgerError, Result, Submission};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Load and sanity-check an approved-submission export.
pub fn load_submissions(path: &Path) -> Result<Vec<Submission>> {
    let bytes = fs::read(path).map_err(|e| {
        LedgerError::StorageError(format!("failed to read {}: {e}", path.display()))
    })?;
    parse_submissions(&bytes)
}

pub fn parse_submissions(bytes: &[u8]) -> Result<Vec<Submission>> {
    let submissions: Vec<Submission> = serde_json::from_slice(bytes)
        .map_err(|e| LedgerError::InvalidInput(format!("malformed submission feed: {e}")))?;

    let mut seen = HashSet::with_capacity(submissions.len());
    for s in &submissions {
        if !seen.insert(s.id) {
            return Err(LedgerError::InvalidInput(format!(
                "submission {} appears more than once",
                s.id
            )));
        }
    }
    Ok(submissions)
}
