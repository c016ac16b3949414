//! Storage adapters for the Pull-Up Club earnings ledger.
//!
//! - **JsonFileStore**: durable single-file store for operators and small deployments
//! - **submissions**: loaders for the approved-submission feed used by audits

pub mod json_store;
pub mod submissions;

pub use json_store::JsonFileStore;
pub use submissions::load_submissions;
