//! JsonFileStore durability: commits survive a reopen, failures never reach disk.

use chrono::{Duration, NaiveDate};
use puc_adapters::JsonFileStore;
use puc_core::{
    calendar, Ledger, LedgerConfig, LedgerError, LedgerStore, Money, Submission, SubmissionId,
    UserId,
};
use std::fs;
use tempfile::TempDir;

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
}

fn approved(user: UserId) -> Submission {
    Submission {
        id: SubmissionId::new_v4(),
        user_id: user,
        verified_count: 15,
        approved_at: calendar::start_of_day(monday()) + Duration::hours(30),
    }
}

#[test]
fn committed_approval_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.json");
    let sub = approved(UserId::new_v4());

    {
        let ledger = Ledger::new(JsonFileStore::create(&path).unwrap(), LedgerConfig::default())
            .unwrap();
        ledger.provision_week(monday()).unwrap();
        ledger.record_approval(&sub).unwrap();
    }

    let ledger = Ledger::new(JsonFileStore::open(&path).unwrap(), LedgerConfig::default()).unwrap();
    let earning = ledger.earning_for(&sub.id).unwrap().expect("earning persisted");
    assert_eq!(earning.amount, Money::from_dollars(5));

    let pool = ledger.current_pool(sub.approved_at).unwrap();
    assert_eq!(pool.remaining, Money::from_dollars(245));
    assert_eq!(ledger.payouts(None).unwrap().len(), 1);
}

#[test]
fn two_stores_on_one_file_keep_both_approvals() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.json");
    let first = Ledger::new(JsonFileStore::create(&path).unwrap(), LedgerConfig::default()).unwrap();
    let second = Ledger::new(JsonFileStore::open(&path).unwrap(), LedgerConfig::default()).unwrap();
    first.provision_week(monday()).unwrap();

    let a = approved(UserId::new_v4());
    let b = approved(UserId::new_v4());
    first.record_approval(&a).unwrap();
    second.record_approval(&b).unwrap();

    let reopened =
        Ledger::new(JsonFileStore::open(&path).unwrap(), LedgerConfig::default()).unwrap();
    assert!(reopened.earning_for(&a.id).unwrap().is_some());
    assert!(reopened.earning_for(&b.id).unwrap().is_some());
    let pool = reopened.current_pool(a.approved_at).unwrap();
    assert_eq!(pool.remaining, Money::from_dollars(240));
    assert_eq!(pool.spent, Money::from_dollars(10));
}

#[test]
fn concurrent_writers_serialize() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.json");
    Ledger::new(JsonFileStore::create(&path).unwrap(), LedgerConfig::default())
        .unwrap()
        .provision_week(monday())
        .unwrap();

    let subs: Vec<Submission> = (0..8).map(|_| approved(UserId::new_v4())).collect();
    std::thread::scope(|scope| {
        for sub in &subs {
            let path = &path;
            scope.spawn(move || {
                let ledger =
                    Ledger::new(JsonFileStore::open(path).unwrap(), LedgerConfig::default())
                        .unwrap();
                ledger.record_approval(sub).unwrap();
            });
        }
    });

    let ledger = Ledger::new(JsonFileStore::open(&path).unwrap(), LedgerConfig::default()).unwrap();
    for sub in &subs {
        assert!(ledger.earning_for(&sub.id).unwrap().is_some());
    }
    let pool = ledger.current_pool(subs[0].approved_at).unwrap();
    assert_eq!(pool.spent, Money::from_dollars(40));
    assert_eq!(pool.remaining, Money::from_dollars(210));
}

#[test]
fn failed_approval_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.json");
    let store = JsonFileStore::create(&path).unwrap();
    let before = fs::read(&path).unwrap();

    // No pool provisioned, so the approval has nowhere to debit from.
    let ledger = Ledger::new(store, LedgerConfig::default()).unwrap();
    let err = ledger.record_approval(&approved(UserId::new_v4())).unwrap_err();
    assert!(matches!(err, LedgerError::NoActivePool { .. }));

    assert_eq!(fs::read(&path).unwrap(), before);
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn create_refuses_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.json");
    JsonFileStore::create(&path).unwrap();

    let err = JsonFileStore::create(&path).unwrap_err();
    assert!(matches!(err, LedgerError::StorageError(_)));
}

#[test]
fn open_missing_file_is_empty_ledger() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("ledger.json");
    let store = JsonFileStore::open(&path).unwrap();

    assert_eq!(store.read(|t| t.pools().count()).unwrap(), 0);
    assert!(!path.exists());

    let ledger = Ledger::new(store, LedgerConfig::default()).unwrap();
    ledger.provision_week(monday()).unwrap();
    assert!(path.exists());
}

#[test]
fn corrupt_file_is_a_storage_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.json");
    fs::write(&path, b"{\"version\": 1, \"tables\": ").unwrap();

    let err = JsonFileStore::open(&path).unwrap_err();
    assert!(matches!(err, LedgerError::StorageError(_)));
}

#[test]
fn unknown_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.json");
    JsonFileStore::create(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    fs::write(&path, text.replacen("\"version\": 1", "\"version\": 9", 1)).unwrap();

    let err = JsonFileStore::open(&path).unwrap_err();
    assert!(err.to_string().contains("unsupported ledger file version 9"));
}
