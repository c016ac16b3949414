//! Ledger tables and the transactional store seam.
//!
//! Every ledger operation runs inside [`LedgerStore::transact`]: the closure works on a
//! private copy of the tables and the copy replaces the committed state only when the
//! closure returns `Ok`. A failed operation therefore leaves no partial writes behind
//! (an earning without its pool debit, or the reverse).

use crate::{
    Earning, LedgerError, MonthKey, MonthlyPayoutRequest, Pool, PoolId, Result, SubmissionId,
    UserId, UserProfile,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// The ledger's relational state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerTables {
    pools: BTreeMap<PoolId, Pool>,
    /// Keyed by submission, so a second earning for the same submission cannot exist.
    earnings: BTreeMap<SubmissionId, Earning>,
    payouts: Vec<MonthlyPayoutRequest>,
    users: BTreeMap<UserId, UserProfile>,
}

impl LedgerTables {
    pub fn pools(&self) -> impl Iterator<Item = &Pool> {
        self.pools.values()
    }

    pub fn pool(&self, id: &PoolId) -> Option<&Pool> {
        self.pools.get(id)
    }

    pub fn earnings(&self) -> impl Iterator<Item = &Earning> {
        self.earnings.values()
    }

    pub fn earning_for(&self, submission: &SubmissionId) -> Option<&Earning> {
        self.earnings.get(submission)
    }

    pub fn earnings_in_pool<'a>(&'a self, pool: &'a PoolId) -> impl Iterator<Item = &'a Earning> {
        self.earnings.values().filter(move |e| e.pool_id == *pool)
    }

    pub fn earnings_for_user<'a>(&'a self, user: &'a UserId) -> impl Iterator<Item = &'a Earning> {
        self.earnings.values().filter(move |e| e.user_id == *user)
    }

    pub fn payouts(&self) -> impl Iterator<Item = &MonthlyPayoutRequest> {
        self.payouts.iter()
    }

    pub fn payout(&self, user: &UserId, month: MonthKey) -> Option<&MonthlyPayoutRequest> {
        self.payouts
            .iter()
            .find(|p| p.user_id == *user && p.month == month)
    }

    pub fn user(&self, id: &UserId) -> Option<&UserProfile> {
        self.users.get(id)
    }

    pub(crate) fn pool_mut(&mut self, id: &PoolId) -> Result<&mut Pool> {
        self.pools
            .get_mut(id)
            .ok_or(LedgerError::PoolNotFound { id: *id })
    }

    pub(crate) fn insert_pool(&mut self, pool: Pool) {
        self.pools.insert(pool.id, pool);
    }

    pub(crate) fn remove_pool(&mut self, id: &PoolId) -> Option<Pool> {
        self.pools.remove(id)
    }

    pub(crate) fn insert_earning(&mut self, earning: Earning) -> Result<()> {
        if self.earnings.contains_key(&earning.submission_id) {
            return Err(LedgerError::StorageError(format!(
                "duplicate earning for submission {}",
                earning.submission_id
            )));
        }
        self.earnings.insert(earning.submission_id, earning);
        Ok(())
    }

    pub(crate) fn remove_earning(&mut self, submission: &SubmissionId) -> Option<Earning> {
        self.earnings.remove(submission)
    }

    pub(crate) fn upsert_payout(&mut self, request: MonthlyPayoutRequest) {
        match self
            .payouts
            .iter_mut()
            .find(|p| p.user_id == request.user_id && p.month == request.month)
        {
            Some(existing) => *existing = request,
            None => self.payouts.push(request),
        }
    }

    pub(crate) fn payout_mut(
        &mut self,
        user: &UserId,
        month: MonthKey,
    ) -> Option<&mut MonthlyPayoutRequest> {
        self.payouts
            .iter_mut()
            .find(|p| p.user_id == *user && p.month == month)
    }

    pub(crate) fn remove_payout(&mut self, user: &UserId, month: MonthKey) {
        self.payouts
            .retain(|p| !(p.user_id == *user && p.month == month));
    }

    pub(crate) fn upsert_user(&mut self, profile: UserProfile) {
        self.users.insert(profile.id, profile);
    }
}

/// Transactional access to [`LedgerTables`].
///
/// Implementations must ensure:
/// - `transact` is all-or-nothing: on `Err` the committed tables are unchanged
/// - concurrent `transact` calls serialize (no lost updates on a pool row)
/// - `read` never observes a half-applied transaction
pub trait LedgerStore: Send + Sync {
    /// Run `f` against a consistent view of the committed tables.
    fn read<T>(&self, f: impl FnOnce(&LedgerTables) -> T) -> Result<T>;

    /// Run `f` as one transaction, committing its writes only if it returns `Ok`.
    fn transact<T>(&self, f: impl FnOnce(&mut LedgerTables) -> Result<T>) -> Result<T>;
}

/// Process-local store for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<LedgerTables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: LedgerTables) -> Self {
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Copy of the committed tables.
    pub fn snapshot(&self) -> Result<LedgerTables> {
        self.read(|t| t.clone())
    }
}

impl LedgerStore for InMemoryStore {
    fn read<T>(&self, f: impl FnOnce(&LedgerTables) -> T) -> Result<T> {
        let tables = self
            .tables
            .read()
            .map_err(|_| LedgerError::StorageError("ledger lock poisoned".into()))?;
        Ok(f(&tables))
    }

    fn transact<T>(&self, f: impl FnOnce(&mut LedgerTables) -> Result<T>) -> Result<T> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| LedgerError::StorageError("ledger lock poisoned".into()))?;
        let mut working = tables.clone();
        let out = f(&mut working)?;
        *tables = working;
        Ok(out)
    }
}
