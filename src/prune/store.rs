use std::collections::BTreeMap;
use std::convert::Infallible;
use std::ops::Bound;

use super::Account;

/// Persistence behind the pruning driver.
///
/// Candidates are accounts with a non-empty address, not already flagged,
/// whose `last_seen` is strictly below `cutoff`. Pages are ordered by
/// `user_id` and start after the last id of the previous page, so flagging an
/// account never shifts the following pages.
pub trait AccountStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn count_inactive(&self, cutoff: i64) -> Result<u64, Self::Error>;

    fn inactive_accounts(
        &self,
        cutoff: i64,
        after: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Account>, Self::Error>;

    /// Flags the account. Returns `false` when nothing changed (unknown id or
    /// already flagged).
    fn mark_invalid(&mut self, user_id: u64) -> Result<bool, Self::Error>;

    /// Called after a batch that flagged at least one account, for stores that
    /// persist or invalidate caches in bulk.
    fn commit(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    account: Account,
    banned: bool,
}

/// In-memory [`AccountStore`], also the backing table of the CSV store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryAccountStore {
    entries: BTreeMap<u64, Entry>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the account with the same id.
    pub fn insert(&mut self, account: Account, banned: bool) {
        self.entries
            .insert(account.user_id, Entry { account, banned });
    }

    pub fn is_banned(&self, user_id: u64) -> Option<bool> {
        self.entries.get(&user_id).map(|entry| entry.banned)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every account in id order with its flag.
    pub fn iter(&self) -> impl Iterator<Item = (&Account, bool)> {
        self.entries
            .values()
            .map(|entry| (&entry.account, entry.banned))
    }

    fn candidates(&self, cutoff: i64, after: Option<u64>) -> impl Iterator<Item = &Account> {
        let start = after.map_or(Bound::Unbounded, Bound::Excluded);
        self.entries
            .range((start, Bound::Unbounded))
            .map(|(_, entry)| entry)
            .filter(move |entry| {
                !entry.banned
                    && !entry.account.email.trim().is_empty()
                    && entry.account.last_seen < cutoff
            })
            .map(|entry| &entry.account)
    }
}

impl FromIterator<Account> for MemoryAccountStore {
    fn from_iter<I: IntoIterator<Item = Account>>(iter: I) -> Self {
        let mut store = Self::new();
        for account in iter {
            store.insert(account, false);
        }
        store
    }
}

impl AccountStore for MemoryAccountStore {
    type Error = Infallible;

    fn count_inactive(&self, cutoff: i64) -> Result<u64, Infallible> {
        Ok(self.candidates(cutoff, None).count() as u64)
    }

    fn inactive_accounts(
        &self,
        cutoff: i64,
        after: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Account>, Infallible> {
        Ok(self.candidates(cutoff, after).take(limit).cloned().collect())
    }

    fn mark_invalid(&mut self, user_id: u64) -> Result<bool, Infallible> {
        Ok(match self.entries.get_mut(&user_id) {
            Some(entry) if !entry.banned => {
                entry.banned = true;
                true
            }
            _ => false,
        })
    }
}
