//! Balance and history reads over the entry chains

use crate::traits::*;
use crate::types::*;

/// Read-side view of the ledger: derived balances and paged history
///
/// Balances are never stored; an account's balance is the `balance_after` of
/// its latest committed entry, or 0 for an account with no entries. These
/// reads take no part in the commit protocol and may observe a stale
/// snapshot; the engines do their own read inside the optimistic-append loop.
pub struct BalanceReader<S: EntryStore> {
    store: S,
}

impl<S: EntryStore> BalanceReader<S> {
    /// Create a new reader over the given store
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Current balance of an account, in minor units
    pub async fn balance_of(&self, account_id: &str) -> LedgerResult<i64> {
        Ok(self
            .store
            .latest(account_id)
            .await?
            .map(|entry| entry.balance_after)
            .unwrap_or(0))
    }

    /// Current balances of every account with at least one entry
    pub async fn all_balances(&self) -> LedgerResult<Vec<AccountBalance>> {
        let mut balances = Vec::new();

        for account_id in self.store.account_ids().await? {
            if let Some(entry) = self.store.latest(&account_id).await? {
                balances.push(AccountBalance {
                    account_id,
                    balance: entry.balance_after,
                    last_sequence: entry.sequence_number,
                    updated_at: entry.created_at,
                });
            }
        }

        balances.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        Ok(balances)
    }

    /// One page of an account's chain, ascending by sequence number
    pub async fn history(
        &self,
        account_id: &str,
        cursor: Option<u64>,
        limit: usize,
    ) -> LedgerResult<HistoryPage> {
        self.store.history(account_id, cursor, limit).await
    }
}
