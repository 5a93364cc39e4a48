//! In-memory storage and collaborator implementations for testing

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;

/// In-memory entry store for testing and development
///
/// Every account's chain sits behind its own mutex, so the sequence check and
/// the insert happen as one atomic step. `append_transfer` locks the two
/// chains in ascending account-id order before checking either expectation.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    chains: Arc<RwLock<HashMap<String, Arc<Mutex<Vec<LedgerEntry>>>>>>,
}

impl MemoryStore {
    /// Create a new memory store instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.chains.write().unwrap().clear();
    }

    fn chain(&self, account_id: &str) -> Arc<Mutex<Vec<LedgerEntry>>> {
        if let Some(chain) = self.chains.read().unwrap().get(account_id) {
            return chain.clone();
        }
        self.chains
            .write()
            .unwrap()
            .entry(account_id.to_string())
            .or_default()
            .clone()
    }

    fn check_commit(
        entries: &[LedgerEntry],
        draft: &DraftEntry,
        expected_prior_sequence: u64,
    ) -> LedgerResult<()> {
        let current = entries.last().map(|e| e.sequence_number).unwrap_or(0);
        if current != expected_prior_sequence {
            return Err(LedgerError::ConcurrencyConflict(format!(
                "account '{}' is at sequence {}, caller expected {}",
                draft.account_id, current, expected_prior_sequence
            )));
        }

        if let Some(key) = draft.idempotency_key.as_deref() {
            if entries
                .iter()
                .any(|e| e.idempotency_key.as_deref() == Some(key))
            {
                return Err(LedgerError::ConcurrencyConflict(format!(
                    "idempotency key '{}' already applied on account '{}'",
                    key, draft.account_id
                )));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn append(
        &self,
        draft: DraftEntry,
        expected_prior_sequence: u64,
    ) -> LedgerResult<LedgerEntry> {
        draft.validate()?;

        let chain = self.chain(&draft.account_id);
        let mut entries = chain.lock().unwrap();

        Self::check_commit(&entries, &draft, expected_prior_sequence)?;
        let entry = draft.into_committed(expected_prior_sequence + 1);
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn append_transfer(
        &self,
        outgoing: DraftEntry,
        incoming: DraftEntry,
        expected_out_sequence: u64,
        expected_in_sequence: u64,
    ) -> LedgerResult<(LedgerEntry, LedgerEntry)> {
        outgoing.validate()?;
        incoming.validate()?;
        if outgoing.account_id == incoming.account_id {
            return Err(LedgerError::Validation(
                "Transfer legs must be on different accounts".to_string(),
            ));
        }

        let out_chain = self.chain(&outgoing.account_id);
        let in_chain = self.chain(&incoming.account_id);

        // Fixed lock order: ascending account id.
        let out_first = outgoing.account_id < incoming.account_id;
        let (first, second) = if out_first {
            (&out_chain, &in_chain)
        } else {
            (&in_chain, &out_chain)
        };
        let mut first_guard = first.lock().unwrap();
        let mut second_guard = second.lock().unwrap();
        let (out_entries, in_entries) = if out_first {
            (&mut *first_guard, &mut *second_guard)
        } else {
            (&mut *second_guard, &mut *first_guard)
        };

        // Both expectations are checked before either leg is committed, so a
        // failure here leaves both chains untouched.
        Self::check_commit(out_entries, &outgoing, expected_out_sequence)?;
        Self::check_commit(in_entries, &incoming, expected_in_sequence)?;

        let out_entry = outgoing.into_committed(expected_out_sequence + 1);
        let in_entry = incoming.into_committed(expected_in_sequence + 1);
        out_entries.push(out_entry.clone());
        in_entries.push(in_entry.clone());
        Ok((out_entry, in_entry))
    }

    async fn latest(&self, account_id: &str) -> LedgerResult<Option<LedgerEntry>> {
        let chain = self.chain(account_id);
        let entries = chain.lock().unwrap();
        Ok(entries.last().cloned())
    }

    async fn history(
        &self,
        account_id: &str,
        cursor: Option<u64>,
        limit: usize,
    ) -> LedgerResult<HistoryPage> {
        let chain = self.chain(account_id);
        let entries = chain.lock().unwrap();

        let start = cursor.unwrap_or(0);
        let remaining: Vec<LedgerEntry> = entries
            .iter()
            .filter(|e| e.sequence_number > start)
            .cloned()
            .collect();
        let has_more = remaining.len() > limit;
        let page: Vec<LedgerEntry> = remaining.into_iter().take(limit).collect();
        let next_cursor = if has_more {
            page.last().map(|e| e.sequence_number)
        } else {
            None
        };

        Ok(HistoryPage {
            entries: page,
            next_cursor,
        })
    }

    async fn find_by_idempotency_key(
        &self,
        account_id: &str,
        key: &str,
    ) -> LedgerResult<Option<LedgerEntry>> {
        let chain = self.chain(account_id);
        let entries = chain.lock().unwrap();
        Ok(entries
            .iter()
            .find(|e| e.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn find_transfer_pair(
        &self,
        transfer_id: Uuid,
    ) -> LedgerResult<Option<(LedgerEntry, LedgerEntry)>> {
        let chains = self.chains.read().unwrap();
        let mut outgoing = None;
        let mut incoming = None;

        for chain in chains.values() {
            let entries = chain.lock().unwrap();
            for entry in entries.iter() {
                if entry.transfer_id != Some(transfer_id) {
                    continue;
                }
                match entry.kind {
                    EntryKind::TransferOut => outgoing = Some(entry.clone()),
                    EntryKind::TransferIn => incoming = Some(entry.clone()),
                    _ => {}
                }
            }
        }

        Ok(match (outgoing, incoming) {
            (Some(out), Some(inc)) => Some((out, inc)),
            _ => None,
        })
    }

    async fn find_entry(&self, entry_id: Uuid) -> LedgerResult<Option<LedgerEntry>> {
        let chains = self.chains.read().unwrap();
        for chain in chains.values() {
            let entries = chain.lock().unwrap();
            if let Some(entry) = entries.iter().find(|e| e.id == entry_id) {
                return Ok(Some(entry.clone()));
            }
        }
        Ok(None)
    }

    async fn account_ids(&self) -> LedgerResult<Vec<String>> {
        let chains = self.chains.read().unwrap();
        let mut ids: Vec<String> = chains
            .iter()
            .filter(|(_, chain)| !chain.lock().unwrap().is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn remove(&self, entry_id: Uuid) -> LedgerResult<LedgerEntry> {
        let chains = self.chains.read().unwrap();
        for chain in chains.values() {
            let mut entries = chain.lock().unwrap();
            if let Some(position) = entries.iter().position(|e| e.id == entry_id) {
                return Ok(entries.remove(position));
            }
        }
        Err(LedgerError::EntryNotFound(entry_id.to_string()))
    }

    async fn replace_suffix(
        &self,
        account_id: &str,
        from_sequence: u64,
        replacement: Vec<LedgerEntry>,
    ) -> LedgerResult<()> {
        if let Some(stray) = replacement.iter().find(|e| e.account_id != account_id) {
            return Err(LedgerError::Validation(format!(
                "Replacement entry {} belongs to account '{}'",
                stray.id, stray.account_id
            )));
        }

        let chain = self.chain(account_id);
        let mut entries = chain.lock().unwrap();
        entries.retain(|e| e.sequence_number < from_sequence);
        entries.extend(replacement);
        Ok(())
    }
}

/// In-memory employee directory for testing
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    employees: Arc<RwLock<HashSet<String>>>,
}

impl MemoryDirectory {
    /// Create a new empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an employee account
    pub fn register(&self, account_id: &str) {
        self.employees.write().unwrap().insert(account_id.to_string());
    }
}

#[async_trait]
impl EmployeeDirectory for MemoryDirectory {
    async fn exists(&self, account_id: &str) -> LedgerResult<bool> {
        Ok(self.employees.read().unwrap().contains(account_id))
    }
}

/// In-memory expense totals for testing
#[derive(Debug, Clone, Default)]
pub struct MemoryExpenses {
    totals: Arc<RwLock<HashMap<String, i64>>>,
}

impl MemoryExpenses {
    /// Create a new empty expense view
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate a posted expense against an account
    pub fn post(&self, account_id: &str, amount: i64) {
        *self
            .totals
            .write()
            .unwrap()
            .entry(account_id.to_string())
            .or_insert(0) += amount;
    }
}

#[async_trait]
impl ExpensePosting for MemoryExpenses {
    async fn total_posted_expenses(&self, account_id: &str) -> LedgerResult<i64> {
        Ok(self
            .totals
            .read()
            .unwrap()
            .get(account_id)
            .copied()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn draft(account_id: &str, kind: EntryKind, amount: i64, balance_after: i64) -> DraftEntry {
        DraftEntry {
            id: Uuid::new_v4(),
            account_id: account_id.to_string(),
            kind,
            amount,
            balance_after,
            description: "test".to_string(),
            reference: EntryReference::manual(),
            counterparty_account_id: None,
            transfer_id: None,
            processed_by: Actor::System,
            idempotency_key: None,
            created_at: Utc::now(),
        }
    }

    fn transfer_leg(
        account_id: &str,
        counterparty: &str,
        kind: EntryKind,
        amount: i64,
        balance_after: i64,
        transfer_id: Uuid,
    ) -> DraftEntry {
        DraftEntry {
            counterparty_account_id: Some(counterparty.to_string()),
            transfer_id: Some(transfer_id),
            reference: EntryReference::transfer(transfer_id),
            ..draft(account_id, kind, amount, balance_after)
        }
    }

    #[tokio::test]
    async fn stale_expected_sequence_is_a_conflict() {
        let store = MemoryStore::new();
        store
            .append(draft("emp-1", EntryKind::Credit, 100, 100), 0)
            .await
            .unwrap();

        // Second writer still believes the chain is empty.
        let err = store
            .append(draft("emp-1", EntryKind::Credit, 50, 50), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ConcurrencyConflict(_)));

        let latest = store.latest("emp-1").await.unwrap().unwrap();
        assert_eq!(latest.sequence_number, 1);
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_commits_nothing() {
        let store = MemoryStore::new();
        let mut first = draft("emp-1", EntryKind::Credit, 100, 100);
        first.idempotency_key = Some("key-1".to_string());
        store.append(first, 0).await.unwrap();

        let mut second = draft("emp-1", EntryKind::Credit, 100, 200);
        second.idempotency_key = Some("key-1".to_string());
        let err = store.append(second, 1).await.unwrap_err();
        assert!(matches!(err, LedgerError::ConcurrencyConflict(_)));

        let latest = store.latest("emp-1").await.unwrap().unwrap();
        assert_eq!(latest.sequence_number, 1);
    }

    #[tokio::test]
    async fn transfer_append_is_all_or_nothing() {
        let store = MemoryStore::new();
        store
            .append(draft("emp-a", EntryKind::Credit, 500, 500), 0)
            .await
            .unwrap();

        let transfer_id = Uuid::new_v4();
        let outgoing = transfer_leg("emp-a", "emp-b", EntryKind::TransferOut, 200, 300, transfer_id);
        let incoming = transfer_leg("emp-b", "emp-a", EntryKind::TransferIn, 200, 200, transfer_id);

        // Destination expectation is stale; neither leg must land.
        let err = store
            .append_transfer(outgoing.clone(), incoming.clone(), 1, 7)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ConcurrencyConflict(_)));
        assert_eq!(store.latest("emp-a").await.unwrap().unwrap().sequence_number, 1);
        assert!(store.latest("emp-b").await.unwrap().is_none());

        let (out_entry, in_entry) = store
            .append_transfer(outgoing, incoming, 1, 0)
            .await
            .unwrap();
        assert_eq!(out_entry.sequence_number, 2);
        assert_eq!(in_entry.sequence_number, 1);

        let pair = store.find_transfer_pair(transfer_id).await.unwrap().unwrap();
        assert_eq!(pair.0.id, out_entry.id);
        assert_eq!(pair.1.id, in_entry.id);
    }

    #[tokio::test]
    async fn history_pages_are_restartable_by_cursor() {
        let store = MemoryStore::new();
        let mut balance = 0;
        for n in 1..=5 {
            balance += 10;
            store
                .append(draft("emp-1", EntryKind::Credit, 10, balance), n - 1)
                .await
                .unwrap();
        }

        let first = store.history("emp-1", None, 2).await.unwrap();
        assert_eq!(first.entries.len(), 2);
        assert_eq!(first.next_cursor, Some(2));

        let second = store.history("emp-1", first.next_cursor, 2).await.unwrap();
        assert_eq!(second.entries.len(), 2);
        assert_eq!(second.next_cursor, Some(4));

        let last = store.history("emp-1", second.next_cursor, 2).await.unwrap();
        assert_eq!(last.entries.len(), 1);
        assert_eq!(last.next_cursor, None);

        let sequences: Vec<u64> = first
            .entries
            .iter()
            .chain(second.entries.iter())
            .chain(last.entries.iter())
            .map(|e| e.sequence_number)
            .collect();
        assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
    }
}
