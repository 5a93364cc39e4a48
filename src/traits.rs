//! Traits for storage abstraction and external collaborators

use async_trait::async_trait;
use uuid::Uuid;

use crate::types::*;

/// Storage abstraction for the append-only entry chains
///
/// This trait allows the ledger engine to work with any backend (PostgreSQL,
/// MongoDB, in-memory, etc.). Concurrency control is optimistic: both append
/// methods take the caller's view of the account's latest sequence number and
/// must commit atomically only if that view still holds, returning
/// [`LedgerError::ConcurrencyConflict`] otherwise.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Append one entry to its account's chain
    ///
    /// Assigns `sequence_number = expected_prior_sequence + 1` and persists
    /// atomically with the check that no entry committed concurrently.
    /// `expected_prior_sequence` is 0 for a fresh account. A draft whose
    /// idempotency key was already committed on the account must be rejected
    /// as [`LedgerError::ConcurrencyConflict`] with nothing written, so the
    /// engine can re-read the prior entry by key.
    async fn append(
        &self,
        draft: DraftEntry,
        expected_prior_sequence: u64,
    ) -> LedgerResult<LedgerEntry>;

    /// Commit both legs of a transfer as a single all-or-nothing operation
    ///
    /// Either both entries are persisted (with the sequence check applied to
    /// each account) or neither is. Implementations that lock per account must
    /// acquire the two accounts' locks in ascending account-id order.
    async fn append_transfer(
        &self,
        outgoing: DraftEntry,
        incoming: DraftEntry,
        expected_out_sequence: u64,
        expected_in_sequence: u64,
    ) -> LedgerResult<(LedgerEntry, LedgerEntry)>;

    /// Latest committed entry of an account, if any
    async fn latest(&self, account_id: &str) -> LedgerResult<Option<LedgerEntry>>;

    /// One page of an account's chain in ascending sequence order
    ///
    /// `cursor` is the sequence number to resume after; `None` starts from the
    /// beginning of the chain.
    async fn history(
        &self,
        account_id: &str,
        cursor: Option<u64>,
        limit: usize,
    ) -> LedgerResult<HistoryPage>;

    /// Entry previously committed under an idempotency key, if any
    async fn find_by_idempotency_key(
        &self,
        account_id: &str,
        key: &str,
    ) -> LedgerResult<Option<LedgerEntry>>;

    /// Both legs of a committed transfer
    async fn find_transfer_pair(
        &self,
        transfer_id: Uuid,
    ) -> LedgerResult<Option<(LedgerEntry, LedgerEntry)>>;

    /// Look up a single entry by id
    async fn find_entry(&self, entry_id: Uuid) -> LedgerResult<Option<LedgerEntry>>;

    /// Ids of all accounts that have at least one entry
    async fn account_ids(&self) -> LedgerResult<Vec<String>>;

    /// Remove one committed entry
    ///
    /// Administrative override only. Removing an entry breaks the chain's
    /// running balances for every later entry until
    /// [`EntryStore::replace_suffix`] rewrites them; normal callers go through
    /// the facade, which does both as one repair.
    async fn remove(&self, entry_id: Uuid) -> LedgerResult<LedgerEntry>;

    /// Replace every entry of an account from `from_sequence` onward
    ///
    /// Administrative companion to [`EntryStore::remove`]: the replacement
    /// entries carry recomputed running balances for the surviving suffix.
    async fn replace_suffix(
        &self,
        account_id: &str,
        from_sequence: u64,
        entries: Vec<LedgerEntry>,
    ) -> LedgerResult<()>;
}

/// Employee directory consulted for account existence
///
/// Accounts are employee identities owned elsewhere in the ERP; the ledger
/// only ever asks whether one exists.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    /// Whether an employee account exists
    async fn exists(&self, account_id: &str) -> LedgerResult<bool>;
}

/// Read-only view of the expense subsystem's postings
///
/// May be eventually consistent; it is consulted for reconciliation only and
/// never gates a ledger mutation.
#[async_trait]
pub trait ExpensePosting: Send + Sync {
    /// Sum of posted expenses for an account, in minor units
    async fn total_posted_expenses(&self, account_id: &str) -> LedgerResult<i64>;
}

/// Trait for implementing custom entry validation rules
pub trait EntryValidator: Send + Sync {
    /// Validate the request shape before an entry is built
    fn validate_request(&self, account_id: &str, amount: i64, description: &str)
        -> LedgerResult<()>;
}

/// Default entry validator with basic rules
pub struct DefaultEntryValidator;

impl EntryValidator for DefaultEntryValidator {
    fn validate_request(
        &self,
        account_id: &str,
        amount: i64,
        description: &str,
    ) -> LedgerResult<()> {
        if account_id.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account ID cannot be empty".to_string(),
            ));
        }

        if amount <= 0 {
            return Err(LedgerError::Validation(
                "Amount must be positive".to_string(),
            ));
        }

        if description.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Description cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
