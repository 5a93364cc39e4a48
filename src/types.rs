//! Core types and data structures for the petty-cash ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of postings against an employee's petty-cash account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Cash handed into the employee's fund
    Credit,
    /// Cash spent out of the employee's fund
    Debit,
    /// Incoming leg of an inter-employee transfer
    TransferIn,
    /// Outgoing leg of an inter-employee transfer
    TransferOut,
}

impl EntryKind {
    /// Signed effect of an entry of this kind on the running balance
    pub fn signed_delta(&self, amount: i64) -> i64 {
        match self {
            EntryKind::Credit | EntryKind::TransferIn => amount,
            EntryKind::Debit | EntryKind::TransferOut => -amount,
        }
    }

    /// Whether this kind draws the balance down and is subject to the floor
    pub fn draws_down(&self) -> bool {
        matches!(self, EntryKind::Debit | EntryKind::TransferOut)
    }

    /// Whether this kind is one leg of a transfer pair
    pub fn is_transfer(&self) -> bool {
        matches!(self, EntryKind::TransferIn | EntryKind::TransferOut)
    }
}

/// The identity that processed an entry
///
/// Automated postings use [`Actor::System`], so `processed_by` is never absent
/// from an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    /// A named back-office user
    User(String),
    /// Automated posting (imports, scheduled jobs)
    System,
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::User(name) => write!(f, "{}", name),
            Actor::System => write!(f, "System"),
        }
    }
}

/// What an entry refers back to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// Entered by hand in the back office
    Manual,
    /// Posted from an expense record
    Expense,
    /// One leg of an inter-employee transfer
    Transfer,
}

/// Reference from an entry to the object that caused it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryReference {
    /// Kind of the referenced object
    pub kind: ReferenceKind,
    /// Identifier of the referenced object, when one exists
    pub reference_id: Option<String>,
}

impl EntryReference {
    /// Reference for a hand-entered posting
    pub fn manual() -> Self {
        Self {
            kind: ReferenceKind::Manual,
            reference_id: None,
        }
    }

    /// Reference to a posted expense
    pub fn expense(expense_id: impl Into<String>) -> Self {
        Self {
            kind: ReferenceKind::Expense,
            reference_id: Some(expense_id.into()),
        }
    }

    /// Reference to the transfer that produced this leg
    pub fn transfer(transfer_id: Uuid) -> Self {
        Self {
            kind: ReferenceKind::Transfer,
            reference_id: Some(transfer_id.to_string()),
        }
    }
}

/// One committed, immutable ledger entry
///
/// Amounts are integer minor units (e.g. paise, cents). `sequence_number` is
/// the authoritative per-account commit order; `created_at` is for display and
/// audit only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique identifier for the entry
    pub id: Uuid,
    /// Employee account the entry belongs to
    pub account_id: String,
    /// Kind of posting
    pub kind: EntryKind,
    /// Positive amount in minor units
    pub amount: i64,
    /// Strictly increasing per-account position, assigned at commit
    pub sequence_number: u64,
    /// Signed running balance immediately after this entry
    pub balance_after: i64,
    /// Human-readable description
    pub description: String,
    /// What the entry refers back to
    pub reference: EntryReference,
    /// The other account of a transfer pair, for transfer legs only
    pub counterparty_account_id: Option<String>,
    /// Shared identifier of a transfer pair, for transfer legs only
    pub transfer_id: Option<Uuid>,
    /// Who processed the entry
    pub processed_by: Actor,
    /// Caller-supplied replay token, when the mutation was idempotent
    pub idempotency_key: Option<String>,
    /// When the entry was committed
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Signed effect of this entry on the running balance
    pub fn signed_delta(&self) -> i64 {
        self.kind.signed_delta(self.amount)
    }
}

/// An entry prepared by an engine but not yet committed
///
/// Carries everything except `sequence_number`, which the store assigns
/// atomically with the concurrency check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftEntry {
    pub id: Uuid,
    pub account_id: String,
    pub kind: EntryKind,
    pub amount: i64,
    pub balance_after: i64,
    pub description: String,
    pub reference: EntryReference,
    pub counterparty_account_id: Option<String>,
    pub transfer_id: Option<Uuid>,
    pub processed_by: Actor,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DraftEntry {
    /// Basic structural validation of the draft
    pub fn validate(&self) -> LedgerResult<()> {
        if self.amount <= 0 {
            return Err(LedgerError::Validation(
                "Entry amount must be positive".to_string(),
            ));
        }

        if self.kind.is_transfer() {
            if self.counterparty_account_id.is_none() || self.transfer_id.is_none() {
                return Err(LedgerError::Validation(
                    "Transfer legs must carry a counterparty and a transfer id".to_string(),
                ));
            }
            if self.counterparty_account_id.as_deref() == Some(self.account_id.as_str()) {
                return Err(LedgerError::Validation(
                    "Transfer counterparty cannot be the entry's own account".to_string(),
                ));
            }
        } else if self.counterparty_account_id.is_some() || self.transfer_id.is_some() {
            return Err(LedgerError::Validation(
                "Only transfer legs may carry a counterparty or transfer id".to_string(),
            ));
        }

        Ok(())
    }

    /// Seal the draft with its committed position
    pub fn into_committed(self, sequence_number: u64) -> LedgerEntry {
        LedgerEntry {
            id: self.id,
            account_id: self.account_id,
            kind: self.kind,
            amount: self.amount,
            sequence_number,
            balance_after: self.balance_after,
            description: self.description,
            reference: self.reference,
            counterparty_account_id: self.counterparty_account_id,
            transfer_id: self.transfer_id,
            processed_by: self.processed_by,
            idempotency_key: self.idempotency_key,
            created_at: self.created_at,
        }
    }
}

/// The two committed legs of an inter-employee transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferPair {
    /// TransferOut leg on the source account
    pub outgoing: LedgerEntry,
    /// TransferIn leg on the destination account
    pub incoming: LedgerEntry,
}

/// Current derived balance of one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// Employee account
    pub account_id: String,
    /// Balance after the latest committed entry
    pub balance: i64,
    /// Sequence number of the latest committed entry
    pub last_sequence: u64,
    /// Commit time of the latest entry
    pub updated_at: DateTime<Utc>,
}

/// One page of an account's history, ascending by sequence number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    /// Entries in this page
    pub entries: Vec<LedgerEntry>,
    /// Cursor to resume from, absent once the chain is exhausted
    pub next_cursor: Option<u64>,
}

/// Tunables for the ledger engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Minimum permitted `balance_after` for a Debit or TransferOut
    pub floor: i64,
    /// Bounded retries for an optimistic append before surfacing the conflict
    pub max_append_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            floor: 0,
            max_append_attempts: 5,
        }
    }
}

/// Errors that can occur in the ledger system
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Entry not found: {0}")]
    EntryNotFound(String),
    #[error(
        "Insufficient balance on account '{account_id}': available {available}, requested {requested}"
    )]
    InsufficientBalance {
        account_id: String,
        available: i64,
        requested: i64,
    },
    #[error("Transfer source and destination are the same account: {0}")]
    SameAccountTransfer(String),
    #[error("Concurrent commit on account: {0}")]
    ConcurrencyConflict(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
