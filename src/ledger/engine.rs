//! Single-account credit and debit commits

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;

/// Validates and atomically commits credit/debit entries on one account
///
/// Commits run an optimistic loop: read the latest entry, derive the next
/// running balance, and append against the expected prior sequence number.
/// A concurrent commit on the same account surfaces as
/// [`LedgerError::ConcurrencyConflict`] from the store and is retried up to
/// [`LedgerConfig::max_append_attempts`] times. On any failure the chain is
/// exactly as it was before the call.
pub struct TransactionEngine<S: EntryStore, D: EmployeeDirectory> {
    store: S,
    directory: D,
    validator: Box<dyn EntryValidator>,
    config: LedgerConfig,
}

impl<S: EntryStore, D: EmployeeDirectory> TransactionEngine<S, D> {
    /// Create a new engine with the default validator and configuration
    pub fn new(store: S, directory: D) -> Self {
        Self::with_config(store, directory, LedgerConfig::default())
    }

    /// Create a new engine with a custom configuration
    pub fn with_config(store: S, directory: D, config: LedgerConfig) -> Self {
        Self {
            store,
            directory,
            validator: Box::new(DefaultEntryValidator),
            config,
        }
    }

    /// Create a new engine with a custom validator
    pub fn with_validator(
        store: S,
        directory: D,
        config: LedgerConfig,
        validator: Box<dyn EntryValidator>,
    ) -> Self {
        Self {
            store,
            directory,
            validator,
            config,
        }
    }

    /// Credit an employee's fund
    pub async fn credit(
        &self,
        account_id: &str,
        amount: i64,
        description: &str,
        actor: Actor,
        idempotency_key: Option<String>,
    ) -> LedgerResult<LedgerEntry> {
        self.post(
            EntryKind::Credit,
            account_id,
            amount,
            description,
            EntryReference::manual(),
            actor,
            idempotency_key,
        )
        .await
    }

    /// Debit an employee's fund
    pub async fn debit(
        &self,
        account_id: &str,
        amount: i64,
        description: &str,
        actor: Actor,
        idempotency_key: Option<String>,
    ) -> LedgerResult<LedgerEntry> {
        self.post(
            EntryKind::Debit,
            account_id,
            amount,
            description,
            EntryReference::manual(),
            actor,
            idempotency_key,
        )
        .await
    }

    /// Debit an employee's fund against a posted expense
    pub async fn debit_for_expense(
        &self,
        account_id: &str,
        amount: i64,
        description: &str,
        expense_id: &str,
        actor: Actor,
        idempotency_key: Option<String>,
    ) -> LedgerResult<LedgerEntry> {
        self.post(
            EntryKind::Debit,
            account_id,
            amount,
            description,
            EntryReference::expense(expense_id),
            actor,
            idempotency_key,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn post(
        &self,
        kind: EntryKind,
        account_id: &str,
        amount: i64,
        description: &str,
        reference: EntryReference,
        actor: Actor,
        idempotency_key: Option<String>,
    ) -> LedgerResult<LedgerEntry> {
        self.validator
            .validate_request(account_id, amount, description)?;

        if !self.directory.exists(account_id).await? {
            return Err(LedgerError::AccountNotFound(account_id.to_string()));
        }

        if let Some(key) = idempotency_key.as_deref() {
            if let Some(prior) = self.store.find_by_idempotency_key(account_id, key).await? {
                debug!(account = %account_id, key, "idempotent replay, returning prior entry");
                return Ok(prior);
            }
        }

        for attempt in 1..=self.config.max_append_attempts {
            let latest = self.store.latest(account_id).await?;
            let (prior_sequence, prior_balance) = latest
                .map(|entry| (entry.sequence_number, entry.balance_after))
                .unwrap_or((0, 0));

            let balance_after = prior_balance + kind.signed_delta(amount);
            if kind.draws_down() && balance_after < self.config.floor {
                return Err(LedgerError::InsufficientBalance {
                    account_id: account_id.to_string(),
                    available: prior_balance - self.config.floor,
                    requested: amount,
                });
            }

            let draft = DraftEntry {
                id: Uuid::new_v4(),
                account_id: account_id.to_string(),
                kind,
                amount,
                balance_after,
                description: description.to_string(),
                reference: reference.clone(),
                counterparty_account_id: None,
                transfer_id: None,
                processed_by: actor.clone(),
                idempotency_key: idempotency_key.clone(),
                created_at: Utc::now(),
            };
            draft.validate()?;

            match self.store.append(draft, prior_sequence).await {
                Ok(entry) => {
                    debug!(
                        account = %account_id,
                        sequence = entry.sequence_number,
                        kind = ?kind,
                        amount,
                        "committed entry"
                    );
                    return Ok(entry);
                }
                Err(LedgerError::ConcurrencyConflict(_)) => {
                    // Another writer extended the chain (or claimed the same
                    // idempotency key) between our read and our append.
                    if let Some(key) = idempotency_key.as_deref() {
                        if let Some(prior) =
                            self.store.find_by_idempotency_key(account_id, key).await?
                        {
                            return Ok(prior);
                        }
                    }
                    debug!(account = %account_id, attempt, "append conflict, retrying");
                }
                Err(other) => {
                    warn!(account = %account_id, error = %other, "append failed");
                    return Err(other);
                }
            }
        }

        Err(LedgerError::ConcurrencyConflict(account_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_store::{MemoryDirectory, MemoryStore};

    fn engine() -> TransactionEngine<MemoryStore, MemoryDirectory> {
        let directory = MemoryDirectory::new();
        directory.register("emp-1");
        TransactionEngine::new(MemoryStore::new(), directory)
    }

    #[tokio::test]
    async fn credit_then_debit_tracks_running_balance() {
        let engine = engine();

        let credit = engine
            .credit("emp-1", 1000, "Fund top-up", Actor::User("accountant".into()), None)
            .await
            .unwrap();
        assert_eq!(credit.sequence_number, 1);
        assert_eq!(credit.balance_after, 1000);

        let debit = engine
            .debit("emp-1", 400, "Site materials", Actor::User("accountant".into()), None)
            .await
            .unwrap();
        assert_eq!(debit.sequence_number, 2);
        assert_eq!(debit.balance_after, 600);
    }

    #[tokio::test]
    async fn rejects_non_positive_amounts() {
        let engine = engine();

        let err = engine
            .credit("emp-1", 0, "Nothing", Actor::System, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = engine
            .debit("emp-1", -50, "Negative", Actor::System, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_unknown_account() {
        let engine = engine();

        let err = engine
            .credit("ghost", 100, "Top-up", Actor::System, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn overdraw_fails_and_writes_nothing() {
        let engine = engine();
        engine
            .credit("emp-1", 300, "Fund top-up", Actor::System, None)
            .await
            .unwrap();

        let err = engine
            .debit("emp-1", 1000, "Too much", Actor::User("accountant".into()), None)
            .await
            .unwrap_err();
        match err {
            LedgerError::InsufficientBalance {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 300);
                assert_eq!(requested, 1000);
            }
            other => panic!("expected InsufficientBalance, got {other:?}"),
        }

        let latest = engine.store.latest("emp-1").await.unwrap().unwrap();
        assert_eq!(latest.sequence_number, 1);
        assert_eq!(latest.balance_after, 300);
    }

    #[tokio::test]
    async fn idempotency_key_replay_returns_prior_entry() {
        let engine = engine();

        let first = engine
            .credit(
                "emp-1",
                500,
                "Fund top-up",
                Actor::User("accountant".into()),
                Some("req-42".into()),
            )
            .await
            .unwrap();
        let replay = engine
            .credit(
                "emp-1",
                500,
                "Fund top-up",
                Actor::User("accountant".into()),
                Some("req-42".into()),
            )
            .await
            .unwrap();

        assert_eq!(first, replay);
        let latest = engine.store.latest("emp-1").await.unwrap().unwrap();
        assert_eq!(latest.sequence_number, 1);
    }

    #[tokio::test]
    async fn negative_floor_permits_overdraft() {
        let directory = MemoryDirectory::new();
        directory.register("emp-1");
        let config = LedgerConfig {
            floor: -500,
            ..LedgerConfig::default()
        };
        let engine = TransactionEngine::with_config(MemoryStore::new(), directory, config);

        let entry = engine
            .debit("emp-1", 300, "Advance", Actor::System, None)
            .await
            .unwrap();
        assert_eq!(entry.balance_after, -300);

        let err = engine
            .debit("emp-1", 300, "Too deep", Actor::System, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    }
}
