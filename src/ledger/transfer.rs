//! Paired transfers between two employee funds

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;

/// Atomically commits a TransferOut/TransferIn pair across two accounts
///
/// Both legs share one `transfer_id`, carry swapped account/counterparty
/// fields, and are committed through [`EntryStore::append_transfer`] as a
/// single all-or-nothing operation; no partial transfer is ever observable.
/// Stores that lock per account take the two locks in ascending account-id
/// order, so two transfers running in opposite directions cannot deadlock.
pub struct TransferCoordinator<S: EntryStore, D: EmployeeDirectory> {
    store: S,
    directory: D,
    validator: Box<dyn EntryValidator>,
    config: LedgerConfig,
}

impl<S: EntryStore, D: EmployeeDirectory> TransferCoordinator<S, D> {
    /// Create a new coordinator with the default validator and configuration
    pub fn new(store: S, directory: D) -> Self {
        Self::with_config(store, directory, LedgerConfig::default())
    }

    /// Create a new coordinator with a custom configuration
    pub fn with_config(store: S, directory: D, config: LedgerConfig) -> Self {
        Self {
            store,
            directory,
            validator: Box::new(DefaultEntryValidator),
            config,
        }
    }

    /// Create a new coordinator with a custom validator
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

    /// Move cash from one employee's fund to another's
    pub async fn transfer(
        &self,
        from_account_id: &str,
        to_account_id: &str,
        amount: i64,
        description: &str,
        actor: Actor,
    ) -> LedgerResult<TransferPair> {
        if from_account_id == to_account_id {
            return Err(LedgerError::SameAccountTransfer(
                from_account_id.to_string(),
            ));
        }

        self.validator
            .validate_request(from_account_id, amount, description)?;
        self.validator
            .validate_request(to_account_id, amount, description)?;

        if !self.directory.exists(from_account_id).await? {
            return Err(LedgerError::AccountNotFound(from_account_id.to_string()));
        }
        if !self.directory.exists(to_account_id).await? {
            return Err(LedgerError::AccountNotFound(to_account_id.to_string()));
        }

        for attempt in 1..=self.config.max_append_attempts {
            let (from_sequence, from_balance) = self.latest_position(from_account_id).await?;
            let (to_sequence, to_balance) = self.latest_position(to_account_id).await?;

            if from_balance - amount < self.config.floor {
                return Err(LedgerError::InsufficientBalance {
                    account_id: from_account_id.to_string(),
                    available: from_balance - self.config.floor,
                    requested: amount,
                });
            }

            let transfer_id = Uuid::new_v4();
            let now = Utc::now();

            let outgoing = DraftEntry {
                id: Uuid::new_v4(),
                account_id: from_account_id.to_string(),
                kind: EntryKind::TransferOut,
                amount,
                balance_after: from_balance - amount,
                description: description.to_string(),
                reference: EntryReference::transfer(transfer_id),
                counterparty_account_id: Some(to_account_id.to_string()),
                transfer_id: Some(transfer_id),
                processed_by: actor.clone(),
                idempotency_key: None,
                created_at: now,
            };
            let incoming = DraftEntry {
                id: Uuid::new_v4(),
                account_id: to_account_id.to_string(),
                kind: EntryKind::TransferIn,
                amount,
                balance_after: to_balance + amount,
                description: description.to_string(),
                reference: EntryReference::transfer(transfer_id),
                counterparty_account_id: Some(from_account_id.to_string()),
                transfer_id: Some(transfer_id),
                processed_by: actor.clone(),
                idempotency_key: None,
                created_at: now,
            };
            outgoing.validate()?;
            incoming.validate()?;

            match self
                .store
                .append_transfer(outgoing, incoming, from_sequence, to_sequence)
                .await
            {
                Ok((outgoing, incoming)) => {
                    debug!(
                        from = %from_account_id,
                        to = %to_account_id,
                        %transfer_id,
                        amount,
                        "committed transfer pair"
                    );
                    return Ok(TransferPair { outgoing, incoming });
                }
                Err(LedgerError::ConcurrencyConflict(_)) => {
                    debug!(
                        from = %from_account_id,
                        to = %to_account_id,
                        attempt,
                        "transfer conflict, retrying"
                    );
                }
                Err(other) => {
                    warn!(
                        from = %from_account_id,
                        to = %to_account_id,
                        error = %other,
                        "transfer failed"
                    );
                    return Err(other);
                }
            }
        }

        Err(LedgerError::ConcurrencyConflict(format!(
            "{} -> {}",
            from_account_id, to_account_id
        )))
    }

    async fn latest_position(&self, account_id: &str) -> LedgerResult<(u64, i64)> {
        Ok(self
            .store
            .latest(account_id)
            .await?
            .map(|entry| (entry.sequence_number, entry.balance_after))
            .unwrap_or((0, 0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::engine::TransactionEngine;
    use crate::utils::memory_store::{MemoryDirectory, MemoryStore};

    fn fixtures() -> (
        TransactionEngine<MemoryStore, MemoryDirectory>,
        TransferCoordinator<MemoryStore, MemoryDirectory>,
        MemoryStore,
    ) {
        let store = MemoryStore::new();
        let directory = MemoryDirectory::new();
        directory.register("emp-a");
        directory.register("emp-b");
        (
            TransactionEngine::new(store.clone(), directory.clone()),
            TransferCoordinator::new(store.clone(), directory),
            store,
        )
    }

    #[tokio::test]
    async fn transfer_moves_cash_and_pairs_the_legs() {
        let (engine, transfers, _store) = fixtures();
        engine
            .credit("emp-a", 600, "Fund top-up", Actor::System, None)
            .await
            .unwrap();

        let pair = transfers
            .transfer("emp-a", "emp-b", 300, "Site handover", Actor::User("pm".into()))
            .await
            .unwrap();

        assert_eq!(pair.outgoing.kind, EntryKind::TransferOut);
        assert_eq!(pair.outgoing.balance_after, 300);
        assert_eq!(pair.incoming.kind, EntryKind::TransferIn);
        assert_eq!(pair.incoming.balance_after, 300);
        assert_eq!(pair.outgoing.transfer_id, pair.incoming.transfer_id);
        assert_eq!(
            pair.outgoing.counterparty_account_id.as_deref(),
            Some("emp-b")
        );
        assert_eq!(
            pair.incoming.counterparty_account_id.as_deref(),
            Some("emp-a")
        );
    }

    #[tokio::test]
    async fn transfer_to_same_account_is_rejected() {
        let (_, transfers, _store) = fixtures();

        let err = transfers
            .transfer("emp-a", "emp-a", 100, "Loop", Actor::System)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::SameAccountTransfer(id) if id == "emp-a"));
    }

    #[tokio::test]
    async fn transfer_beyond_balance_mutates_nothing() {
        let (engine, transfers, store) = fixtures();
        engine
            .credit("emp-a", 200, "Fund top-up", Actor::System, None)
            .await
            .unwrap();

        let err = transfers
            .transfer("emp-a", "emp-b", 500, "Too much", Actor::System)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

        let from_latest = store.latest("emp-a").await.unwrap().unwrap();
        assert_eq!(from_latest.balance_after, 200);
        assert!(store.latest("emp-b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transfer_rejects_unknown_destination() {
        let (engine, transfers, _store) = fixtures();
        engine
            .credit("emp-a", 200, "Fund top-up", Actor::System, None)
            .await
            .unwrap();

        let err = transfers
            .transfer("emp-a", "ghost", 100, "Nowhere", Actor::System)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(id) if id == "ghost"));
    }
}
