//! Main ledger facade that coordinates commits, reads, and reconciliation

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::ledger::{BalanceReader, TransactionEngine, TransferCoordinator};
use crate::reconciliation::{ReconciliationReport, ReconciliationService};
use crate::traits::*;
use crate::types::*;

const CHAIN_PAGE_SIZE: usize = 256;

/// Petty-cash ledger system orchestrating all fund operations
///
/// Wraps the transaction engine, the transfer coordinator, the balance
/// reader, and the reconciliation service behind one storage-generic type.
pub struct PettyCashLedger<S, D, E>
where
    S: EntryStore + Clone,
    D: EmployeeDirectory + Clone,
    E: ExpensePosting,
{
    engine: TransactionEngine<S, D>,
    transfers: TransferCoordinator<S, D>,
    reader: BalanceReader<S>,
    reconciliation: ReconciliationService<S, E>,
    store: S,
}

impl<S, D, E> PettyCashLedger<S, D, E>
where
    S: EntryStore + Clone,
    D: EmployeeDirectory + Clone,
    E: ExpensePosting,
{
    /// Create a new ledger with the default configuration
    pub fn new(store: S, directory: D, expenses: E) -> Self {
        Self::with_config(store, directory, expenses, LedgerConfig::default())
    }

    /// Create a new ledger with a custom configuration
    pub fn with_config(store: S, directory: D, expenses: E, config: LedgerConfig) -> Self {
        Self {
            engine: TransactionEngine::with_config(store.clone(), directory.clone(), config),
            transfers: TransferCoordinator::with_config(store.clone(), directory, config),
            reader: BalanceReader::new(store.clone()),
            reconciliation: ReconciliationService::new(store.clone(), expenses),
            store,
        }
    }

    // Mutations
    /// Credit an employee's fund
    pub async fn credit(
        &self,
        account_id: &str,
        amount: i64,
        description: &str,
        actor: Actor,
        idempotency_key: Option<String>,
    ) -> LedgerResult<LedgerEntry> {
        self.engine
            .credit(account_id, amount, description, actor, idempotency_key)
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
        self.engine
            .debit(account_id, amount, description, actor, idempotency_key)
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
        self.engine
            .debit_for_expense(
                account_id,
                amount,
                description,
                expense_id,
                actor,
                idempotency_key,
            )
            .await
    }

    /// Move cash between two employees' funds
    pub async fn transfer(
        &self,
        from_account_id: &str,
        to_account_id: &str,
        amount: i64,
        description: &str,
        actor: Actor,
    ) -> LedgerResult<TransferPair> {
        self.transfers
            .transfer(from_account_id, to_account_id, amount, description, actor)
            .await
    }

    // Reads
    /// Current balance of an account, in minor units
    pub async fn balance_of(&self, account_id: &str) -> LedgerResult<i64> {
        self.reader.balance_of(account_id).await
    }

    /// Current balances of every account with at least one entry
    pub async fn all_balances(&self) -> LedgerResult<Vec<AccountBalance>> {
        self.reader.all_balances().await
    }

    /// One page of an account's chain, ascending by sequence number
    pub async fn history(
        &self,
        account_id: &str,
        cursor: Option<u64>,
        limit: usize,
    ) -> LedgerResult<HistoryPage> {
        self.reader.history(account_id, cursor, limit).await
    }

    // Reconciliation
    /// Posted expenses minus ledger balance for one account
    pub async fn expense_credit_difference(&self, account_id: &str) -> LedgerResult<i64> {
        self.reconciliation
            .expense_credit_difference(account_id)
            .await
    }

    /// Reconciliation report for one account
    pub async fn reconcile(&self, account_id: &str) -> LedgerResult<ReconciliationReport> {
        self.reconciliation.reconcile(account_id).await
    }

    /// Reconciliation reports for every account with entries
    pub async fn reconcile_all(&self) -> LedgerResult<Vec<ReconciliationReport>> {
        self.reconciliation.reconcile_all().await
    }

    // Integrity
    /// Replay an account's chain and re-derive every running balance
    ///
    /// Checks that sequence numbers strictly increase, that each
    /// `balance_after` equals the predecessor balance plus the entry's signed
    /// delta, and that every transfer leg has a matching counterpart with the
    /// same amount and swapped accounts.
    pub async fn verify_chain(&self, account_id: &str) -> LedgerResult<ChainIntegrityReport> {
        let entries = self.full_chain(account_id).await?;
        let mut issues = Vec::new();
        let mut running_balance = 0i64;
        let mut prior_sequence = 0u64;

        for entry in &entries {
            if entry.sequence_number <= prior_sequence {
                issues.push(format!(
                    "Entry {} has sequence {} not above predecessor {}",
                    entry.id, entry.sequence_number, prior_sequence
                ));
            }
            prior_sequence = entry.sequence_number;

            if entry.amount <= 0 {
                issues.push(format!(
                    "Entry {} has non-positive amount {}",
                    entry.id, entry.amount
                ));
            }

            running_balance += entry.signed_delta();
            if entry.balance_after != running_balance {
                issues.push(format!(
                    "Entry {} (sequence {}) has balance_after {}, replay gives {}",
                    entry.id, entry.sequence_number, entry.balance_after, running_balance
                ));
                // Continue the replay from the stored balance so one broken
                // link reports once instead of cascading.
                running_balance = entry.balance_after;
            }

            if entry.kind.is_transfer() {
                self.check_transfer_pairing(entry, &mut issues).await?;
            } else if entry.counterparty_account_id.is_some() || entry.transfer_id.is_some() {
                issues.push(format!(
                    "Entry {} is not a transfer leg but carries transfer fields",
                    entry.id
                ));
            }
        }

        Ok(ChainIntegrityReport {
            account_id: account_id.to_string(),
            entries_checked: entries.len(),
            is_valid: issues.is_empty(),
            issues,
        })
    }

    /// Remove a committed entry and repair the chain — administrative override
    ///
    /// This is deliberately outside the invariant-preserving API surface:
    /// committed entries are otherwise immutable. Removing one leg of a
    /// transfer removes its counterpart too, so no pairing ever dangles. The
    /// running balances of every later entry on the affected account(s) are
    /// recomputed immediately; sequence numbers are preserved, leaving a gap
    /// as the audit trace of the removal. Callers must quiesce writers on the
    /// affected accounts for the duration.
    pub async fn admin_remove_entry(&self, entry_id: Uuid) -> LedgerResult<AdminRemoval> {
        let entry = self
            .store
            .find_entry(entry_id)
            .await?
            .ok_or_else(|| LedgerError::EntryNotFound(entry_id.to_string()))?;

        let mut targets = vec![entry.clone()];
        if let Some(transfer_id) = entry.transfer_id {
            if let Some((outgoing, incoming)) = self.store.find_transfer_pair(transfer_id).await? {
                let counterpart = if outgoing.id == entry.id {
                    incoming
                } else {
                    outgoing
                };
                if counterpart.id != entry.id {
                    targets.push(counterpart);
                }
            }
        }

        let mut removed = Vec::new();
        for target in &targets {
            warn!(
                account = %target.account_id,
                entry = %target.id,
                sequence = target.sequence_number,
                "administrative removal of committed entry"
            );
            removed.push(self.store.remove(target.id).await?);
        }

        let mut rewritten = Vec::new();
        for target in &removed {
            rewritten.extend(
                self.recompute_suffix(&target.account_id, target.sequence_number)
                    .await?,
            );
        }

        Ok(AdminRemoval { removed, rewritten })
    }

    /// Rewrite the running balances of an account from `from_sequence` onward
    async fn recompute_suffix(
        &self,
        account_id: &str,
        from_sequence: u64,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let entries = self.full_chain(account_id).await?;

        let mut prior_balance = entries
            .iter()
            .take_while(|entry| entry.sequence_number < from_sequence)
            .last()
            .map(|entry| entry.balance_after)
            .unwrap_or(0);

        let mut rewritten = Vec::new();
        for entry in entries
            .into_iter()
            .filter(|entry| entry.sequence_number >= from_sequence)
        {
            prior_balance += entry.signed_delta();
            let mut updated = entry;
            updated.balance_after = prior_balance;
            rewritten.push(updated);
        }

        self.store
            .replace_suffix(account_id, from_sequence, rewritten.clone())
            .await?;
        Ok(rewritten)
    }

    async fn check_transfer_pairing(
        &self,
        entry: &LedgerEntry,
        issues: &mut Vec<String>,
    ) -> LedgerResult<()> {
        let Some(transfer_id) = entry.transfer_id else {
            issues.push(format!("Transfer leg {} has no transfer id", entry.id));
            return Ok(());
        };
        if entry.counterparty_account_id.is_none() {
            issues.push(format!("Transfer leg {} has no counterparty", entry.id));
        }

        match self.store.find_transfer_pair(transfer_id).await? {
            Some((outgoing, incoming)) => {
                if outgoing.amount != incoming.amount {
                    issues.push(format!(
                        "Transfer {} legs disagree on amount: {} vs {}",
                        transfer_id, outgoing.amount, incoming.amount
                    ));
                }
                if outgoing.counterparty_account_id.as_deref() != Some(incoming.account_id.as_str())
                    || incoming.counterparty_account_id.as_deref()
                        != Some(outgoing.account_id.as_str())
                {
                    issues.push(format!(
                        "Transfer {} legs do not reference each other's accounts",
                        transfer_id
                    ));
                }
            }
            None => {
                issues.push(format!(
                    "Transfer leg {} (transfer {}) has no committed counterpart",
                    entry.id, transfer_id
                ));
            }
        }
        Ok(())
    }

    async fn full_chain(&self, account_id: &str) -> LedgerResult<Vec<LedgerEntry>> {
        let mut entries = Vec::new();
        let mut cursor = None;

        loop {
            let page = self
                .store
                .history(account_id, cursor, CHAIN_PAGE_SIZE)
                .await?;
            entries.extend(page.entries);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(entries)
    }
}

/// Result of replaying one account's chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainIntegrityReport {
    pub account_id: String,
    pub entries_checked: usize,
    pub is_valid: bool,
    pub issues: Vec<String>,
}

/// Result of an administrative entry removal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminRemoval {
    /// Entries taken out of the ledger (both legs for a transfer)
    pub removed: Vec<LedgerEntry>,
    /// Entries whose running balance was rewritten by the repair
    pub rewritten: Vec<LedgerEntry>,
}
