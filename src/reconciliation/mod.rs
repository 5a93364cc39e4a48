//! Reconciliation of ledger balances against posted expenses
//!
//! The expense subsystem records what an employee has actually spent; the
//! ledger records the cash entrusted to them. Comparing the two shows who is
//! owed a top-up and who is sitting on surplus credit. The expense view may
//! be eventually consistent, so the difference is informational only and
//! never gates a ledger mutation.

use serde::{Deserialize, Serialize};

use crate::ledger::BalanceReader;
use crate::traits::*;
use crate::types::*;

/// Ledger-vs-expenses comparison for one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Employee account
    pub account_id: String,
    /// Sum of expenses posted against the account, in minor units
    pub posted_expenses: i64,
    /// Current derived ledger balance, in minor units
    pub ledger_balance: i64,
    /// `posted_expenses - ledger_balance`; positive means the employee has
    /// spent beyond their current credit and is owed a top-up
    pub difference: i64,
}

/// Compares derived ledger balances with the expense subsystem's postings
pub struct ReconciliationService<S: EntryStore, E: ExpensePosting> {
    reader: BalanceReader<S>,
    expenses: E,
}

impl<S: EntryStore, E: ExpensePosting> ReconciliationService<S, E> {
    /// Create a new service over the given store and expense view
    pub fn new(store: S, expenses: E) -> Self {
        Self {
            reader: BalanceReader::new(store),
            expenses,
        }
    }

    /// Posted expenses minus ledger balance for one account
    pub async fn expense_credit_difference(&self, account_id: &str) -> LedgerResult<i64> {
        let posted = self.expenses.total_posted_expenses(account_id).await?;
        let balance = self.reader.balance_of(account_id).await?;
        Ok(posted - balance)
    }

    /// Full reconciliation report for one account
    pub async fn reconcile(&self, account_id: &str) -> LedgerResult<ReconciliationReport> {
        let posted_expenses = self.expenses.total_posted_expenses(account_id).await?;
        let ledger_balance = self.reader.balance_of(account_id).await?;

        Ok(ReconciliationReport {
            account_id: account_id.to_string(),
            posted_expenses,
            ledger_balance,
            difference: posted_expenses - ledger_balance,
        })
    }

    /// Reconciliation reports for every account with at least one entry
    pub async fn reconcile_all(&self) -> LedgerResult<Vec<ReconciliationReport>> {
        let mut reports = Vec::new();
        for balance in self.reader.all_balances().await? {
            reports.push(self.reconcile(&balance.account_id).await?);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TransactionEngine;
    use crate::utils::memory_store::{MemoryDirectory, MemoryExpenses, MemoryStore};

    #[tokio::test]
    async fn overspent_employee_shows_positive_difference() {
        let store = MemoryStore::new();
        let directory = MemoryDirectory::new();
        directory.register("emp-1");
        let expenses = MemoryExpenses::new();

        let engine = TransactionEngine::new(store.clone(), directory);
        engine
            .credit("emp-1", 600, "Fund top-up", Actor::System, None)
            .await
            .unwrap();
        expenses.post("emp-1", 800);

        let service = ReconciliationService::new(store, expenses);
        assert_eq!(
            service.expense_credit_difference("emp-1").await.unwrap(),
            200
        );

        let report = service.reconcile("emp-1").await.unwrap();
        assert_eq!(report.posted_expenses, 800);
        assert_eq!(report.ledger_balance, 600);
        assert_eq!(report.difference, 200);
    }

    #[tokio::test]
    async fn surplus_credit_shows_negative_difference() {
        let store = MemoryStore::new();
        let directory = MemoryDirectory::new();
        directory.register("emp-1");
        let expenses = MemoryExpenses::new();
        expenses.post("emp-1", 100);

        let engine = TransactionEngine::new(store.clone(), directory);
        engine
            .credit("emp-1", 400, "Fund top-up", Actor::System, None)
            .await
            .unwrap();

        let service = ReconciliationService::new(store, expenses);
        assert_eq!(
            service.expense_credit_difference("emp-1").await.unwrap(),
            -300
        );
    }
}
