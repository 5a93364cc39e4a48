//! Petty-cash ledger walkthrough

use pettycash_core::utils::{format_minor_units, MemoryDirectory, MemoryExpenses, MemoryStore};
use pettycash_core::{Actor, PettyCashLedger};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("💵 Petty-Cash Core - Ledger Example\n");

    // Wire the ledger to in-memory collaborators
    let directory = MemoryDirectory::new();
    directory.register("emp-ravi");
    directory.register("emp-sara");
    let expenses = MemoryExpenses::new();
    let ledger = PettyCashLedger::new(MemoryStore::new(), directory, expenses.clone());

    // 1. Fund two site engineers
    println!("💰 Funding employee accounts...");
    ledger
        .credit(
            "emp-ravi",
            150_000,
            "Monthly petty-cash fund",
            Actor::User("accountant".to_string()),
            None,
        )
        .await?;
    ledger
        .credit(
            "emp-sara",
            80_000,
            "Monthly petty-cash fund",
            Actor::User("accountant".to_string()),
            None,
        )
        .await?;
    println!("  ✓ Credited ₹1500.00 to emp-ravi");
    println!("  ✓ Credited ₹800.00 to emp-sara\n");

    // 2. Record spending against the funds
    println!("🧾 Recording spending...");
    ledger
        .debit_for_expense(
            "emp-ravi",
            42_500,
            "Diesel for generator",
            "expense-1042",
            Actor::System,
            None,
        )
        .await?;
    println!("  ✓ Debited ₹425.00 from emp-ravi (expense-1042)\n");

    // 3. Move cash between sites
    println!("🔁 Transferring between funds...");
    let pair = ledger
        .transfer(
            "emp-ravi",
            "emp-sara",
            30_000,
            "Cash handover at site B",
            Actor::User("project-manager".to_string()),
        )
        .await?;
    println!(
        "  ✓ Transfer {} moved ₹300.00 from emp-ravi to emp-sara\n",
        pair.outgoing.transfer_id.unwrap()
    );

    // 4. Show derived balances
    println!("📊 Current balances:");
    for balance in ledger.all_balances().await? {
        println!(
            "  {} = ₹{} (after entry {})",
            balance.account_id,
            format_minor_units(balance.balance),
            balance.last_sequence
        );
    }
    println!();

    // 5. Reconcile against posted expenses
    expenses.post("emp-ravi", 95_000);
    println!("🔍 Reconciliation:");
    for report in ledger.reconcile_all().await? {
        let position = if report.difference > 0 {
            "owed a top-up"
        } else {
            "holding surplus credit"
        };
        println!(
            "  {}: posted ₹{}, balance ₹{} -> {}",
            report.account_id,
            format_minor_units(report.posted_expenses),
            format_minor_units(report.ledger_balance),
            position
        );
    }
    println!();

    // 6. Verify chain integrity
    for account in ["emp-ravi", "emp-sara"] {
        let report = ledger.verify_chain(account).await?;
        println!(
            "✅ {}: {} entries verified, valid = {}",
            account, report.entries_checked, report.is_valid
        );
    }

    Ok(())
}
