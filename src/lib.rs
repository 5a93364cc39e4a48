//! # Petty-Cash Core
//!
//! The petty-cash ledger engine of a construction-company ERP: append-only
//! per-employee cash ledgers, derived balances, atomic inter-employee
//! transfers, and reconciliation against posted expenses.
//!
//! ## Features
//!
//! - **Append-only entry chains**: every credit, debit, and transfer leg is an
//!   immutable entry with a per-account sequence number and running balance
//! - **Derived balances**: an account's balance is always the `balance_after`
//!   of its latest entry, never a separately cached figure
//! - **Atomic transfers**: both legs of an inter-employee transfer commit
//!   together or not at all, sharing one transfer id
//! - **Optimistic concurrency**: commits race on the sequence number and retry
//!   a bounded number of times, so concurrent writers can never fork a chain
//! - **Reconciliation**: derived balances compared against the expense
//!   subsystem's postings to show who is owed a top-up
//! - **Storage abstraction**: database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use pettycash_core::utils::{MemoryDirectory, MemoryExpenses, MemoryStore};
//! use pettycash_core::{Actor, PettyCashLedger};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = MemoryDirectory::new();
//! directory.register("emp-1");
//! let ledger = PettyCashLedger::new(MemoryStore::new(), directory, MemoryExpenses::new());
//!
//! ledger
//!     .credit("emp-1", 100_000, "Monthly fund top-up", Actor::System, None)
//!     .await?;
//! assert_eq!(ledger.balance_of("emp-1").await?, 100_000);
//! # Ok(())
//! # }
//! ```

pub mod ledger;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use ledger::*;
pub use reconciliation::*;
pub use traits::*;
pub use types::*;
