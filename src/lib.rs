//! # Statement Reconciler
//!
//! Matches the entries of a credit-card statement against the entries of a
//! bank-account statement.
//!
//! ## Features
//!
//! - **Normalized records**: one record shape for both statements, validated
//!   before it is stored
//! - **Storage abstraction**: the [`LedgerStore`] trait, with in-memory and
//!   SQLite (`sqlite` feature) implementations
//! - **Reconciliation**: a unique-amount pass followed by an amount-and-date
//!   pass, each pair written back to the store as it is found
//! - **Reporting**: matched/unmatched summaries and a match-link integrity check
//!
//! ## Quick Start
//!
//! ```rust
//! use statement_reconciler::utils::MemoryStorage;
//! use statement_reconciler::{Ledger, RecordBuilder};
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//!
//! let mut ledger = Ledger::new(MemoryStorage::new());
//! let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
//!
//! ledger
//!     .record(RecordBuilder::credit_card(date, BigDecimal::from(100)).draft())
//!     .unwrap();
//! ledger
//!     .record(
//!         RecordBuilder::bank_account(date.and_hms_opt(18, 5, 0).unwrap(), BigDecimal::from(100))
//!             .draft(),
//!     )
//!     .unwrap();
//!
//! let outcome = ledger.reconcile().unwrap();
//! assert_eq!(outcome.matched_count(), 1);
//! ```

pub mod ledger;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use ledger::*;
pub use reconciliation::{
    LinkFailure, MatchPair, MatchPhase, ReconcileError, Reconciliation, ReconciliationEngine,
};
pub use traits::*;
pub use types::*;
