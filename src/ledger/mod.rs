//! Ledger module containing record ingestion and the reconciliation facade

pub mod core;
pub mod record;

pub use core::*;
pub use record::*;
