//! Traits for storage abstraction and extensibility

use crate::types::*;

/// Storage abstraction for the two statement ledgers
///
/// This trait allows the reconciliation engine to work with any storage
/// backend (SQLite, in-memory, etc.) by implementing these methods.
/// Implementations must make every write visible to subsequent reads through
/// the same handle.
pub trait LedgerStore {
    /// Save a new record; its id must not exist in either ledger.
    ///
    /// Records enter the store unmatched. A record whose `matched` is already
    /// set is rejected with [`LedgerError::MalformedRecord`]; pairs are only
    /// ever made through [`LedgerStore::link`].
    fn insert(&mut self, record: &TransactionRecord) -> LedgerResult<()>;

    /// Get a record by ID, whichever ledger holds it
    fn get(&self, id: &RecordId) -> LedgerResult<Option<TransactionRecord>>;

    /// List every record of a ledger in insertion order
    fn records(&self, source: Source) -> LedgerResult<Vec<TransactionRecord>>;

    /// List the records of a ledger that are not matched yet, in a stable order
    fn unmatched(&self, source: Source) -> LedgerResult<Vec<TransactionRecord>>;

    /// Pair two records from opposite ledgers.
    ///
    /// Both `matched` fields are set in one atomic step. Fails with
    /// [`LedgerError::NotFound`] if either id is absent,
    /// [`LedgerError::AlreadyMatched`] if either side is already paired and
    /// [`LedgerError::SameLedger`] if both ids live in the same ledger. A
    /// failed call leaves both records untouched.
    fn link(&mut self, id_a: &RecordId, id_b: &RecordId) -> LedgerResult<()>;
}

/// Checks shared by every store implementation before saving a record
pub(crate) fn check_insertable(record: &TransactionRecord) -> LedgerResult<()> {
    match &record.matched {
        Some(partner) => Err(LedgerError::MalformedRecord(format!(
            "new record {} cannot arrive already matched to {}",
            record.id, partner
        ))),
        None => Ok(()),
    }
}

/// Checks shared by every store implementation before pairing two records
pub(crate) fn check_linkable(a: &TransactionRecord, b: &TransactionRecord) -> LedgerResult<()> {
    if a.source == b.source {
        return Err(LedgerError::SameLedger(a.id.clone(), b.id.clone()));
    }
    for record in [a, b] {
        if let Some(partner) = &record.matched {
            return Err(LedgerError::AlreadyMatched {
                id: record.id.clone(),
                partner: partner.clone(),
            });
        }
    }
    Ok(())
}

/// Trait for implementing custom record validation rules
pub trait RecordValidator: Send + Sync {
    /// Validate a draft and produce the record that will be stored
    fn validate_record(&self, draft: UnvalidatedRecord) -> LedgerResult<TransactionRecord>;
}

/// Default record validator: required fields, sign and scale of the amount
pub struct DefaultRecordValidator;

impl RecordValidator for DefaultRecordValidator {
    fn validate_record(&self, draft: UnvalidatedRecord) -> LedgerResult<TransactionRecord> {
        draft.validate()
    }
}
