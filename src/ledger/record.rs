//! Statement record ingestion and lookup

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};

use crate::traits::*;
use crate::types::*;

/// Record manager: validates drafts before they reach the store
pub struct RecordManager<S: LedgerStore> {
    pub(crate) storage: S,
    validator: Box<dyn RecordValidator>,
}

impl<S: LedgerStore> RecordManager<S> {
    /// Create a new record manager
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultRecordValidator),
        }
    }

    /// Create a new record manager with custom validator
    pub fn with_validator(storage: S, validator: Box<dyn RecordValidator>) -> Self {
        Self { storage, validator }
    }

    /// Validate and store one record
    pub fn record(&mut self, draft: UnvalidatedRecord) -> LedgerResult<TransactionRecord> {
        let record = self.validator.validate_record(draft)?;
        self.storage.insert(&record)?;
        Ok(record)
    }

    /// Validate a whole statement and store it.
    ///
    /// Nothing is stored unless every draft validates. Records are inserted
    /// in the given order, which is the order reconciliation will see them in.
    pub fn record_statement(
        &mut self,
        drafts: Vec<UnvalidatedRecord>,
    ) -> LedgerResult<Vec<TransactionRecord>> {
        let records = drafts
            .into_iter()
            .map(|draft| self.validator.validate_record(draft))
            .collect::<LedgerResult<Vec<_>>>()?;

        for record in &records {
            self.storage.insert(record)?;
        }
        tracing::info!(count = records.len(), "statement recorded");
        Ok(records)
    }

    /// Get a record by ID
    pub fn get_record(&self, id: &RecordId) -> LedgerResult<Option<TransactionRecord>> {
        self.storage.get(id)
    }

    /// Get a record by ID, returning an error if not found
    pub fn get_record_required(&self, id: &RecordId) -> LedgerResult<TransactionRecord> {
        self.storage
            .get(id)?
            .ok_or_else(|| LedgerError::NotFound(id.clone()))
    }

    /// List all records of a ledger
    pub fn list_records(&self, source: Source) -> LedgerResult<Vec<TransactionRecord>> {
        self.storage.records(source)
    }

    /// List the records of a ledger still waiting for a partner
    pub fn list_unmatched(&self, source: Source) -> LedgerResult<Vec<TransactionRecord>> {
        self.storage.unmatched(source)
    }
}

/// Builder for statement record drafts
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    draft: UnvalidatedRecord,
}

impl RecordBuilder {
    /// Start a credit-card record dated on its transaction date
    pub fn credit_card(transaction_date: NaiveDate, amount: BigDecimal) -> Self {
        let mut draft = UnvalidatedRecord::new(Source::CreditCard);
        draft.date = Some(transaction_date);
        draft.amount = Some(amount);
        Self { draft }
    }

    /// Start a bank-account record from its statement timestamp
    pub fn bank_account(timestamp: NaiveDateTime, amount: BigDecimal) -> Self {
        let mut draft = UnvalidatedRecord::new(Source::BankAccount);
        draft.timestamp = Some(timestamp);
        draft.amount = Some(amount);
        Self { draft }
    }

    /// Use a caller-chosen id instead of a generated one
    pub fn id(mut self, id: impl Into<RecordId>) -> Self {
        self.draft.id = Some(id.into());
        self
    }

    pub fn posting_date(mut self, posting_date: NaiveDate) -> Self {
        self.draft.posting_date = Some(posting_date);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.draft.description = Some(description.into());
        self
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.draft.channel = Some(channel.into());
        self
    }

    pub fn balance(mut self, balance: BigDecimal) -> Self {
        self.draft.balance = Some(balance);
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.draft.details = Some(details.into());
        self
    }

    pub fn descriptions(mut self, descriptions: impl Into<String>) -> Self {
        self.draft.descriptions = Some(descriptions.into());
        self
    }

    /// The draft, unvalidated
    pub fn draft(self) -> UnvalidatedRecord {
        self.draft
    }

    /// Build the record
    pub fn build(self) -> LedgerResult<TransactionRecord> {
        self.draft.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MemoryStorage;
    use std::str::FromStr;

    fn amount(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn builder_fills_bank_details() {
        let timestamp = date(3).and_hms_opt(8, 15, 0).unwrap();
        let record = RecordBuilder::bank_account(timestamp, amount("250.00"))
            .id("kb-1")
            .channel("K PLUS")
            .balance(amount("12000.00"))
            .details("To X1234 ACME CO")
            .descriptions("Transfer Withdrawal")
            .build()
            .unwrap();

        assert_eq!(record.id, RecordId::from("kb-1"));
        assert_eq!(record.date, date(3));
        match record.details {
            RecordDetails::BankAccount {
                channel,
                descriptions,
                ..
            } => {
                assert_eq!(channel.as_deref(), Some("K PLUS"));
                assert_eq!(descriptions.as_deref(), Some("Transfer Withdrawal"));
            }
            other => panic!("unexpected details: {other:?}"),
        }
    }

    #[test]
    fn record_statement_is_all_or_nothing() {
        let mut manager = RecordManager::new(MemoryStorage::new());
        let mut broken = RecordBuilder::credit_card(date(2), amount("5.00")).draft();
        broken.amount = None;

        let result = manager.record_statement(vec![
            RecordBuilder::credit_card(date(1), amount("10.00")).draft(),
            broken,
        ]);
        assert!(matches!(result, Err(LedgerError::MalformedRecord(_))));
        assert!(manager.list_records(Source::CreditCard).unwrap().is_empty());
    }

    #[test]
    fn recorded_statement_keeps_order() {
        let mut manager = RecordManager::new(MemoryStorage::new());
        let stored = manager
            .record_statement(vec![
                RecordBuilder::credit_card(date(4), amount("3.00")).draft(),
                RecordBuilder::credit_card(date(1), amount("1.00")).draft(),
            ])
            .unwrap();

        let listed = manager.list_unmatched(Source::CreditCard).unwrap();
        assert_eq!(listed, stored);
        assert!(listed.iter().all(|r| r.id.as_str().starts_with("kc")));
    }

    #[test]
    fn get_record_required_reports_missing_id() {
        let manager = RecordManager::new(MemoryStorage::new());
        let missing = RecordId::from("kc0");
        assert_eq!(
            manager.get_record_required(&missing),
            Err(LedgerError::NotFound(missing))
        );
    }
}
