//! Main ledger orchestrator that coordinates ingestion and reconciliation

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::ledger::RecordManager;
use crate::reconciliation::{ReconcileError, Reconciliation, ReconciliationEngine};
use crate::traits::*;
use crate::types::*;

/// The pair of statement ledgers plus the engine that reconciles them
pub struct Ledger<S: LedgerStore> {
    record_manager: RecordManager<S>,
    engine: ReconciliationEngine,
}

impl<S: LedgerStore> Ledger<S> {
    /// Create a new ledger with the given storage backend
    pub fn new(storage: S) -> Self {
        Self {
            record_manager: RecordManager::new(storage),
            engine: ReconciliationEngine::new(),
        }
    }

    /// Create a new ledger with a custom record validator
    pub fn with_validator(storage: S, validator: Box<dyn RecordValidator>) -> Self {
        Self {
            record_manager: RecordManager::with_validator(storage, validator),
            engine: ReconciliationEngine::new(),
        }
    }

    /// Borrow the underlying store
    pub fn storage(&self) -> &S {
        &self.record_manager.storage
    }

    /// Give back the underlying store
    pub fn into_storage(self) -> S {
        self.record_manager.storage
    }

    // Record operations
    /// Record a single statement line
    pub fn record(&mut self, draft: UnvalidatedRecord) -> LedgerResult<TransactionRecord> {
        self.record_manager.record(draft)
    }

    /// Record a parsed statement; nothing is stored if any line is malformed
    pub fn record_statement(
        &mut self,
        drafts: Vec<UnvalidatedRecord>,
    ) -> LedgerResult<Vec<TransactionRecord>> {
        self.record_manager.record_statement(drafts)
    }

    /// Get a record by ID
    pub fn get_record(&self, id: &RecordId) -> LedgerResult<Option<TransactionRecord>> {
        self.record_manager.get_record(id)
    }

    /// List all records of a ledger
    pub fn list_records(&self, source: Source) -> LedgerResult<Vec<TransactionRecord>> {
        self.record_manager.list_records(source)
    }

    /// List the unmatched records of a ledger
    pub fn list_unmatched(&self, source: Source) -> LedgerResult<Vec<TransactionRecord>> {
        self.record_manager.list_unmatched(source)
    }

    /// Get a record's partner on the other ledger, if it has one
    pub fn get_partner(&self, id: &RecordId) -> LedgerResult<Option<TransactionRecord>> {
        let record = self.record_manager.get_record_required(id)?;
        match record.matched {
            Some(partner) => self.record_manager.get_record_required(&partner).map(Some),
            None => Ok(None),
        }
    }

    // Reconciliation
    /// Match unmatched credit-card records against unmatched bank-account records
    pub fn reconcile(&mut self) -> Result<Reconciliation, ReconcileError> {
        self.engine.reconcile(&mut self.record_manager.storage)
    }

    /// Matched and unmatched counts and totals for both ledgers
    pub fn summary(&self) -> LedgerResult<LedgerSummary> {
        Ok(LedgerSummary {
            credit_card: self.source_summary(Source::CreditCard)?,
            bank_account: self.source_summary(Source::BankAccount)?,
        })
    }

    fn source_summary(&self, source: Source) -> LedgerResult<SourceSummary> {
        let records = self.record_manager.list_records(source)?;
        let mut summary = SourceSummary {
            source,
            total: records.len(),
            matched: 0,
            unmatched: 0,
            unmatched_amount: BigDecimal::from(0).with_scale(2),
        };

        for record in &records {
            if record.is_matched() {
                summary.matched += 1;
            } else {
                summary.unmatched += 1;
                summary.unmatched_amount += &record.amount;
            }
        }

        Ok(summary)
    }

    /// Check that every match link is symmetric and crosses ledgers
    pub fn validate_integrity(&self) -> LedgerResult<LedgerIntegrityReport> {
        let mut issues = Vec::new();
        let mut links_checked = 0;

        for source in [Source::CreditCard, Source::BankAccount] {
            for record in self.record_manager.list_records(source)? {
                let Some(partner_id) = &record.matched else {
                    continue;
                };
                links_checked += 1;

                match self.record_manager.get_record(partner_id)? {
                    None => issues.push(format!(
                        "{} is matched to missing record {}",
                        record.id, partner_id
                    )),
                    Some(partner) if partner.source != source.counterpart() => {
                        issues.push(format!(
                            "{} is matched to {} on the same {} ledger",
                            record.id, partner.id, source
                        ))
                    }
                    Some(partner) if partner.matched.as_ref() != Some(&record.id) => {
                        issues.push(format!(
                            "{} points to {} but {} points to {}",
                            record.id,
                            partner.id,
                            partner.id,
                            partner
                                .matched
                                .as_ref()
                                .map(RecordId::as_str)
                                .unwrap_or("nothing")
                        ))
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(LedgerIntegrityReport {
            is_valid: issues.is_empty(),
            issues,
            links_checked,
        })
    }
}

/// Counts and unmatched total for one ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub source: Source,
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub unmatched_amount: BigDecimal,
}

/// Reconciliation status of both ledgers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub credit_card: SourceSummary,
    pub bank_account: SourceSummary,
}

/// Report on match-link integrity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerIntegrityReport {
    pub is_valid: bool,
    pub issues: Vec<String>,
    /// Number of matched records examined, counting both sides of a pair
    pub links_checked: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::RecordBuilder;
    use crate::utils::memory_storage::MemoryStorage;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn amount(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn noon(d: u32) -> chrono::NaiveDateTime {
        date(d).and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn test_ledger_basic_operations() {
        let mut ledger = Ledger::new(MemoryStorage::new());

        let card = ledger
            .record(
                RecordBuilder::credit_card(date(10), amount("100.00"))
                    .description("SHOPEE")
                    .draft(),
            )
            .unwrap();
        let bank = ledger
            .record(
                RecordBuilder::bank_account(noon(12), amount("100.00"))
                    .descriptions("Payment")
                    .draft(),
            )
            .unwrap();
        ledger
            .record(RecordBuilder::credit_card(date(11), amount("7.25")).draft())
            .unwrap();

        let outcome = ledger.reconcile().unwrap();
        assert_eq!(outcome.matched_count(), 1);
        assert_eq!(outcome.pairs[0].ids(), (&card.id, &bank.id));

        let partner = ledger.get_partner(&card.id).unwrap().unwrap();
        assert_eq!(partner.id, bank.id);

        let summary = ledger.summary().unwrap();
        assert_eq!(summary.credit_card.total, 2);
        assert_eq!(summary.credit_card.matched, 1);
        assert_eq!(summary.credit_card.unmatched_amount, amount("7.25"));
        assert_eq!(summary.bank_account.unmatched, 0);

        let report = ledger.validate_integrity().unwrap();
        assert!(report.is_valid, "{:?}", report.issues);
        assert_eq!(report.links_checked, 2);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn integrity_flags_one_sided_links() {
        use crate::utils::SqliteStorage;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        {
            let mut ledger = Ledger::new(SqliteStorage::open(&path).unwrap());
            ledger
                .record(RecordBuilder::credit_card(date(1), amount("1.00")).id("kc1").draft())
                .unwrap();
            ledger
                .record(RecordBuilder::bank_account(noon(1), amount("1.00")).id("kb1").draft())
                .unwrap();
            assert!(ledger.validate_integrity().unwrap().is_valid);
        }

        // Tamper with the file behind the store's back.
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute("UPDATE credit_card SET matched = 'kb1' WHERE id = 'kc1'", [])
            .unwrap();

        let report = Ledger::new(SqliteStorage::open(&path).unwrap())
            .validate_integrity()
            .unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.links_checked, 1);
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].contains("kb1 points to nothing"));
    }
}
