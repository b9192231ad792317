//! In-memory storage implementation for testing

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct Ledgers {
    records: HashMap<RecordId, TransactionRecord>,
    credit_card: Vec<RecordId>,
    bank_account: Vec<RecordId>,
}

impl Ledgers {
    fn order(&self, source: Source) -> &[RecordId] {
        match source {
            Source::CreditCard => &self.credit_card,
            Source::BankAccount => &self.bank_account,
        }
    }

    fn listed(
        &self,
        source: Source,
        filter: impl Fn(&TransactionRecord) -> bool,
    ) -> Vec<TransactionRecord> {
        self.order(source)
            .iter()
            .filter_map(|id| self.records.get(id))
            .filter(|record| filter(record))
            .cloned()
            .collect()
    }
}

/// In-memory storage implementation for testing and development
///
/// Clones share the same underlying ledgers.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    ledgers: Arc<RwLock<Ledgers>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> LedgerResult<()> {
        *self.write()? = Ledgers::default();
        Ok(())
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, Ledgers>> {
        self.ledgers
            .read()
            .map_err(|e| LedgerError::Storage(e.to_string()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, Ledgers>> {
        self.ledgers
            .write()
            .map_err(|e| LedgerError::Storage(e.to_string()))
    }
}

impl LedgerStore for MemoryStorage {
    fn insert(&mut self, record: &TransactionRecord) -> LedgerResult<()> {
        check_insertable(record)?;
        let mut ledgers = self.write()?;
        if ledgers.records.contains_key(&record.id) {
            return Err(LedgerError::DuplicateRecord(record.id.clone()));
        }

        match record.source {
            Source::CreditCard => ledgers.credit_card.push(record.id.clone()),
            Source::BankAccount => ledgers.bank_account.push(record.id.clone()),
        }
        ledgers.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn get(&self, id: &RecordId) -> LedgerResult<Option<TransactionRecord>> {
        Ok(self.read()?.records.get(id).cloned())
    }

    fn records(&self, source: Source) -> LedgerResult<Vec<TransactionRecord>> {
        Ok(self.read()?.listed(source, |_| true))
    }

    fn unmatched(&self, source: Source) -> LedgerResult<Vec<TransactionRecord>> {
        Ok(self.read()?.listed(source, |record| !record.is_matched()))
    }

    fn link(&mut self, id_a: &RecordId, id_b: &RecordId) -> LedgerResult<()> {
        // Both records are checked and updated under one write guard.
        let mut ledgers = self.write()?;

        let a = ledgers
            .records
            .get(id_a)
            .ok_or_else(|| LedgerError::NotFound(id_a.clone()))?;
        let b = ledgers
            .records
            .get(id_b)
            .ok_or_else(|| LedgerError::NotFound(id_b.clone()))?;
        check_linkable(a, b)?;

        if let Some(a) = ledgers.records.get_mut(id_a) {
            a.matched = Some(id_b.clone());
        }
        if let Some(b) = ledgers.records.get_mut(id_b) {
            b.matched = Some(id_a.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn record(id: &str, source: Source, cents: i64) -> TransactionRecord {
        let mut draft = UnvalidatedRecord::new(source);
        draft.id = Some(RecordId::from(id));
        draft.amount = Some(BigDecimal::new(cents.into(), 2));
        draft.timestamp = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0);
        draft.validate().unwrap()
    }

    fn seeded() -> MemoryStorage {
        let mut storage = MemoryStorage::new();
        storage.insert(&record("kc1", Source::CreditCard, 1000)).unwrap();
        storage.insert(&record("kc2", Source::CreditCard, 2000)).unwrap();
        storage.insert(&record("kb1", Source::BankAccount, 1000)).unwrap();
        storage
    }

    #[test]
    fn unmatched_preserves_insertion_order() {
        let storage = seeded();
        let ids: Vec<_> = storage
            .unmatched(Source::CreditCard)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![RecordId::from("kc1"), RecordId::from("kc2")]);
    }

    #[test]
    fn insert_rejects_duplicate_ids_across_ledgers() {
        let mut storage = seeded();
        let result = storage.insert(&record("kc1", Source::BankAccount, 500));
        assert_eq!(
            result,
            Err(LedgerError::DuplicateRecord(RecordId::from("kc1")))
        );
    }

    #[test]
    fn insert_rejects_prelinked_records() {
        let mut storage = seeded();
        let mut linked = record("kc3", Source::CreditCard, 1000);
        linked.matched = Some(RecordId::from("kb1"));

        assert!(matches!(
            storage.insert(&linked),
            Err(LedgerError::MalformedRecord(_))
        ));
        assert!(storage.get(&linked.id).unwrap().is_none());
        assert!(storage.get(&RecordId::from("kb1")).unwrap().unwrap().matched.is_none());
    }

    #[test]
    fn link_sets_both_sides_and_hides_them_from_unmatched() {
        let mut storage = seeded();
        let (kc1, kb1) = (RecordId::from("kc1"), RecordId::from("kb1"));
        storage.link(&kc1, &kb1).unwrap();

        assert_eq!(storage.get(&kc1).unwrap().unwrap().matched, Some(kb1.clone()));
        assert_eq!(storage.get(&kb1).unwrap().unwrap().matched, Some(kc1));
        assert_eq!(storage.unmatched(Source::CreditCard).unwrap().len(), 1);
        assert!(storage.unmatched(Source::BankAccount).unwrap().is_empty());
        assert_eq!(storage.records(Source::BankAccount).unwrap().len(), 1);
    }

    #[test]
    fn link_failures_leave_records_untouched() {
        let mut storage = seeded();
        let (kc1, kc2, kb1) = (
            RecordId::from("kc1"),
            RecordId::from("kc2"),
            RecordId::from("kb1"),
        );

        assert_eq!(
            storage.link(&kc1, &RecordId::from("missing")),
            Err(LedgerError::NotFound(RecordId::from("missing")))
        );
        assert_eq!(
            storage.link(&kc1, &kc2),
            Err(LedgerError::SameLedger(kc1.clone(), kc2.clone()))
        );
        assert!(storage.get(&kc1).unwrap().unwrap().matched.is_none());

        storage.link(&kc1, &kb1).unwrap();
        assert_eq!(
            storage.link(&kc2, &kb1),
            Err(LedgerError::AlreadyMatched {
                id: kb1.clone(),
                partner: kc1.clone(),
            })
        );
        assert!(storage.get(&kc2).unwrap().unwrap().matched.is_none());
    }

    #[test]
    fn clones_share_state() {
        let storage = seeded();
        let mut handle = storage.clone();
        handle
            .link(&RecordId::from("kc1"), &RecordId::from("kb1"))
            .unwrap();
        assert!(storage.unmatched(Source::BankAccount).unwrap().is_empty());

        storage.clear().unwrap();
        assert!(handle.records(Source::CreditCard).unwrap().is_empty());
    }
}
