//! Reconciliation engine pairing credit-card entries with bank-account entries
//!
//! A run makes two passes over the unmatched records of a [`LedgerStore`]:
//!
//! 1. **Unique amounts**: an amount that occurs exactly once among the
//!    unmatched credit-card records and exactly once among the unmatched
//!    bank-account records pairs those two records.
//! 2. **Amount and date**: each remaining credit-card record, in store order,
//!    takes the first remaining bank-account record with the same amount and
//!    the same calendar date.
//!
//! Every pair is written to the store as soon as it is found. The second pass
//! is greedy and depends on store order; it is not a globally optimal
//! assignment.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::traits::*;
use crate::types::*;

/// Pass that produced a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    /// Amount unique on both ledgers
    UniqueAmount,
    /// Same amount and same calendar date
    AmountAndDate,
}

/// A committed pairing between the two ledgers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPair {
    pub credit_card: RecordId,
    pub bank_account: RecordId,
    pub phase: MatchPhase,
}

impl MatchPair {
    /// The pair as `(credit card id, bank account id)`
    pub fn ids(&self) -> (&RecordId, &RecordId) {
        (&self.credit_card, &self.bank_account)
    }
}

/// A pairing the store refused
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkFailure {
    pub credit_card: RecordId,
    pub bank_account: RecordId,
    pub phase: MatchPhase,
    pub error: LedgerError,
}

/// Outcome of a reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Committed pairs in commit order
    pub pairs: Vec<MatchPair>,
    /// Link attempts rejected by the store, in attempt order
    pub failures: Vec<LinkFailure>,
    /// Credit-card records still unmatched after the run
    pub unmatched_credit_card: Vec<RecordId>,
    /// Bank-account records still unmatched after the run
    pub unmatched_bank_account: Vec<RecordId>,
}

impl Reconciliation {
    pub fn matched_count(&self) -> usize {
        self.pairs.len()
    }

    /// Pairs produced by one pass
    pub fn pairs_in(&self, phase: MatchPhase) -> impl Iterator<Item = &MatchPair> {
        self.pairs.iter().filter(move |pair| pair.phase == phase)
    }

    /// Whether `id` was paired during this run, on either side
    pub fn contains(&self, id: &RecordId) -> bool {
        self.pairs
            .iter()
            .any(|pair| &pair.credit_card == id || &pair.bank_account == id)
    }
}

/// Errors that end a reconciliation run.
///
/// Pairs committed before the error stay committed; they are available
/// through [`ReconcileError::partial`].
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("failed to link {credit_card} with {bank_account}: {source}")]
    Link {
        credit_card: RecordId,
        bank_account: RecordId,
        source: LedgerError,
        partial: Box<Reconciliation>,
    },
    #[error("failed to read unmatched records: {source}")]
    Store {
        source: LedgerError,
        partial: Box<Reconciliation>,
    },
}

impl ReconcileError {
    /// Everything the run committed before failing
    pub fn partial(&self) -> &Reconciliation {
        match self {
            ReconcileError::Link { partial, .. } | ReconcileError::Store { partial, .. } => {
                partial
            }
        }
    }

    /// The underlying store error
    pub fn ledger_error(&self) -> &LedgerError {
        match self {
            ReconcileError::Link { source, .. } | ReconcileError::Store { source, .. } => source,
        }
    }
}

/// Two-pass matcher over the unmatched records of a store
#[derive(Debug, Clone, Copy)]
pub struct ReconciliationEngine;

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Pair unmatched credit-card records with unmatched bank-account records.
    ///
    /// The store must not be modified by anyone else during the call. A link
    /// rejected by the store is recorded and the run moves on to the next
    /// candidate; once both passes finish the first such failure is returned
    /// as [`ReconcileError::Link`]. A failed read ends the run immediately.
    pub fn reconcile<S: LedgerStore + ?Sized>(
        &self,
        store: &mut S,
    ) -> Result<Reconciliation, ReconcileError> {
        let mut run = Run {
            store,
            outcome: Reconciliation::default(),
        };

        if let Err(source) = run.execute() {
            return Err(ReconcileError::Store {
                source,
                partial: Box::new(run.outcome),
            });
        }

        let outcome = run.outcome;
        info!(
            matched = outcome.pairs.len(),
            failed = outcome.failures.len(),
            unmatched_credit_card = outcome.unmatched_credit_card.len(),
            unmatched_bank_account = outcome.unmatched_bank_account.len(),
            "reconciliation finished"
        );

        match outcome.failures.first().cloned() {
            Some(failure) => Err(ReconcileError::Link {
                credit_card: failure.credit_card,
                bank_account: failure.bank_account,
                source: failure.error,
                partial: Box::new(outcome),
            }),
            None => Ok(outcome),
        }
    }
}

struct Run<'s, S: ?Sized> {
    store: &'s mut S,
    outcome: Reconciliation,
}

impl<S: LedgerStore + ?Sized> Run<'_, S> {
    fn execute(&mut self) -> LedgerResult<()> {
        self.unique_amount_pass()?;
        self.amount_and_date_pass()?;

        self.outcome.unmatched_credit_card = self.unmatched_ids(Source::CreditCard)?;
        self.outcome.unmatched_bank_account = self.unmatched_ids(Source::BankAccount)?;
        Ok(())
    }

    fn unique_amount_pass(&mut self) -> LedgerResult<()> {
        let cards = self.store.unmatched(Source::CreditCard)?;
        let banks = self.store.unmatched(Source::BankAccount)?;
        info!(
            credit_card = cards.len(),
            bank_account = banks.len(),
            "unique amount pass"
        );

        let unique_cards = unique_amounts(&cards);
        let unique_banks = unique_amounts(&banks);

        for card in &cards {
            if !unique_cards.contains_key(&card.amount) {
                continue;
            }
            if let Some(bank) = unique_banks.get(&card.amount) {
                // A rejected link is recorded by `commit`; carry on with the next amount.
                let _ = self.commit(card, bank, MatchPhase::UniqueAmount);
            }
        }
        Ok(())
    }

    fn amount_and_date_pass(&mut self) -> LedgerResult<()> {
        let cards = self.store.unmatched(Source::CreditCard)?;
        let mut remaining = self.store.unmatched(Source::BankAccount)?;
        info!(
            credit_card = cards.len(),
            bank_account = remaining.len(),
            "amount and date pass"
        );

        for card in &cards {
            let mut index = 0;
            while index < remaining.len() {
                let bank = &remaining[index];
                if bank.amount != card.amount || bank.date != card.date {
                    index += 1;
                    continue;
                }

                match self.commit(card, bank, MatchPhase::AmountAndDate) {
                    Ok(()) => {
                        remaining.remove(index);
                        break;
                    }
                    // The card itself cannot be linked; leave the candidate for later cards.
                    Err(error) if implicates(&error, &card.id) => break,
                    Err(_) => {
                        remaining.remove(index);
                    }
                }
            }
        }

        debug!(bank_account = remaining.len(), "amount and date pass done");
        Ok(())
    }

    fn commit(
        &mut self,
        card: &TransactionRecord,
        bank: &TransactionRecord,
        phase: MatchPhase,
    ) -> LedgerResult<()> {
        match self.store.link(&card.id, &bank.id) {
            Ok(()) => {
                debug!(
                    credit_card = %card.id,
                    bank_account = %bank.id,
                    amount = %card.amount,
                    date = %card.date,
                    ?phase,
                    "matched"
                );
                self.outcome.pairs.push(MatchPair {
                    credit_card: card.id.clone(),
                    bank_account: bank.id.clone(),
                    phase,
                });
                Ok(())
            }
            Err(error) => {
                warn!(
                    credit_card = %card.id,
                    bank_account = %bank.id,
                    ?phase,
                    %error,
                    "link rejected"
                );
                self.outcome.failures.push(LinkFailure {
                    credit_card: card.id.clone(),
                    bank_account: bank.id.clone(),
                    phase,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    fn unmatched_ids(&self, source: Source) -> LedgerResult<Vec<RecordId>> {
        Ok(self
            .store
            .unmatched(source)?
            .into_iter()
            .map(|record| record.id)
            .collect())
    }
}

/// Records whose amount occurs exactly once in `records`, keyed by amount
fn unique_amounts(records: &[TransactionRecord]) -> BTreeMap<&BigDecimal, &TransactionRecord> {
    let mut seen: BTreeMap<&BigDecimal, Option<&TransactionRecord>> = BTreeMap::new();
    for record in records {
        seen.entry(&record.amount)
            .and_modify(|slot| *slot = None)
            .or_insert(Some(record));
    }
    seen.into_iter()
        .filter_map(|(amount, record)| record.map(|record| (amount, record)))
        .collect()
}

fn implicates(error: &LedgerError, id: &RecordId) -> bool {
    match error {
        LedgerError::NotFound(missing) => missing == id,
        LedgerError::AlreadyMatched { id: linked, .. } => linked == id,
        _ => false,
    }
}
