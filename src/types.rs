//! Core types and data structures for statement reconciliation

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The two ledgers a record can come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    /// Credit-card statement entries (side A of a reconciliation)
    CreditCard,
    /// Bank-account statement entries (side B of a reconciliation)
    BankAccount,
}

impl Source {
    /// Prefix used for generated record ids
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Source::CreditCard => "kc",
            Source::BankAccount => "kb",
        }
    }

    /// The ledger on the other side of a pairing
    pub fn counterpart(&self) -> Source {
        match self {
            Source::CreditCard => Source::BankAccount,
            Source::BankAccount => Source::CreditCard,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::CreditCard => write!(f, "credit card"),
            Source::BankAccount => write!(f, "bank account"),
        }
    }
}

/// Opaque record identity, unique across both ledgers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id for a record of the given ledger
    pub fn generate(source: Source) -> Self {
        Self(format!("{}{}", source.id_prefix(), Uuid::new_v4().as_u128()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Descriptive payload of a record. Never consulted when matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordDetails {
    CreditCard {
        /// Date the issuer posted the charge
        posting_date: Option<NaiveDate>,
        description: String,
    },
    BankAccount {
        /// Full statement timestamp; only its calendar date is matched on
        timestamp: NaiveDateTime,
        channel: Option<String>,
        /// Running balance printed on the statement line
        balance: Option<BigDecimal>,
        details: Option<String>,
        descriptions: Option<String>,
    },
}

impl RecordDetails {
    pub fn source(&self) -> Source {
        match self {
            RecordDetails::CreditCard { .. } => Source::CreditCard,
            RecordDetails::BankAccount { .. } => Source::BankAccount,
        }
    }
}

/// A normalized ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique identifier, immutable after creation
    pub id: RecordId,
    /// Ledger the record belongs to
    pub source: Source,
    /// Monetary amount at scale 2, never negative
    pub amount: BigDecimal,
    /// Calendar date used for matching
    pub date: NaiveDate,
    /// Partner record on the other ledger, `None` while unreconciled
    pub matched: Option<RecordId>,
    /// When the record was ingested
    pub created_at: NaiveDateTime,
    /// Free-text statement fields carried through unchanged
    pub details: RecordDetails,
}

impl TransactionRecord {
    pub fn is_matched(&self) -> bool {
        self.matched.is_some()
    }
}

/// A record as handed over by an ingestion collaborator, before validation.
///
/// Amount and date are optional here because statement extraction may fail to
/// find them; [`UnvalidatedRecord::validate`] rejects such drafts so they never
/// reach a store or the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnvalidatedRecord {
    pub id: Option<RecordId>,
    pub source: Source,
    pub amount: Option<BigDecimal>,
    pub date: Option<NaiveDate>,
    /// Bank statements carry a timestamp; the matching date is derived from it
    pub timestamp: Option<NaiveDateTime>,
    pub posting_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub channel: Option<String>,
    pub balance: Option<BigDecimal>,
    pub details: Option<String>,
    pub descriptions: Option<String>,
}

impl UnvalidatedRecord {
    /// Create an empty draft for the given ledger
    pub fn new(source: Source) -> Self {
        Self {
            id: None,
            source,
            amount: None,
            date: None,
            timestamp: None,
            posting_date: None,
            description: None,
            channel: None,
            balance: None,
            details: None,
            descriptions: None,
        }
    }

    /// Validate the draft and turn it into a record.
    ///
    /// A missing id is generated; the amount is normalized to two decimal
    /// places.
    pub fn validate(self) -> LedgerResult<TransactionRecord> {
        let amount = self
            .amount
            .ok_or_else(|| LedgerError::MalformedRecord("amount is required".to_string()))?;

        if amount < BigDecimal::from(0) {
            return Err(LedgerError::MalformedRecord(format!(
                "amount must not be negative: {amount}"
            )));
        }

        let normalized = amount.with_scale(2);
        if normalized != amount {
            return Err(LedgerError::MalformedRecord(format!(
                "amount has more than two decimal places: {amount}"
            )));
        }

        let date = match (self.date, self.timestamp) {
            (Some(date), Some(timestamp)) if date != timestamp.date() => {
                return Err(LedgerError::MalformedRecord(format!(
                    "date {date} disagrees with timestamp {timestamp}"
                )));
            }
            (Some(date), _) => date,
            (None, Some(timestamp)) => timestamp.date(),
            (None, None) => {
                return Err(LedgerError::MalformedRecord("date is required".to_string()));
            }
        };

        let details = match self.source {
            Source::CreditCard => RecordDetails::CreditCard {
                posting_date: self.posting_date,
                description: self.description.unwrap_or_default(),
            },
            Source::BankAccount => RecordDetails::BankAccount {
                timestamp: self.timestamp.ok_or_else(|| {
                    LedgerError::MalformedRecord(
                        "bank account records require a timestamp".to_string(),
                    )
                })?,
                channel: self.channel,
                balance: self.balance,
                details: self.details.or(self.description),
                descriptions: self.descriptions,
            },
        };

        let id = match self.id {
            Some(id) if id.as_str().trim().is_empty() => {
                return Err(LedgerError::MalformedRecord(
                    "record id cannot be empty".to_string(),
                ));
            }
            Some(id) => id,
            None => RecordId::generate(self.source),
        };

        Ok(TransactionRecord {
            id,
            source: self.source,
            amount: normalized,
            date,
            matched: None,
            created_at: chrono::Utc::now().naive_utc(),
            details,
        })
    }
}

/// Errors that can occur while storing or reconciling records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Record not found: {0}")]
    NotFound(RecordId),
    #[error("Record {id} is already matched to {partner}")]
    AlreadyMatched { id: RecordId, partner: RecordId },
    #[error("Records {0} and {1} belong to the same ledger")]
    SameLedger(RecordId, RecordId),
    #[error("Duplicate record id: {0}")]
    DuplicateRecord(RecordId),
    #[error("Malformed record: {0}")]
    MalformedRecord(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
