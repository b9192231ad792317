//! SQLite storage implementation

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::str::FromStr;

use crate::traits::*;
use crate::types::*;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";

const CREATE_TABLES: &str = r#"
    CREATE TABLE IF NOT EXISTS credit_card (
        id TEXT PRIMARY KEY,
        matched TEXT,
        created_at TEXT NOT NULL,
        transaction_date TEXT NOT NULL,
        posting_date TEXT,
        description TEXT,
        amount TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS bank_account (
        id TEXT PRIMARY KEY,
        matched TEXT,
        created_at TEXT NOT NULL,
        date TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        channel TEXT,
        balance TEXT,
        details TEXT,
        descriptions TEXT,
        amount TEXT NOT NULL
    );
"#;

// Both selects yield the same column layout so rows decode through one path.
const SELECT_CREDIT_CARD: &str = "SELECT id, matched, created_at, transaction_date, amount, \
     NULL, posting_date, description, NULL, NULL, NULL, NULL FROM credit_card";
const SELECT_BANK_ACCOUNT: &str = "SELECT id, matched, created_at, date, amount, \
     timestamp, NULL, NULL, channel, balance, details, descriptions FROM bank_account";

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

fn table(source: Source) -> &'static str {
    match source {
        Source::CreditCard => "credit_card",
        Source::BankAccount => "bank_account",
    }
}

fn select(source: Source) -> &'static str {
    match source {
        Source::CreditCard => SELECT_CREDIT_CARD,
        Source::BankAccount => SELECT_BANK_ACCOUNT,
    }
}

struct StoredRow {
    id: String,
    matched: Option<String>,
    created_at: String,
    date: String,
    amount: String,
    timestamp: Option<String>,
    posting_date: Option<String>,
    description: Option<String>,
    channel: Option<String>,
    balance: Option<String>,
    details: Option<String>,
    descriptions: Option<String>,
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            matched: row.get(1)?,
            created_at: row.get(2)?,
            date: row.get(3)?,
            amount: row.get(4)?,
            timestamp: row.get(5)?,
            posting_date: row.get(6)?,
            description: row.get(7)?,
            channel: row.get(8)?,
            balance: row.get(9)?,
            details: row.get(10)?,
            descriptions: row.get(11)?,
        })
    }

    fn decode(self, source: Source) -> LedgerResult<TransactionRecord> {
        let details = match source {
            Source::CreditCard => RecordDetails::CreditCard {
                posting_date: self.posting_date.as_deref().map(parse_date).transpose()?,
                description: self.description.unwrap_or_default(),
            },
            Source::BankAccount => RecordDetails::BankAccount {
                timestamp: parse_timestamp(self.timestamp.as_deref().unwrap_or_default())?,
                channel: self.channel,
                balance: self.balance.as_deref().map(parse_amount).transpose()?,
                details: self.details,
                descriptions: self.descriptions,
            },
        };

        Ok(TransactionRecord {
            id: RecordId::from(self.id),
            source,
            amount: parse_amount(&self.amount)?,
            date: parse_date(&self.date)?,
            matched: self.matched.map(RecordId::from),
            created_at: parse_timestamp(&self.created_at)?,
            details,
        })
    }
}

fn parse_date(s: &str) -> LedgerResult<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| LedgerError::Storage(format!("invalid stored date '{s}': {e}")))
}

fn parse_timestamp(s: &str) -> LedgerResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| LedgerError::Storage(format!("invalid stored timestamp '{s}': {e}")))
}

fn parse_amount(s: &str) -> LedgerResult<BigDecimal> {
    BigDecimal::from_str(s)
        .map(|amount| amount.with_scale(2))
        .map_err(|e| LedgerError::Storage(format!("invalid stored amount '{s}': {e}")))
}

fn load(conn: &Connection, id: &RecordId) -> LedgerResult<Option<TransactionRecord>> {
    for source in [Source::CreditCard, Source::BankAccount] {
        let row = conn
            .query_row(
                &format!("{} WHERE id = ?1", select(source)),
                params![id.as_str()],
                StoredRow::from_row,
            )
            .optional()?;
        if let Some(row) = row {
            return row.decode(source).map(Some);
        }
    }
    Ok(None)
}

fn list(
    conn: &Connection,
    source: Source,
    unmatched_only: bool,
) -> LedgerResult<Vec<TransactionRecord>> {
    let filter = if unmatched_only {
        " WHERE matched IS NULL"
    } else {
        ""
    };
    let mut stmt = conn.prepare(&format!("{}{} ORDER BY rowid", select(source), filter))?;
    let rows = stmt
        .query_map([], StoredRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(|row| row.decode(source)).collect()
}

/// SQLite-backed ledger store with one table per statement ledger
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Open (or create) a database file and ensure the ledger tables exist
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> LedgerResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> LedgerResult<Self> {
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self { conn })
    }
}

impl LedgerStore for SqliteStorage {
    fn insert(&mut self, record: &TransactionRecord) -> LedgerResult<()> {
        check_insertable(record)?;
        let tx = self.conn.transaction()?;
        if load(&tx, &record.id)?.is_some() {
            return Err(LedgerError::DuplicateRecord(record.id.clone()));
        }

        let created_at = record.created_at.format(TIMESTAMP_FORMAT).to_string();
        let date = record.date.format(DATE_FORMAT).to_string();

        match &record.details {
            RecordDetails::CreditCard {
                posting_date,
                description,
            } => {
                tx.execute(
                    "INSERT INTO credit_card (id, created_at, transaction_date, posting_date, description, amount) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        record.id.as_str(),
                        created_at,
                        date,
                        posting_date.map(|d| d.format(DATE_FORMAT).to_string()),
                        description,
                        record.amount.to_string(),
                    ],
                )?;
            }
            RecordDetails::BankAccount {
                timestamp,
                channel,
                balance,
                details,
                descriptions,
            } => {
                tx.execute(
                    "INSERT INTO bank_account (id, created_at, date, timestamp, channel, balance, details, descriptions, amount) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        record.id.as_str(),
                        created_at,
                        date,
                        timestamp.format(TIMESTAMP_FORMAT).to_string(),
                        channel,
                        balance.as_ref().map(|b| b.to_string()),
                        details,
                        descriptions,
                        record.amount.to_string(),
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn get(&self, id: &RecordId) -> LedgerResult<Option<TransactionRecord>> {
        load(&self.conn, id)
    }

    fn records(&self, source: Source) -> LedgerResult<Vec<TransactionRecord>> {
        list(&self.conn, source, false)
    }

    fn unmatched(&self, source: Source) -> LedgerResult<Vec<TransactionRecord>> {
        list(&self.conn, source, true)
    }

    fn link(&mut self, id_a: &RecordId, id_b: &RecordId) -> LedgerResult<()> {
        let tx = self.conn.transaction()?;
        let a = load(&tx, id_a)?.ok_or_else(|| LedgerError::NotFound(id_a.clone()))?;
        let b = load(&tx, id_b)?.ok_or_else(|| LedgerError::NotFound(id_b.clone()))?;
        check_linkable(&a, &b)?;

        for (record, partner) in [(&a, &b), (&b, &a)] {
            tx.execute(
                &format!(
                    "UPDATE {} SET matched = ?1 WHERE id = ?2 AND matched IS NULL",
                    table(record.source)
                ),
                params![partner.id.as_str(), record.id.as_str()],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}
