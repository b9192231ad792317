//! Reconcile a month of credit-card charges against the bank account that paid them

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use statement_reconciler::utils::MemoryStorage;
use statement_reconciler::{Ledger, LedgerStore, MatchPhase, RecordBuilder, Source};
use std::str::FromStr;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut ledger = Ledger::new(MemoryStorage::new());
    let jan = |d| NaiveDate::from_ymd_opt(2024, 1, d).ok_or("bad date");

    println!("Recording credit card statement...");
    ledger.record_statement(vec![
        RecordBuilder::credit_card(jan(3)?, BigDecimal::from_str("1250.00")?)
            .posting_date(jan(4)?)
            .description("AIRLINE TICKET")
            .draft(),
        RecordBuilder::credit_card(jan(8)?, BigDecimal::from_str("89.00")?)
            .posting_date(jan(9)?)
            .description("STREAMING SUBSCRIPTION")
            .draft(),
        RecordBuilder::credit_card(jan(12)?, BigDecimal::from_str("89.00")?)
            .posting_date(jan(13)?)
            .description("GYM")
            .draft(),
        RecordBuilder::credit_card(jan(20)?, BigDecimal::from_str("42.50")?)
            .posting_date(jan(21)?)
            .description("BOOKSTORE")
            .draft(),
    ])?;

    println!("Recording bank account statement...");
    let at = |d, h, m| {
        jan(d).and_then(|date| date.and_hms_opt(h, m, 0).ok_or("bad time"))
    };
    ledger.record_statement(vec![
        RecordBuilder::bank_account(at(12, 19, 2)?, BigDecimal::from_str("89.00")?)
            .channel("K PLUS")
            .descriptions("Direct Debit")
            .draft(),
        RecordBuilder::bank_account(at(8, 7, 30)?, BigDecimal::from_str("89.00")?)
            .channel("K PLUS")
            .descriptions("Direct Debit")
            .draft(),
        RecordBuilder::bank_account(at(5, 10, 15)?, BigDecimal::from_str("1250.00")?)
            .channel("Internet/Mobile")
            .descriptions("Payment")
            .draft(),
    ])?;

    let outcome = ledger.reconcile()?;
    println!("\nMatched {} pairs:", outcome.matched_count());
    for pair in &outcome.pairs {
        let pass = match pair.phase {
            MatchPhase::UniqueAmount => "unique amount",
            MatchPhase::AmountAndDate => "amount and date",
        };
        println!("  {} <-> {} ({pass})", pair.credit_card, pair.bank_account);
    }

    let summary = ledger.summary()?;
    for side in [&summary.credit_card, &summary.bank_account] {
        println!(
            "{}: {} of {} unmatched, {} outstanding",
            side.source, side.unmatched, side.total, side.unmatched_amount
        );
    }

    let storage = ledger.into_storage();
    for record in storage.unmatched(Source::CreditCard)? {
        println!("  still open: {} {} {}", record.id, record.date, record.amount);
    }

    Ok(())
}
