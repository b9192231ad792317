//! Validation utilities

use crate::traits::*;
use crate::types::*;
use bigdecimal::BigDecimal;

/// Validate that an amount is positive
pub fn validate_positive_amount(amount: &BigDecimal) -> LedgerResult<()> {
    if *amount <= BigDecimal::from(0) {
        Err(LedgerError::MalformedRecord(
            "Amount must be positive".to_string(),
        ))
    } else {
        Ok(())
    }
}

const MAX_RECORD_ID_LEN: usize = 64;

/// Validate a record id for the ledger it is about to join.
///
/// Ids are ASCII identifiers (letters, digits, `-`, `_`). An id in the
/// generated shape, a `kc`/`kb` prefix followed only by digits, must carry the
/// prefix of its own ledger.
pub fn validate_record_id(id: &RecordId, source: Source) -> LedgerResult<()> {
    let id = id.as_str();
    if id.is_empty() || id.len() > MAX_RECORD_ID_LEN {
        return Err(LedgerError::MalformedRecord(format!(
            "record id must be 1 to {MAX_RECORD_ID_LEN} characters long"
        )));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(LedgerError::MalformedRecord(format!(
            "record id '{id}' may only contain letters, digits, dashes and underscores"
        )));
    }

    let other = source.counterpart();
    if let Some(digits) = id.strip_prefix(other.id_prefix()) {
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LedgerError::MalformedRecord(format!(
                "record id '{id}' is a {other} id but the record is on the {source} ledger"
            )));
        }
    }

    Ok(())
}

/// Validate that a statement description is not oversized
pub fn validate_description(description: &str) -> LedgerResult<()> {
    if description.len() > 500 {
        return Err(LedgerError::MalformedRecord(
            "Description cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Enhanced record validator with detailed checks
///
/// On top of the default rules it rejects zero amounts, oversized free-text
/// fields and ids that are not plain identifiers or that carry the other
/// ledger's generated prefix.
pub struct EnhancedRecordValidator;

impl RecordValidator for EnhancedRecordValidator {
    fn validate_record(&self, draft: UnvalidatedRecord) -> LedgerResult<TransactionRecord> {
        // Basic validation
        let record = draft.validate()?;

        // Enhanced validations
        validate_record_id(&record.id, record.source)?;
        validate_positive_amount(&record.amount)?;

        match &record.details {
            RecordDetails::CreditCard { description, .. } => validate_description(description)?,
            RecordDetails::BankAccount {
                details,
                descriptions,
                ..
            } => {
                for text in [details, descriptions].into_iter().flatten() {
                    validate_description(text)?;
                }
            }
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn draft(id: &str, cents: i64) -> UnvalidatedRecord {
        let mut draft = UnvalidatedRecord::new(Source::CreditCard);
        draft.id = Some(RecordId::from(id));
        draft.amount = Some(BigDecimal::new(cents.into(), 2));
        draft.date = NaiveDate::from_ymd_opt(2024, 1, 1);
        draft
    }

    #[test]
    fn enhanced_validator_accepts_plain_records() {
        let record = EnhancedRecordValidator
            .validate_record(draft("kc_001", 1999))
            .unwrap();
        assert_eq!(record.amount, BigDecimal::new(1999.into(), 2));
    }

    #[test]
    fn enhanced_validator_rejects_zero_amount() {
        assert!(matches!(
            EnhancedRecordValidator.validate_record(draft("kc1", 0)),
            Err(LedgerError::MalformedRecord(_))
        ));
        // The default validator lets zero through.
        assert!(DefaultRecordValidator
            .validate_record(draft("kc1", 0))
            .is_ok());
    }

    #[test]
    fn enhanced_validator_rejects_odd_ids() {
        assert!(matches!(
            EnhancedRecordValidator.validate_record(draft("kc 1/2", 100)),
            Err(LedgerError::MalformedRecord(_))
        ));
        assert!(validate_record_id(&RecordId::from("a".repeat(65)), Source::CreditCard).is_err());
    }

    #[test]
    fn generated_id_shape_must_match_ledger() {
        assert!(validate_record_id(&RecordId::from("kc42"), Source::CreditCard).is_ok());
        assert!(validate_record_id(&RecordId::from("kb42"), Source::CreditCard).is_err());
        assert!(validate_record_id(&RecordId::from("kc42"), Source::BankAccount).is_err());
        // Only the all-digit generated shape is reserved.
        assert!(validate_record_id(&RecordId::from("kb_lunch"), Source::CreditCard).is_ok());

        let generated = RecordId::generate(Source::BankAccount);
        assert!(validate_record_id(&generated, Source::BankAccount).is_ok());
        assert!(matches!(
            EnhancedRecordValidator.validate_record(draft("kb7", 100)),
            Err(LedgerError::MalformedRecord(_))
        ));
    }

    #[test]
    fn enhanced_validator_checks_bank_text_fields() {
        let mut bank = UnvalidatedRecord::new(Source::BankAccount);
        bank.amount = Some(BigDecimal::from(5));
        bank.timestamp = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(7, 0, 0);
        bank.details = Some("x".repeat(501));
        assert!(EnhancedRecordValidator.validate_record(bank).is_err());
    }
}
