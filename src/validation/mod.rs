use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::fmt;

pub const EXTERNAL_REF_MAX_LEN: usize = 255;
pub const VERIFIER_MAX_LEN: usize = 128;
pub const NOTES_MAX_LEN: usize = 2000;
pub const AMOUNT_MAX_SCALE: i64 = 2;
/// Digits left of the decimal point in a `NUMERIC(14,2)` column.
pub const AMOUNT_MAX_INTEGER_DIGITS: u32 = 12;
pub const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// Sanitizes a tenant-supplied payment reference and returns the normalized form.
pub fn normalize_external_ref(external_ref: &str) -> Result<String, ValidationError> {
    let external_ref = sanitize_string(external_ref);
    validate_required("transaction_id", &external_ref)?;
    validate_max_len("transaction_id", &external_ref, EXTERNAL_REF_MAX_LEN)?;
    Ok(external_ref)
}

pub fn normalize_verifier(verifier: &str) -> Result<String, ValidationError> {
    let verifier = sanitize_string(verifier);
    validate_required("verifier", &verifier)?;
    validate_max_len("verifier", &verifier, VERIFIER_MAX_LEN)?;
    Ok(verifier)
}

pub fn normalize_notes(notes: Option<&str>) -> Result<Option<String>, ValidationError> {
    match notes.map(str::trim) {
        None | Some("") => Ok(None),
        Some(notes) => {
            validate_max_len("notes", notes, NOTES_MAX_LEN)?;
            Ok(Some(notes.to_string()))
        }
    }
}

/// Money must be positive and representable in a `NUMERIC(14,2)` column without rounding.
pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    if amount.with_scale(AMOUNT_MAX_SCALE) != *amount {
        return Err(ValidationError::new(
            "amount",
            format!("must have at most {} decimal places", AMOUNT_MAX_SCALE),
        ));
    }

    if *amount >= BigDecimal::from(10_i64.pow(AMOUNT_MAX_INTEGER_DIGITS)) {
        return Err(ValidationError::new(
            "amount",
            format!("must be less than 10^{}", AMOUNT_MAX_INTEGER_DIGITS),
        ));
    }

    Ok(())
}

pub fn parse_due_date(value: &str) -> Result<NaiveDate, ValidationError> {
    let value = value.trim();
    validate_required("due_date", value)?;
    NaiveDate::parse_from_str(value, DUE_DATE_FORMAT)
        .map_err(|_| ValidationError::new("due_date", "must be a date formatted as YYYY-MM-DD"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string("single"), "single");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn normalizes_external_ref() {
        assert_eq!(normalize_external_ref("  TXN123 ").unwrap(), "TXN123");
        assert!(normalize_external_ref("\u{0007}").is_err());
        assert!(normalize_external_ref(&"X".repeat(256)).is_err());
    }

    #[test]
    fn normalizes_notes() {
        assert_eq!(normalize_notes(None).unwrap(), None);
        assert_eq!(normalize_notes(Some("   ")).unwrap(), None);
        assert_eq!(
            normalize_notes(Some(" broken tap ")).unwrap(),
            Some("broken tap".to_string())
        );
    }

    #[test]
    fn validates_positive_amount() {
        let positive = BigDecimal::from_str("1.23").expect("valid decimal");
        let zero = BigDecimal::from(0);
        let negative = BigDecimal::from(-1);
        let too_precise = BigDecimal::from_str("10.005").expect("valid decimal");

        assert!(validate_positive_amount(&positive).is_ok());
        assert!(validate_positive_amount(&BigDecimal::from(5000)).is_ok());
        assert!(validate_positive_amount(&zero).is_err());
        assert!(validate_positive_amount(&negative).is_err());
        assert!(validate_positive_amount(&too_precise).is_err());
    }

    #[test]
    fn rejects_amounts_too_large_for_storage() {
        let largest = BigDecimal::from_str("999999999999.99").expect("valid decimal");
        let overflow = BigDecimal::from_str("1000000000000").expect("valid decimal");

        assert!(validate_positive_amount(&largest).is_ok());
        assert!(validate_positive_amount(&overflow).is_err());
    }

    #[test]
    fn parses_due_dates() {
        assert_eq!(
            parse_due_date("2025-02-10").unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 10).unwrap()
        );
        assert!(parse_due_date("10/02/2025").is_err());
        assert!(parse_due_date("2025-02-30").is_err());
        assert_eq!(parse_due_date("").unwrap_err().field, "due_date");
    }
}
