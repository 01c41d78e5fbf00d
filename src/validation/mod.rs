use crate::domain::TxStatus;
use bigdecimal::BigDecimal;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod auth;
pub mod catalog;
pub mod player;
pub mod transaction;

pub const CURRENCY_LEN: usize = 3;
pub const DEFAULT_CURRENCY: &str = "USD";
pub const AMOUNT_INPUT_MAX_LEN: usize = 32;
pub const AMOUNT_MAX_SCALE: i64 = 2;
/// Matches the `NUMERIC(15, 2)` amount column.
pub const AMOUNT_MAX_INTEGER_DIGITS: i64 = 13;
pub const WITHDRAWAL_ADDRESS_MAX_LEN: usize = 255;
pub const PLAYER_SITE_ID_MAX_LEN: usize = 100;
pub const NOTES_MAX_LEN: usize = 2000;
pub const COMMENT_MAX_LEN: usize = 1000;
pub const USERNAME_MAX_LEN: usize = 100;
pub const NAME_MAX_LEN: usize = 255;

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

/// Collects field errors so a request reports every problem at once.
#[derive(Debug, Default)]
pub struct Collector {
    errors: Vec<ValidationError>,
}

impl Collector {
    pub fn check<T>(&mut self, result: Result<T, ValidationError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.errors.push(err);
                None
            }
        }
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(ValidationError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// A scalar that may arrive as JSON string or number, or as a multipart text field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(serde_json::Number),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Text(s) => s.trim().to_string(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sanitizes free text, mapping blank input to `None`.
pub fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max_len: usize,
) -> Result<Option<String>, ValidationError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let value = sanitize_string(value);
    if value.is_empty() {
        return Ok(None);
    }
    validate_max_len(field, &value, max_len)?;
    Ok(Some(value))
}

pub fn required_text(
    field: &'static str,
    value: Option<&str>,
    max_len: usize,
) -> Result<String, ValidationError> {
    optional_text(field, value, max_len)?.ok_or_else(|| ValidationError::new(field, "is required"))
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

pub fn validate_enum(field: &'static str, value: &str, allowed: &[&str]) -> ValidationResult {
    if allowed.iter().all(|candidate| value != *candidate) {
        return Err(ValidationError::new(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }

    Ok(())
}

/// Resolves a status code against the fixed vocabulary.
pub fn parse_status(field: &'static str, value: &str) -> Result<TxStatus, ValidationError> {
    let value = sanitize_string(value);
    validate_required(field, &value)?;
    validate_enum(field, &value, &TxStatus::codes())?;
    TxStatus::from_str(&value).map_err(|err| ValidationError::new(field, err.to_string()))
}

pub fn parse_amount(field: &'static str, value: &FieldValue) -> Result<BigDecimal, ValidationError> {
    let raw = value.as_text();
    validate_required(field, &raw)?;
    validate_max_len(field, &raw, AMOUNT_INPUT_MAX_LEN)?;
    if raw.contains(['e', 'E']) {
        return Err(ValidationError::new(field, "must be a plain decimal number"));
    }

    let amount = BigDecimal::from_str(&raw)
        .map_err(|_| ValidationError::new(field, "must be a decimal number"))?;
    validate_positive_amount(field, &amount)?;

    let (digits, scale) = amount.as_bigint_and_exponent();
    if scale > AMOUNT_MAX_SCALE {
        return Err(ValidationError::new(
            field,
            format!("must have at most {} decimal places", AMOUNT_MAX_SCALE),
        ));
    }
    if digits.to_string().len() as i64 - scale > AMOUNT_MAX_INTEGER_DIGITS {
        return Err(ValidationError::new(
            field,
            format!("must have at most {} digits before the decimal point", AMOUNT_MAX_INTEGER_DIGITS),
        ));
    }

    Ok(amount.with_scale(AMOUNT_MAX_SCALE))
}

pub fn validate_positive_amount(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }

    Ok(())
}

pub fn parse_id(field: &'static str, value: &FieldValue) -> Result<i64, ValidationError> {
    value
        .as_text()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ValidationError::new(field, "must be a positive integer"))
}

pub fn parse_uuid(field: &'static str, value: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(value.trim()).map_err(|_| ValidationError::new(field, "must be a valid UUID"))
}

pub fn parse_currency(field: &'static str, value: Option<&str>) -> Result<String, ValidationError> {
    let currency = match value.map(sanitize_string) {
        Some(currency) if !currency.is_empty() => currency,
        _ => return Ok(DEFAULT_CURRENCY.to_string()),
    };

    if currency.len() != CURRENCY_LEN || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ValidationError::new(
            field,
            "must be a 3-letter uppercase currency code",
        ));
    }

    Ok(currency)
}

pub fn validate_rating(field: &'static str, rating: i64) -> Result<i16, ValidationError> {
    if !(1..=5).contains(&rating) {
        return Err(ValidationError::new(field, "must be between 1 and 5"));
    }
    Ok(rating as i16)
}

pub fn validate_language_code(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let code = value.trim().to_ascii_lowercase();
    if code.len() != 2 || !code.chars().all(|ch| ch.is_ascii_lowercase()) {
        return Err(ValidationError::new(field, "must be a 2-letter language code"));
    }
    Ok(code)
}

pub fn validate_url(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let parsed = url::Url::parse(value.trim())
        .map_err(|_| ValidationError::new(field, "must be a valid URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::new(field, "must be an http or https URL"));
    }
    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

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
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn parses_status_codes_only_from_vocabulary() {
        assert_eq!(parse_status("status", " SUCCESS "), Ok(TxStatus::Success));
        let err = parse_status("status", "DONE").unwrap_err();
        assert_eq!(err.field, "status");
        assert!(err.message.contains("IN_PROGRESS"));
        assert!(parse_status("status", "").is_err());
    }

    #[test]
    fn parses_amounts() {
        let amount = parse_amount("amount", &FieldValue::from("100")).unwrap();
        assert_eq!(amount.to_string(), "100.00");

        let number: FieldValue = serde_json::from_str("12.5").unwrap();
        assert_eq!(parse_amount("amount", &number).unwrap().to_string(), "12.50");

        assert!(parse_amount("amount", &FieldValue::from("0")).is_err());
        assert!(parse_amount("amount", &FieldValue::from("-3")).is_err());
        assert!(parse_amount("amount", &FieldValue::from("1.005")).is_err());
        assert!(parse_amount("amount", &FieldValue::from("ten")).is_err());
    }

    #[test]
    fn rejects_exponents_and_oversized_amounts() {
        for raw in ["1e99999999", "1E2", "2.5e-1"] {
            let err = parse_amount("amount", &FieldValue::from(raw)).unwrap_err();
            assert_eq!(err.field, "amount", "{raw}");
        }

        assert!(parse_amount("amount", &FieldValue::from("99999999999999999999")).is_err());
        assert!(parse_amount("amount", &FieldValue::from("10000000000000")).is_err());
        let largest = parse_amount("amount", &FieldValue::from("9999999999999.99")).unwrap();
        assert_eq!(largest.to_string(), "9999999999999.99");
        let small = parse_amount("amount", &FieldValue::from("0.5")).unwrap();
        assert_eq!(small.to_string(), "0.50");
    }

    #[test]
    fn parses_currency_with_default() {
        assert_eq!(parse_currency("currency", None).unwrap(), "USD");
        assert_eq!(parse_currency("currency", Some("ETB")).unwrap(), "ETB");
        assert!(parse_currency("currency", Some("usd")).is_err());
        assert!(parse_currency("currency", Some("DOLLAR")).is_err());
    }

    #[test]
    fn validates_ratings_and_language_codes() {
        assert_eq!(validate_rating("rating", 5), Ok(5));
        assert!(validate_rating("rating", 0).is_err());
        assert!(validate_rating("rating", 6).is_err());
        assert_eq!(validate_language_code("languageCode", "EN").unwrap(), "en");
        assert!(validate_language_code("languageCode", "eng").is_err());
    }

    #[test]
    fn validates_urls() {
        assert!(validate_url("evidenceUrl", "https://cdn.example.com/a.png").is_ok());
        assert!(validate_url("evidenceUrl", "ftp://example.com/a.png").is_err());
        assert!(validate_url("evidenceUrl", "not a url").is_err());
    }

    #[test]
    fn collector_gathers_all_errors() {
        let mut collector = Collector::default();
        assert_eq!(collector.check(parse_id("depositBankId", &FieldValue::from("7"))), Some(7));
        collector.check(parse_id("depositBankId", &FieldValue::from("x")));
        collector.push("amount", "is required");
        let errors = collector.finish().unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
