//! Input checks shared by every tool and resource binding
//!
//! Each helper names the offending field in its error so callers can fix the
//! exact argument. Field names are the caller-facing (camelCase) argument keys.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveTime};
use regex::Regex;

use crate::{domain::normalize::parse_date_like, errors::AppError};

pub const MIN_PHONE_DIGITS: usize = 9;
pub const MAX_PHONE_DIGITS: usize = 16;
pub const MAX_NOTE_CHARS: usize = 500;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9\s().-]+$").expect("phone regex"));
static RFC3339: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?-u:\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2}))$")
        .expect("rfc3339 regex")
});
static CURRENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}$").expect("currency regex"));
static COUNTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}$").expect("country regex"));
static PERCENTAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{1,3}(?:\.[0-9]{1,4})?$").expect("percentage regex"));

/// Structural and semantic checks run before any external call.
pub trait Validate {
    fn validate(&self) -> Result<(), AppError>;
}

pub fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(field, "must not be empty"));
    }
    Ok(())
}

pub fn validate_email(field: &str, value: &str) -> Result<(), AppError> {
    if !EMAIL.is_match(value.trim()) {
        return Err(AppError::validation(field, "must be a valid email address"));
    }
    Ok(())
}

/// Optional leading `+`, then digits with spaces, dots, dashes or parentheses.
pub fn validate_phone(field: &str, value: &str) -> Result<(), AppError> {
    let value = value.trim();
    if !PHONE.is_match(value) {
        return Err(AppError::validation(
            field,
            "may only contain digits, spaces, dots, dashes, parentheses and a leading +",
        ));
    }

    let digits = value.chars().filter(char::is_ascii_digit).count();
    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits) {
        return Err(AppError::validation(
            field,
            format!("must contain between {MIN_PHONE_DIGITS} and {MAX_PHONE_DIGITS} digits"),
        ));
    }
    Ok(())
}

pub fn validate_date_only(field: &str, value: &str) -> Result<(), AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| AppError::validation(field, "must be a date in YYYY-MM-DD format"))
}

pub fn validate_clock_time(field: &str, value: &str) -> Result<(), AppError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map(|_| ())
        .map_err(|_| AppError::validation(field, "must be a time in HH:MM (24-hour) format"))
}

/// Full RFC 3339 timestamp with an explicit `Z` or numeric offset.
pub fn validate_rfc3339(field: &str, value: &str) -> Result<(), AppError> {
    let value = value.trim();
    if !RFC3339.is_match(value) || DateTime::parse_from_rfc3339(value).is_err() {
        return Err(AppError::validation(
            field,
            "must be an RFC 3339 timestamp with a Z or +HH:MM offset",
        ));
    }
    Ok(())
}

pub fn validate_date_like(field: &str, value: &str) -> Result<(), AppError> {
    parse_date_like(value)
        .map(|_| ())
        .map_err(|_| AppError::validation(field, format!("`{value}` is not a recognizable date")))
}

pub fn validate_currency(field: &str, value: &str) -> Result<(), AppError> {
    if !CURRENCY.is_match(value) {
        return Err(AppError::validation(
            field,
            "must be a three-letter uppercase ISO 4217 code",
        ));
    }
    Ok(())
}

pub fn validate_country(field: &str, value: &str) -> Result<(), AppError> {
    if !COUNTRY.is_match(value) {
        return Err(AppError::validation(
            field,
            "must be a two-letter uppercase ISO 3166 country code",
        ));
    }
    Ok(())
}

/// Amounts are in the currency's smallest unit.
pub fn validate_amount(field: &str, amount: i64) -> Result<(), AppError> {
    if amount < 0 {
        return Err(AppError::validation(field, "must not be negative"));
    }
    Ok(())
}

pub fn validate_percentage(field: &str, value: &str) -> Result<(), AppError> {
    let within_range = PERCENTAGE.is_match(value)
        && value.parse::<f64>().is_ok_and(|percentage| percentage <= 100.0);
    if !within_range {
        return Err(AppError::validation(
            field,
            "must be a decimal percentage between 0 and 100, e.g. \"7.25\"",
        ));
    }
    Ok(())
}

pub fn validate_one_of(field: &str, value: &str, allowed: &[&str]) -> Result<(), AppError> {
    if !allowed.contains(&value) {
        return Err(AppError::validation(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }
    Ok(())
}

pub fn validate_max_chars(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    if value.chars().count() > max {
        return Err(AppError::validation(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(())
}
