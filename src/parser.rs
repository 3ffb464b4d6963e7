// 🧮 Field Parsing - shared helpers for turning raw cells into typed values
//
// Raw expense cells are free text: nullable, padded, with comma decimals.
// Every helper here either returns a typed value or a ParseError naming
// the field, so callers can decide if the failure is fatal or skippable.

use crate::error::ParseError;
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt::Display;
use std::str::FromStr;

/// Date layouts seen in the source, tried in order
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

// ============================================================================
// CANONICALIZATION
// ============================================================================

/// Not-null rule: trimmed value, or `default` when null/blank
pub fn not_null(raw: Option<&str>, default: &str) -> String {
    match raw.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => default.to_string(),
    }
}

/// Trimmed, non-blank value or None
pub fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

/// Case-insensitive equality used by every matcher
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

// ============================================================================
// NUMBERS
// ============================================================================

/// Parse a locale-formatted decimal ("150,00" or "150.00")
pub fn parse_decimal(field: &'static str, raw: Option<&str>) -> Result<f64, ParseError> {
    let value = non_blank(raw).ok_or_else(|| ParseError::missing(field))?;
    let canonical = value.replace(',', ".");

    let parsed: f64 = canonical
        .parse()
        .map_err(|e| ParseError::new(field, value, format!("{}", e)))?;

    if !parsed.is_finite() {
        return Err(ParseError::new(field, value, "not a finite number"));
    }

    Ok(parsed)
}

/// Decimal that falls back to `default` when null/blank
pub fn parse_decimal_or(field: &'static str, raw: Option<&str>, default: f64) -> Result<f64, ParseError> {
    match non_blank(raw) {
        Some(_) => parse_decimal(field, raw),
        None => Ok(default),
    }
}

/// Required integer field
pub fn parse_int<T>(field: &'static str, raw: Option<&str>) -> Result<T, ParseError>
where
    T: FromStr,
    T::Err: Display,
{
    let value = non_blank(raw).ok_or_else(|| ParseError::missing(field))?;
    value
        .parse()
        .map_err(|e: T::Err| ParseError::new(field, value, e.to_string()))
}

/// Integer field that falls back to `default` when null/blank
pub fn parse_int_or<T>(field: &'static str, raw: Option<&str>, default: T) -> Result<T, ParseError>
where
    T: FromStr,
    T::Err: Display,
{
    match non_blank(raw) {
        Some(_) => parse_int(field, raw),
        None => Ok(default),
    }
}

/// Integer that may arrive as "123" or "123.0"; blank is None
pub fn parse_numeric_id(field: &'static str, raw: Option<&str>) -> Result<Option<i64>, ParseError> {
    let Some(value) = non_blank(raw) else {
        return Ok(None);
    };

    if let Ok(id) = value.parse::<i64>() {
        return Ok(Some(id));
    }

    match value.replace(',', ".").parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Some(f as i64)),
        _ => Err(ParseError::new(field, value, "not an integer")),
    }
}

/// Month number in 1..=12
pub fn parse_month(field: &'static str, raw: Option<&str>) -> Result<u32, ParseError> {
    let month: u32 = parse_int(field, raw)?;
    if !(1..=12).contains(&month) {
        return Err(ParseError::new(field, month.to_string(), "out of range 1..=12"));
    }
    Ok(month)
}

// ============================================================================
// DATES
// ============================================================================

/// Issue date: blank is None, anything else must parse
pub fn parse_issue_date(field: &'static str, raw: Option<&str>) -> Result<Option<NaiveDateTime>, ParseError> {
    let Some(value) = non_blank(raw) else {
        return Ok(None);
    };

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Some(datetime));
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Ok(date.and_hms_opt(0, 0, 0));
        }
    }

    Err(ParseError::new(field, value, "unrecognized date format"))
}
