//! Stateless field checks shared by the user and transaction validators.
//!
//! Each function inspects a single raw input value and has no side effects.
//! The validators assemble the human-readable messages.

use std::{collections::BTreeMap, str::FromStr};

use email_address::EmailAddress;
use serde_json::Value;
use time::{Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

/// Validation failures accumulated per request field.
///
/// Keys are the request body field names; values are the messages for that
/// field in the order the checks ran.
pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

/// The `YYYY-MM-DD` date format used in request bodies.
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Whether `value` is present and non-empty after trimming.
pub fn required(value: Option<&str>) -> bool {
    value.is_some_and(|text| !text.trim().is_empty())
}

/// Whether the trimmed `value` has at least `min` characters.
pub fn min_length(value: &str, min: usize) -> bool {
    value.trim().chars().count() >= min
}

/// Whether the trimmed `value` has no more than `max` characters.
pub fn max_length(value: &str, max: usize) -> bool {
    value.trim().chars().count() <= max
}

/// Whether `value` has the shape of an email address.
pub fn is_valid_email(value: &str) -> bool {
    EmailAddress::from_str(value).is_ok()
}

/// Parse a JSON value as a monetary amount.
///
/// Accepts a JSON number or a numeric string, mirroring what HTML form
/// clients send. Returns `None` for anything else.
pub fn parse_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Parse a `YYYY-MM-DD` string as a calendar date.
///
/// Returns `None` for malformed input and for dates that do not exist on
/// the calendar (e.g. `2025-02-30`).
pub fn parse_date(value: &str) -> Option<Date> {
    Date::parse(value, DATE_FORMAT).ok()
}

/// Whether `date` is no later than today (UTC). Today passes.
pub fn is_past_or_today(date: Date) -> bool {
    date <= OffsetDateTime::now_utc().date()
}
