use crate::schema::Value;
use chrono::{Datelike, NaiveDate};

// Stored strings are echoed back into HTML tables by the front end.
const DISALLOWED_STRING_SYMBOLS: &[char] = &['<', '>'];

pub fn is_unsigned_decimal(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

pub fn string(value: &Value) -> bool {
    match value {
        Value::Text(s) => !s.contains(DISALLOWED_STRING_SYMBOLS),
        _ => false,
    }
}

pub fn non_empty_string(value: &Value) -> bool {
    !value.is_empty() && string(value)
}

/// Ints, or strings made only of ASCII digits (form values before coercion).
pub fn number(value: &Value) -> bool {
    match value {
        Value::Int(n) => *n >= 0,
        Value::Text(s) => is_unsigned_decimal(s),
        Value::Null => false,
    }
}

fn numeric(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(*n),
        Value::Text(s) if is_unsigned_decimal(s) => s.parse().ok(),
        _ => None,
    }
}

/// Years between 1940 (exclusive) and 2040 (inclusive).
pub fn year(value: &Value) -> bool {
    numeric(value).is_some_and(|y| 1940 < y && y <= 2040)
}

/// `YYYY-MM-DD` naming a real calendar day, 1930 < year < 2030.
pub fn date(value: &Value) -> bool {
    if !string(value) {
        return false;
    }
    let Some(s) = value.as_text() else {
        return false;
    };
    let bytes = s.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return false;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !digits_ok {
        return false;
    }
    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(d) => 1930 < d.year() && d.year() < 2030,
        Err(_) => false,
    }
}

pub fn email(value: &Value) -> bool {
    if !non_empty_string(value) {
        return false;
    }
    let Some(s) = value.as_text() else {
        return false;
    };
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = s.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

/// An empty option list accepts anything.
pub fn one_of(value: &Value, options: &[&str]) -> bool {
    if options.is_empty() {
        return true;
    }
    match value {
        Value::Text(s) => options.contains(&s.as_str()),
        _ => false,
    }
}
