//! This module handles conversion between iCal files and internal representations
//!
//! It is a wrapper around different Rust third-party libraries, since I haven't find any complete library that is able to parse _and_ generate iCal files

mod parser;
pub use parser::parse;
mod builder;
pub use builder::{build_calendar, build_from, build_from_existing};

use chrono::{NaiveDate, NaiveDateTime};

use crate::config::{ORG_NAME, PRODUCT_NAME};

/// Non-standard property that carries the task color
pub const COLOR_PROPERTY: &str = "X-ERRANDS-COLOR";

const DATE_FORMAT: &str = "%Y%m%d";
const DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";
const EXTENDED_DATE_FORMAT: &str = "%Y-%m-%d";
const EXTENDED_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn default_prod_id() -> String {
    let org = ORG_NAME.lock().map(|s| s.clone()).unwrap_or_default();
    let product = PRODUCT_NAME.lock().map(|s| s.clone()).unwrap_or_default();
    format!("-//{}//{}//EN", org, product)
}

/// A date value, as stored in the task database
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FloatingDate {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl FloatingDate {
    /// Parse an iCal date or date-time, or its ISO 8601 extended form (`2024-01-05T10:00:00`).
    ///
    /// Times are floating: a trailing `Z` (UTC) is dropped and the wall-clock value is kept as is.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().trim_end_matches('Z');
        if value.is_empty() {
            return None;
        }
        for format in [DATE_TIME_FORMAT, EXTENDED_DATE_TIME_FORMAT] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
                return Some(FloatingDate::DateTime(dt));
            }
        }
        [DATE_FORMAT, EXTENDED_DATE_FORMAT].iter()
            .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
            .map(FloatingDate::Date)
    }

    pub fn is_date_only(&self) -> bool {
        matches!(self, FloatingDate::Date(_))
    }

    pub fn format(&self) -> String {
        match self {
            FloatingDate::Date(d) => d.format(DATE_FORMAT).to_string(),
            FloatingDate::DateTime(dt) => dt.format(DATE_TIME_FORMAT).to_string(),
        }
    }
}

/// Normalize a date string to its canonical stored form, or an empty string if it cannot be understood
pub fn normalize_date(value: &str) -> String {
    if value.trim().is_empty() {
        return String::new();
    }
    match FloatingDate::parse(value) {
        Some(date) => date.format(),
        None => {
            log::warn!("Ignoring invalid date {:?}", value);
            String::new()
        },
    }
}

/// Reverse the TEXT escaping of RFC5545 (section 3.3.11)
pub(crate) fn unescape_text(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => result.push('\n'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}

/// Split a multi-valued TEXT property on its unescaped commas
pub(crate) fn split_escaped_list(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            current.push('\\');
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ',' {
            items.push(unescape_text(&current));
            current.clear();
        } else {
            current.push(c);
        }
    }
    items.push(unescape_text(&current));
    items.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
