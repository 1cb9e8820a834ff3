//! Field-level normalizers for raw source values.
//!
//! Every function here is total: malformed input degrades to a typed sentinel
//! (`None`, `0.0`, `Unknown`) with a logged warning, and the pipeline keeps
//! going. Downstream code can therefore assume canonical values without
//! re-validating. Do not convert these into hard errors; treating garbage as
//! a sentinel is the documented business rule for this data.

use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use log::warn;
use regex::Regex;

use crate::model::{ShipmentType, Status};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Collapses internal whitespace and title-cases each token, preserving short
/// all-uppercase tokens ("LLC", "USA") as acronyms. Blank input is `None`.
pub fn clean_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned = trimmed
        .split_whitespace()
        .map(|token| {
            if token.len() <= 3 && token.chars().all(|c| !c.is_alphabetic() || c.is_uppercase()) {
                token.to_string()
            } else {
                title_case(token)
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    Some(cleaned)
}

fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Maps the fixed synonym set to ACTIVE/INACTIVE, falling back to a prefix
/// match, else UNKNOWN.
pub fn normalize_status(raw: &str) -> Status {
    let lowered = raw.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "" => Status::Unknown,
        "active" | "act" | "y" | "yes" | "true" | "1" => Status::Active,
        "inactive" | "inact" | "n" | "no" | "false" | "0" => Status::Inactive,
        other if other.starts_with("active") => Status::Active,
        other if other.starts_with("inact") => Status::Inactive,
        _ => Status::Unknown,
    }
}

/// Maps shipment-type synonyms ("2 DAY", "GND", "OVERNIGHT", ...) onto the
/// four billable codes; anything else is UNKNOWN.
pub fn normalize_shipment_type(raw: &str) -> ShipmentType {
    let uppered = raw.trim().to_ascii_uppercase();
    match uppered.as_str() {
        "GROUND" | "GND" | "STANDARD" | "REGULAR" => ShipmentType::Ground,
        "2DAY" | "2 DAY" | "TWO DAY" | "2-DAY" => ShipmentType::TwoDay,
        "EXPRESS" | "EXP" | "NEXT DAY" | "OVERNIGHT" => ShipmentType::Express,
        "FREIGHT" | "FRT" | "CARGO" | "HEAVY" => ShipmentType::Freight,
        _ => ShipmentType::Unknown,
    }
}

/// Parses a calendar date from any of the supported formats, taking the date
/// part of datetime-shaped values, with a final fuzzy scan for a date token
/// embedded in surrounding text. Unparsable input is `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(parsed);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(parsed.date());
        }
    }
    if let Some(found) = fuzzy_date(trimmed) {
        return Some(found);
    }
    warn!("Could not parse date: '{trimmed}'");
    None
}

/// Fallback for values like "opened 2024-03-01 (migrated)": pull the first
/// date-shaped token out of the string and parse that.
fn fuzzy_date(value: &str) -> Option<NaiveDate> {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    let pattern = TOKEN.get_or_init(|| {
        Regex::new(r"\d{4}[-/]\d{1,2}[-/]\d{1,2}|\d{1,2}[-/]\d{1,2}[-/]\d{4}")
            .expect("date token pattern is valid")
    });
    let token = pattern.find(value)?.as_str();
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(token, fmt) {
            return Some(parsed);
        }
    }
    None
}

/// Parses a monetary amount, stripping currency symbols and thousands
/// separators. Unparsable input is `0.0`, never an error: garbage amounts
/// are deliberately treated as zero rather than poisoning the run.
pub fn parse_amount(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let stripped: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    match stripped.parse::<f64>() {
        Ok(value) => value,
        Err(_) => {
            warn!("Could not parse amount: '{trimmed}'");
            0.0
        }
    }
}
