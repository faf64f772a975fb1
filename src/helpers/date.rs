//! Date helper functions

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Parse the date forms posts use in their front-matter
///
/// # Examples
/// ```ignore
/// parse_date("2024-01-15")          // -> Some(2024-01-15)
/// parse_date("2024-01-15 10:30:00") // -> Some(2024-01-15)
/// ```
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }

    let formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    for fmt in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.naive_local().date())
}

/// Long display form: `2024年01月15日`
///
/// Strings that are not recognizable dates are returned unchanged.
pub fn format_date(s: &str) -> String {
    match parse_date(s) {
        Some(d) => d.format("%Y年%m月%d日").to_string(),
        None => s.to_string(),
    }
}

/// Short display form: `01-15`
pub fn format_date_short(s: &str) -> String {
    match parse_date(s) {
        Some(d) => d.format("%m-%d").to_string(),
        None => s.to_string(),
    }
}
