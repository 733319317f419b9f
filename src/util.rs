// Utility helpers for parsing, basic statistics and number formatting.
//
// This module centralizes all the "dirty" CSV/number/date handling so the
// rest of the code can assume clean, typed values.
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Tokens that load as a missing cell, in addition to the empty string.
pub const NULL_TOKENS: &[&str] = &[
    "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "<NA>", "#N/A",
    "#NA",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%b-%Y", "%Y%m%d"];

pub fn is_null_token(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || NULL_TOKENS.contains(&s)
}

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in CSV exports.
///
/// - Accepts `Option<&str>` so callers can pass through optional fields.
/// - Trims whitespace and strips thousands separators like `","`.
/// - Returns `None` for anything that is not a finite number.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if is_null_token(s) {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse dates and timestamps in the handful of layouts CSV exports use.
/// Date-only values land at midnight.
pub fn parse_datetime_safe(s: Option<&str>) -> Option<NaiveDateTime> {
    let s = s?.trim();
    if is_null_token(s) {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse boolean-ish markers. Anything unrecognized is `None`.
pub fn parse_flag_safe(s: Option<&str>) -> Option<bool> {
    let s = s?.trim().to_ascii_lowercase();
    match s.as_str() {
        "true" | "t" | "yes" | "y" | "1" | "1.0" => Some(true),
        "false" | "f" | "no" | "n" | "0" | "0.0" => Some(false),
        _ => None,
    }
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Format a floating-point value with:
    // - a fixed number of decimal places, and
    // - locale-aware thousands separators (e.g., `1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let mut res = match int_part.parse::<u128>() {
        Ok(v) => v.to_formatted_string(&Locale::en),
        // past u128 (or inf) keep the plain digits
        Err(_) => int_part.to_string(),
    };
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    // "-0.00" after rounding reads as noise
    if neg && res.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

pub fn format_currency(n: f64) -> String {
    format!("${}", format_number(n, 2))
}

pub fn format_percent(n: f64) -> String {
    format!("{}%", format_number(n, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_thousands_and_decimals() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-1500.0, 1), "-1,500.0");
        assert_eq!(format_number(-0.001, 2), "0.00");
        assert_eq!(format_int(9855usize), "9,855");
        assert_eq!(format_currency(20.0), "$20.00");
        assert_eq!(format_percent(12.345), "12.3%");
    }

    #[test]
    fn numeric_parsing_is_forgiving() {
        assert_eq!(parse_f64_safe(Some(" 1,234.5 ")), Some(1234.5));
        assert_eq!(parse_f64_safe(Some("abc")), None);
        assert_eq!(parse_f64_safe(Some("NaN")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn parses_common_date_layouts() {
        let d = parse_datetime_safe(Some("2024-02-03")).unwrap();
        assert_eq!(d.to_string(), "2024-02-03 00:00:00");
        let dt = parse_datetime_safe(Some("2024-02-03 14:05:00")).unwrap();
        assert_eq!(dt.to_string(), "2024-02-03 14:05:00");
        assert!(parse_datetime_safe(Some("2024-02-03T14:05:00Z")).is_some());
        assert!(parse_datetime_safe(Some("02/03/2024")).is_some());
        assert!(parse_datetime_safe(Some("not a date")).is_none());
    }

    #[test]
    fn huge_values_keep_their_digits() {
        assert_eq!(format_number(1e19, 0), "10,000,000,000,000,000,000");
        assert_eq!(format_currency(9.3e18), "$9,300,000,000,000,000,000.00");
        assert_eq!(format_number(-2e20, 1), "-200,000,000,000,000,000,000.0");
    }

    #[test]
    fn flags_accept_common_markers() {
        assert_eq!(parse_flag_safe(Some("TRUE")), Some(true));
        assert_eq!(parse_flag_safe(Some("0")), Some(false));
        assert_eq!(parse_flag_safe(Some("maybe")), None);
    }
}
