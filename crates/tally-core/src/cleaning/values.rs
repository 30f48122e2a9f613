use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::cleaning::CleaningError;
use crate::matching::normalize::fold_width;

/// Date layouts seen in ledgers, tried in order after any caller-supplied formats.
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y年%m月%d日", "%Y%m%d"];

/// Largest serial Excel can represent (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Parse an amount written by hand into a ledger.
///
/// Handles formats like:
/// - "1,234.50" -> 1234.50
/// - "¥ 1,234" / "1234元" -> 1234
/// - "１２３４" (full-width digits) -> 1234
/// - "(1,000)" -> -1000 (accounting negative)
/// - "1.2E+5" -> 120000
pub fn parse_decimal(s: &str) -> Result<Decimal, CleaningError> {
    let folded = fold_width(s.trim());
    let mut cleaned: String = folded
        .chars()
        .filter(|c| !matches!(c, ',' | '¥' | '￥' | '$' | '元') && !c.is_whitespace())
        .collect();

    let mut negative = false;
    if cleaned.starts_with('(') && cleaned.ends_with(')') && cleaned.len() > 2 {
        cleaned = cleaned[1..cleaned.len() - 1].to_string();
        negative = true;
    }

    if cleaned.is_empty() {
        return Err(CleaningError::InvalidNumber(s.trim().to_string()));
    }

    let parsed = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|_| CleaningError::InvalidNumber(s.trim().to_string()))?;

    Ok(if negative { -parsed } else { parsed })
}

/// Parse a date cell written as text.
///
/// `extra_formats` are tried first, as dates and then as date-times.
pub fn parse_date(s: &str, extra_formats: &[String]) -> Result<NaiveDate, CleaningError> {
    let folded = fold_width(s.trim());
    let text = folded.trim();
    if text.is_empty() {
        return Err(CleaningError::InvalidDate(s.to_string()));
    }

    for fmt in extra_formats {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return Ok(d);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(dt.date());
        }
    }

    // Drop a trailing time component: "2024-03-01 09:30:00", "2024-03-01T09:30".
    let date_part = text
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or(text);

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(date_part, fmt) {
            return Ok(d);
        }
    }

    Err(CleaningError::InvalidDate(s.trim().to_string()))
}

/// Convert an Excel serial day number to a timestamp (1900 date system).
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..=MAX_EXCEL_SERIAL + 1.0).contains(&serial) {
        return None;
    }
    let mut days = serial.trunc() as i64;
    // Excel counts a nonexistent 1900-02-29 as serial 60.
    if days < 60 {
        days += 1;
    }
    let seconds = ((serial.fract()) * 86_400.0).round() as i64;
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    base.checked_add_signed(Duration::days(days))?
        .checked_add_signed(Duration::seconds(seconds))
}

/// Convert f64 to Decimal, preserving reasonable precision.
///
/// Uses string round-trip to avoid floating-point artifacts
/// (e.g., 0.0035_f64 becoming 0.00349999...). Returns `None` for
/// values Decimal cannot hold (NaN, infinities, beyond ±7.9e28).
pub fn f64_to_decimal(f: f64) -> Option<Decimal> {
    let s = format!("{f}");
    s.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::try_from(f).ok())
}
