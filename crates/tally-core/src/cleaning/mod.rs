//! Per-field cleaning rules.
//!
//! Each rule is a pure function from one [`FieldValue`] to another. Rules of a
//! field run in catalog order; the first failing rule stops the chain for that
//! cell and surfaces as a field-level error.

pub mod values;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::model::FieldValue;
use values::{excel_serial_to_datetime, parse_date, parse_decimal};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CleaningError {
    #[error("'{0}' is not a valid number")]
    InvalidNumber(String),

    #[error("'{0}' is not a valid date")]
    InvalidDate(String),
}

/// A compiled regular expression that round-trips through JSON as its source text.
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(Pattern)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.0.as_str())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Pattern::new(&source).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum CleaningRule {
    Trim,
    Uppercase,
    Lowercase,
    /// Drop everything except letters, digits (CJK included), whitespace and `keep`.
    StripSpecial {
        #[serde(default)]
        keep: String,
    },
    /// Parse to a decimal amount, optionally rounded to `scale` places.
    Number {
        #[serde(default)]
        scale: Option<u32>,
    },
    /// Parse to a calendar date. `formats` are tried before the built-in layouts.
    Date {
        #[serde(default)]
        formats: Vec<String>,
    },
    Replace {
        pattern: Pattern,
        #[serde(default)]
        replacement: String,
    },
}

impl CleaningRule {
    pub fn name(&self) -> &'static str {
        match self {
            CleaningRule::Trim => "trim",
            CleaningRule::Uppercase => "uppercase",
            CleaningRule::Lowercase => "lowercase",
            CleaningRule::StripSpecial { .. } => "strip_special",
            CleaningRule::Number { .. } => "number",
            CleaningRule::Date { .. } => "date",
            CleaningRule::Replace { .. } => "replace",
        }
    }

    /// Apply this rule to one value. Empty values pass through every rule.
    pub fn apply(&self, value: FieldValue) -> Result<FieldValue, CleaningError> {
        if value.is_empty() {
            return Ok(FieldValue::Empty);
        }
        match self {
            CleaningRule::Trim => Ok(value.trimmed()),
            CleaningRule::Uppercase => Ok(map_text(value, |s| s.to_uppercase())),
            CleaningRule::Lowercase => Ok(map_text(value, |s| s.to_lowercase())),
            CleaningRule::StripSpecial { keep } => Ok(map_text(value, |s| {
                s.chars()
                    .filter(|c| c.is_alphanumeric() || c.is_whitespace() || keep.contains(*c))
                    .collect()
            })),
            CleaningRule::Number { scale } => {
                let number = match value {
                    FieldValue::Number(d) => d,
                    FieldValue::Text(s) => parse_decimal(&s)?,
                    FieldValue::Bool(b) => Decimal::from(u8::from(b)),
                    FieldValue::Date(d) => return Err(CleaningError::InvalidNumber(d.to_string())),
                    FieldValue::Empty => return Ok(FieldValue::Empty),
                };
                Ok(FieldValue::Number(match scale {
                    Some(dp) => number.round_dp_with_strategy(*dp, RoundingStrategy::MidpointAwayFromZero),
                    None => number.normalize(),
                }))
            }
            CleaningRule::Date { formats } => match value {
                FieldValue::Date(d) => Ok(FieldValue::Date(d)),
                FieldValue::Text(s) => parse_date(&s, formats).map(FieldValue::Date),
                FieldValue::Number(n) => {
                    // Eight-digit integers are keyed dates (20240301); other numbers are Excel serials.
                    if let Some(d) = compact_date(n) {
                        return Ok(FieldValue::Date(d));
                    }
                    n.to_f64()
                        .and_then(excel_serial_to_datetime)
                        .map(|dt| FieldValue::Date(dt.date()))
                        .ok_or_else(|| CleaningError::InvalidDate(n.to_string()))
                }
                FieldValue::Bool(b) => Err(CleaningError::InvalidDate(b.to_string())),
                FieldValue::Empty => Ok(FieldValue::Empty),
            },
            CleaningRule::Replace {
                pattern,
                replacement,
            } => Ok(map_text(value, |s| {
                pattern.0.replace_all(s, replacement.as_str()).into_owned()
            })),
        }
    }
}

/// Run `rules` in order over `value`.
pub fn apply_rules(rules: &[CleaningRule], value: FieldValue) -> Result<FieldValue, CleaningError> {
    rules.iter().try_fold(value, |acc, rule| rule.apply(acc))
}

fn compact_date(n: Decimal) -> Option<NaiveDate> {
    if !n.fract().is_zero() || n < Decimal::from(10_000_000) || n > Decimal::from(99_999_999) {
        return None;
    }
    NaiveDate::parse_from_str(&n.trunc().to_string(), "%Y%m%d").ok()
}

/// Text rules only touch text; a rule that empties the text yields `Empty`.
fn map_text(value: FieldValue, f: impl FnOnce(&str) -> String) -> FieldValue {
    match value {
        FieldValue::Text(s) => {
            let out = f(&s);
            if out.is_empty() {
                FieldValue::Empty
            } else {
                FieldValue::Text(out)
            }
        }
        other => other,
    }
}
