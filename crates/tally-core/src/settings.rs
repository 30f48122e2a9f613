use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::TallyError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Exact and alias matches only.
    #[default]
    Strict,
    /// Also accept similar headers above `fuzzy_threshold`.
    Fuzzy,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Strict => write!(f, "strict"),
            MatchMode::Fuzzy => write!(f, "fuzzy"),
        }
    }
}

/// How often an external scheduler should re-import the same files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateFrequency {
    Hourly,
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl UpdateFrequency {
    /// Nominal interval. Monthly counts as 30 days; use [`next_after`](Self::next_after)
    /// for calendar months.
    pub fn interval(&self) -> Duration {
        match self {
            UpdateFrequency::Hourly => Duration::hours(1),
            UpdateFrequency::Daily => Duration::days(1),
            UpdateFrequency::Weekly => Duration::weeks(1),
            UpdateFrequency::Monthly => Duration::days(30),
        }
    }

    pub fn next_after(&self, last: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            UpdateFrequency::Monthly => last.checked_add_months(Months::new(1)),
            other => last.checked_add_signed(other.interval()),
        }
    }
}

/// Options for one import run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub match_mode: MatchMode,
    /// Minimum similarity for a fuzzy match, in (0, 1].
    pub fuzzy_threshold: f64,
    /// A kind must match at least this many fields to be recognized.
    pub min_match_fields: usize,
    /// Non-blank rows examined from the top when looking for the header.
    pub header_scan_rows: usize,
    pub skip_empty_rows: bool,
    /// Trim text cells before the cleaning rules run.
    pub trim_whitespace: bool,
    /// Reject rows whose required fields are missing or fail cleaning.
    pub validate_data: bool,
    pub auto_update_enabled: bool,
    pub update_frequency: UpdateFrequency,
}

impl Default for ImportSettings {
    fn default() -> Self {
        ImportSettings {
            match_mode: MatchMode::Strict,
            fuzzy_threshold: 0.8,
            min_match_fields: 3,
            header_scan_rows: 10,
            skip_empty_rows: true,
            trim_whitespace: true,
            validate_data: false,
            auto_update_enabled: false,
            update_frequency: UpdateFrequency::Daily,
        }
    }
}

impl ImportSettings {
    pub fn validate(&self) -> Result<(), TallyError> {
        if self.min_match_fields == 0 {
            return Err(TallyError::InvalidSettings(
                "min_match_fields must be at least 1".into(),
            ));
        }
        if self.header_scan_rows == 0 {
            return Err(TallyError::InvalidSettings(
                "header_scan_rows must be at least 1".into(),
            ));
        }
        if !(self.fuzzy_threshold > 0.0 && self.fuzzy_threshold <= 1.0) {
            return Err(TallyError::InvalidSettings(format!(
                "fuzzy_threshold must be in (0, 1], got {}",
                self.fuzzy_threshold
            )));
        }
        Ok(())
    }

    /// Parse and validate settings from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, TallyError> {
        let settings: ImportSettings = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    /// When the next automatic re-import is due, or `None` if auto update is off.
    pub fn next_update_after(&self, last: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.auto_update_enabled {
            return None;
        }
        self.update_frequency.next_after(last)
    }
}

/// Load settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<ImportSettings, TallyError> {
    let content = std::fs::read_to_string(path)?;
    ImportSettings::from_toml_str(&content)
}
