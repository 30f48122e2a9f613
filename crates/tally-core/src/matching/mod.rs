//! Header matching: map a raw header row onto canonical fields.
//!
//! Every header cell and catalog name is first reduced to a comparison key
//! with [`normalize::normalize_header`]. A column is then scored against each
//! still-unclaimed field:
//!
//! 1. Exact key equality (canonical name or alias) scores 1.0 and always beats
//!    a fuzzy candidate.
//! 2. Otherwise the configured [`MatchStrategy`] may accept a similar key with
//!    a score below 1.0.
//!
//! Columns are scanned left to right and each field can be claimed once.

pub mod normalize;

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::catalog::FieldDefinition;
use crate::settings::{ImportSettings, MatchMode};
use normalize::normalize_header;

/// Upper bound on the confidence of a non-exact match.
pub const MAX_FUZZY_CONFIDENCE: f64 = 0.99;

/// Pluggable similarity for non-exact matches.
pub trait MatchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Score two distinct normalized keys. `None` rejects the pair.
    fn similarity(&self, header: &str, candidate: &str) -> Option<f64>;
}

/// Exact and alias matches only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactStrategy;

impl MatchStrategy for ExactStrategy {
    fn name(&self) -> &'static str {
        "strict"
    }

    fn similarity(&self, _header: &str, _candidate: &str) -> Option<f64> {
        None
    }
}

/// Edit-distance and containment similarity above a threshold.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyStrategy {
    pub threshold: f64,
}

impl FuzzyStrategy {
    pub fn new(threshold: f64) -> Self {
        FuzzyStrategy { threshold }
    }

    /// Raw score in [0, 1] before the threshold and confidence cap are applied.
    pub fn score(header: &str, candidate: &str) -> f64 {
        let levenshtein = strsim::normalized_levenshtein(header, candidate);

        let (h_len, c_len) = (header.chars().count(), candidate.chars().count());
        let (short, long, short_len, long_len) = if h_len <= c_len {
            (header, candidate, h_len, c_len)
        } else {
            (candidate, header, c_len, h_len)
        };
        let containment = if short_len >= 2 && long.contains(short) {
            0.5 + 0.5 * short_len as f64 / long_len as f64
        } else {
            0.0
        };

        levenshtein.max(containment)
    }
}

impl MatchStrategy for FuzzyStrategy {
    fn name(&self) -> &'static str {
        "fuzzy"
    }

    fn similarity(&self, header: &str, candidate: &str) -> Option<f64> {
        let score = FuzzyStrategy::score(header, candidate).min(MAX_FUZZY_CONFIDENCE);
        (score >= self.threshold).then_some(score)
    }
}

/// One column claimed by one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMatch {
    /// Canonical name of the claiming field.
    pub field: String,
    /// Position of the field in the candidate list.
    pub field_index: usize,
    /// Header text as it appeared in the sheet.
    pub header: String,
    pub confidence: f64,
    pub exact: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeaderMatchResult {
    pub columns: BTreeMap<usize, ColumnMatch>,
    pub unmatched_columns: BTreeSet<usize>,
    pub matched_count: usize,
}

impl HeaderMatchResult {
    /// Canonical names of the matched fields, in column order.
    pub fn matched_fields(&self) -> Vec<String> {
        self.columns.values().map(|m| m.field.clone()).collect()
    }

    pub fn confidence(&self, column: usize) -> Option<f64> {
        self.columns.get(&column).map(|m| m.confidence)
    }

    pub fn column_of(&self, field: &str) -> Option<usize> {
        self.columns
            .iter()
            .find(|(_, m)| m.field == field)
            .map(|(col, _)| *col)
    }
}

/// Comparison keys of one field, computed once per match call.
struct FieldKeys {
    canonical: String,
    aliases: Vec<String>,
    canonical_len: usize,
}

impl FieldKeys {
    fn new(field: &FieldDefinition) -> Self {
        FieldKeys {
            canonical: normalize_header(&field.canonical_name),
            aliases: field.aliases.iter().map(|a| normalize_header(a)).collect(),
            canonical_len: field.canonical_name.chars().count(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    field_index: usize,
    confidence: f64,
    exact: bool,
    via_canonical: bool,
    canonical_len: usize,
}

impl Candidate {
    /// Higher confidence, then a canonical-name hit, then the longer
    /// canonical name, then the earlier catalog position.
    fn beats(&self, other: &Candidate) -> bool {
        let order = self
            .confidence
            .partial_cmp(&other.confidence)
            .unwrap_or(Ordering::Equal)
            .then(self.via_canonical.cmp(&other.via_canonical))
            .then(self.canonical_len.cmp(&other.canonical_len))
            .then(other.field_index.cmp(&self.field_index));
        order == Ordering::Greater
    }
}

fn consider(best: &mut Option<Candidate>, cand: Candidate) {
    if best.map_or(true, |b| cand.beats(&b)) {
        *best = Some(cand);
    }
}

/// Maps header rows onto candidate fields with a fixed strategy.
#[derive(Clone)]
pub struct HeaderMatcher {
    strategy: Arc<dyn MatchStrategy>,
}

impl fmt::Debug for HeaderMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderMatcher")
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

impl Default for HeaderMatcher {
    fn default() -> Self {
        HeaderMatcher::strict()
    }
}

impl HeaderMatcher {
    pub fn new(strategy: Arc<dyn MatchStrategy>) -> Self {
        HeaderMatcher { strategy }
    }

    pub fn strict() -> Self {
        HeaderMatcher::new(Arc::new(ExactStrategy))
    }

    pub fn fuzzy(threshold: f64) -> Self {
        HeaderMatcher::new(Arc::new(FuzzyStrategy::new(threshold)))
    }

    pub fn from_settings(settings: &ImportSettings) -> Self {
        match settings.match_mode {
            MatchMode::Strict => HeaderMatcher::strict(),
            MatchMode::Fuzzy => HeaderMatcher::fuzzy(settings.fuzzy_threshold),
        }
    }

    /// Match one header row against `fields`. Never fails; the worst case is no matches.
    pub fn match_header<S: AsRef<str>>(
        &self,
        header: &[S],
        fields: &[FieldDefinition],
    ) -> HeaderMatchResult {
        let keys: Vec<FieldKeys> = fields.iter().map(FieldKeys::new).collect();
        let mut claimed = vec![false; fields.len()];
        let mut result = HeaderMatchResult::default();

        for (col, cell) in header.iter().enumerate() {
            let raw = cell.as_ref();
            let key = normalize_header(raw);
            if key.is_empty() {
                result.unmatched_columns.insert(col);
                continue;
            }

            match self.best_candidate(&key, &keys, &claimed) {
                Some(best) => {
                    claimed[best.field_index] = true;
                    result.columns.insert(
                        col,
                        ColumnMatch {
                            field: fields[best.field_index].canonical_name.clone(),
                            field_index: best.field_index,
                            header: raw.trim().to_string(),
                            confidence: best.confidence,
                            exact: best.exact,
                        },
                    );
                }
                None => {
                    result.unmatched_columns.insert(col);
                }
            }
        }

        result.matched_count = result.columns.len();
        result
    }

    fn best_candidate(&self, key: &str, keys: &[FieldKeys], claimed: &[bool]) -> Option<Candidate> {
        let open = || {
            keys.iter()
                .enumerate()
                .filter(|(i, _)| !claimed[*i])
        };

        let mut best: Option<Candidate> = None;

        for (i, fk) in open() {
            let via_canonical = fk.canonical == key;
            if via_canonical || fk.aliases.iter().any(|a| a == key) {
                consider(&mut best, Candidate {
                    field_index: i,
                    confidence: 1.0,
                    exact: true,
                    via_canonical,
                    canonical_len: fk.canonical_len,
                });
            }
        }
        if best.is_some() {
            return best;
        }

        for (i, fk) in open() {
            let canonical_score = self.strategy.similarity(key, &fk.canonical);
            let alias_score = fk
                .aliases
                .iter()
                .filter_map(|a| self.strategy.similarity(key, a))
                .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))));

            let (confidence, via_canonical) = match (canonical_score, alias_score) {
                (Some(c), Some(a)) if a > c => (a, false),
                (Some(c), _) => (c, true),
                (None, Some(a)) => (a, false),
                (None, None) => continue,
            };
            consider(&mut best, Candidate {
                field_index: i,
                confidence,
                exact: false,
                via_canonical,
                canonical_len: fk.canonical_len,
            });
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SheetKind;

    fn contract_fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::new("合同编号", SheetKind::Contract).alias("合同号"),
            FieldDefinition::new("合同名称", SheetKind::Contract),
            FieldDefinition::new("甲方", SheetKind::Contract).alias("甲方单位"),
            FieldDefinition::new("乙方", SheetKind::Contract),
            FieldDefinition::new("合同金额", SheetKind::Contract).alias("合同金额(元)"),
        ]
    }

    #[test]
    fn test_exact_matches() {
        let header = ["合同编号", "合同名称", "甲方", "乙方", "合同金额"];
        let result = HeaderMatcher::strict().match_header(&header, &contract_fields());
        assert_eq!(result.matched_count, 5);
        assert!(result.unmatched_columns.is_empty());
        assert_eq!(result.confidence(4), Some(1.0));
        assert_eq!(
            result.matched_fields(),
            vec!["合同编号", "合同名称", "甲方", "乙方", "合同金额"]
        );
    }

    #[test]
    fn test_alias_and_normalization() {
        let header = [" 合同号 ", "备注", "合同金额（元）", "*甲方单位："];
        let result = HeaderMatcher::strict().match_header(&header, &contract_fields());
        assert_eq!(result.matched_count, 3);
        assert_eq!(result.columns[&0].field, "合同编号");
        assert_eq!(result.columns[&2].field, "合同金额");
        assert_eq!(result.columns[&3].field, "甲方");
        assert_eq!(result.unmatched_columns, BTreeSet::from([1]));
    }

    #[test]
    fn test_field_claimed_once() {
        let header = ["合同编号", "合同号"];
        let result = HeaderMatcher::strict().match_header(&header, &contract_fields());
        assert_eq!(result.matched_count, 1);
        assert_eq!(result.column_of("合同编号"), Some(0));
        assert!(result.unmatched_columns.contains(&1));
    }

    #[test]
    fn test_blank_header_cells_unmatched() {
        let header = ["", "  ", "甲方"];
        let result = HeaderMatcher::strict().match_header(&header, &contract_fields());
        assert_eq!(result.matched_count, 1);
        assert_eq!(result.unmatched_columns, BTreeSet::from([0, 1]));
    }

    #[test]
    fn test_tie_break_prefers_canonical_then_earlier() {
        let fields = vec![
            FieldDefinition::new("单位", SheetKind::Contract).alias("签约方"),
            FieldDefinition::new("签约方", SheetKind::Contract),
            FieldDefinition::new("对方", SheetKind::Contract).alias("签约方"),
        ];
        let result = HeaderMatcher::strict().match_header(&["签约方"], &fields);
        assert_eq!(result.columns[&0].field, "签约方");

        let fields = vec![
            FieldDefinition::new("甲", SheetKind::Contract).alias("委托人"),
            FieldDefinition::new("乙", SheetKind::Contract).alias("委托人"),
        ];
        let result = HeaderMatcher::strict().match_header(&["委托人"], &fields);
        assert_eq!(result.columns[&0].field, "甲");
    }

    #[test]
    fn test_tie_break_prefers_longer_canonical() {
        let fields = vec![
            FieldDefinition::new("金额", SheetKind::Contract).alias("价款"),
            FieldDefinition::new("合同金额", SheetKind::Contract).alias("价款"),
        ];
        let result = HeaderMatcher::strict().match_header(&["价款"], &fields);
        assert_eq!(result.columns[&0].field, "合同金额");
    }

    #[test]
    fn test_strict_rejects_near_miss() {
        let result = HeaderMatcher::strict().match_header(&["合同编号码"], &contract_fields());
        assert_eq!(result.matched_count, 0);
    }

    #[test]
    fn test_fuzzy_accepts_near_miss_with_lower_confidence() {
        let result = HeaderMatcher::fuzzy(0.8).match_header(&["合同编号码"], &contract_fields());
        assert_eq!(result.matched_count, 1);
        let m = &result.columns[&0];
        assert_eq!(m.field, "合同编号");
        assert!(!m.exact);
        assert!(m.confidence < 1.0 && m.confidence >= 0.8);
    }

    #[test]
    fn test_fuzzy_exact_still_wins() {
        let result = HeaderMatcher::fuzzy(0.5).match_header(&["合同名称"], &contract_fields());
        assert_eq!(result.columns[&0].field, "合同名称");
        assert_eq!(result.confidence(0), Some(1.0));
    }

    #[test]
    fn test_fuzzy_ignores_generic_terms() {
        let header = ["编号", "名称", "金额", "日期", "备注"];
        let result = HeaderMatcher::fuzzy(0.8).match_header(&header, &contract_fields());
        assert_eq!(result.matched_count, 0);
    }

    #[test]
    fn test_fuzzy_score_containment() {
        let score = FuzzyStrategy::score("合同金额", "合同金额合计");
        assert!((score - (0.5 + 0.5 * 4.0 / 6.0)).abs() < 1e-9);
    }

    #[test]
    fn test_match_is_idempotent() {
        let header = ["合同号", "甲方", "乙方", "其他"];
        let matcher = HeaderMatcher::fuzzy(0.8);
        let first = matcher.match_header(&header, &contract_fields());
        let second = matcher.match_header(&header, &contract_fields());
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_catalog_matches_nothing() {
        let result = HeaderMatcher::strict().match_header(&["合同编号"], &[]);
        assert_eq!(result.matched_count, 0);
        assert_eq!(result.unmatched_columns.len(), 1);
    }
}
