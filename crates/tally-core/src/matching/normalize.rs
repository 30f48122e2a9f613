/// Normalize a header cell (or a catalog name) to its comparison key.
///
/// Steps:
/// 1. Fold full-width ASCII and the ideographic space to half-width
/// 2. Trim
/// 3. Strip a leading required-field marker ("*合同编号") and a trailing colon
/// 4. Lowercase
/// 5. Remove all remaining whitespace ("合同 编号" == "合同编号")
pub fn normalize_header(raw: &str) -> String {
    let folded = fold_width(raw);
    let mut s = folded.trim();

    s = s.trim_start_matches('*').trim_start();
    s = s.trim_end_matches(':').trim_end();

    s.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Fold full-width forms (U+FF01..U+FF5E) and U+3000 to their ASCII counterparts.
pub fn fold_width(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '\u{3000}' => ' ',
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect()
}
