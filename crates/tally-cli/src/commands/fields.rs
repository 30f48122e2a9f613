use std::path::Path;

use tally_core::catalog::{self, builtin};
use tally_core::cleaning::CleaningRule;
use tally_core::error::TallyError;
use tally_core::matching::normalize::normalize_header;

pub fn list() -> Result<(), TallyError> {
    println!("Built-in field catalogs:\n");
    for name in builtin::PRESETS {
        let def = builtin::load_preset(name)?;
        let required = def.fields.iter().filter(|f| f.required).count();
        println!(
            "  {:<12} {} (v{}) [{} fields, {} required]",
            name,
            def.name,
            def.version,
            def.fields.len(),
            required
        );
        if let Some(ref desc) = def.description {
            println!("               {}", desc);
        }
        println!();
    }
    Ok(())
}

pub fn explain(preset: &str) -> Result<(), TallyError> {
    let def = builtin::load_preset(preset)?;

    println!("{} (version {})\n", def.name, def.version);
    if let Some(ref desc) = def.description {
        println!("{}\n", desc);
    }

    println!(
        "A worksheet is recognized as {} when its header row matches enough of",
        def.kind
    );
    println!("these fields by canonical name or alias. Headers are compared after");
    println!("folding full-width characters, case and whitespace.\n");

    let width = def
        .fields
        .iter()
        .map(|f| f.name.chars().count())
        .max()
        .unwrap_or(8)
        + 2;

    for field in &def.fields {
        let marker = if field.required { " *" } else { "" };
        println!("  {:<width$}{}", field.name, marker, width = width);
        if let Some(ref desc) = field.description {
            println!("      {}", desc);
        }
        if !field.aliases.is_empty() {
            println!("      aliases:  {}", field.aliases.join(", "));
        }
        if !field.cleaning.is_empty() {
            let rules: Vec<String> = field.cleaning.iter().map(describe_rule).collect();
            println!("      cleaning: {}", rules.join(" -> "));
        }
    }

    println!("\n  * required: rows without a value are rejected when validation is on.\n");
    Ok(())
}

fn describe_rule(rule: &CleaningRule) -> String {
    match rule {
        CleaningRule::StripSpecial { keep } if !keep.is_empty() => {
            format!("strip_special (keep \"{keep}\")")
        }
        CleaningRule::Number { scale: Some(scale) } => format!("number ({scale} decimals)"),
        CleaningRule::Date { formats } if !formats.is_empty() => {
            format!("date ({})", formats.join(" | "))
        }
        CleaningRule::Replace {
            pattern,
            replacement,
        } => format!("replace /{}/ with \"{}\"", pattern.as_str(), replacement),
        other => other.name().to_string(),
    }
}

pub fn schema() -> Result<(), TallyError> {
    print!(
        r#"JSON Field Catalog Schema
=========================

A field catalog lists the canonical columns of one ledger kind. When you
run `tally inspect` or `tally import`, each worksheet's header row is
matched against the contract and procurement catalogs, and the kind with
enough matched fields wins. Pass `--fields <file>` to replace the
built-in catalog of the same kind.

Top-level fields:
  name          (string, required)  Human-readable catalog name
  description   (string, optional)  What this catalog is for
  version       (string, required)  Version identifier (e.g., "2025.1")
  kind          (string, required)  "contract" or "procurement"
  fields        (array, required)   Ordered list of fields (see below).
                                    Order breaks ties between equally
                                    good matches.

Each entry in the "fields" array:
  name          (string, required)  Canonical field name. Extracted
                                    records are keyed by this name.
  aliases       (array, optional)   Other header texts for this field.
                                    Names and aliases must be unique
                                    within a catalog after normalization
                                    (full-width folding, lowercase,
                                    whitespace removed).
  required      (bool, optional)    Rows without this field are rejected
                                    when data validation is on.
                                    Default: false
  description   (string, optional)  Shown by `tally fields explain`.
  cleaning      (array, optional)   Rules applied in order to each value:
      {{"rule": "trim"}}
      {{"rule": "uppercase"}} / {{"rule": "lowercase"}}
      {{"rule": "strip_special", "keep": "-_"}}
                                    Drop everything except letters,
                                    digits, whitespace and "keep".
      {{"rule": "number", "scale": 2}}
                                    Parse as a decimal; accepts thousands
                                    separators, currency signs, full-width
                                    digits and "(1,000)" negatives.
      {{"rule": "date", "formats": ["%Y年%m月%d日"]}}
                                    Parse as a date; Excel serial numbers
                                    and common formats are always tried.
      {{"rule": "replace", "pattern": "\\s+", "replacement": ""}}
                                    Regex replacement on text values.

Example:
{{
  "name": "Site contracts",
  "version": "1.0",
  "kind": "contract",
  "fields": [
    {{
      "name": "合同编号",
      "aliases": ["合同号", "contract no"],
      "required": true,
      "cleaning": [{{"rule": "trim"}}, {{"rule": "uppercase"}}]
    }},
    {{
      "name": "合同金额",
      "aliases": ["金额（元）"],
      "cleaning": [{{"rule": "number", "scale": 2}}]
    }}
  ]
}}

A value that fails a cleaning rule is kept as a field error on its row;
the rest of the row is still imported unless validation is on.
"#
    );
    Ok(())
}

pub fn validate(file: &Path) -> Result<(), TallyError> {
    let def = catalog::load_catalog(file)?;

    println!(
        "Field catalog '{}' (v{}) is valid.",
        def.name, def.version
    );
    println!("  Kind: {}", def.kind);
    println!("  Fields: {}", def.fields.len());

    // Warnings, not errors
    let mut warnings = Vec::new();
    if def.fields.is_empty() {
        warnings.push("catalog has no fields; no worksheet can be recognized as this kind".to_string());
    }
    if !def.fields.is_empty() && !def.fields.iter().any(|f| f.required) {
        warnings.push("no field is marked required".to_string());
    }
    for field in &def.fields {
        for alias in &field.aliases {
            if normalize_header(alias) == normalize_header(&field.name) {
                warnings.push(format!(
                    "alias '{}' of '{}' is the same header as its name",
                    alias, field.name
                ));
            }
        }
    }

    if !warnings.is_empty() {
        println!("\nWarnings:");
        for w in &warnings {
            println!("  - {}", w);
        }
    }

    Ok(())
}
