pub mod fields;
pub mod import;
pub mod inspect;

use tally_core::catalog::{self, FieldCatalog};
use tally_core::error::TallyError;
use tally_core::settings::{self, ImportSettings, MatchMode};

use crate::SettingsArgs;

/// Settings file (or defaults) with command-line overrides applied on top.
pub fn resolve_settings(args: &SettingsArgs) -> Result<ImportSettings, TallyError> {
    let mut settings = match &args.settings {
        Some(path) => settings::load_settings(path)?,
        None => ImportSettings::default(),
    };

    if args.fuzzy {
        settings.match_mode = MatchMode::Fuzzy;
    }
    if let Some(n) = args.min_match {
        settings.min_match_fields = n;
    }
    if let Some(rows) = args.header_scan_rows {
        settings.header_scan_rows = rows;
    }
    if args.validate {
        settings.validate_data = true;
    }
    if args.keep_empty_rows {
        settings.skip_empty_rows = false;
    }

    settings.validate()?;
    Ok(settings)
}

/// Built-in catalogs, with each `--fields` file replacing the catalog of its kind.
pub fn resolve_catalog(args: &SettingsArgs) -> Result<FieldCatalog, TallyError> {
    let mut fields = FieldCatalog::builtin()?;
    for path in &args.fields {
        let def = catalog::load_catalog(path)?;
        tracing::info!(
            path = %path.display(),
            kind = %def.kind,
            fields = def.fields.len(),
            "using custom field catalog"
        );
        fields = fields.with_catalog(&def);
    }
    Ok(fields)
}
