use std::path::Path;
use std::sync::Arc;

use tally_core::error::TallyError;
use tally_core::workbook::CalamineReader;

use crate::output;
use crate::SettingsArgs;

pub fn run(input_file: &Path, output_format: &str, args: &SettingsArgs) -> Result<(), TallyError> {
    let settings = super::resolve_settings(args)?;
    let fields = Arc::new(super::resolve_catalog(args)?);

    let classifications =
        tally_core::inspect_workbook(input_file, &CalamineReader, fields, &settings)?;

    match output_format {
        "json" => output::json::print(&classifications)?,
        _ => output::table::print_classifications(input_file, &classifications),
    }

    Ok(())
}
