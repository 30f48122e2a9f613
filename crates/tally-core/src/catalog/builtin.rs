use crate::catalog::schema::CatalogDef;
use crate::error::TallyError;

const CONTRACT_FIELDS_JSON: &str = include_str!("../../../../fields/contract-fields.json");
const PROCUREMENT_FIELDS_JSON: &str = include_str!("../../../../fields/procurement-fields.json");

/// Available built-in catalogs.
pub const PRESETS: &[&str] = &["contract", "procurement"];

/// Load a built-in catalog by name.
pub fn load_preset(name: &str) -> Result<CatalogDef, TallyError> {
    match name {
        "contract" => {
            let catalog: CatalogDef = serde_json::from_str(CONTRACT_FIELDS_JSON)?;
            Ok(catalog)
        }
        "procurement" => {
            let catalog: CatalogDef = serde_json::from_str(PROCUREMENT_FIELDS_JSON)?;
            Ok(catalog)
        }
        _ => Err(TallyError::CatalogInvalid(format!(
            "unknown preset '{}'. Available: {}",
            name,
            PRESETS.join(", ")
        ))),
    }
}
