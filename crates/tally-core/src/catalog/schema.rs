use serde::{Deserialize, Serialize};

use crate::cleaning::CleaningRule;
use crate::model::SheetKind;

/// A field catalog document: the canonical columns of one ledger kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    pub kind: SheetKind,
    /// Ordered; position is the matcher's final tie-break.
    pub fields: Vec<FieldDef>,
}

/// A single canonical field within a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Rows missing this field are rejected when data validation is on.
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cleaning: Vec<CleaningRule>,
}
