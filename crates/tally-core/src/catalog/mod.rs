//! Canonical field catalogs for contract and procurement ledgers.

pub mod builtin;
pub mod schema;

use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::cleaning::CleaningRule;
use crate::error::TallyError;
use crate::matching::normalize::normalize_header;
use crate::model::SheetKind;
use schema::{CatalogDef, FieldDef};

/// A canonical field as the matcher and extractor see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDefinition {
    pub canonical_name: String,
    pub kind: SheetKind,
    /// Accepted alternate header texts, in catalog order without duplicates.
    pub aliases: Vec<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub cleaning_rules: Vec<CleaningRule>,
}

impl FieldDefinition {
    pub fn new(canonical_name: impl Into<String>, kind: SheetKind) -> Self {
        FieldDefinition {
            canonical_name: canonical_name.into(),
            kind,
            aliases: Vec::new(),
            required: false,
            description: None,
            cleaning_rules: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        if !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn rule(mut self, rule: CleaningRule) -> Self {
        self.cleaning_rules.push(rule);
        self
    }

    fn from_def(def: &FieldDef, kind: SheetKind) -> Self {
        let mut field = FieldDefinition::new(def.name.clone(), kind);
        for alias in &def.aliases {
            field = field.alias(alias.clone());
        }
        field.required = def.required;
        field.description = def.description.clone();
        field.cleaning_rules = def.cleaning.clone();
        field
    }
}

/// Source of field definitions, consulted once per import run.
pub trait FieldProvider: Send + Sync {
    /// Ordered field definitions for one kind. An empty list is valid.
    fn fields(&self, kind: SheetKind) -> Vec<FieldDefinition>;
}

/// An immutable set of field definitions for both kinds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldCatalog {
    contract: Vec<FieldDefinition>,
    procurement: Vec<FieldDefinition>,
}

impl FieldCatalog {
    /// The catalogs compiled into the binary.
    pub fn builtin() -> Result<Self, TallyError> {
        let defs = builtin::PRESETS
            .iter()
            .map(|name| builtin::load_preset(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FieldCatalog::from_defs(&defs))
    }

    /// Build from catalog documents. A later document of the same kind replaces an earlier one.
    pub fn from_defs(defs: &[CatalogDef]) -> Self {
        defs.iter()
            .fold(FieldCatalog::default(), |catalog, def| catalog.with_catalog(def))
    }

    /// Replace the fields of `def.kind` with those of `def`.
    pub fn with_catalog(mut self, def: &CatalogDef) -> Self {
        let fields = def
            .fields
            .iter()
            .map(|f| FieldDefinition::from_def(f, def.kind))
            .collect();
        *self.slot_mut(def.kind) = fields;
        self
    }

    pub fn with_fields(mut self, kind: SheetKind, fields: Vec<FieldDefinition>) -> Self {
        *self.slot_mut(kind) = fields;
        self
    }

    /// Freeze a provider's current view of both kinds.
    pub fn snapshot(provider: &dyn FieldProvider) -> Self {
        FieldCatalog {
            contract: provider.fields(SheetKind::Contract),
            procurement: provider.fields(SheetKind::Procurement),
        }
    }

    pub fn lookup(&self, kind: SheetKind) -> &[FieldDefinition] {
        match kind {
            SheetKind::Contract => &self.contract,
            SheetKind::Procurement => &self.procurement,
        }
    }

    pub fn field(&self, kind: SheetKind, canonical_name: &str) -> Option<&FieldDefinition> {
        self.lookup(kind)
            .iter()
            .find(|f| f.canonical_name == canonical_name)
    }

    fn slot_mut(&mut self, kind: SheetKind) -> &mut Vec<FieldDefinition> {
        match kind {
            SheetKind::Contract => &mut self.contract,
            SheetKind::Procurement => &mut self.procurement,
        }
    }
}

impl FieldProvider for FieldCatalog {
    fn fields(&self, kind: SheetKind) -> Vec<FieldDefinition> {
        self.lookup(kind).to_vec()
    }
}

/// Load a field catalog from a JSON file.
pub fn load_catalog(path: &Path) -> Result<CatalogDef, TallyError> {
    let content = std::fs::read_to_string(path).map_err(|e| TallyError::CatalogLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_catalog(&content, path)
}

/// Parse a field catalog from a JSON string.
pub fn parse_catalog(json: &str, source: &Path) -> Result<CatalogDef, TallyError> {
    let catalog: CatalogDef = serde_json::from_str(json).map_err(|e| TallyError::CatalogLoad {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;
    validate_catalog(&catalog)?;
    Ok(catalog)
}

/// Parse a field catalog from a JSON string (no file path context).
pub fn parse_catalog_str(json: &str) -> Result<CatalogDef, TallyError> {
    let catalog: CatalogDef = serde_json::from_str(json).map_err(TallyError::Json)?;
    validate_catalog(&catalog)?;
    Ok(catalog)
}

/// Validate that a catalog is well-formed.
///
/// Names are compared after header normalization, so "合同金额（元）" and
/// "合同金额(元)" count as the same text.
pub fn validate_catalog(catalog: &CatalogDef) -> Result<(), TallyError> {
    if catalog.name.trim().is_empty() {
        return Err(TallyError::CatalogInvalid(
            "catalog name must not be empty".into(),
        ));
    }

    // normalized text -> canonical field that owns it
    let mut owners: HashMap<String, &str> = HashMap::new();

    for field in &catalog.fields {
        let key = normalize_header(&field.name);
        if key.is_empty() {
            return Err(TallyError::CatalogInvalid(
                "field name must not be empty".into(),
            ));
        }
        if let Some(owner) = owners.get(&key) {
            let reason = if *owner == field.name {
                format!("duplicate field '{}'", field.name)
            } else {
                format!("field '{}' collides with '{}'", field.name, owner)
            };
            return Err(TallyError::CatalogInvalid(reason));
        }
        owners.insert(key.clone(), &field.name);

        for alias in &field.aliases {
            let alias_key = normalize_header(alias);
            if alias_key.is_empty() {
                return Err(TallyError::CatalogInvalid(format!(
                    "field '{}' has an empty alias",
                    field.name
                )));
            }
            if alias_key == key {
                continue;
            }
            if let Some(owner) = owners.get(&alias_key) {
                if *owner != field.name {
                    return Err(TallyError::CatalogInvalid(format!(
                        "alias '{}' of field '{}' is already used by '{}'",
                        alias, field.name, owner
                    )));
                }
                continue;
            }
            owners.insert(alias_key, &field.name);
        }
    }

    Ok(())
}
