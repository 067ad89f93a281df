/// Data structures for tracker stock and the product catalog
use crate::error::{ExtensionError, Result};
use crate::protocol::SCHEMA_VERSION;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One stock record from the tracker app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockEntry {
    #[serde(default)]
    pub id: String,
    pub product_slug: String,
    pub variant_sku: String,
    pub quantity: u32,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub added_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub custom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_color_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_display_name: Option<String>,
    /// Fields this extension doesn't read, kept so the stored snapshot matches the tracker's
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StockEntry {
    pub fn new(product_slug: &str, variant_sku: &str, quantity: u32, brand: &str) -> StockEntry {
        StockEntry {
            id: format!("{}::{}", product_slug, variant_sku),
            product_slug: product_slug.to_string(),
            variant_sku: variant_sku.to_string(),
            quantity,
            brand: brand.to_string(),
            added_at: String::new(),
            updated_at: String::new(),
            custom: false,
            custom_subtype: None,
            custom_color_tag: None,
            custom_display_name: None,
            extra: Map::new(),
        }
    }
}

/// Versioned stock snapshot as the tracker app persists it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockData {
    pub version: i64,
    pub entries: Vec<StockEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StockData {
    pub fn new(entries: Vec<StockEntry>) -> Self {
        StockData {
            version: SCHEMA_VERSION,
            entries,
            extra: Map::new(),
        }
    }

    pub fn check_version(&self) -> Result<()> {
        if self.version == SCHEMA_VERSION {
            Ok(())
        } else {
            Err(ExtensionError::SchemaMismatch {
                found: Some(self.version),
                expected: SCHEMA_VERSION,
            })
        }
    }
}

/// Parse and validate the raw localStorage value.
///
/// The shape is checked on the untyped JSON first so that a wrong version is
/// reported as a schema mismatch rather than as a field-level decode error.
pub fn parse_stock_data(raw: &str) -> Result<StockData> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| ExtensionError::MalformedSnapshot(e.to_string()))?;

    let version = value.get("version").and_then(serde_json::Value::as_i64);
    let entries_ok = value
        .get("entries")
        .is_some_and(serde_json::Value::is_array);

    if version != Some(SCHEMA_VERSION) || !entries_ok {
        return Err(ExtensionError::SchemaMismatch {
            found: version,
            expected: SCHEMA_VERSION,
        });
    }

    serde_json::from_value(value).map_err(|e| ExtensionError::MalformedSnapshot(e.to_string()))
}

/// A product in the static catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    pub slug: String,
    #[serde(default)]
    pub name: String,
    pub variants: Vec<CatalogVariant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogVariant {
    pub sku: String,
    #[serde(default)]
    pub color_name: String,
    #[serde(default)]
    pub color_code: Option<String>,
}

pub fn parse_catalog(json: &str) -> Result<Vec<CatalogProduct>> {
    serde_json::from_str(json).map_err(|e| ExtensionError::Catalog(e.to_string()))
}
