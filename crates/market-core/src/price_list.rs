//! # Price-List Documents
//!
//! Parsing and validation of the supplier price-list document.
//!
//! ## Document Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  shop: Связной                                                          │
//! │  categories:                                                            │
//! │    - { id: 224, name: Смартфоны }                                       │
//! │  goods:                                                                 │
//! │    - id: 4216292              ◄── external id, unique per document      │
//! │      category: 224            ◄── must be declared in `categories`      │
//! │      model: apple/iphone/xs-max                                         │
//! │      name: Смартфон Apple iPhone XS Max 512GB (золотистый)              │
//! │      price: 110000            ◄── 0 ..= MAX_PRICE                       │
//! │      price_rrc: 116990        ◄── 0 ..= MAX_PRICE                       │
//! │      quantity: 14             ◄── ≥ 0                                   │
//! │      parameters: { "Цвет": золотистый }  ◄── names unique as text       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every key shown is required; `parameters` may be an empty mapping.
//! JSON documents are accepted too, the YAML parser reads them unchanged.
//! A document is fully validated before the ingestor touches the database.

use std::collections::HashSet;

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::ValidationError;
use crate::money::Money;
use crate::MAX_PRICE;

/// A category declared by the document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PriceListCategory {
    pub id: i64,
    pub name: String,
}

/// One goods entry of the document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceListItem {
    /// Supplier's external id of the listing.
    pub id: i64,
    pub category: i64,
    pub model: String,
    pub name: String,
    pub price: Money,
    pub price_rrc: Money,
    pub quantity: i64,
    #[serde(deserialize_with = "parameters_as_text")]
    pub parameters: Vec<(String, String)>,
}

/// A parsed and validated supplier price list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceList {
    pub shop: String,
    pub categories: Vec<PriceListCategory>,
    pub goods: Vec<PriceListItem>,
}

impl PriceList {
    /// Parses a YAML (or JSON) document and validates it.
    pub fn parse(bytes: &[u8]) -> Result<Self, ValidationError> {
        let list: PriceList = serde_yaml::from_slice(bytes)
            .map_err(|e| ValidationError::invalid("document", e.to_string()))?;
        list.validate()?;
        Ok(list)
    }

    /// Checks the rules that serde cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.shop.trim().is_empty() {
            return Err(ValidationError::required("shop"));
        }

        let mut declared = HashSet::with_capacity(self.categories.len());
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(ValidationError::required("categories.name"));
            }
            declared.insert(category.id);
        }

        let mut seen = HashSet::with_capacity(self.goods.len());
        for item in &self.goods {
            if !seen.insert(item.id) {
                return Err(ValidationError::Duplicate {
                    field: "goods.id".to_string(),
                    value: item.id.to_string(),
                });
            }
            if !declared.contains(&item.category) {
                return Err(ValidationError::invalid(
                    "goods.category",
                    format!("category {} is not declared", item.category),
                ));
            }
            if item.name.trim().is_empty() {
                return Err(ValidationError::required("goods.name"));
            }
            if item.price.is_negative() || item.price_rrc.is_negative() {
                return Err(ValidationError::invalid("goods.price", "must not be negative"));
            }
            if item.price > MAX_PRICE || item.price_rrc > MAX_PRICE {
                return Err(ValidationError::invalid(
                    "goods.price",
                    format!("must not exceed {MAX_PRICE}"),
                ));
            }
            if item.quantity < 0 {
                return Err(ValidationError::invalid(
                    "goods.quantity",
                    "must not be negative",
                ));
            }

            let mut names = HashSet::with_capacity(item.parameters.len());
            for (name, _) in &item.parameters {
                if !names.insert(name.as_str()) {
                    return Err(ValidationError::Duplicate {
                        field: "goods.parameters".to_string(),
                        value: name.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Total number of parameter rows the document produces.
    pub fn parameter_count(&self) -> usize {
        self.goods.iter().map(|item| item.parameters.len()).sum()
    }
}

fn parameters_as_text<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let mapping = serde_yaml::Mapping::deserialize(deserializer)?;
    Ok(mapping
        .into_iter()
        .map(|(key, value)| (scalar_text(key), scalar_text(value)))
        .collect())
}

/// Textual form of a parameter key or value (`6.5` → `"6.5"`).
fn scalar_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
