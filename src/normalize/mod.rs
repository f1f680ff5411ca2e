//! Product Normalizer (C3, spec.md §4.3).
//!
//! Accepts a raw product document (opaque `serde_json::Value`) and produces
//! a pure `(FamilyRecord, Vec<VariantRecord>)` pair. Downstream components
//! never see the raw document again (spec.md §9: "duck-typed variant
//! payloads... restate as one explicit normalization step").

pub mod fields;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{Dimensions, Multilingual, PriceTier};

/// The normalized, strongly-typed shape of one family before it is grouped,
/// hashed, or persisted. Distinct from [`crate::models::Product`]: this is
/// the normalizer's output, not the storage row (no `sku` == family key is
/// assigned here yet — that's [`super::grouping`]'s job once all variants of
/// a family are known).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyRecord {
    pub family_key: String,
    pub supplier_sku: String,
    pub supplier_code: String,
    pub name: Multilingual,
    pub description: Multilingual,
    pub short_description: Multilingual,
    pub model_name: Multilingual,
    pub material: Multilingual,
    pub category: Option<String>,
    pub country_of_origin: Option<String>,
    pub delivery_time: Option<String>,
    pub dimensions: Dimensions,
    pub price_tiers: Vec<PriceTier>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantRecord {
    pub sku: String,
    pub color: Option<String>,
    pub hex_color: Option<String>,
    pub size: Option<String>,
    pub dimensions: Dimensions,
    pub diameter: Option<f64>,
    pub primary_image: Option<String>,
    pub gallery_images: Vec<String>,
}

/// Normalize one raw product document into its family and child variant
/// records. Pure: no I/O, no side effects.
pub fn normalize_product(raw: &Value) -> Result<(FamilyRecord, Vec<VariantRecord>)> {
    let parent_sku = fields::get_field(raw, "sku")
        .or_else(|| fields::get_field(raw, "itemNumber"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::validation("product document missing parent sku"))?
        .to_string();

    let family_key = fields::family_key(raw, &parent_sku);

    let non_lang = fields::get_field(raw, "nonLanguageDependedProductDetails").cloned().unwrap_or(Value::Null);
    let product_details = fields::get_field(raw, "productDetails").cloned().unwrap_or(Value::Null);

    let family = FamilyRecord {
        family_key,
        supplier_sku: parent_sku.clone(),
        supplier_code: fields::get_field(raw, "supplierCode")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        name: fields::extract_from_language_blocks(&product_details, "name"),
        description: fields::extract_from_language_blocks(&product_details, "description"),
        short_description: fields::extract_from_language_blocks(&product_details, "shortDescription"),
        model_name: fields::extract_from_language_blocks(&product_details, "modelName"),
        material: fields::extract_from_language_blocks(&non_lang, "material"),
        category: fields::get_field(&non_lang, "category")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        country_of_origin: fields::get_field(&non_lang, "countryOfOrigin")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        delivery_time: fields::get_field(&non_lang, "deliveryTime")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        dimensions: fields::extract_dimensions(&non_lang),
        price_tiers: fields::extract_price_tiers(raw),
    };

    let children = match fields::get_field(raw, "childProducts") {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    };

    let mut variants = Vec::with_capacity(children.len());
    for child in children {
        variants.push(normalize_variant(child)?);
    }

    Ok((family, variants))
}

fn normalize_variant(raw: &Value) -> Result<VariantRecord> {
    let sku = fields::get_field(raw, "sku")
        .or_else(|| fields::get_field(raw, "itemNumber"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::validation("variant document missing sku"))?
        .to_string();

    let non_lang = fields::get_field(raw, "nonLanguageDependedProductDetails").cloned().unwrap_or(Value::Null);
    let product_details = fields::get_field(raw, "productDetails").cloned().unwrap_or(Value::Null);

    let (color, size, hex_color) = fields::extract_color_size(raw);

    Ok(VariantRecord {
        sku,
        color,
        hex_color,
        size,
        dimensions: fields::extract_dimensions(&non_lang),
        diameter: fields::extract_diameter(&non_lang),
        primary_image: fields::extract_variant_primary_image(&product_details),
        gallery_images: fields::extract_gallery_images(raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_document() -> Value {
        json!({
            "sku": "PARENT1",
            "aNumber": "FAM42",
            "supplierCode": "SUPP01",
            "productDetails": {
                "en": {"name": "Mug", "description": "A mug", "shortDescription": "Mug", "modelName": "M1"},
                "de": {"name": "Tasse"},
            },
            "nonLanguageDependedProductDetails": {
                "category": "Drinkware",
                "countryOfOrigin": "NL",
                "deliveryTime": "5 days",
                "material": "Ceramic",
                "length": 10.0,
                "width": 8.0,
            },
            "price_1": 2.5,
            "childProducts": [
                {
                    "sku": "V1",
                    "configurationFields": [{"name": "Color", "value": "Red"}, {"name": "Size", "value": "S"}],
                    "productDetails": {"en": {"image": {"url": "https://x/v1.jpg"}}},
                },
                {
                    "sku": "V2",
                    "configurationFields": [{"name": "Color", "value": "Red"}, {"name": "Size", "value": "M"}],
                    "productDetails": {"en": {"image": {"url": "https://x/v1.jpg"}}},
                },
            ],
        })
    }

    #[test]
    fn normalizes_family_and_variants() {
        let (family, variants) = normalize_product(&sample_document()).unwrap();
        assert_eq!(family.family_key, "FAM42");
        assert_eq!(family.name.get("en"), Some(&"Mug".to_string()));
        assert_eq!(family.category.as_deref(), Some("Drinkware"));
        assert_eq!(family.price_tiers.len(), 1);
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].sku, "V1");
        assert_eq!(variants[0].color.as_deref(), Some("Red"));
        assert_eq!(variants[1].size.as_deref(), Some("M"));
    }

    #[test]
    fn missing_sku_is_validation_error() {
        let doc = json!({});
        let err = normalize_product(&doc).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn zero_variant_family_normalizes_to_empty_vec() {
        let doc = json!({"sku": "LONER"});
        let (family, variants) = normalize_product(&doc).unwrap();
        assert_eq!(family.family_key, "LONER");
        assert!(variants.is_empty());
    }
}
