//! Consolidated field extraction (spec.md §9: "Repeated per-field
//! extractors... Consolidate into one field extractor module keyed by field
//! descriptor; transformers compose it").
//!
//! The raw upstream document arrives as an opaque `serde_json::Value` whose
//! keys may be camelCase, PascalCase, snake_case, or UPPER_CASE depending on
//! which supplier fed it through. Every lookup in this module tries all four
//! casings before giving up.

use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;

use once_cell::sync::Lazy;

use crate::models::{Dimensions, Multilingual, PriceTier, PriceType};

static LANGUAGES: &[&str] = &["en", "de", "fr", "nl", "es"];

static A_NUMBER_BARE_SUPPLIER_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]\d+$").expect("valid regex"));

/// Look up `key` in `obj` trying camelCase, PascalCase, snake_case, and
/// UPPER_CASE variants of the supplied canonical (camelCase) spelling.
pub fn get_field<'a>(obj: &'a Value, key: &str) -> Option<&'a Value> {
    let obj = obj.as_object()?;

    let pascal = to_pascal_case(key);
    let snake = to_snake_case(key);
    let upper = snake.to_uppercase();

    obj.get(key)
        .or_else(|| obj.get(&pascal))
        .or_else(|| obj.get(&snake))
        .or_else(|| obj.get(&upper))
        .or_else(|| {
            // Last resort: case-insensitive scan, for suppliers that mangle
            // casing in ways none of the four canonical forms predict.
            obj.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v)
        })
}

fn to_pascal_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut capitalize_next = true;
    for c in key.chars() {
        if c == '_' {
            capitalize_next = true;
            continue;
        }
        if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Extract a multilingual field (spec.md §4.3): an object is copied as-is, a
/// bare string fans out to all known languages, and a missing value yields
/// an empty map (the caller treats "absent" as "no entry for any language").
pub fn extract_multilingual(obj: &Value, key: &str) -> Multilingual {
    let mut result = Multilingual::new();
    match get_field(obj, key) {
        Some(Value::Object(map)) => {
            for (lang, value) in map {
                if let Some(s) = value.as_str() {
                    result.insert(lang.to_lowercase(), s.to_string());
                } else if let Some(nested) = value.as_object() {
                    // Some suppliers nest `{ "Name": { "en": "..." } }`
                    // one level deeper under the language key itself.
                    if let Some(s) = nested.get("Value").or_else(|| nested.get("value")).and_then(|v| v.as_str()) {
                        result.insert(lang.to_lowercase(), s.to_string());
                    }
                }
            }
        }
        Some(Value::String(s)) => {
            for lang in LANGUAGES {
                result.insert(lang.to_string(), s.clone());
            }
        }
        _ => {}
    }
    result
}

/// Extract a multilingual field from a per-language block shaped like
/// `ProductDetails[lang].Field`, used for name/description/short
/// description/model/material which live under the language-dependent
/// block rather than as a standalone multilingual map.
pub fn extract_from_language_blocks(product_details: &Value, field: &str) -> Multilingual {
    let mut result = Multilingual::new();
    if let Some(map) = product_details.as_object() {
        for (lang, block) in map {
            if let Some(value) = get_field(block, field).and_then(|v| v.as_str()) {
                result.insert(lang.to_lowercase(), value.to_string());
            }
        }
    }
    result
}

/// Parse a numeric dimension. Non-numeric, zero, and negative values are
/// dropped (spec.md §4.3).
pub fn extract_positive_float(obj: &Value, key: &str) -> Option<f64> {
    let value = get_field(obj, key)?;
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if n > 0.0 {
        Some(n)
    } else {
        None
    }
}

pub fn extract_dimensions(non_language_details: &Value) -> Dimensions {
    Dimensions {
        length: extract_positive_float(non_language_details, "length"),
        width: extract_positive_float(non_language_details, "width"),
        height: extract_positive_float(non_language_details, "height"),
        weight: extract_positive_float(non_language_details, "weight"),
        unit: get_field(non_language_details, "dimensionUnit")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
    }
}

/// Extract price tiers from both the flat `price_1..price_8` fields and any
/// `PriceDetails[]` array, per spec.md §4.3. Emits one tier per non-null
/// price; currency defaults to EUR.
pub fn extract_price_tiers(raw: &Value) -> Vec<PriceTier> {
    let mut tiers = Vec::new();

    for i in 1..=8 {
        let key = format!("price_{i}");
        if let Some(price) = get_field(raw, &key).and_then(value_to_decimal) {
            tiers.push(PriceTier {
                quantity: i,
                price,
                currency: "EUR".to_string(),
                price_type: PriceType::Selling,
            });
        }
    }

    if let Some(Value::Array(items)) = get_field(raw, "priceDetails") {
        for item in items {
            let quantity = get_field(item, "quantity")
                .and_then(|v| v.as_i64())
                .unwrap_or(1) as i32;
            let Some(price) = get_field(item, "price").and_then(value_to_decimal) else {
                continue;
            };
            let currency = get_field(item, "currency")
                .and_then(|v| v.as_str())
                .unwrap_or("EUR")
                .to_string();
            let is_purchase = get_field(item, "priceType")
                .and_then(|v| v.as_str())
                .map(|s| s.eq_ignore_ascii_case("purchase"))
                .unwrap_or(false);
            tiers.push(PriceTier {
                quantity,
                price,
                currency,
                price_type: if is_purchase { PriceType::Purchase } else { PriceType::Selling },
            });
        }
    }

    tiers
}

fn value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::try_from(n.as_f64()?).ok(),
        Value::String(s) => s.trim().parse::<Decimal>().ok(),
        Value::Null => None,
        _ => None,
    }
}

/// Determine the family key: use the record's own `ANumber`/`model` field
/// when present and it does not look like a bare supplier code
/// (`^[A-Z]\d+$`); otherwise fall back to the parent SKU (spec.md §4.3,
/// the "critical rule").
pub fn family_key(raw: &Value, parent_sku: &str) -> String {
    let candidate = get_field(raw, "aNumber")
        .or_else(|| get_field(raw, "model"))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match candidate {
        Some(candidate) if !A_NUMBER_BARE_SUPPLIER_CODE.is_match(candidate) => candidate.to_string(),
        _ => parent_sku.to_string(),
    }
}

/// Extract color/size/hex-color for a variant: case-insensitive name match
/// against `ConfigurationFields`, falling back to top-level `color`/`size`/
/// `hexColor` fields. `hex_color` has no flat-field fallback in the feed
/// shape documented by spec.md §4.3 beyond `ConfigurationFields`/top-level,
/// so suppliers that never publish it simply leave the variant's swatch
/// color unset.
pub fn extract_color_size(raw: &Value) -> (Option<String>, Option<String>, Option<String>) {
    let mut color = None;
    let mut size = None;
    let mut hex_color = None;

    if let Some(Value::Array(fields)) = get_field(raw, "configurationFields") {
        for field in fields {
            let Some(name) = get_field(field, "name").and_then(|v| v.as_str()) else {
                continue;
            };
            let Some(value) = get_field(field, "value").and_then(|v| v.as_str()) else {
                continue;
            };
            if name.eq_ignore_ascii_case("color") {
                color = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("size") {
                size = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("hexcolor") || name.eq_ignore_ascii_case("colorcode") {
                hex_color = Some(normalize_hex_color(value));
            }
        }
    }

    if color.is_none() {
        color = get_field(raw, "color").and_then(|v| v.as_str()).map(str::to_string);
    }
    if size.is_none() {
        size = get_field(raw, "size").and_then(|v| v.as_str()).map(str::to_string);
    }
    if hex_color.is_none() {
        hex_color = get_field(raw, "hexColor")
            .and_then(|v| v.as_str())
            .map(normalize_hex_color);
    }

    (color, size, hex_color)
}

/// Normalize a hex color to lowercase with a leading `#`.
fn normalize_hex_color(value: &str) -> String {
    let trimmed = value.trim().trim_start_matches('#').to_lowercase();
    format!("#{trimmed}")
}

/// Parse the variant's diameter, a flat query-perf field alongside
/// length/width/height/weight (spec.md §3) but not part of the shared
/// [`Dimensions`] shape since only variants carry it.
pub fn extract_diameter(non_language_details: &Value) -> Option<f64> {
    extract_positive_float(non_language_details, "diameter")
}

/// Variant primary image: `ProductDetails[lang].Image.Url`, first language
/// block that has one.
pub fn extract_variant_primary_image(product_details: &Value) -> Option<String> {
    let map = product_details.as_object()?;
    for (_lang, block) in map {
        if let Some(image) = get_field(block, "image") {
            if let Some(url) = get_field(image, "url").and_then(|v| v.as_str()) {
                return Some(url.to_string());
            }
        }
    }
    None
}

/// Variant gallery images: `MediaGalleryImages[].Url`.
pub fn extract_gallery_images(raw: &Value) -> Vec<String> {
    match get_field(raw, "mediaGalleryImages") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| get_field(item, "url").and_then(|v| v.as_str()))
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_field_tries_all_casings() {
        let camel = json!({"countryOfOrigin": "NL"});
        let pascal = json!({"CountryOfOrigin": "NL"});
        let snake = json!({"country_of_origin": "NL"});
        let upper = json!({"COUNTRY_OF_ORIGIN": "NL"});

        for obj in [&camel, &pascal, &snake, &upper] {
            assert_eq!(get_field(obj, "countryOfOrigin").and_then(|v| v.as_str()), Some("NL"));
        }
    }

    #[test]
    fn multilingual_object_copied_as_is() {
        let obj = json!({"name": {"en": "Mug", "de": "Tasse"}});
        let m = extract_multilingual(&obj, "name");
        assert_eq!(m.get("en"), Some(&"Mug".to_string()));
        assert_eq!(m.get("de"), Some(&"Tasse".to_string()));
    }

    #[test]
    fn multilingual_bare_string_fans_out() {
        let obj = json!({"name": "Mug"});
        let m = extract_multilingual(&obj, "name");
        assert_eq!(m.len(), 5);
        assert_eq!(m.get("es"), Some(&"Mug".to_string()));
    }

    #[test]
    fn multilingual_missing_is_empty() {
        let obj = json!({});
        assert!(extract_multilingual(&obj, "name").is_empty());
    }

    #[test]
    fn dimensions_drop_zero_and_negative() {
        let obj = json!({"length": 10.0, "width": 0.0, "height": -5.0, "weight": "2.5"});
        let dims = extract_dimensions(&obj);
        assert_eq!(dims.length, Some(10.0));
        assert_eq!(dims.width, None);
        assert_eq!(dims.height, None);
        assert_eq!(dims.weight, Some(2.5));
    }

    #[test]
    fn family_key_prefers_a_number_when_not_bare_supplier_code() {
        let raw = json!({"aNumber": "ABC123"});
        assert_eq!(family_key(&raw, "PARENT1"), "ABC123");
    }

    #[test]
    fn family_key_falls_back_when_a_number_is_bare_supplier_code() {
        let raw = json!({"aNumber": "A123"});
        assert_eq!(family_key(&raw, "PARENT1"), "PARENT1");
    }

    #[test]
    fn family_key_falls_back_when_a_number_missing() {
        let raw = json!({});
        assert_eq!(family_key(&raw, "PARENT1"), "PARENT1");
    }

    #[test]
    fn color_size_from_configuration_fields_case_insensitive() {
        let raw = json!({"configurationFields": [
            {"name": "COLOR", "value": "Red"},
            {"name": "Size", "value": "M"},
            {"name": "HexColor", "value": "FF0000"},
        ]});
        let (color, size, hex_color) = extract_color_size(&raw);
        assert_eq!(color, Some("Red".to_string()));
        assert_eq!(size, Some("M".to_string()));
        assert_eq!(hex_color, Some("#ff0000".to_string()));
    }

    #[test]
    fn color_size_falls_back_to_top_level() {
        let raw = json!({"color": "Blue", "size": "L", "hexColor": "#00F"});
        let (color, size, hex_color) = extract_color_size(&raw);
        assert_eq!(color, Some("Blue".to_string()));
        assert_eq!(size, Some("L".to_string()));
        assert_eq!(hex_color, Some("#00f".to_string()));
    }

    #[test]
    fn diameter_extracted_from_non_language_details() {
        let obj = json!({"diameter": 7.5});
        assert_eq!(extract_diameter(&obj), Some(7.5));
    }

    #[test]
    fn price_tiers_from_flat_fields() {
        let raw = json!({"price_1": 9.99, "price_2": 8.50});
        let tiers = extract_price_tiers(&raw);
        assert_eq!(tiers.len(), 2);
        assert_eq!(tiers[0].quantity, 1);
        assert_eq!(tiers[0].currency, "EUR");
    }

    #[test]
    fn price_tiers_from_price_details_array() {
        let raw = json!({"priceDetails": [
            {"quantity": 100, "price": 3.5, "currency": "USD", "priceType": "purchase"},
        ]});
        let tiers = extract_price_tiers(&raw);
        assert_eq!(tiers.len(), 1);
        assert_eq!(tiers[0].quantity, 100);
        assert_eq!(tiers[0].currency, "USD");
        assert_eq!(tiers[0].price_type, PriceType::Purchase);
    }
}
