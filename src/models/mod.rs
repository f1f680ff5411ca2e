//! Conceptual data model (spec.md §3). Names are snake_case per the spec's
//! convention even where Rust style would prefer otherwise for SQL columns.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A multilingual field: `lang -> value`. A `BTreeMap` rather than `HashMap`
/// so that iteration order is already sorted by language key, which is what
/// the canonical form (hashing.rs) needs without a re-sort.
pub type Multilingual = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Running => "running",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
            SyncStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Supplier {
    pub code: String,
    pub is_active: bool,
    pub auto_import: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_status: String,
    pub last_sync_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceTier {
    pub quantity: i32,
    pub price: rust_decimal::Decimal,
    pub currency: String,
    pub price_type: PriceType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    Purchase,
    Selling,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Dimensions {
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub unit: Option<String>,
}

/// Product (family) — a catalog family grouped under one family key.
/// See spec.md §3 invariants I1-I4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub sku: String,
    pub a_number: String,
    pub supplier_sku: String,
    pub supplier: String,
    pub name: Multilingual,
    pub description: Multilingual,
    pub short_description: Multilingual,
    pub model_name: Multilingual,
    pub material: Multilingual,
    pub category: Option<String>,
    pub categories: Vec<String>,
    pub main_image: Option<String>,
    pub gallery_images: Vec<String>,
    pub price_tiers: Vec<PriceTier>,
    pub dimensions: Dimensions,
    pub country_of_origin: Option<String>,
    pub delivery_time: Option<String>,
    pub promidata_hash: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub available_colors: Vec<String>,
    pub available_sizes: Vec<String>,
    pub hex_colors: Vec<String>,
    pub price_min: Option<rust_decimal::Decimal>,
    pub price_max: Option<rust_decimal::Decimal>,
    pub gemini_file_uri: Option<String>,
    pub gemini_synced_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// ProductVariant — a color/size combination within a family.
/// Variants never duplicate product-level descriptive fields (I6, §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductVariant {
    pub sku: String,
    pub product_sku: String,
    pub color: Option<String>,
    pub hex_color: Option<String>,
    pub size: Option<String>,
    pub dimensions_length: Option<f64>,
    pub dimensions_width: Option<f64>,
    pub dimensions_height: Option<f64>,
    pub dimensions_diameter: Option<f64>,
    pub dimensions_weight: Option<f64>,
    pub primary_image: Option<String>,
    pub gallery_images: Vec<String>,
    pub is_primary_for_color: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Media — an image stored in the object store. At most one row per
/// `filename` (I7).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Media {
    pub filename: String,
    pub url: String,
    pub size: Option<i64>,
    pub hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multilingual_iterates_sorted() {
        let mut m: Multilingual = Multilingual::new();
        m.insert("nl".to_string(), "x".to_string());
        m.insert("de".to_string(), "y".to_string());
        m.insert("en".to_string(), "z".to_string());
        let keys: Vec<_> = m.keys().cloned().collect();
        assert_eq!(keys, vec!["de", "en", "nl"]);
    }
}
