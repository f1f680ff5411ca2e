//! Reconciler atomicity and hash-diff behavior against a live Postgres
//! instance (properties P1, P2, P3, P6).

mod common;

use promidata_sync::hashing::hash_family;
use promidata_sync::models::{Dimensions, Multilingual, PriceTier};
use promidata_sync::normalize::{FamilyRecord, VariantRecord};
use promidata_sync::reconciler;

fn sample_family(key: &str, supplier: &str, description: &str) -> (FamilyRecord, Vec<VariantRecord>) {
    let mut name = Multilingual::new();
    name.insert("en".to_string(), "Travel Mug".to_string());

    let mut desc = Multilingual::new();
    desc.insert("en".to_string(), description.to_string());

    let family = FamilyRecord {
        family_key: key.to_string(),
        supplier_sku: key.to_string(),
        supplier_code: supplier.to_string(),
        name,
        description: desc,
        short_description: Multilingual::new(),
        model_name: Multilingual::new(),
        material: Multilingual::new(),
        category: Some("Drinkware".to_string()),
        country_of_origin: Some("NL".to_string()),
        delivery_time: Some("3 days".to_string()),
        dimensions: Dimensions::default(),
        price_tiers: vec![PriceTier {
            quantity: 1,
            price: rust_decimal::Decimal::new(999, 2),
            currency: "EUR".to_string(),
            price_type: promidata_sync::models::PriceType::Selling,
        }],
    };

    let variants = vec![
        VariantRecord {
            sku: format!("{key}-RED"),
            color: Some("Red".to_string()),
            hex_color: Some("#ff0000".to_string()),
            size: Some("S".to_string()),
            dimensions: Dimensions::default(),
            diameter: None,
            primary_image: None,
            gallery_images: vec![],
        },
        VariantRecord {
            sku: format!("{key}-RED-L"),
            color: Some("Red".to_string()),
            hex_color: Some("#ff0000".to_string()),
            size: Some("L".to_string()),
            dimensions: Dimensions::default(),
            diameter: None,
            primary_image: None,
            gallery_images: vec![],
        },
        VariantRecord {
            sku: format!("{key}-BLUE"),
            color: Some("Blue".to_string()),
            hex_color: Some("#0000ff".to_string()),
            size: Some("S".to_string()),
            dimensions: Dimensions::default(),
            diameter: None,
            primary_image: None,
            gallery_images: vec![],
        },
    ];

    (family, variants)
}

#[tokio::test]
#[ignore]
async fn upsert_family_persists_hash_equal_to_canonical_hash() {
    let pool = common::test_pool().await;
    let supplier = common::unique("supp");
    let key = common::unique("fam");
    promidata_sync::db::suppliers::bootstrap(&pool, &[&supplier]).await.unwrap();

    let (family, variants) = sample_family(&key, &supplier, "A sturdy travel mug");
    let hash = hash_family(&family);
    let pending = reconciler::PendingFamily { family, variants, hash: hash.clone() };

    reconciler::upsert_family(&pool, &pending).await.unwrap();

    let stored = promidata_sync::db::products::get_by_sku(&pool, &key).await.unwrap().unwrap();
    assert_eq!(stored.promidata_hash.as_deref(), Some(hash.as_str()));
}

#[tokio::test]
#[ignore]
async fn exactly_one_variant_is_primary_per_color() {
    let pool = common::test_pool().await;
    let supplier = common::unique("supp");
    let key = common::unique("fam");
    promidata_sync::db::suppliers::bootstrap(&pool, &[&supplier]).await.unwrap();

    let (family, variants) = sample_family(&key, &supplier, "Color grouping check");
    let hash = hash_family(&family);
    let pending = reconciler::PendingFamily { family, variants, hash };

    reconciler::upsert_family(&pool, &pending).await.unwrap();

    let rows: Vec<(Option<String>, bool)> = sqlx::query_as(
        "SELECT color, is_primary_for_color FROM product_variants WHERE product_sku = $1",
    )
    .bind(&key)
    .fetch_all(&pool)
    .await
    .unwrap();

    let red_primaries = rows.iter().filter(|(c, p)| c.as_deref() == Some("Red") && *p).count();
    let blue_primaries = rows.iter().filter(|(c, p)| c.as_deref() == Some("Blue") && *p).count();
    assert_eq!(red_primaries, 1);
    assert_eq!(blue_primaries, 1);
}

#[tokio::test]
#[ignore]
async fn unchanged_family_is_skipped_on_the_next_sync() {
    let pool = common::test_pool().await;
    let supplier = common::unique("supp");
    let key = common::unique("fam");
    promidata_sync::db::suppliers::bootstrap(&pool, &[&supplier]).await.unwrap();

    let (family, variants) = sample_family(&key, &supplier, "Stable description");
    let hash = hash_family(&family);
    let pending = reconciler::PendingFamily { family: family.clone(), variants: variants.clone(), hash };
    reconciler::upsert_family(&pool, &pending).await.unwrap();

    let filtered = reconciler::filter_for_sync(&pool, &supplier, vec![(family, variants)])
        .await
        .unwrap();

    assert_eq!(filtered.skipped_count, 1);
    assert!(filtered.to_process.is_empty());
    assert_eq!(filtered.efficiency, 1.0);
}

#[tokio::test]
#[ignore]
async fn changed_description_is_reprocessed_not_skipped() {
    let pool = common::test_pool().await;
    let supplier = common::unique("supp");
    let key = common::unique("fam");
    promidata_sync::db::suppliers::bootstrap(&pool, &[&supplier]).await.unwrap();

    let (family, variants) = sample_family(&key, &supplier, "Original description");
    let hash = hash_family(&family);
    let pending = reconciler::PendingFamily { family, variants, hash };
    reconciler::upsert_family(&pool, &pending).await.unwrap();

    let (changed_family, changed_variants) = sample_family(&key, &supplier, "Updated description");
    let filtered = reconciler::filter_for_sync(&pool, &supplier, vec![(changed_family, changed_variants)])
        .await
        .unwrap();

    assert_eq!(filtered.skipped_count, 0);
    assert_eq!(filtered.to_process.len(), 1);
}

/// spec.md §4.6: a dedup hit against an already-stored Media row must be
/// visible on the variant — and on the family's `main_image`, since this is
/// the family's first variant — immediately after the upsert transaction,
/// without waiting on the async image-upload job.
#[tokio::test]
#[ignore]
async fn dedup_hit_sets_variant_and_main_image_within_the_upsert() {
    let pool = common::test_pool().await;
    let supplier = common::unique("supp");
    let key = common::unique("fam");
    promidata_sync::db::suppliers::bootstrap(&pool, &[&supplier]).await.unwrap();

    let filename = common::unique("mug.jpg");
    let stored_url = format!("https://store.example/{filename}");
    promidata_sync::db::media::insert_if_absent(&pool, &filename, &stored_url, Some(10), None)
        .await
        .unwrap();

    let (mut family, mut variants) = sample_family(&key, &supplier, "Dedup check");
    variants[0].primary_image = Some(format!("https://upstream.example/images/{filename}"));
    family.category = Some("Drinkware".to_string());

    let hash = hash_family(&family);
    let pending = reconciler::PendingFamily { family, variants, hash };
    reconciler::upsert_family(&pool, &pending).await.unwrap();

    let variant_image: (Option<String>,) =
        sqlx::query_as("SELECT primary_image FROM product_variants WHERE sku = $1")
            .bind(format!("{key}-RED"))
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(variant_image.0.as_deref(), Some(stored_url.as_str()));

    let product = promidata_sync::db::products::get_by_sku(&pool, &key).await.unwrap().unwrap();
    assert_eq!(product.main_image.as_deref(), Some(stored_url.as_str()));
}

/// A cache miss (no Media row yet for the derived filename) leaves the
/// variant's image columns unset rather than storing the raw upstream URL —
/// the async image-upload job fills them in once it has downloaded and
/// uploaded the asset.
#[tokio::test]
#[ignore]
async fn dedup_miss_leaves_image_columns_unset() {
    let pool = common::test_pool().await;
    let supplier = common::unique("supp");
    let key = common::unique("fam");
    promidata_sync::db::suppliers::bootstrap(&pool, &[&supplier]).await.unwrap();

    let (mut family, mut variants) = sample_family(&key, &supplier, "No media row yet");
    variants[0].primary_image = Some("https://upstream.example/images/never-downloaded.jpg".to_string());
    family.category = Some("Drinkware".to_string());

    let hash = hash_family(&family);
    let pending = reconciler::PendingFamily { family, variants, hash };
    reconciler::upsert_family(&pool, &pending).await.unwrap();

    let variant_image: (Option<String>,) =
        sqlx::query_as("SELECT primary_image FROM product_variants WHERE sku = $1")
            .bind(format!("{key}-RED"))
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(variant_image.0, None);

    let product = promidata_sync::db::products::get_by_sku(&pool, &key).await.unwrap().unwrap();
    assert_eq!(product.main_image, None);
}
