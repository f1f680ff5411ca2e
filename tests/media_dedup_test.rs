//! Media filename uniqueness (property P4): a second insert for a filename
//! already present issues no new row and the original URL/hash survive.

mod common;

#[tokio::test]
#[ignore]
async fn insert_if_absent_is_idempotent_per_filename() {
    let pool = common::test_pool().await;
    let filename = common::unique("mug.jpg");

    let first = promidata_sync::db::media::insert_if_absent(
        &pool,
        &filename,
        "https://store.example/mug.jpg",
        Some(1024),
        Some("abc123"),
    )
    .await
    .unwrap();

    let second = promidata_sync::db::media::insert_if_absent(
        &pool,
        &filename,
        "https://store.example/mug-resized.jpg",
        Some(2048),
        Some("def456"),
    )
    .await
    .unwrap();

    assert_eq!(first.url, second.url);
    assert_eq!(first.hash, second.hash);
    assert_eq!(second.url, "https://store.example/mug.jpg");

    let rows: Vec<(String,)> = sqlx::query_as("SELECT filename FROM media WHERE filename = $1")
        .bind(&filename)
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}
