//! Durable job queue behavior against a live Postgres instance: claim
//! exclusivity, retry/backoff, and pause/resume.

mod common;

use serde_json::json;

use promidata_sync::jobs::queue::JobQueue;
use promidata_sync::jobs::{JobKind, JobState};

#[tokio::test]
#[ignore]
async fn claim_never_hands_the_same_job_to_two_callers() {
    let pool = common::test_pool().await;
    let queue = JobQueue::new(pool.clone());

    let id = queue.enqueue(JobKind::ImageUpload, json!({"url": "https://x/img.jpg"})).await.unwrap();

    let (a, b) = tokio::join!(queue.claim("image-upload"), queue.claim("image-upload"));
    let claimed: Vec<_> = [a.unwrap(), b.unwrap()].into_iter().flatten().collect();

    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, id);
    assert_eq!(claimed[0].state, JobState::Active);
}

#[tokio::test]
#[ignore]
async fn exhausted_retries_terminate_as_failed() {
    let pool = common::test_pool().await;
    let queue = JobQueue::new(pool.clone());

    let id = queue.enqueue_with_attempts(JobKind::ImageUpload, json!({}), 1).await.unwrap();
    let claimed = queue.claim("image-upload").await.unwrap().unwrap();
    assert_eq!(claimed.attempts, 1);

    queue.fail_or_retry(id, "boom").await.unwrap();

    let job = queue.get(id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.error.as_deref(), Some("boom"));
}

#[tokio::test]
#[ignore]
async fn retry_with_attempts_remaining_delays_instead_of_failing() {
    let pool = common::test_pool().await;
    let queue = JobQueue::new(pool.clone());

    let id = queue.enqueue_with_attempts(JobKind::ImageUpload, json!({}), 3).await.unwrap();
    queue.claim("image-upload").await.unwrap().unwrap();

    queue.fail_or_retry(id, "transient").await.unwrap();

    let job = queue.get(id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Delayed);
    assert!(job.run_after > chrono::Utc::now());
}

#[tokio::test]
#[ignore]
async fn paused_queue_yields_no_claims() {
    let pool = common::test_pool().await;
    let queue = JobQueue::new(pool.clone());

    queue.enqueue(JobKind::ImageUpload, json!({})).await.unwrap();
    queue.pause("image-upload").await.unwrap();

    let claimed = queue.claim("image-upload").await.unwrap();
    assert!(claimed.is_none());

    queue.resume("image-upload").await.unwrap();
    let claimed = queue.claim("image-upload").await.unwrap();
    assert!(claimed.is_some());
}

#[tokio::test]
#[ignore]
async fn has_queued_or_active_matches_on_payload_field() {
    let pool = common::test_pool().await;
    let queue = JobQueue::new(pool.clone());
    let supplier = common::unique("supplier");

    assert!(!queue
        .has_queued_or_active("supplier-sync", "supplier_id", &supplier)
        .await
        .unwrap());

    queue
        .enqueue(JobKind::SupplierSync, json!({"supplier_id": supplier, "manual": true}))
        .await
        .unwrap();

    assert!(queue
        .has_queued_or_active("supplier-sync", "supplier_id", &supplier)
        .await
        .unwrap());
}
