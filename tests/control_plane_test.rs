//! Control plane behavior against a live Redis instance: lock mutual
//! exclusion (property P5) and the stop sentinel (property P7's signaling
//! half — the cooperative-cancellation timing half is exercised by the
//! supplier-sync handler itself, not here).

mod common;

use promidata_sync::control::{locks, stop};

#[tokio::test]
#[ignore]
async fn second_acquire_fails_while_first_holds_the_lock() {
    let mut redis = common::test_redis().await;
    let supplier = common::unique("supplier");

    let first = locks::acquire(&mut redis, &supplier).await.unwrap();
    assert!(first.is_some());

    let second = locks::acquire(&mut redis, &supplier).await.unwrap();
    assert!(second.is_none(), "a held lock must reject a concurrent acquire");

    let released = locks::release(&mut redis, &first.unwrap()).await.unwrap();
    assert!(released);

    let third = locks::acquire(&mut redis, &supplier).await.unwrap();
    assert!(third.is_some(), "the lock must be acquirable again once released");
}

#[tokio::test]
#[ignore]
async fn release_with_stale_holder_id_is_a_noop() {
    let mut redis = common::test_redis().await;
    let supplier = common::unique("supplier");

    let lock = locks::acquire(&mut redis, &supplier).await.unwrap().unwrap();
    let forged = locks::SupplierLock { supplier_id: supplier.clone(), holder_id: "not-the-real-holder".to_string() };

    let released = locks::release(&mut redis, &forged).await.unwrap();
    assert!(!released, "a release with the wrong holder id must not delete the lock");
    assert!(locks::is_locked(&mut redis, &supplier).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn list_active_reflects_acquired_locks_via_scan() {
    let mut redis = common::test_redis().await;
    let supplier_a = common::unique("supplier");
    let supplier_b = common::unique("supplier");

    locks::acquire(&mut redis, &supplier_a).await.unwrap();
    locks::acquire(&mut redis, &supplier_b).await.unwrap();

    let active = locks::list_active(&mut redis).await.unwrap();
    assert!(active.contains(&supplier_a));
    assert!(active.contains(&supplier_b));
}

#[tokio::test]
#[ignore]
async fn stop_signal_is_visible_until_cleared() {
    let mut redis = common::test_redis().await;
    let supplier = common::unique("supplier");

    assert!(!stop::requested(&mut redis, &supplier).await.unwrap());

    stop::signal(&mut redis, &supplier).await.unwrap();
    assert!(stop::requested(&mut redis, &supplier).await.unwrap());

    stop::clear(&mut redis, &supplier).await.unwrap();
    assert!(!stop::requested(&mut redis, &supplier).await.unwrap());
}
