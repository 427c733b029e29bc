// ==========================================
// Concurrent allocation against a file-backed store
// ==========================================
// Several pool connections race for the same rows; every code must end up
// with at most one owner and every loser must get a clean domain error.
// ==========================================

mod common;

use std::collections::HashSet;
use std::time::Duration;

use barcode_core::{Barcode, BarcodeStatus, BarcodeType, CoreError};
use barcode_db::{Database, ServiceError};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_preferred_code_race_has_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let db = common::file_db(&dir).await;
    common::seed_codes(&db, &["5012345678900", "4006381333931"], BarcodeType::Ean13, 0).await;

    let a = common::variant(&db, "Shirt", "RACE-A").await;
    let b = common::variant(&db, "Shirt", "RACE-B").await;

    let (left, right) = tokio::join!(
        {
            let db = db.clone();
            let id = a.id.clone();
            tokio::spawn(async move {
                db.allocation()
                    .assign(&id, BarcodeType::Ean13, Some("5012345678900"))
                    .await
            })
        },
        {
            let db = db.clone();
            let id = b.id.clone();
            tokio::spawn(async move {
                db.allocation()
                    .assign(&id, BarcodeType::Ean13, Some("5012345678900"))
                    .await
            })
        }
    );
    let results = [left.unwrap(), right.unwrap()];

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(matches!(
        loser,
        ServiceError::Domain(CoreError::CodeUnavailable { .. })
    ));
    assert_eq!(
        loser.user_message("assignment"),
        "barcode 5012345678900 is no longer available, pick another"
    );

    let row = db.queries().find_by_code("5012345678900").await.unwrap().unwrap();
    assert_eq!(row.status, BarcodeStatus::Assigned);
    common::assert_pool_invariants(&db).await;
    db.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_assign_never_double_allocates() {
    let dir = tempfile::tempdir().unwrap();
    let db = common::file_db(&dir).await;
    let codes: Vec<String> = (100..106).map(|n| n.to_string()).collect();
    common::seed_codes(&db, &codes, BarcodeType::Ean13, 0).await;

    let mut variants = Vec::new();
    for i in 0..10 {
        variants.push(common::variant(&db, "Shirt", &format!("PAR-{i}")).await);
    }

    let mut handles = Vec::new();
    for v in &variants {
        let db = db.clone();
        let id = v.id.clone();
        handles.push(tokio::spawn(async move {
            db.allocation().assign(&id, BarcodeType::Ean13, None).await
        }));
    }

    let mut assigned = HashSet::new();
    let mut exhausted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(barcode) => assert!(assigned.insert(barcode.code), "code handed out twice"),
            Err(ServiceError::Domain(CoreError::PoolExhausted { .. })) => exhausted += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(assigned.len(), 6);
    assert_eq!(exhausted, 4);
    assert_eq!(db.queries().stats().await.unwrap().available(BarcodeType::Ean13), 0);
    common::assert_pool_invariants(&db).await;
    db.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_set_primary_keeps_single_primary() {
    let dir = tempfile::tempdir().unwrap();
    let db = common::file_db(&dir).await;
    common::seed_codes(&db, &["1", "2", "3", "4"], BarcodeType::Ean13, 0).await;
    let v = common::variant(&db, "Shirt", "PRIMARY-1").await;

    let mut owned = Vec::new();
    for _ in 0..4 {
        owned.push(
            db.allocation()
                .assign(&v.id, BarcodeType::Ean13, None)
                .await
                .unwrap(),
        );
    }

    let mut handles = Vec::new();
    for barcode in &owned {
        let db = db.clone();
        let variant_id = v.id.clone();
        let barcode_id = barcode.id.clone();
        handles.push(tokio::spawn(async move {
            db.allocation().set_primary(&variant_id, &barcode_id).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let primaries = db
        .allocation()
        .barcodes_for_variant(&v.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|b| b.is_primary)
        .count();
    assert_eq!(primaries, 1);
    common::assert_pool_invariants(&db).await;
    db.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_imports_store_each_code_once() {
    let dir = tempfile::tempdir().unwrap();
    let db = common::file_db(&dir).await;

    let first: Vec<String> = (1..=300).map(|n| n.to_string()).collect();
    let second: Vec<String> = (201..=500).map(|n| n.to_string()).collect();

    let (left, right) = tokio::join!(
        {
            let db = db.clone();
            tokio::spawn(async move { common::seed_codes(&db, &first, BarcodeType::Ean13, 0).await })
        },
        {
            let db = db.clone();
            tokio::spawn(async move { common::seed_codes(&db, &second, BarcodeType::Ean13, 0).await })
        }
    );
    let (left, right) = (left.unwrap(), right.unwrap());

    assert_eq!(left.imported + right.imported, 500);
    assert_eq!(left.duplicates + right.duplicates, 100);
    assert_eq!(db.queries().stats().await.unwrap().total, 500);
    db.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_code_race_without_preference_exhausts_loser() {
    let dir = tempfile::tempdir().unwrap();
    let db = common::file_db(&dir).await;
    common::seed_codes(&db, &["4006381333931"], BarcodeType::Ean13, 0).await;

    let a = common::variant(&db, "Shirt", "SOLO-A").await;
    let b = common::variant(&db, "Shirt", "SOLO-B").await;

    let spawn = |variant_id: String| {
        let db = db.clone();
        tokio::spawn(async move {
            db.allocation()
                .assign(&variant_id, BarcodeType::Ean13, None)
                .await
        })
    };
    let (left, right) = tokio::join!(spawn(a.id.clone()), spawn(b.id.clone()));
    let results = [left.unwrap(), right.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    // No preferred code: the loser runs out of candidates rather than
    // being told a specific code was taken.
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(matches!(
        loser,
        ServiceError::Domain(CoreError::PoolExhausted {
            barcode_type: BarcodeType::Ean13
        })
    ));
    common::assert_pool_invariants(&db).await;
    db.close().await;
}

/// Holds a variant deletion open while `assign` runs, then commits it.
async fn assign_while_variant_is_deleted(
    db: &Database,
    preferred: Option<&'static str>,
) -> Result<Barcode, ServiceError> {
    common::seed_codes(db, &["100", "200"], BarcodeType::Ean13, 0).await;
    let v = common::variant(db, "Shirt", "GONE-1").await;

    let mut deletion = db.pool().begin().await.unwrap();
    sqlx::query("DELETE FROM product_variants WHERE id = ?1")
        .bind(&v.id)
        .execute(&mut *deletion)
        .await
        .unwrap();

    let assign = {
        let db = db.clone();
        let id = v.id.clone();
        tokio::spawn(async move {
            db.allocation()
                .assign(&id, BarcodeType::Ean13, preferred)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    deletion.commit().await.unwrap();

    assign.await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_assign_racing_deletion_leaves_codes_in_pool() {
    for preferred in [None, Some("200")] {
        let dir = tempfile::tempdir().unwrap();
        let db = common::file_db(&dir).await;

        let err = assign_while_variant_is_deleted(&db, preferred)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ServiceError::Domain(CoreError::VariantNotFound(_))),
            "unexpected result for {preferred:?}: {err:?}"
        );

        let stats = db.queries().stats().await.unwrap();
        assert_eq!(stats.available(BarcodeType::Ean13), 2);
        assert_eq!(stats.count(BarcodeStatus::Assigned, BarcodeType::Ean13), 0);
        common::assert_pool_invariants(&db).await;
        db.close().await;
    }
}
