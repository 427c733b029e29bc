// ==========================================
// Pool lifecycle: import → assign → release → delete
// ==========================================

mod common;

use barcode_core::parser::FileFormat;
use barcode_core::{
    BarcodeStatus, BarcodeType, CoreError, DeletionReason, ImportRequest, ReleaseOutcome,
    ReleaseReason,
};
use barcode_db::{DbError, NewVariant, ServiceError};

#[tokio::test]
async fn test_threshold_partition_of_large_import() {
    let db = common::memory_db().await;
    let codes: Vec<String> = (1..=100_000u32).map(|n| n.to_string()).collect();

    let report = common::seed_codes(&db, &codes, BarcodeType::Ean13, 40_000).await;

    assert_eq!(report.total_processed, 100_000);
    assert_eq!(report.legacy, 40_000);
    assert_eq!(report.available, 60_000);
    assert_eq!(report.error_count, 0);

    let stats = db.queries().stats().await.unwrap();
    assert_eq!(stats.count(BarcodeStatus::LegacyArchive, BarcodeType::Ean13), 40_000);
    assert_eq!(stats.available(BarcodeType::Ean13), 60_000);

    let boundary = db.queries().find_by_code("40000").await.unwrap().unwrap();
    assert_eq!(boundary.status, BarcodeStatus::LegacyArchive);

    let v = common::variant(&db, "Shirt", "SHIRT-1").await;
    let first = db
        .allocation()
        .assign(&v.id, BarcodeType::Ean13, None)
        .await
        .unwrap();
    assert_eq!(first.code, "40001");
}

#[tokio::test]
async fn test_codes_are_unique_across_types() {
    let db = common::memory_db().await;
    common::seed_codes(&db, &["1001", "1002"], BarcodeType::Ean13, 0).await;

    let report = common::seed_codes(&db, &["1002", "1003"], BarcodeType::UpcA, 0).await;

    assert_eq!(report.imported, 1);
    assert_eq!(report.duplicates, 1);
    let stats = db.queries().stats().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.available(BarcodeType::UpcA), 1);
}

#[tokio::test]
async fn test_assignment_keeps_row_invariants() {
    let db = common::memory_db().await;
    common::seed_codes(&db, &["11", "12", "13", "14", "15", "16"], BarcodeType::Ean13, 0).await;
    let a = common::variant(&db, "Shirt", "SHIRT-A").await;
    let b = common::variant(&db, "Shirt", "SHIRT-B").await;
    let allocation = db.allocation();

    for _ in 0..3 {
        allocation.assign(&a.id, BarcodeType::Ean13, None).await.unwrap();
        allocation.assign(&b.id, BarcodeType::Ean13, None).await.unwrap();
        common::assert_pool_invariants(&db).await;
    }

    let owned = allocation.barcodes_for_variant(&b.id).await.unwrap();
    allocation.set_primary(&b.id, &owned[2].id).await.unwrap();
    allocation
        .release(&owned[0].id, ReleaseReason::Manual)
        .await
        .unwrap();
    common::assert_pool_invariants(&db).await;

    let codes_a: Vec<String> = allocation
        .barcodes_for_variant(&a.id)
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.code)
        .collect();
    assert_eq!(codes_a, vec!["11", "13", "15"]);
}

#[tokio::test]
async fn test_release_twice_changes_nothing_the_second_time() {
    let db = common::memory_db().await;
    common::seed_codes(&db, &["500", "600"], BarcodeType::Ean13, 0).await;
    let v = common::variant(&db, "Shirt", "SHIRT-1").await;
    let allocation = db.allocation();

    let released = allocation.assign(&v.id, BarcodeType::Ean13, None).await.unwrap();
    let kept = allocation.assign(&v.id, BarcodeType::Ean13, None).await.unwrap();

    assert_eq!(
        allocation
            .release(&released.id, ReleaseReason::Manual)
            .await
            .unwrap(),
        ReleaseOutcome::Released
    );
    let after_first = db.queries().find_by_code("500").await.unwrap().unwrap();

    assert_eq!(
        allocation
            .release(&released.id, ReleaseReason::Manual)
            .await
            .unwrap(),
        ReleaseOutcome::AlreadyAvailable
    );
    let after_second = db.queries().find_by_code("500").await.unwrap().unwrap();
    assert_eq!(after_first, after_second);

    let untouched = db.queries().find_by_code("600").await.unwrap().unwrap();
    assert_eq!(untouched.assigned_at, kept.assigned_at);
    assert_eq!(untouched.owner_variant_id.as_deref(), Some(v.id.as_str()));
}

#[tokio::test]
async fn test_released_code_goes_to_next_variant() {
    let db = common::memory_db().await;
    common::seed_codes(&db, &["700", "800"], BarcodeType::Ean13, 0).await;
    let first_owner = common::variant(&db, "Shirt", "SHIRT-1").await;
    let second_owner = common::variant(&db, "Shirt", "SHIRT-2").await;
    let allocation = db.allocation();

    let code = allocation
        .assign(&first_owner.id, BarcodeType::Ean13, None)
        .await
        .unwrap();
    allocation
        .release(&code.id, ReleaseReason::Reassigned)
        .await
        .unwrap();

    let reused = allocation
        .assign(&second_owner.id, BarcodeType::Ean13, None)
        .await
        .unwrap();
    assert_eq!(reused.id, code.id);
    assert_eq!(reused.owner_variant_id.as_deref(), Some(second_owner.id.as_str()));
    assert!(reused.is_primary);
}

#[tokio::test]
async fn test_ragged_csv_aborts_whole_import() {
    let db = common::memory_db().await;
    common::seed_codes(&db, &["1", "2", "3"], BarcodeType::Ean13, 0).await;

    let mut body = String::from("barcode,qty\n");
    for n in 1000..1100 {
        if n == 1048 {
            // 50th line of the file
            body.push_str(&format!("{n}\n"));
        } else {
            body.push_str(&format!("{n},1\n"));
        }
    }

    let err = db
        .importer()
        .import_bytes(
            "broken.csv",
            body.as_bytes(),
            FileFormat::Csv,
            ImportRequest::new(BarcodeType::Ean13, 0).validate_format(false),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Domain(CoreError::Parse(_))));
    assert_eq!(db.queries().stats().await.unwrap().total, 3);
    assert_eq!(db.queries().batch_history(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_deleting_variant_archives_snapshot() {
    let db = common::memory_db().await;
    db.importer()
        .import_bytes(
            "gtin.csv",
            b"barcode\n5012345678900\n4006381333931\n9780201379624\n",
            FileFormat::Csv,
            ImportRequest::new(BarcodeType::Ean13, 0),
        )
        .await
        .unwrap();

    let product = db.catalog().create_product("Linen Shirt").await.unwrap();
    let v = db
        .catalog()
        .create_variant(
            &product.id,
            NewVariant::new("026-RED-120").color("Red").size("120"),
        )
        .await
        .unwrap();

    let allocation = db.allocation();
    let primary = allocation
        .assign(&v.id, BarcodeType::Ean13, Some("5012345678900"))
        .await
        .unwrap();
    assert!(primary.is_primary);
    allocation.assign(&v.id, BarcodeType::Ean13, None).await.unwrap();

    let archive = db
        .reconciler()
        .on_delete_variant(&v.id, DeletionReason::Discontinued, None)
        .await
        .unwrap();

    assert_eq!(archive.variant_sku, "026-RED-120");
    assert_eq!(archive.primary_barcode.as_deref(), Some("5012345678900"));
    assert_eq!(archive.deletion_reason, DeletionReason::Discontinued);
    assert_eq!(archive.size.as_deref(), Some("120"));
    assert_eq!(archive.released_codes().len(), 2);

    let code = db.queries().find_by_code("5012345678900").await.unwrap().unwrap();
    assert_eq!(code.status, BarcodeStatus::Available);
    assert_eq!(code.owner_variant_id, None);
    assert!(!code.is_primary);

    assert_eq!(db.reconciler().archive_by_sku("026-RED-120").await.unwrap().len(), 1);
    assert!(db.catalog().variant_by_sku("026-RED-120").await.unwrap().is_none());
    common::assert_pool_invariants(&db).await;
}

#[tokio::test]
async fn test_failed_deletion_rolls_back_everything() {
    let db = common::memory_db().await;
    common::seed_codes(&db, &["900", "901"], BarcodeType::Ean13, 0).await;
    let v = common::variant(&db, "Shirt", "SHIRT-FK").await;
    db.allocation()
        .assign(&v.id, BarcodeType::Ean13, None)
        .await
        .unwrap();

    // A dependent row the deletion does not know about blocks the variant DELETE.
    sqlx::query(
        "CREATE TABLE variant_images (id INTEGER PRIMARY KEY, \
         variant_id TEXT NOT NULL REFERENCES product_variants(id))",
    )
    .execute(db.pool())
    .await
    .unwrap();
    sqlx::query("INSERT INTO variant_images (variant_id) VALUES (?1)")
        .bind(&v.id)
        .execute(db.pool())
        .await
        .unwrap();

    let err = db
        .reconciler()
        .on_delete_variant(&v.id, DeletionReason::DataError, Some("cleanup"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::TransactionAborted(DbError::ForeignKeyViolation { .. })
    ));
    assert_eq!(
        err.user_message("deletion"),
        "could not complete deletion, try again"
    );

    assert!(db.catalog().variant_exists(&v.id).await.unwrap());
    let owned = db.allocation().barcodes_for_variant(&v.id).await.unwrap();
    assert_eq!(owned.len(), 1);
    assert!(owned[0].is_primary);
    assert!(db.reconciler().archives(10).await.unwrap().is_empty());
}
