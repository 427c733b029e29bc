// ==========================================
// Shared fixtures for barcode-db integration tests
// ==========================================

#![allow(dead_code)]

use barcode_core::parser::FileFormat;
use barcode_core::{BarcodeType, ImportReport, ImportRequest, Variant};
use barcode_db::{Database, DbConfig, NewVariant};
use tempfile::TempDir;

/// Fresh in-memory store with migrations applied.
pub async fn memory_db() -> Database {
    Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database")
}

/// File-backed store so several connections can race each other.
pub async fn file_db(dir: &TempDir) -> Database {
    Database::new(DbConfig::new(dir.path().join("pool.db")).max_connections(8))
        .await
        .expect("file database")
}

/// Imports newline-separated codes with format checks off.
pub async fn seed_codes<S: AsRef<str>>(
    db: &Database,
    codes: &[S],
    barcode_type: BarcodeType,
    legacy_threshold: u64,
) -> ImportReport {
    let body = codes
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join("\n");

    db.importer()
        .import_bytes(
            "seed.txt",
            body.as_bytes(),
            FileFormat::Lines,
            ImportRequest::new(barcode_type, legacy_threshold).validate_format(false),
        )
        .await
        .expect("seed import")
}

/// Creates a product with one variant.
pub async fn variant(db: &Database, product: &str, sku: &str) -> Variant {
    let product = db
        .catalog()
        .create_product(product)
        .await
        .expect("product");
    db.catalog()
        .create_variant(&product.id, NewVariant::new(sku))
        .await
        .expect("variant")
}

/// Row-level invariant check straight against the table.
pub async fn assert_pool_invariants(db: &Database) {
    let orphaned: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM barcodes \
         WHERE (status = 'assigned') <> (owner_variant_id IS NOT NULL)",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(orphaned, 0, "assigned rows must have an owner and only they");

    let multi_primary: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM (SELECT owner_variant_id FROM barcodes \
         WHERE is_primary = 1 GROUP BY owner_variant_id HAVING COUNT(*) > 1)",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(multi_primary, 0, "at most one primary per variant");

    let stray_primary: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM barcodes WHERE is_primary = 1 AND status <> 'assigned'")
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(stray_primary, 0, "only assigned rows can be primary");
}
