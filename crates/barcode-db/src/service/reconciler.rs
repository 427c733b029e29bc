//! # Archive Reconciler
//!
//! Deletes a variant while keeping the pool consistent and leaving an audit
//! record behind.
//!
//! ## Deletion Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  on_delete_variant(variant_id, reason, notes)                          │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   1. INSERT deleted_variant_archives SELECT … FROM variant + product    │
//! │        primary_barcode   ← owned row with is_primary = 1               │
//! │        released_barcodes ← JSON array of every owned code              │
//! │        0 rows → ROLLBACK, VariantNotFound                               │
//! │   2. UPDATE barcodes → available, owner/primary/assigned_at cleared     │
//! │   3. DELETE product_variants                                            │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any failure rolls back all three: the variant keeps its codes and no   │
//! │  archive row exists.                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Archive rows are write-once; a trigger rejects any UPDATE.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use barcode_core::validation::{validate_history_limit, validate_notes};
use barcode_core::{CoreError, DeletedVariantArchive, DeletionReason};

use crate::error::ServiceResult;
use crate::repository::barcode;

const ARCHIVE_COLUMNS: &str = "id, variant_id, product_name, variant_sku, color, size, \
     primary_barcode, released_barcodes, deletion_reason, deletion_notes, deleted_at";

/// Variant deletion with archive and barcode release.
#[derive(Debug, Clone)]
pub struct ArchiveReconciler {
    pool: SqlitePool,
}

impl ArchiveReconciler {
    pub fn new(pool: SqlitePool) -> Self {
        ArchiveReconciler { pool }
    }

    /// Archives, releases and deletes a variant as one unit.
    ///
    /// ## Errors
    /// - `Validation` if `notes` is too long; nothing touched
    /// - `VariantNotFound` if the variant does not exist; nothing touched
    /// - `TransactionAborted` if any step failed; everything rolled back
    pub async fn on_delete_variant(
        &self,
        variant_id: &str,
        reason: DeletionReason,
        notes: Option<&str>,
    ) -> ServiceResult<DeletedVariantArchive> {
        let notes = validate_notes("deletion_notes", notes)?;
        let archive_id = Uuid::new_v4().to_string();

        let mut tx = self.pool.begin().await?;

        let archived = sqlx::query(
            r#"
            INSERT INTO deleted_variant_archives (
                id, variant_id, product_name, variant_sku, color, size,
                primary_barcode, released_barcodes, deletion_reason, deletion_notes, deleted_at
            )
            SELECT
                ?1, v.id, p.name, v.sku, v.color, v.size,
                (SELECT code FROM barcodes
                  WHERE owner_variant_id = v.id AND is_primary = 1 AND status = 'assigned'),
                (SELECT json_group_array(code) FROM (
                    SELECT code FROM barcodes
                     WHERE owner_variant_id = v.id AND status = 'assigned'
                     ORDER BY is_primary DESC, length(ltrim(code, '0')), ltrim(code, '0'), code)),
                ?2, ?3, ?4
            FROM product_variants v
            JOIN products p ON p.id = v.product_id
            WHERE v.id = ?5
            "#,
        )
        .bind(&archive_id)
        .bind(reason)
        .bind(&notes)
        .bind(Utc::now())
        .bind(variant_id)
        .execute(&mut *tx)
        .await?;

        if archived.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(CoreError::VariantNotFound(variant_id.to_string()).into());
        }

        let released = barcode::release_owned(&mut tx, variant_id).await?;
        debug!(variant_id = %variant_id, count = released.len(), "Released variant barcodes");

        sqlx::query("DELETE FROM product_variants WHERE id = ?1")
            .bind(variant_id)
            .execute(&mut *tx)
            .await?;

        let sql = format!("SELECT {ARCHIVE_COLUMNS} FROM deleted_variant_archives WHERE id = ?1");
        let archive = sqlx::query_as::<_, DeletedVariantArchive>(&sql)
            .bind(&archive_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            variant_id = %variant_id,
            sku = %archive.variant_sku,
            reason = %reason,
            primary = ?archive.primary_barcode,
            released = released.len(),
            "Variant deleted and archived"
        );
        Ok(archive)
    }

    /// Most recent archive rows, newest first.
    pub async fn archives(&self, limit: u32) -> ServiceResult<Vec<DeletedVariantArchive>> {
        let limit = validate_history_limit(limit)?;
        let sql = format!(
            "SELECT {ARCHIVE_COLUMNS} FROM deleted_variant_archives \
             ORDER BY deleted_at DESC, rowid DESC LIMIT ?1"
        );
        let rows = sqlx::query_as::<_, DeletedVariantArchive>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Archive rows for a SKU (a SKU can be reused after deletion).
    pub async fn archive_by_sku(&self, sku: &str) -> ServiceResult<Vec<DeletedVariantArchive>> {
        let sql = format!(
            "SELECT {ARCHIVE_COLUMNS} FROM deleted_variant_archives \
             WHERE variant_sku = ?1 ORDER BY deleted_at DESC, rowid DESC"
        );
        let rows = sqlx::query_as::<_, DeletedVariantArchive>(&sql)
            .bind(sku.trim())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
