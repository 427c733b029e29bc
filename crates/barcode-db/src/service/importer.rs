//! # Pool Importer
//!
//! Loads a file of codes into the pool as one import batch.
//!
//! ## Import Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  outside any transaction                                                │
//! │  ──────────────────────                                                 │
//! │  size check → parse_codes() → prepare()        (ParseError aborts)      │
//! │                                                                         │
//! │  one write transaction                                                  │
//! │  ─────────────────────                                                  │
//! │  1. INSERT import_batches (counts = 0)                                  │
//! │  2. clear_existing? DELETE available rows of this type                  │
//! │  3. SELECT existing codes                                               │
//! │  4. finalize() → ImportPlan                                             │
//! │  5. INSERT accepted rows                                                │
//! │  6. UPDATE import_batches counts                                        │
//! │  7. COMMIT                                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The first statement of the transaction is a write, so SQLite takes the
//! write lock up front and the existence check sees every committed code.
//! Any failure after step 1 rolls back the whole batch.

use std::path::Path;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use barcode_core::parser::{parse_codes, FileFormat};
use barcode_core::partition::{prepare, ImportPlan};
use barcode_core::symbology::FormatRules;
use barcode_core::validation::{validate_notes, validate_threshold};
use barcode_core::{BarcodeType, ImportReport, ImportRequest, ParseError};

use crate::error::ServiceResult;
use crate::pool::ServiceSettings;
use crate::repository::barcode;

/// Imports code files into the pool.
#[derive(Debug, Clone)]
pub struct PoolImporter {
    pool: SqlitePool,
    rules: FormatRules,
    settings: ServiceSettings,
}

impl PoolImporter {
    pub fn new(pool: SqlitePool, rules: FormatRules, settings: ServiceSettings) -> Self {
        PoolImporter {
            pool,
            rules,
            settings,
        }
    }

    /// Imports the file at `path`. The format is picked from its extension.
    pub async fn import_file(
        &self,
        path: impl AsRef<Path>,
        request: ImportRequest,
    ) -> ServiceResult<ImportReport> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let unreadable = |e: std::io::Error| ParseError::Unreadable {
            path: display.clone(),
            message: e.to_string(),
        };

        let metadata = tokio::fs::metadata(path).await.map_err(unreadable)?;
        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        self.check_size(size)?;

        let bytes = tokio::fs::read(path).await.map_err(unreadable)?;
        let source_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(display.as_str());

        self.import_bytes(
            source_name,
            &bytes,
            FileFormat::from_file_name(source_name),
            request,
        )
        .await
    }

    /// Imports already-loaded file contents.
    ///
    /// ## Errors
    /// - `Domain(Parse(..))` if the file is structurally unreadable; nothing written
    /// - `Domain(Validation(..))` for a bad threshold or over-long notes
    /// - `TransactionAborted` if the store failed; the batch was rolled back
    pub async fn import_bytes(
        &self,
        source_name: &str,
        bytes: &[u8],
        format: FileFormat,
        request: ImportRequest,
    ) -> ServiceResult<ImportReport> {
        self.check_size(bytes.len())?;
        let threshold = validate_threshold(request.legacy_threshold)?;
        let legacy_notes = validate_notes("legacy_notes", request.legacy_notes.as_deref())?;

        let candidates = parse_codes(bytes, format)?;
        debug!(
            source = %source_name,
            candidates = candidates.len(),
            ?format,
            "Parsed import file"
        );

        let prepared = prepare(
            candidates,
            request.barcode_type,
            request.options.validate_format,
            &self.rules,
        );

        let batch_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO import_batches (
                batch_id, barcode_type, legacy_threshold, legacy_notes,
                clear_existing, validate_format, source_name, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&batch_id)
        .bind(request.barcode_type)
        .bind(threshold)
        .bind(&legacy_notes)
        .bind(request.options.clear_existing)
        .bind(request.options.validate_format)
        .bind(source_name)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let cleared = if request.options.clear_existing {
            barcode::delete_available(&mut *tx, Some(request.barcode_type)).await?
        } else {
            0
        };

        let existing = barcode::existing_codes(&mut *tx, prepared.codes()).await?;
        let plan = prepared.finalize(&existing, request.legacy_threshold);

        barcode::insert_accepted(
            &mut *tx,
            &batch_id,
            request.barcode_type,
            legacy_notes.as_deref(),
            &plan.accepted,
            now,
        )
        .await?;

        record_counts(&mut tx, &batch_id, &plan, cleared).await?;
        tx.commit().await?;

        let report = plan.report(&batch_id, cleared, self.settings.error_display_limit);
        if report.error_count > 0 {
            warn!(
                batch_id = %batch_id,
                rejected = report.error_count,
                "Some rows were skipped during import"
            );
        }
        info!(
            batch_id = %batch_id,
            source = %source_name,
            barcode_type = %request.barcode_type,
            total = report.total_processed,
            available = report.available,
            legacy = report.legacy,
            duplicates = report.duplicates,
            invalid = report.invalid,
            cleared,
            "Import committed"
        );

        Ok(report)
    }

    /// Deletes every `available` code, optionally of one type only.
    ///
    /// Assigned, reserved and legacy rows are never touched.
    pub async fn clear_pool(&self, barcode_type: Option<BarcodeType>) -> ServiceResult<u64> {
        let mut conn = self.pool.acquire().await?;
        let deleted = barcode::delete_available(&mut conn, barcode_type).await?;

        info!(
            barcode_type = ?barcode_type.map(|t| t.as_str()),
            deleted,
            "Cleared available barcodes"
        );
        Ok(deleted)
    }

    fn check_size(&self, size: usize) -> Result<(), ParseError> {
        if size > self.settings.max_file_bytes {
            return Err(ParseError::TooLarge {
                size,
                limit: self.settings.max_file_bytes,
            });
        }
        Ok(())
    }
}

async fn record_counts(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    batch_id: &str,
    plan: &ImportPlan,
    cleared: u64,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE import_batches SET
            total_processed = ?2,
            imported_count  = ?3,
            available_count = ?4,
            legacy_count    = ?5,
            duplicate_count = ?6,
            invalid_count   = ?7,
            cleared_count   = ?8
        WHERE batch_id = ?1
        "#,
    )
    .bind(batch_id)
    .bind(plan.total_processed as i64)
    .bind(plan.accepted.len() as i64)
    .bind(plan.available_count() as i64)
    .bind(plan.legacy_count() as i64)
    .bind(plan.duplicate_count() as i64)
    .bind(plan.invalid_count() as i64)
    .bind(cleared as i64)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
