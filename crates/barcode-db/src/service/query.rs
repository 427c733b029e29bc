//! # Pool Queries
//!
//! Read-only views over the pool: stats, import history and search.
//!
//! Every query runs as a single statement outside any transaction, so the
//! numbers are a snapshot that may already be stale under concurrent writes.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use barcode_core::symbology::normalize_code;
use barcode_core::validation::{validate_history_limit, validate_page, validate_search_query};
use barcode_core::{Barcode, BarcodeFilter, ImportBatch, Page, PoolStats, SearchPage, StatusCount};

use crate::error::ServiceResult;
use crate::repository::barcode::{BarcodeRepository, BARCODE_COLUMNS, CODE_ORDER};

const BATCH_COLUMNS: &str = "batch_id, barcode_type, legacy_threshold, legacy_notes, \
     clear_existing, validate_format, source_name, created_at, total_processed, \
     imported_count, available_count, legacy_count, duplicate_count, invalid_count, cleared_count";

/// Read-only pool queries.
#[derive(Debug, Clone)]
pub struct PoolQueryService {
    pool: SqlitePool,
    barcodes: BarcodeRepository,
}

impl PoolQueryService {
    pub fn new(pool: SqlitePool) -> Self {
        PoolQueryService {
            barcodes: BarcodeRepository::new(pool.clone()),
            pool,
        }
    }

    /// Counts grouped by status and type.
    pub async fn stats(&self) -> ServiceResult<PoolStats> {
        let rows = sqlx::query_as::<_, StatusCount>(
            r#"
            SELECT status, barcode_type, COUNT(*) AS count
            FROM barcodes
            GROUP BY status, barcode_type
            ORDER BY barcode_type, status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(PoolStats::from_rows(rows))
    }

    /// Most recent import batches, newest first.
    pub async fn batch_history(&self, limit: u32) -> ServiceResult<Vec<ImportBatch>> {
        let limit = validate_history_limit(limit)?;
        let sql = format!(
            "SELECT {BATCH_COLUMNS} FROM import_batches \
             ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        );
        let batches = sqlx::query_as::<_, ImportBatch>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(batches)
    }

    /// One import batch by id.
    pub async fn batch(&self, batch_id: &str) -> ServiceResult<Option<ImportBatch>> {
        let sql = format!("SELECT {BATCH_COLUMNS} FROM import_batches WHERE batch_id = ?1");
        let batch = sqlx::query_as::<_, ImportBatch>(&sql)
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(batch)
    }

    /// Looks a code up after normalizing it the way imports do.
    pub async fn find_by_code(&self, raw: &str) -> ServiceResult<Option<Barcode>> {
        let Some(code) = normalize_code(raw) else {
            return Ok(None);
        };
        Ok(self.barcodes.get_by_code(&code).await?)
    }

    /// Filtered, paged barcode listing in allocation order.
    ///
    /// ## Returns
    /// The requested page plus the total number of matches.
    pub async fn search(&self, filter: &BarcodeFilter, page: Page) -> ServiceResult<SearchPage> {
        let page = validate_page(page)?;
        let needle = match filter.code_contains.as_deref() {
            Some(query) => validate_search_query(query)?.and_then(|q| normalize_code(&q)),
            None => None,
        };

        let mut count: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM barcodes");
        push_filters(&mut count, filter, needle.as_deref());
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {BARCODE_COLUMNS} FROM barcodes"));
        push_filters(&mut select, filter, needle.as_deref());
        select
            .push(format!(" ORDER BY {CODE_ORDER} LIMIT "))
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let items = select.build_query_as::<Barcode>().fetch_all(&self.pool).await?;

        debug!(total, returned = items.len(), "Barcode search");
        Ok(SearchPage { items, total })
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &BarcodeFilter, needle: Option<&str>) {
    qb.push(" WHERE 1 = 1");

    if let Some(needle) = needle {
        qb.push(" AND code LIKE ")
            .push_bind(format!("%{}%", escape_like(needle)))
            .push(" ESCAPE '\\'");
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(barcode_type) = filter.barcode_type {
        qb.push(" AND barcode_type = ").push_bind(barcode_type);
    }
    if let Some(batch_id) = filter.batch_id.as_deref() {
        qb.push(" AND import_batch_id = ").push_bind(batch_id.to_string());
    }
}

/// Escapes LIKE wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// =============================================================================
// Unit Tests
// =============================================================================
