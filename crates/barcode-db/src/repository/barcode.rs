//! # Barcode Repository
//!
//! SQL for the `barcodes` table.
//!
//! Write helpers take `&mut SqliteConnection` so the services can run them
//! inside their own transaction (`&mut *tx`). Reads that never take part in
//! a transaction go through [`BarcodeRepository`] and the pool.
//!
//! ## Candidate Order
//! ```text
//! ORDER BY length(ltrim(code, '0')), ltrim(code, '0'), code
//!
//!   "99" < "0100" < "101" < "5012345678900"   (numeric order for digit codes)
//!
//! Backed by idx_barcodes_allocation on the same expressions.
//! ```
//!
//! Leading zeros are ignored the same way the legacy threshold ignores them;
//! `code` breaks ties between equal values such as "0100" and "100".

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use barcode_core::partition::AcceptedCode;
use barcode_core::{Barcode, BarcodeStatus, BarcodeType};

use crate::error::DbResult;

/// Column list matching [`Barcode`]'s `FromRow`.
pub(crate) const BARCODE_COLUMNS: &str = "id, code, barcode_type, status, owner_variant_id, \
     is_primary, assigned_at, import_batch_id, legacy_notes, created_at";

/// Rows per multi-row INSERT / IN (...) lookup. Keeps bind counts well under
/// SQLite's parameter limit.
const CHUNK: usize = 500;

/// Allocation order, shared by candidate windows and listings.
pub(crate) const CODE_ORDER: &str = "length(ltrim(code, '0')), ltrim(code, '0'), code";

/// Keyset position in [`CODE_ORDER`].
pub type CandidateKey = (i64, String, String);

/// Key of `code` in allocation order.
pub fn candidate_key(code: &str) -> CandidateKey {
    let value = code.trim_start_matches('0');
    (value.chars().count() as i64, value.to_string(), code.to_string())
}

// =============================================================================
// Pool-level reads
// =============================================================================

/// Read access to barcodes outside any transaction.
#[derive(Debug, Clone)]
pub struct BarcodeRepository {
    pool: SqlitePool,
}

impl BarcodeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BarcodeRepository { pool }
    }

    /// Gets a barcode by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Barcode>> {
        let mut conn = self.pool.acquire().await?;
        get_by_id(&mut conn, id).await
    }

    /// Gets a barcode by its normalized code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Barcode>> {
        let sql = format!("SELECT {BARCODE_COLUMNS} FROM barcodes WHERE code = ?1");
        let barcode = sqlx::query_as::<_, Barcode>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(barcode)
    }

    /// All barcodes currently assigned to a variant, primary first.
    pub async fn for_variant(&self, variant_id: &str) -> DbResult<Vec<Barcode>> {
        let sql = format!(
            "SELECT {BARCODE_COLUMNS} FROM barcodes \
             WHERE owner_variant_id = ?1 AND status = 'assigned' \
             ORDER BY is_primary DESC, {CODE_ORDER}"
        );
        let barcodes = sqlx::query_as::<_, Barcode>(&sql)
            .bind(variant_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(barcodes)
    }

    /// The variant's primary barcode, if any.
    pub async fn primary_for_variant(&self, variant_id: &str) -> DbResult<Option<Barcode>> {
        let sql = format!(
            "SELECT {BARCODE_COLUMNS} FROM barcodes \
             WHERE owner_variant_id = ?1 AND is_primary = 1"
        );
        let barcode = sqlx::query_as::<_, Barcode>(&sql)
            .bind(variant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(barcode)
    }

    /// Number of `available` rows of one type.
    pub async fn count_available(&self, barcode_type: BarcodeType) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM barcodes WHERE barcode_type = ?1 AND status = 'available'",
        )
        .bind(barcode_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Next window of `available` candidates after `after`, in allocation order.
    pub async fn candidates(
        &self,
        barcode_type: BarcodeType,
        after: Option<&CandidateKey>,
        limit: u32,
    ) -> DbResult<Vec<(String, String)>> {
        let (after_len, after_value, after_code) = match after {
            Some((len, value, code)) => (*len, value.as_str(), code.as_str()),
            None => (-1, "", ""),
        };

        let sql = format!(
            r#"
            SELECT id, code FROM barcodes
            WHERE barcode_type = ?1
              AND status = 'available'
              AND ({CODE_ORDER}) > (?2, ?3, ?4)
            ORDER BY {CODE_ORDER}
            LIMIT ?5
            "#
        );
        let rows: Vec<(String, String)> = sqlx::query_as(&sql)
            .bind(barcode_type)
            .bind(after_len)
            .bind(after_value)
            .bind(after_code)
            .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(
            barcode_type = %barcode_type,
            fetched = rows.len(),
            "Fetched allocation candidates"
        );
        Ok(rows)
    }
}

// =============================================================================
// Connection-level helpers (usable inside a transaction)
// =============================================================================

/// Gets a barcode by id on a given connection.
pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Barcode>> {
    let sql = format!("SELECT {BARCODE_COLUMNS} FROM barcodes WHERE id = ?1");
    let barcode = sqlx::query_as::<_, Barcode>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(barcode)
}

/// Current status of a barcode, if it exists.
pub async fn status_of(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<BarcodeStatus>> {
    let status = sqlx::query_scalar::<_, BarcodeStatus>("SELECT status FROM barcodes WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(status)
}

/// Returns which of `codes` already exist (any type, any status).
pub async fn existing_codes<'a, I>(conn: &mut SqliteConnection, codes: I) -> DbResult<HashSet<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let codes: Vec<&str> = codes.into_iter().collect();
    let mut found = HashSet::new();

    for chunk in codes.chunks(CHUNK) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT code FROM barcodes WHERE code IN (");
        let mut separated = qb.separated(", ");
        for code in chunk {
            separated.push_bind(code.to_string());
        }
        separated.push_unseparated(")");

        let rows: Vec<String> = qb.build_query_scalar().fetch_all(&mut *conn).await?;
        found.extend(rows);
    }

    Ok(found)
}

/// Inserts the accepted rows of one import batch.
///
/// Legacy rows carry `legacy_notes`; available rows never do.
pub async fn insert_accepted(
    conn: &mut SqliteConnection,
    batch_id: &str,
    barcode_type: BarcodeType,
    legacy_notes: Option<&str>,
    rows: &[AcceptedCode],
    now: DateTime<Utc>,
) -> DbResult<u64> {
    let mut inserted = 0;

    for chunk in rows.chunks(CHUNK) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO barcodes (id, code, barcode_type, status, owner_variant_id, \
             is_primary, assigned_at, import_batch_id, legacy_notes, created_at) ",
        );

        qb.push_values(chunk, |mut row, accepted| {
            let notes = match accepted.status {
                BarcodeStatus::LegacyArchive => legacy_notes.map(str::to_string),
                _ => None,
            };
            row.push_bind(Uuid::new_v4().to_string())
                .push_bind(accepted.code.clone())
                .push_bind(barcode_type)
                .push_bind(accepted.status)
                .push_bind(Option::<String>::None)
                .push_bind(false)
                .push_bind(Option::<DateTime<Utc>>::None)
                .push_bind(batch_id.to_string())
                .push_bind(notes)
                .push_bind(now);
        });

        inserted += qb.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(inserted)
}

/// Deletes `available` rows, optionally of one type. Never touches other statuses.
pub async fn delete_available(
    conn: &mut SqliteConnection,
    barcode_type: Option<BarcodeType>,
) -> DbResult<u64> {
    let result = match barcode_type {
        Some(barcode_type) => {
            sqlx::query("DELETE FROM barcodes WHERE status = 'available' AND barcode_type = ?1")
                .bind(barcode_type)
                .execute(&mut *conn)
                .await?
        }
        None => {
            sqlx::query("DELETE FROM barcodes WHERE status = 'available'")
                .execute(&mut *conn)
                .await?
        }
    };

    Ok(result.rows_affected())
}

/// Returns every barcode owned by `variant_id` to the pool.
///
/// ## Returns
/// The released codes in allocation order.
pub async fn release_owned(conn: &mut SqliteConnection, variant_id: &str) -> DbResult<Vec<String>> {
    let mut released: Vec<String> = sqlx::query_scalar(
        r#"
        UPDATE barcodes SET
            status = 'available',
            owner_variant_id = NULL,
            is_primary = 0,
            assigned_at = NULL
        WHERE owner_variant_id = ?1 AND status = 'assigned'
        RETURNING code
        "#,
    )
    .bind(variant_id)
    .fetch_all(&mut *conn)
    .await?;

    released.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    Ok(released)
}
