//! # Allocation Service
//!
//! Hands pool codes to variants and takes them back.
//!
//! ## Assignment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  assign(variant, type, preferred?)                                      │
//! │                                                                         │
//! │  preferred code given                                                   │
//! │    UPDATE … WHERE code = ? AND barcode_type = ? AND status='available'  │
//! │    0 rows → CodeUnavailable (never falls back to another code)          │
//! │                                                                         │
//! │  no preferred code                                                      │
//! │    budget = COUNT(available of type)        0 → PoolExhausted           │
//! │    loop over windows of candidates in ascending code order:            │
//! │      UPDATE … WHERE id = ? AND status='available'                       │
//! │        1 row  → done                                                    │
//! │        0 rows → another caller won this code, try the next one         │
//! │    budget spent or no candidates left → PoolExhausted                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each claim is a single conditional UPDATE, so two callers can never both
//! win the same row and nothing is held between candidates. The claim sets
//! `is_primary` when the variant has no primary yet. It also requires the
//! variant row to exist, so a variant deleted mid-call never ends up owning
//! a code: the failed claim reports `VariantNotFound`.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use barcode_core::symbology::normalize_code;
use barcode_core::{
    Barcode, BarcodeStatus, BarcodeType, CoreError, ReleaseOutcome, ReleaseReason,
};

use crate::error::ServiceResult;
use crate::repository::barcode::{
    self, candidate_key, BarcodeRepository, CandidateKey, BARCODE_COLUMNS,
};
use crate::repository::catalog::CatalogRepository;

/// How often `release` re-reads a row that stayed `assigned` after the update.
const RELEASE_ATTEMPTS: usize = 3;

/// Assignment, primary selection and release.
#[derive(Debug, Clone)]
pub struct AllocationService {
    pool: SqlitePool,
    barcodes: BarcodeRepository,
    catalog: CatalogRepository,
    candidate_window: u32,
}

impl AllocationService {
    pub fn new(pool: SqlitePool, candidate_window: u32) -> Self {
        AllocationService {
            barcodes: BarcodeRepository::new(pool.clone()),
            catalog: CatalogRepository::new(pool.clone()),
            pool,
            candidate_window: candidate_window.max(1),
        }
    }

    // =========================================================================
    // Assign
    // =========================================================================

    /// Assigns a code of `barcode_type` to `variant_id`.
    ///
    /// With `preferred_code`, exactly that code is claimed or the call fails.
    /// Without it, the lowest available code of the type is claimed.
    ///
    /// ## Errors
    /// - `VariantNotFound` if the variant does not exist
    /// - `CodeUnavailable` if the preferred code is not available for this type
    /// - `PoolExhausted` if no code of the type could be claimed
    pub async fn assign(
        &self,
        variant_id: &str,
        barcode_type: BarcodeType,
        preferred_code: Option<&str>,
    ) -> ServiceResult<Barcode> {
        self.ensure_variant(variant_id).await?;

        match preferred_code {
            Some(raw) => self.assign_preferred(variant_id, barcode_type, raw).await,
            None => self.assign_next(variant_id, barcode_type).await,
        }
    }

    async fn assign_preferred(
        &self,
        variant_id: &str,
        barcode_type: BarcodeType,
        raw: &str,
    ) -> ServiceResult<Barcode> {
        let code = normalize_code(raw).ok_or_else(|| CoreError::CodeUnavailable {
            code: raw.trim().to_string(),
        })?;

        let sql = format!(
            r#"
            UPDATE barcodes SET
                status = 'assigned',
                owner_variant_id = ?1,
                assigned_at = ?2,
                is_primary = NOT EXISTS (
                    SELECT 1 FROM barcodes WHERE owner_variant_id = ?1 AND is_primary = 1
                )
            WHERE code = ?3 AND barcode_type = ?4 AND status = 'available'
              AND EXISTS (SELECT 1 FROM product_variants WHERE id = ?1)
            RETURNING {BARCODE_COLUMNS}
            "#
        );

        let claimed = sqlx::query_as::<_, Barcode>(&sql)
            .bind(variant_id)
            .bind(Utc::now())
            .bind(&code)
            .bind(barcode_type)
            .fetch_optional(&self.pool)
            .await?;

        match claimed {
            Some(barcode) => {
                info!(
                    variant_id = %variant_id,
                    code = %barcode.code,
                    is_primary = barcode.is_primary,
                    "Assigned preferred barcode"
                );
                Ok(barcode)
            }
            None => {
                self.ensure_variant(variant_id).await?;
                debug!(code = %code, "Preferred barcode not available");
                Err(CoreError::CodeUnavailable { code }.into())
            }
        }
    }

    async fn assign_next(&self, variant_id: &str, barcode_type: BarcodeType) -> ServiceResult<Barcode> {
        let exhausted = || CoreError::PoolExhausted { barcode_type };

        let budget = self.barcodes.count_available(barcode_type).await?;
        if budget == 0 {
            warn!(barcode_type = %barcode_type, "Barcode pool exhausted");
            return Err(exhausted().into());
        }

        let mut attempts: i64 = 0;
        let mut after: Option<CandidateKey> = None;

        loop {
            let window = self
                .barcodes
                .candidates(barcode_type, after.as_ref(), self.candidate_window)
                .await?;
            if window.is_empty() {
                break;
            }

            for (id, code) in &window {
                attempts += 1;
                if let Some(barcode) = self.claim(id, variant_id).await? {
                    info!(
                        variant_id = %variant_id,
                        code = %barcode.code,
                        is_primary = barcode.is_primary,
                        attempts,
                        "Assigned barcode"
                    );
                    return Ok(barcode);
                }

                self.ensure_variant(variant_id).await?;
                warn!(code = %code, "Candidate claimed concurrently, trying next");
                if attempts >= budget {
                    warn!(barcode_type = %barcode_type, attempts, "Gave up after exhausting candidates");
                    return Err(exhausted().into());
                }
            }

            after = window.last().map(|(_, code)| candidate_key(code));
        }

        warn!(barcode_type = %barcode_type, "Barcode pool exhausted");
        Err(exhausted().into())
    }

    /// Fails with `VariantNotFound` once the variant is gone.
    ///
    /// Claims also require the variant row, so a deletion that commits
    /// mid-assignment turns a failed claim into this error instead of a retry.
    async fn ensure_variant(&self, variant_id: &str) -> ServiceResult<()> {
        if self.catalog.variant_exists(variant_id).await? {
            Ok(())
        } else {
            Err(CoreError::VariantNotFound(variant_id.to_string()).into())
        }
    }

    /// Claims one candidate row if it is still `available` and the variant
    /// still exists.
    async fn claim(&self, id: &str, variant_id: &str) -> ServiceResult<Option<Barcode>> {
        let sql = format!(
            r#"
            UPDATE barcodes SET
                status = 'assigned',
                owner_variant_id = ?1,
                assigned_at = ?2,
                is_primary = NOT EXISTS (
                    SELECT 1 FROM barcodes WHERE owner_variant_id = ?1 AND is_primary = 1
                )
            WHERE id = ?3 AND status = 'available'
              AND EXISTS (SELECT 1 FROM product_variants WHERE id = ?1)
            RETURNING {BARCODE_COLUMNS}
            "#
        );

        let claimed = sqlx::query_as::<_, Barcode>(&sql)
            .bind(variant_id)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(claimed)
    }

    // =========================================================================
    // Primary
    // =========================================================================

    /// Makes `barcode_id` the variant's primary code, demoting the old one.
    ///
    /// ## Errors
    /// - `BarcodeNotFound` if the id does not exist
    /// - `NotOwnedByVariant` if the code is not assigned to `variant_id`
    pub async fn set_primary(&self, variant_id: &str, barcode_id: &str) -> ServiceResult<Barcode> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE barcodes SET is_primary = 0 \
             WHERE owner_variant_id = ?1 AND is_primary = 1 AND id <> ?2",
        )
        .bind(variant_id)
        .bind(barcode_id)
        .execute(&mut *tx)
        .await?;

        let sql = format!(
            "UPDATE barcodes SET is_primary = 1 \
             WHERE id = ?1 AND owner_variant_id = ?2 AND status = 'assigned' \
             RETURNING {BARCODE_COLUMNS}"
        );
        let promoted = sqlx::query_as::<_, Barcode>(&sql)
            .bind(barcode_id)
            .bind(variant_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(barcode) = promoted else {
            let existing = barcode::get_by_id(&mut tx, barcode_id).await?;
            tx.rollback().await?;
            return Err(match existing {
                None => CoreError::BarcodeNotFound(barcode_id.to_string()),
                Some(_) => CoreError::NotOwnedByVariant {
                    barcode_id: barcode_id.to_string(),
                    variant_id: variant_id.to_string(),
                },
            }
            .into());
        };

        tx.commit().await?;
        info!(variant_id = %variant_id, code = %barcode.code, "Primary barcode changed");
        Ok(barcode)
    }

    // =========================================================================
    // Release
    // =========================================================================

    /// Returns one code to the pool.
    ///
    /// Idempotent: releasing an `available` code changes nothing and reports
    /// [`ReleaseOutcome::AlreadyAvailable`].
    ///
    /// ## Errors
    /// - `BarcodeNotFound` if the id does not exist
    pub async fn release(&self, barcode_id: &str, reason: ReleaseReason) -> ServiceResult<ReleaseOutcome> {
        for _ in 0..RELEASE_ATTEMPTS {
            let result = sqlx::query(
                r#"
                UPDATE barcodes SET
                    status = 'available',
                    owner_variant_id = NULL,
                    is_primary = 0,
                    assigned_at = NULL
                WHERE id = ?1 AND status = 'assigned'
                "#,
            )
            .bind(barcode_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 1 {
                info!(barcode_id = %barcode_id, %reason, "Released barcode");
                return Ok(ReleaseOutcome::Released);
            }

            let mut conn = self.pool.acquire().await?;
            match barcode::status_of(&mut conn, barcode_id).await? {
                None => return Err(CoreError::BarcodeNotFound(barcode_id.to_string()).into()),
                Some(BarcodeStatus::Available) => {
                    debug!(barcode_id = %barcode_id, "Barcode already available");
                    return Ok(ReleaseOutcome::AlreadyAvailable);
                }
                Some(status @ (BarcodeStatus::Reserved | BarcodeStatus::LegacyArchive)) => {
                    debug!(barcode_id = %barcode_id, %status, "Barcode is not releasable");
                    return Ok(ReleaseOutcome::NotReleasable(status));
                }
                // Re-assigned between the update and the read.
                Some(BarcodeStatus::Assigned) => continue,
            }
        }

        Err(CoreError::InvalidTransition {
            barcode_id: barcode_id.to_string(),
            status: BarcodeStatus::Assigned,
            operation: "release",
        }
        .into())
    }

    /// Releases every code owned by a variant in one statement.
    ///
    /// ## Returns
    /// The released codes in allocation order.
    pub async fn release_all_for_variant(
        &self,
        variant_id: &str,
        reason: ReleaseReason,
    ) -> ServiceResult<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        let released = barcode::release_owned(&mut conn, variant_id).await?;

        info!(
            variant_id = %variant_id,
            %reason,
            count = released.len(),
            "Released all barcodes for variant"
        );
        Ok(released)
    }

    /// Codes currently assigned to a variant, primary first.
    pub async fn barcodes_for_variant(&self, variant_id: &str) -> ServiceResult<Vec<Barcode>> {
        Ok(self.barcodes.for_variant(variant_id).await?)
    }

    /// The variant's primary code, if any.
    pub async fn primary_for_variant(&self, variant_id: &str) -> ServiceResult<Option<Barcode>> {
        Ok(self.barcodes.primary_for_variant(variant_id).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::repository::catalog::NewVariant;
    use crate::{Database, DbConfig};
    use barcode_core::parser::FileFormat;
    use barcode_core::{DeletionReason, ImportRequest};

    async fn setup(codes: &[&str], window: u32) -> (Database, String) {
        let db = Database::new(DbConfig::in_memory().candidate_window(window))
            .await
            .unwrap();
        db.importer()
            .import_bytes(
                "pool.txt",
                codes.join("\n").as_bytes(),
                FileFormat::Lines,
                ImportRequest::new(BarcodeType::Ean13, 0).validate_format(false),
            )
            .await
            .unwrap();
        let variant_id = new_variant(&db, "SHIRT-1").await;
        (db, variant_id)
    }

    async fn new_variant(db: &Database, sku: &str) -> String {
        let product = db.catalog().create_product("Shirt").await.unwrap();
        db.catalog()
            .create_variant(&product.id, NewVariant::new(sku))
            .await
            .unwrap()
            .id
    }

    fn domain(err: ServiceError) -> CoreError {
        match err {
            ServiceError::Domain(err) => err,
            other => panic!("expected domain error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_claim_requires_live_variant() {
        let (db, variant_id) = setup(&["100", "200"], 4).await;
        let allocation = db.allocation();
        let candidates = allocation
            .barcodes
            .candidates(BarcodeType::Ean13, None, 4)
            .await
            .unwrap();

        sqlx::query("DELETE FROM product_variants WHERE id = ?1")
            .bind(&variant_id)
            .execute(db.pool())
            .await
            .unwrap();

        let claimed = allocation.claim(&candidates[0].0, &variant_id).await.unwrap();
        assert!(claimed.is_none());

        let row = allocation.barcodes.get_by_code("100").await.unwrap().unwrap();
        assert_eq!(row.status, BarcodeStatus::Available);
        assert_eq!(row.owner_variant_id, None);
    }

    #[tokio::test]
    async fn test_assigns_lowest_code_first() {
        let (db, variant) = setup(&["5012345678900", "100", "99"], 16).await;
        let allocation = db.allocation();

        let first = allocation.assign(&variant, BarcodeType::Ean13, None).await.unwrap();
        assert_eq!(first.code, "99");
        assert_eq!(first.status, BarcodeStatus::Assigned);
        assert_eq!(first.owner_variant_id.as_deref(), Some(variant.as_str()));
        assert!(first.is_primary);
        assert!(first.assigned_at.is_some());

        let second = allocation.assign(&variant, BarcodeType::Ean13, None).await.unwrap();
        assert_eq!(second.code, "100");
        assert!(!second.is_primary);
    }

    #[tokio::test]
    async fn test_small_window_pages_through_candidates() {
        let (db, variant) = setup(&["3", "1", "2"], 1).await;
        let allocation = db.allocation();

        let codes: Vec<String> = {
            let mut out = Vec::new();
            for _ in 0..3 {
                out.push(allocation.assign(&variant, BarcodeType::Ean13, None).await.unwrap().code);
            }
            out
        };
        assert_eq!(codes, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_leading_zeros_do_not_change_order() {
        let (db, variant) = setup(&["100", "0050", "00101"], 1).await;
        let allocation = db.allocation();

        let mut codes = Vec::new();
        for _ in 0..3 {
            codes.push(allocation.assign(&variant, BarcodeType::Ean13, None).await.unwrap().code);
        }
        assert_eq!(codes, vec!["0050", "100", "00101"]);
    }

    #[tokio::test]
    async fn test_exhausted_pool() {
        let (db, variant) = setup(&["100"], 16).await;
        let allocation = db.allocation();

        allocation.assign(&variant, BarcodeType::Ean13, None).await.unwrap();
        let err = allocation.assign(&variant, BarcodeType::Ean13, None).await.unwrap_err();
        assert!(matches!(domain(err), CoreError::PoolExhausted { .. }));

        let err = allocation.assign(&variant, BarcodeType::UpcA, None).await.unwrap_err();
        assert!(matches!(
            domain(err),
            CoreError::PoolExhausted {
                barcode_type: BarcodeType::UpcA
            }
        ));
    }

    #[tokio::test]
    async fn test_never_assigns_legacy_codes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.importer()
            .import_bytes(
                "old.txt",
                b"10\n20",
                FileFormat::Lines,
                ImportRequest::new(BarcodeType::Ean13, 50).validate_format(false),
            )
            .await
            .unwrap();
        let variant = new_variant(&db, "OLD-1").await;

        let err = db
            .allocation()
            .assign(&variant, BarcodeType::Ean13, None)
            .await
            .unwrap_err();
        assert!(matches!(domain(err), CoreError::PoolExhausted { .. }));

        let err = db
            .allocation()
            .assign(&variant, BarcodeType::Ean13, Some("10"))
            .await
            .unwrap_err();
        assert!(matches!(domain(err), CoreError::CodeUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_preferred_code() {
        let (db, variant) = setup(&["100", "200", "300"], 16).await;
        let allocation = db.allocation();

        let barcode = allocation
            .assign(&variant, BarcodeType::Ean13, Some(" 2-00 "))
            .await
            .unwrap();
        assert_eq!(barcode.code, "200");
        assert!(barcode.is_primary);

        let other = new_variant(&db, "SHIRT-2").await;
        let err = allocation
            .assign(&other, BarcodeType::Ean13, Some("200"))
            .await
            .unwrap_err();
        assert!(matches!(domain(err), CoreError::CodeUnavailable { code } if code == "200"));

        let err = allocation
            .assign(&other, BarcodeType::Ean8, Some("300"))
            .await
            .unwrap_err();
        assert!(matches!(domain(err), CoreError::CodeUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_unknown_variant() {
        let (db, _) = setup(&["100"], 16).await;
        let err = db
            .allocation()
            .assign("not-a-variant", BarcodeType::Ean13, None)
            .await
            .unwrap_err();
        assert!(matches!(domain(err), CoreError::VariantNotFound(_)));
        assert_eq!(db.queries().stats().await.unwrap().available(BarcodeType::Ean13), 1);
    }

    #[tokio::test]
    async fn test_set_primary_moves_flag() {
        let (db, variant) = setup(&["100", "200"], 16).await;
        let allocation = db.allocation();

        let first = allocation.assign(&variant, BarcodeType::Ean13, None).await.unwrap();
        let second = allocation.assign(&variant, BarcodeType::Ean13, None).await.unwrap();

        let promoted = allocation.set_primary(&variant, &second.id).await.unwrap();
        assert!(promoted.is_primary);

        let primary = allocation.primary_for_variant(&variant).await.unwrap().unwrap();
        assert_eq!(primary.id, second.id);

        let all = allocation.barcodes_for_variant(&variant).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert!(!all.iter().any(|b| b.id == first.id && b.is_primary));
    }

    #[tokio::test]
    async fn test_set_primary_errors_leave_primary_untouched() {
        let (db, variant) = setup(&["100", "200"], 16).await;
        let allocation = db.allocation();
        let owned = allocation.assign(&variant, BarcodeType::Ean13, None).await.unwrap();
        let unowned = db.queries().find_by_code("200").await.unwrap().unwrap();

        let err = allocation.set_primary(&variant, &unowned.id).await.unwrap_err();
        assert!(matches!(domain(err), CoreError::NotOwnedByVariant { .. }));

        let err = allocation.set_primary(&variant, "missing").await.unwrap_err();
        assert!(matches!(domain(err), CoreError::BarcodeNotFound(_)));

        let primary = allocation.primary_for_variant(&variant).await.unwrap().unwrap();
        assert_eq!(primary.id, owned.id);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let (db, variant) = setup(&["100"], 16).await;
        let allocation = db.allocation();
        let barcode = allocation.assign(&variant, BarcodeType::Ean13, None).await.unwrap();

        let outcome = allocation.release(&barcode.id, ReleaseReason::Manual).await.unwrap();
        assert_eq!(outcome, ReleaseOutcome::Released);

        let outcome = allocation.release(&barcode.id, ReleaseReason::Manual).await.unwrap();
        assert_eq!(outcome, ReleaseOutcome::AlreadyAvailable);

        let row = db.queries().find_by_code("100").await.unwrap().unwrap();
        assert_eq!(row.status, BarcodeStatus::Available);
        assert_eq!(row.owner_variant_id, None);
        assert!(!row.is_primary);
        assert_eq!(row.assigned_at, None);
    }

    #[tokio::test]
    async fn test_release_refuses_legacy_and_unknown() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.importer()
            .import_bytes(
                "old.txt",
                b"10",
                FileFormat::Lines,
                ImportRequest::new(BarcodeType::Ean13, 50).validate_format(false),
            )
            .await
            .unwrap();
        let legacy = db.queries().find_by_code("10").await.unwrap().unwrap();

        let outcome = db
            .allocation()
            .release(&legacy.id, ReleaseReason::Manual)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReleaseOutcome::NotReleasable(BarcodeStatus::LegacyArchive)
        );

        let err = db
            .allocation()
            .release("missing", ReleaseReason::Manual)
            .await
            .unwrap_err();
        assert!(matches!(domain(err), CoreError::BarcodeNotFound(_)));
    }

    #[tokio::test]
    async fn test_released_code_is_reused_and_primary_recomputed() {
        let (db, variant) = setup(&["100", "200"], 16).await;
        let allocation = db.allocation();

        let first = allocation.assign(&variant, BarcodeType::Ean13, None).await.unwrap();
        allocation.release(&first.id, ReleaseReason::Reassigned).await.unwrap();

        let again = allocation.assign(&variant, BarcodeType::Ean13, None).await.unwrap();
        assert_eq!(again.code, "100");
        assert!(again.is_primary);
    }

    #[tokio::test]
    async fn test_release_all_for_variant() {
        let (db, variant) = setup(&["100", "200", "300"], 16).await;
        let allocation = db.allocation();
        allocation.assign(&variant, BarcodeType::Ean13, None).await.unwrap();
        allocation.assign(&variant, BarcodeType::Ean13, None).await.unwrap();

        let released = allocation
            .release_all_for_variant(
                &variant,
                ReleaseReason::VariantDeleted(DeletionReason::Discontinued),
            )
            .await
            .unwrap();
        assert_eq!(released, vec!["100", "200"]);
        assert!(allocation.barcodes_for_variant(&variant).await.unwrap().is_empty());
        assert_eq!(db.queries().stats().await.unwrap().available(BarcodeType::Ean13), 3);
    }
}
