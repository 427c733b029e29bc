//! # Clean Slate Partitioning
//!
//! Pure planning half of an import. The database layer only has to answer
//! "which of these codes already exist?" and then write what the plan says.
//!
//! ## Two Phases
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Vec<CandidateCode>                                                     │
//! │       │                                                                 │
//! │       ▼  prepare()                                                      │
//! │  ┌───────────────────────────────────────────────┐                      │
//! │  │ normalize → format rule → in-file dedupe      │──► RowRejection      │
//! │  └───────────────────────┬───────────────────────┘    (Invalid/InFile)  │
//! │                          │ PreparedImport.codes()                       │
//! │                          ▼                                              │
//! │            store lookup (barcode-db, inside the txn)                    │
//! │                          │ HashSet<existing codes>                      │
//! │                          ▼  finalize()                                  │
//! │  ┌───────────────────────────────────────────────┐                      │
//! │  │ in-store dedupe → threshold partition         │──► RowRejection      │
//! │  └───────────────────────┬───────────────────────┘    (InStore)         │
//! │                          ▼                                              │
//! │                     ImportPlan                                          │
//! │       accepted: code ≤ threshold → LegacyArchive                        │
//! │                 code > threshold → Available                            │
//! │                 non-numeric      → Available                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use crate::error::{DuplicateScope, RowRejection};
use crate::parser::CandidateCode;
use crate::symbology::{normalize_code, numeric_value, FormatRules};
use crate::types::{BarcodeStatus, BarcodeType, ImportReport};

/// Decides the initial status of an accepted code.
///
/// The boundary is inclusive on the legacy side. Codes without a numeric
/// interpretation are never legacy.
///
/// ## Example
/// ```rust
/// use barcode_core::partition::classify;
/// use barcode_core::BarcodeStatus;
///
/// assert_eq!(classify("40000", 40000), BarcodeStatus::LegacyArchive);
/// assert_eq!(classify("40001", 40000), BarcodeStatus::Available);
/// assert_eq!(classify("ABC123", u64::MAX), BarcodeStatus::Available);
/// ```
pub fn classify(code: &str, legacy_threshold: u64) -> BarcodeStatus {
    match numeric_value(code) {
        Some(value) if value <= u128::from(legacy_threshold) => BarcodeStatus::LegacyArchive,
        _ => BarcodeStatus::Available,
    }
}

// =============================================================================
// Phase 1: Prepare
// =============================================================================

/// Candidates that survived normalization, format checks and in-file dedupe.
#[derive(Debug, Clone)]
pub struct PreparedImport {
    total_processed: usize,
    codes: Vec<(usize, String)>,
    rejections: Vec<RowRejection>,
}

/// Normalizes, validates and dedupes candidates within the file.
///
/// The first occurrence of a code wins; later rows are rejected as
/// [`DuplicateScope::InFile`].
pub fn prepare(
    candidates: Vec<CandidateCode>,
    barcode_type: BarcodeType,
    validate_format: bool,
    rules: &FormatRules,
) -> PreparedImport {
    let total_processed = candidates.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(candidates.len());
    let mut codes = Vec::with_capacity(candidates.len());
    let mut rejections = Vec::new();

    for CandidateCode { row, raw } in candidates {
        let Some(code) = normalize_code(&raw) else {
            rejections.push(RowRejection::Invalid {
                row,
                raw,
                reason: "empty after normalization".to_string(),
            });
            continue;
        };

        if validate_format {
            if let Err(reason) = rules.check(barcode_type, &code) {
                rejections.push(RowRejection::Invalid { row, raw, reason });
                continue;
            }
        }

        if !seen.insert(code.clone()) {
            rejections.push(RowRejection::Duplicate {
                row,
                code,
                scope: DuplicateScope::InFile,
            });
            continue;
        }

        codes.push((row, code));
    }

    PreparedImport {
        total_processed,
        codes,
        rejections,
    }
}

impl PreparedImport {
    /// Distinct normalized codes still in play, for the store lookup.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(|(_, code)| code.as_str())
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Drops codes already in the store and partitions the rest.
    pub fn finalize(self, existing: &HashSet<String>, legacy_threshold: u64) -> ImportPlan {
        let PreparedImport {
            total_processed,
            codes,
            mut rejections,
        } = self;

        let mut accepted = Vec::with_capacity(codes.len());
        for (row, code) in codes {
            if existing.contains(&code) {
                rejections.push(RowRejection::Duplicate {
                    row,
                    code,
                    scope: DuplicateScope::InStore,
                });
                continue;
            }
            let status = classify(&code, legacy_threshold);
            accepted.push(AcceptedCode { row, code, status });
        }

        rejections.sort_by_key(RowRejection::row);

        ImportPlan {
            total_processed,
            accepted,
            rejections,
        }
    }
}

// =============================================================================
// Phase 2: Plan
// =============================================================================

/// A code that will be inserted, with its initial status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedCode {
    pub row: usize,
    pub code: String,
    pub status: BarcodeStatus,
}

/// Everything the importer needs to write one batch.
#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub total_processed: usize,
    pub accepted: Vec<AcceptedCode>,
    /// Sorted by source row.
    pub rejections: Vec<RowRejection>,
}

impl ImportPlan {
    pub fn available_count(&self) -> usize {
        self.count_status(BarcodeStatus::Available)
    }

    pub fn legacy_count(&self) -> usize {
        self.count_status(BarcodeStatus::LegacyArchive)
    }

    pub fn duplicate_count(&self) -> usize {
        self.rejections.iter().filter(|r| r.is_duplicate()).count()
    }

    pub fn invalid_count(&self) -> usize {
        self.rejections.len() - self.duplicate_count()
    }

    fn count_status(&self, status: BarcodeStatus) -> usize {
        self.accepted.iter().filter(|a| a.status == status).count()
    }

    /// Builds the caller-facing report, keeping the first `error_limit` messages.
    pub fn report(&self, batch_id: &str, cleared: u64, error_limit: usize) -> ImportReport {
        ImportReport {
            batch_id: batch_id.to_string(),
            total_processed: self.total_processed,
            imported: self.accepted.len(),
            available: self.available_count(),
            legacy: self.legacy_count(),
            duplicates: self.duplicate_count(),
            invalid: self.invalid_count(),
            cleared,
            errors: self
                .rejections
                .iter()
                .take(error_limit)
                .map(ToString::to_string)
                .collect(),
            error_count: self.rejections.len(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
