//! # Domain Types
//!
//! Core domain types used throughout the barcode pool.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌──────────────────────┐  │
//! │  │    Barcode      │   │  ImportBatch    │   │ DeletedVariantArchive│  │
//! │  │  ─────────────  │   │  ─────────────  │   │  ──────────────────  │  │
//! │  │  id (UUID)      │   │  batch_id       │   │  variant_sku         │  │
//! │  │  code (unique)  │   │  legacy_thresh. │   │  primary_barcode     │  │
//! │  │  status         │   │  counts         │   │  deletion_reason     │  │
//! │  │  owner_variant  │   └─────────────────┘   └──────────────────────┘  │
//! │  │  is_primary     │                                                    │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  BarcodeStatus  │   │  BarcodeType    │   │ DeletionReason  │       │
//! │  │  Available      │   │  Ean13 / Ean8   │   │  Discontinued   │       │
//! │  │  Assigned       │   │  UpcA / Itf14   │   │  Duplicate ...  │       │
//! │  │  Reserved       │   │  Gs1128         │   └─────────────────┘       │
//! │  │  LegacyArchive  │   └─────────────────┘                              │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Barcode Invariants
//! 1. `code` is unique across the whole store, regardless of type.
//! 2. `status == Assigned` ⇔ `owner_variant_id.is_some()`.
//! 3. At most one `is_primary` barcode per owner.
//! 4. `LegacyArchive` rows are never owned and never allocated.
//! 5. `import_batch_id` is set once at import and never changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Barcode Status
// =============================================================================

/// Lifecycle state of a barcode.
///
/// ## State Machine
/// ```text
///   import ──► Available ──assign──► Assigned
///                 ▲   │                 │
///                 │   └──(external)──► Reserved
///                 └──────release────────┘
///
///   import ──► LegacyArchive   (terminal, never allocated)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BarcodeStatus {
    /// In the pool, selectable by allocation.
    Available,
    /// Held by exactly one variant.
    Assigned,
    /// External hold; excluded from allocation. No engine transition sets it.
    Reserved,
    /// Low-quality/legacy code kept for record-keeping only.
    LegacyArchive,
}

impl BarcodeStatus {
    /// All statuses, in display order.
    pub const ALL: [BarcodeStatus; 4] = [
        BarcodeStatus::Available,
        BarcodeStatus::Assigned,
        BarcodeStatus::Reserved,
        BarcodeStatus::LegacyArchive,
    ];

    /// Stored/serialized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BarcodeStatus::Available => "available",
            BarcodeStatus::Assigned => "assigned",
            BarcodeStatus::Reserved => "reserved",
            BarcodeStatus::LegacyArchive => "legacy_archive",
        }
    }
}

impl std::fmt::Display for BarcodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BarcodeStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BarcodeStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: BarcodeStatus::ALL
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect(),
            })
    }
}

// =============================================================================
// Barcode Type
// =============================================================================

/// Barcode symbology.
///
/// Format rules per symbology live in [`crate::symbology`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum BarcodeType {
    #[serde(rename = "ean13")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "ean13"))]
    Ean13,
    #[serde(rename = "ean8")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "ean8"))]
    Ean8,
    #[serde(rename = "upc_a")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "upc_a"))]
    UpcA,
    #[serde(rename = "itf14")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "itf14"))]
    Itf14,
    #[serde(rename = "gs1_128")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "gs1_128"))]
    Gs1128,
}

impl BarcodeType {
    /// All supported symbologies.
    pub const ALL: [BarcodeType; 5] = [
        BarcodeType::Ean13,
        BarcodeType::Ean8,
        BarcodeType::UpcA,
        BarcodeType::Itf14,
        BarcodeType::Gs1128,
    ];

    /// Stored/serialized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BarcodeType::Ean13 => "ean13",
            BarcodeType::Ean8 => "ean8",
            BarcodeType::UpcA => "upc_a",
            BarcodeType::Itf14 => "itf14",
            BarcodeType::Gs1128 => "gs1_128",
        }
    }

    /// Human-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            BarcodeType::Ean13 => "EAN-13",
            BarcodeType::Ean8 => "EAN-8",
            BarcodeType::UpcA => "UPC-A",
            BarcodeType::Itf14 => "ITF-14",
            BarcodeType::Gs1128 => "GS1-128",
        }
    }
}

impl std::fmt::Display for BarcodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for BarcodeType {
    type Err = ValidationError;

    /// Accepts the stored name or the label, ignoring case, hyphens and underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        match key.as_str() {
            "ean13" | "gtin13" => Ok(BarcodeType::Ean13),
            "ean8" | "gtin8" => Ok(BarcodeType::Ean8),
            "upca" | "upc" | "gtin12" => Ok(BarcodeType::UpcA),
            "itf14" | "gtin14" => Ok(BarcodeType::Itf14),
            "gs1128" | "ucc128" => Ok(BarcodeType::Gs1128),
            _ => Err(ValidationError::NotAllowed {
                field: "barcode_type".to_string(),
                allowed: BarcodeType::ALL
                    .iter()
                    .map(|t| t.as_str().to_string())
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Barcode
// =============================================================================

/// One code in the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Barcode {
    /// Unique identifier (UUID v4), immutable.
    pub id: String,

    /// Normalized code, unique across the store.
    pub code: String,

    pub barcode_type: BarcodeType,

    pub status: BarcodeStatus,

    /// Set iff `status == Assigned`.
    pub owner_variant_id: Option<String>,

    /// Display barcode of the owner. Meaningful only while assigned.
    pub is_primary: bool,

    #[ts(as = "Option<String>")]
    pub assigned_at: Option<DateTime<Utc>>,

    /// Batch that created this row.
    pub import_batch_id: String,

    /// Only set for `LegacyArchive` rows.
    pub legacy_notes: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Barcode {
    /// Returns true if allocation may select this barcode.
    #[inline]
    pub fn is_available(&self) -> bool {
        self.status == BarcodeStatus::Available
    }

    /// Returns true if `variant_id` currently owns this barcode.
    pub fn is_owned_by(&self, variant_id: &str) -> bool {
        self.status == BarcodeStatus::Assigned
            && self.owner_variant_id.as_deref() == Some(variant_id)
    }
}

// =============================================================================
// Products & Variants (external collaborators)
// =============================================================================

/// Minimal product record. Product CRUD lives outside the engine.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A sellable variant of a product (e.g., colour × size).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Variant {
    pub id: String,
    pub product_id: String,
    /// Stock Keeping Unit, e.g. `026-RED-120`.
    pub sku: String,
    pub color: Option<String>,
    pub size: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Import
// =============================================================================

/// Switches for one import call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ImportOptions {
    /// Delete every `available` row of the import's type first (same transaction).
    pub clear_existing: bool,
    /// Apply the symbology's format rule to each candidate.
    pub validate_format: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            clear_existing: false,
            validate_format: true,
        }
    }
}

/// Clean Slate Strategy parameters for one import call.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ImportRequest {
    pub barcode_type: BarcodeType,
    /// Codes numerically `<=` this value become `legacy_archive`.
    pub legacy_threshold: u64,
    /// Attached to every legacy row of the batch.
    pub legacy_notes: Option<String>,
    pub options: ImportOptions,
}

impl ImportRequest {
    /// Creates a request with default options and no notes.
    pub fn new(barcode_type: BarcodeType, legacy_threshold: u64) -> Self {
        ImportRequest {
            barcode_type,
            legacy_threshold,
            legacy_notes: None,
            options: ImportOptions::default(),
        }
    }

    /// Sets the notes attached to legacy rows.
    pub fn legacy_notes(mut self, notes: impl Into<String>) -> Self {
        self.legacy_notes = Some(notes.into());
        self
    }

    /// Sets whether existing `available` rows are cleared first.
    pub fn clear_existing(mut self, clear: bool) -> Self {
        self.options.clear_existing = clear;
        self
    }

    /// Sets whether format rules are applied.
    pub fn validate_format(mut self, validate: bool) -> Self {
        self.options.validate_format = validate;
        self
    }
}

/// Outcome of one import call.
///
/// Row-level rejections do not fail the call; they are counted here and the
/// first `N` messages are kept in `errors`. `error_count` is always the full
/// count.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ImportReport {
    /// Shared by every row written by this call.
    pub batch_id: String,
    /// Candidate codes read from the file.
    pub total_processed: usize,
    /// Rows inserted (available + legacy).
    pub imported: usize,
    pub available: usize,
    pub legacy: usize,
    pub duplicates: usize,
    pub invalid: usize,
    /// `available` rows deleted by `clear_existing`.
    pub cleared: u64,
    /// First N row-level messages.
    pub errors: Vec<String>,
    /// Total row-level messages, even when `errors` is truncated.
    pub error_count: usize,
}

impl ImportReport {
    /// Returns true when `errors` holds fewer messages than occurred.
    pub fn errors_truncated(&self) -> bool {
        self.error_count > self.errors.len()
    }
}

/// Summary of one import call, as recorded at commit time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ImportBatch {
    pub batch_id: String,
    pub barcode_type: BarcodeType,
    pub legacy_threshold: i64,
    pub legacy_notes: Option<String>,
    pub clear_existing: bool,
    pub validate_format: bool,
    /// File name the batch was read from, when known.
    pub source_name: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub total_processed: i64,
    pub imported_count: i64,
    pub available_count: i64,
    pub legacy_count: i64,
    pub duplicate_count: i64,
    pub invalid_count: i64,
    pub cleared_count: i64,
}

// =============================================================================
// Release
// =============================================================================

/// Why a barcode is being returned to the pool. Logged, never stored on the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum ReleaseReason {
    /// Owner variant is being deleted.
    VariantDeleted(DeletionReason),
    /// Operator released it explicitly.
    Manual,
    /// Freed so the variant can take a different code.
    Reassigned,
}

impl std::fmt::Display for ReleaseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReleaseReason::VariantDeleted(reason) => write!(f, "variant_deleted:{}", reason),
            ReleaseReason::Manual => write!(f, "manual"),
            ReleaseReason::Reassigned => write!(f, "reassigned"),
        }
    }
}

/// Result of a `release` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// Was `assigned`, now `available`.
    Released,
    /// Already `available`; nothing changed.
    AlreadyAvailable,
    /// `reserved` or `legacy_archive`; nothing changed.
    NotReleasable(BarcodeStatus),
}

// =============================================================================
// Deletion Archive
// =============================================================================

/// Why a variant was deleted. Fixed list offered by the deletion workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DeletionReason {
    Discontinued,
    OutOfStock,
    Duplicate,
    DataError,
    Seasonal,
    SupplierChange,
    Other,
}

impl DeletionReason {
    pub const ALL: [DeletionReason; 7] = [
        DeletionReason::Discontinued,
        DeletionReason::OutOfStock,
        DeletionReason::Duplicate,
        DeletionReason::DataError,
        DeletionReason::Seasonal,
        DeletionReason::SupplierChange,
        DeletionReason::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionReason::Discontinued => "discontinued",
            DeletionReason::OutOfStock => "out_of_stock",
            DeletionReason::Duplicate => "duplicate",
            DeletionReason::DataError => "data_error",
            DeletionReason::Seasonal => "seasonal",
            DeletionReason::SupplierChange => "supplier_change",
            DeletionReason::Other => "other",
        }
    }
}

impl std::fmt::Display for DeletionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeletionReason {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        DeletionReason::ALL
            .into_iter()
            .find(|reason| reason.as_str() == key)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "deletion_reason".to_string(),
                allowed: DeletionReason::ALL
                    .iter()
                    .map(|r| r.as_str().to_string())
                    .collect(),
            })
    }
}

/// Write-once audit row created when a variant is deleted.
///
/// ## Snapshot Pattern
/// Product name, SKU, attributes and the primary code are copied as plain
/// strings. Nothing here references live rows.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DeletedVariantArchive {
    pub id: String,
    /// Id the variant had (the variant row no longer exists).
    pub variant_id: String,
    pub product_name: String,
    pub variant_sku: String,
    pub color: Option<String>,
    pub size: Option<String>,
    /// Code string of the primary barcode at deletion time.
    pub primary_barcode: Option<String>,
    /// JSON array of every code released by the deletion.
    pub released_barcodes: String,
    pub deletion_reason: DeletionReason,
    pub deletion_notes: Option<String>,
    #[ts(as = "String")]
    pub deleted_at: DateTime<Utc>,
}

impl DeletedVariantArchive {
    /// Decodes `released_barcodes`. A malformed value yields an empty list.
    pub fn released_codes(&self) -> Vec<String> {
        serde_json::from_str(&self.released_barcodes).unwrap_or_default()
    }
}

// =============================================================================
// Query Types
// =============================================================================

/// Count of barcodes for one `(status, type)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StatusCount {
    pub status: BarcodeStatus,
    pub barcode_type: BarcodeType,
    pub count: i64,
}

/// Pool statistics grouped by status and type.
///
/// Counts may be stale under concurrent writes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PoolStats {
    pub rows: Vec<StatusCount>,
    pub total: i64,
}

impl PoolStats {
    /// Builds stats from grouped rows.
    pub fn from_rows(rows: Vec<StatusCount>) -> Self {
        let total = rows.iter().map(|r| r.count).sum();
        PoolStats { rows, total }
    }

    /// Count for one pair (0 if absent).
    pub fn count(&self, status: BarcodeStatus, barcode_type: BarcodeType) -> i64 {
        self.rows
            .iter()
            .find(|r| r.status == status && r.barcode_type == barcode_type)
            .map(|r| r.count)
            .unwrap_or(0)
    }

    /// Count for one status across all types.
    pub fn count_status(&self, status: BarcodeStatus) -> i64 {
        self.rows
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.count)
            .sum()
    }

    /// Allocatable codes of one type.
    pub fn available(&self, barcode_type: BarcodeType) -> i64 {
        self.count(BarcodeStatus::Available, barcode_type)
    }
}

/// Filters for barcode search. Empty filter matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BarcodeFilter {
    /// Substring of the code.
    pub code_contains: Option<String>,
    pub status: Option<BarcodeStatus>,
    pub barcode_type: Option<BarcodeType>,
    pub batch_id: Option<String>,
}

/// Offset pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Page {
    pub offset: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            offset: 0,
            limit: 50,
        }
    }
}

/// One page of search results plus the unpaged total.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SearchPage {
    pub items: Vec<Barcode>,
    pub total: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
