//! # Error Types
//!
//! Domain-specific error types for barcode-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  barcode-core errors (this file)                                       │
//! │  ├── ParseError       - Import file unreadable / wrong structure       │
//! │  ├── RowRejection     - One candidate code skipped (import continues)  │
//! │  ├── ValidationError  - Caller input failed a rule                     │
//! │  └── CoreError        - Allocation / lifecycle failures                │
//! │                                                                         │
//! │  barcode-db errors (separate crate)                                    │
//! │  ├── DbError          - Store failures                                 │
//! │  └── ServiceError     - CoreError | TransactionAborted(DbError)        │
//! │                                                                         │
//! │  Flow: ParseError/ValidationError → CoreError → ServiceError → caller  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Row-level problems are NOT propagated with `?`. They are accumulated in
//! the import report while the overall call still succeeds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{BarcodeStatus, BarcodeType};

// =============================================================================
// Core Error
// =============================================================================

/// Domain failures surfaced by the pool services.
///
/// Each of these fails the specific call outright with no side effects.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The requested code is not `available` for the requested type.
    ///
    /// ## When This Occurs
    /// - Preferred code already assigned, reserved or archived
    /// - Preferred code belongs to a different symbology
    /// - Preferred code lost a race to a concurrent caller
    #[error("Barcode {code} is not available for assignment")]
    CodeUnavailable { code: String },

    /// No `available` code of the requested type remains.
    ///
    /// Variant creation may continue without a barcode.
    #[error("No {barcode_type} barcodes available")]
    PoolExhausted { barcode_type: BarcodeType },

    /// Barcode id does not exist.
    #[error("Barcode not found: {0}")]
    BarcodeNotFound(String),

    /// Barcode is not assigned to the given variant.
    #[error("Barcode {barcode_id} is not assigned to variant {variant_id}")]
    NotOwnedByVariant {
        barcode_id: String,
        variant_id: String,
    },

    /// Variant id does not exist.
    #[error("Variant not found: {0}")]
    VariantNotFound(String),

    /// A transition the state machine does not allow.
    #[error("Barcode {barcode_id} is {status}, cannot {operation}")]
    InvalidTransition {
        barcode_id: String,
        status: BarcodeStatus,
        operation: &'static str,
    },

    /// Import file could not be parsed; nothing was written.
    #[error("Import failed: {0}")]
    Parse(#[from] ParseError),

    /// Caller input failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Parse Error
// =============================================================================

/// Structural failures reading an import file.
///
/// Any of these aborts the whole import before a transaction is opened.
#[derive(Debug, Error)]
pub enum ParseError {
    /// File bytes are not valid UTF-8 text.
    #[error("line {line}: file is not valid UTF-8")]
    InvalidEncoding { line: usize },

    /// CSV/TSV structure is broken (ragged rows, bad quoting).
    #[error("malformed tabular file: {0}")]
    Tabular(String),

    /// Spreadsheet could not be opened or has no worksheet.
    #[error("unreadable spreadsheet: {0}")]
    Spreadsheet(String),

    /// Header row present but no barcode column could be identified.
    #[error("no barcode column found (headers: {headers:?})")]
    MissingBarcodeColumn { headers: Vec<String> },

    /// File contained no candidate codes at all.
    #[error("file contains no barcodes")]
    Empty,

    /// File exceeds the configured size limit.
    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    /// File could not be read from disk.
    #[error("could not read {path}: {message}")]
    Unreadable { path: String, message: String },
}

impl From<csv::Error> for ParseError {
    fn from(err: csv::Error) -> Self {
        ParseError::Tabular(err.to_string())
    }
}

// =============================================================================
// Row Rejection
// =============================================================================

/// Where a duplicate was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateScope {
    /// Code appeared earlier in the same file.
    InFile,
    /// Code already exists in the store (any status).
    InStore,
}

impl std::fmt::Display for DuplicateScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplicateScope::InFile => write!(f, "repeated in file"),
            DuplicateScope::InStore => write!(f, "already in pool"),
        }
    }
}

/// A single candidate skipped during import.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RowRejection {
    /// Failed normalization or the symbology's format rule.
    #[error("row {row}: '{raw}' is invalid: {reason}")]
    Invalid {
        row: usize,
        raw: String,
        reason: String,
    },

    /// Already present in the file or the store.
    #[error("row {row}: {code} is a duplicate ({scope})")]
    Duplicate {
        row: usize,
        code: String,
        scope: DuplicateScope,
    },
}

impl RowRejection {
    /// Source row of the rejected candidate.
    pub fn row(&self) -> usize {
        match self {
            RowRejection::Invalid { row, .. } | RowRejection::Duplicate { row, .. } => *row,
        }
    }

    /// Returns true for duplicate rejections.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, RowRejection::Duplicate { .. })
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation of caller-supplied arguments.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::PoolExhausted {
            barcode_type: BarcodeType::Ean13,
        };
        assert_eq!(err.to_string(), "No EAN-13 barcodes available");

        let err = CoreError::CodeUnavailable {
            code: "5012345678900".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Barcode 5012345678900 is not available for assignment"
        );
    }

    #[test]
    fn test_row_rejection_messages() {
        let dup = RowRejection::Duplicate {
            row: 4,
            code: "123".to_string(),
            scope: DuplicateScope::InStore,
        };
        assert_eq!(dup.to_string(), "row 4: 123 is a duplicate (already in pool)");
        assert!(dup.is_duplicate());

        let invalid = RowRejection::Invalid {
            row: 2,
            raw: "abc".to_string(),
            reason: "must contain only digits".to_string(),
        };
        assert_eq!(
            invalid.to_string(),
            "row 2: 'abc' is invalid: must contain only digits"
        );
        assert!(!invalid.is_duplicate());
    }

    #[test]
    fn test_parse_error_converts_to_core_error() {
        let core_err: CoreError = ParseError::Empty.into();
        assert!(matches!(core_err, CoreError::Parse(ParseError::Empty)));
        assert_eq!(core_err.to_string(), "Import failed: file contains no barcodes");
    }
}
