//! # Validation Module
//!
//! Checks on caller-supplied arguments, run before any transaction opens.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: pool-admin / calling workflow                                 │
//! │  └── Argument parsing (types, enum names)                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── ids, SKUs, notes, paging, thresholds                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                        │
//! │  ├── UNIQUE(code), partial UNIQUE primary per owner                     │
//! │  └── CHECK constraints tying status, owner and primary flag             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Per-code format checks are not here; see [`crate::symbology`].

use crate::error::ValidationError;
use crate::types::Page;
use crate::{MAX_BATCH_HISTORY, MAX_NOTES_LEN, MAX_PAGE_SIZE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifiers
// =============================================================================

/// Validates a UUID string.
///
/// ## Example
/// ```rust
/// use barcode_core::validation::validate_uuid;
///
/// assert!(validate_uuid("variant_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("variant_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id.trim()).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

/// Validates a variant SKU such as `026-RED-120`.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - Letters, digits, hyphens, underscores and dots only
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 64,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, underscores and dots".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Free Text
// =============================================================================

/// Trims optional notes; blank becomes `None`.
pub fn validate_notes(field: &str, notes: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };

    if notes.chars().count() > MAX_NOTES_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NOTES_LEN,
        });
    }

    Ok(Some(notes.to_string()))
}

/// Validates a code substring for search.
///
/// ## Returns
/// The trimmed query, or `None` if it is empty.
pub fn validate_search_query(query: &str) -> ValidationResult<Option<String>> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "code_contains".to_string(),
            max: 100,
        });
    }

    Ok(if query.is_empty() {
        None
    } else {
        Some(query.to_string())
    })
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a search page.
pub fn validate_page(page: Page) -> ValidationResult<Page> {
    if page.limit == 0 || page.limit > MAX_PAGE_SIZE {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: MAX_PAGE_SIZE as i64,
        });
    }

    Ok(page)
}

/// Validates a batch history limit.
pub fn validate_history_limit(limit: u32) -> ValidationResult<u32> {
    if limit == 0 || limit > MAX_BATCH_HISTORY {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: MAX_BATCH_HISTORY as i64,
        });
    }

    Ok(limit)
}

/// Converts a legacy threshold to the store's integer width.
///
/// SQLite integers are signed 64-bit, so thresholds above `i64::MAX` are refused.
pub fn validate_threshold(threshold: u64) -> ValidationResult<i64> {
    i64::try_from(threshold).map_err(|_| ValidationError::OutOfRange {
        field: "legacy_threshold".to_string(),
        min: 0,
        max: i64::MAX,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
