//! # barcode-core: Pure Domain Logic for the Barcode Pool
//!
//! Everything about barcodes that can be decided without touching the store:
//! symbology rules, normalization, import file parsing, threshold
//! partitioning, and the closed command set.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Barcode Pool Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │     Callers: variant workflows, reporting screens, pool-admin   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ PoolCommand / service calls            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    barcode-db (Store + Services)                │   │
//! │  │  PoolImporter · AllocationService · ArchiveReconciler · Queries │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ barcode-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌───────────┐ ┌──────────┐ ┌───────────┐        │   │
//! │  │   │  types   │ │ symbology │ │  parser  │ │ partition │        │   │
//! │  │   │ Barcode  │ │ FormatRule│ │ csv/xlsx │ │ threshold │        │   │
//! │  │   │ Archive  │ │ normalize │ │  lines   │ │  dedupe   │        │   │
//! │  │   └──────────┘ └───────────┘ └──────────┘ └───────────┘        │   │
//! │  │                                                                 │   │
//! │  │   NO DATABASE • NO FILESYSTEM • NO NETWORK • BYTES IN           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Barcode, ImportReport, DeletedVariantArchive, ...)
//! - [`symbology`] - Normalization and pluggable format rules
//! - [`parser`] - Candidate codes from CSV/TSV/spreadsheet/plain-text bytes
//! - [`partition`] - Dedupe and Clean Slate threshold partitioning
//! - [`command`] - Closed command set for the executor
//! - [`error`] - Domain error types
//! - [`validation`] - Caller input checks
//!
//! ## Example Usage
//!
//! ```rust
//! use std::collections::HashSet;
//! use barcode_core::parser::{parse_codes, FileFormat};
//! use barcode_core::partition::prepare;
//! use barcode_core::symbology::FormatRules;
//! use barcode_core::BarcodeType;
//!
//! let candidates = parse_codes(b"100\n50000\n50000\n", FileFormat::Lines).unwrap();
//! let plan = prepare(candidates, BarcodeType::Ean13, false, &FormatRules::standard())
//!     .finalize(&HashSet::new(), 40_000);
//!
//! assert_eq!(plan.legacy_count(), 1);
//! assert_eq!(plan.available_count(), 1);
//! assert_eq!(plan.duplicate_count(), 1);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod command;
pub mod error;
pub mod parser;
pub mod partition;
pub mod symbology;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use command::{CommandOutcome, PoolCommand, ReleaseResult};
pub use error::{CoreError, DuplicateScope, ParseError, RowRejection, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Row-level messages kept in an [`ImportReport`] unless configured otherwise.
pub const DEFAULT_ERROR_DISPLAY_LIMIT: usize = 50;

/// Candidates fetched per round of the allocation retry loop.
pub const DEFAULT_CANDIDATE_WINDOW: u32 = 16;

/// Largest search page.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Largest batch history request.
pub const MAX_BATCH_HISTORY: u32 = 1000;

/// Longest free-text notes (legacy notes, deletion notes).
pub const MAX_NOTES_LEN: usize = 1000;

/// GS1-128 data capacity in characters.
pub const GS1_128_MAX_LEN: usize = 48;
