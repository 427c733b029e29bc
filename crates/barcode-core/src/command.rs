//! # Pool Commands
//!
//! Closed set of operations an administrator or workflow can request.
//! One exhaustive executor in barcode-db turns a [`PoolCommand`] into a
//! [`CommandOutcome`]; there is no string-typed routing past argument parsing.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{
    Barcode, BarcodeFilter, BarcodeType, DeletedVariantArchive, DeletionReason, ImportBatch,
    ImportReport, ImportRequest, Page, PoolStats, ReleaseOutcome, SearchPage,
};

/// One requested pool operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PoolCommand {
    Import {
        path: PathBuf,
        request: ImportRequest,
    },
    /// Deletes `available` rows, optionally of one type only.
    ClearPool {
        barcode_type: Option<BarcodeType>,
    },
    Assign {
        variant_id: String,
        barcode_type: BarcodeType,
        preferred_code: Option<String>,
    },
    SetPrimary {
        variant_id: String,
        barcode_id: String,
    },
    /// Bulk manual release. Each id is released independently.
    Release {
        barcode_ids: Vec<String>,
    },
    DeleteVariant {
        variant_id: String,
        reason: DeletionReason,
        notes: Option<String>,
    },
    Stats,
    BatchHistory {
        limit: u32,
    },
    Search {
        filter: BarcodeFilter,
        page: Page,
    },
}

impl PoolCommand {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            PoolCommand::Import { .. } => "import",
            PoolCommand::ClearPool { .. } => "clear_pool",
            PoolCommand::Assign { .. } => "assign",
            PoolCommand::SetPrimary { .. } => "set_primary",
            PoolCommand::Release { .. } => "release",
            PoolCommand::DeleteVariant { .. } => "delete_variant",
            PoolCommand::Stats => "stats",
            PoolCommand::BatchHistory { .. } => "batch_history",
            PoolCommand::Search { .. } => "search",
        }
    }

    /// Returns true if the command never writes.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            PoolCommand::Stats | PoolCommand::BatchHistory { .. } | PoolCommand::Search { .. }
        )
    }
}

/// Per-id result of a bulk release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseResult {
    pub barcode_id: String,
    pub outcome: Option<ReleaseOutcome>,
    pub error: Option<String>,
}

impl ReleaseResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of executing one [`PoolCommand`]. Variants mirror the command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum CommandOutcome {
    Imported(ImportReport),
    Cleared { deleted: u64 },
    Assigned(Barcode),
    PrimarySet(Barcode),
    Released(Vec<ReleaseResult>),
    VariantDeleted(DeletedVariantArchive),
    Stats(PoolStats),
    BatchHistory(Vec<ImportBatch>),
    Search(SearchPage),
}

// =============================================================================
// Unit Tests
// =============================================================================
