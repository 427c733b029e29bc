//! # barcode-db: Storage and Services for the Barcode Pool
//!
//! This crate owns the SQLite store and every operation that touches it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Barcode Pool Data Flow                           │
//! │                                                                         │
//! │  pool-admin / product workflow                                          │
//! │       │  PoolCommand                                                    │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   barcode-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │  executor::execute ──► service/                                 │   │
//! │  │                        ├── importer    (file → batch)           │   │
//! │  │                        ├── allocation  (assign / release)       │   │
//! │  │                        ├── reconciler  (delete + archive)       │   │
//! │  │                        └── query       (stats / search)         │   │
//! │  │                              │                                  │   │
//! │  │                              ▼                                  │   │
//! │  │                        repository/  (SQL)                       │   │
//! │  │                              │                                  │   │
//! │  │   pool.rs (SqlitePool) ◄─────┘        migrations (embedded)     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and service entry points
//! - [`config`] - `pool.toml` loading and environment overrides
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Store and service error types
//! - [`repository`] - SQL for barcodes, products and variants
//! - [`service`] - Import, allocation, archive and query services
//! - [`executor`] - Runs a [`PoolCommand`](barcode_core::PoolCommand)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use barcode_core::{BarcodeType, DeletionReason, ImportRequest};
//! use barcode_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("pool.db")).await?;
//!
//! let report = db
//!     .importer()
//!     .import_file("codes.csv", ImportRequest::new(BarcodeType::Ean13, 40_000))
//!     .await?;
//!
//! let barcode = db.allocation().assign(&variant_id, BarcodeType::Ean13, None).await?;
//! let archive = db
//!     .reconciler()
//!     .on_delete_variant(&variant_id, DeletionReason::Discontinued, None)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod executor;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, PoolConfig};
pub use error::{DbError, ServiceError, ServiceResult};
pub use executor::execute;
pub use pool::{Database, DbConfig, ServiceSettings};

// Repository and service re-exports for convenience
pub use repository::barcode::BarcodeRepository;
pub use repository::catalog::{CatalogRepository, NewVariant};
pub use service::allocation::AllocationService;
pub use service::importer::PoolImporter;
pub use service::query::PoolQueryService;
pub use service::reconciler::ArchiveReconciler;
