//! # Repository Module
//!
//! SQL for the pool tables. Services compose these inside their own
//! transactions; nothing here opens a transaction itself.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Service (importer / allocation / reconciler / query)                  │
//! │       │                                                                 │
//! │       │  let mut tx = pool.begin().await?;                              │
//! │       │  barcode::existing_codes(&mut *tx, codes).await?;               │
//! │       ▼                                                                 │
//! │  barcode.rs   BarcodeRepository (pool reads) + connection helpers      │
//! │  catalog.rs   CatalogRepository (products, variants)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod barcode;
pub mod catalog;
