//! # Pool Services
//!
//! The operations callers actually use. Each public method is one short
//! transaction (or one autocommit statement) and returns a
//! [`ServiceResult`](crate::error::ServiceResult).
//!
//! - [`importer::PoolImporter`] - file import and pool clearing
//! - [`allocation::AllocationService`] - assign, primary selection, release
//! - [`reconciler::ArchiveReconciler`] - variant deletion with archive
//! - [`query::PoolQueryService`] - stats, history, search

pub mod allocation;
pub mod importer;
pub mod query;
pub mod reconciler;
