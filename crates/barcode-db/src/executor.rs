//! # Command Executor
//!
//! Runs one [`PoolCommand`] against a [`Database`].
//!
//! The match is exhaustive: adding a command variant without handling it here
//! is a compile error rather than a silently ignored request.

use tracing::{debug, info, warn};

use barcode_core::{CommandOutcome, PoolCommand, ReleaseReason, ReleaseResult};

use crate::error::ServiceResult;
use crate::pool::Database;

/// Executes `command` and returns its outcome.
///
/// `Release` never fails as a whole: each id gets its own [`ReleaseResult`].
pub async fn execute(db: &Database, command: PoolCommand) -> ServiceResult<CommandOutcome> {
    debug!(command = command.name(), "Executing pool command");

    let outcome = match command {
        PoolCommand::Import { path, request } => {
            CommandOutcome::Imported(db.importer().import_file(&path, request).await?)
        }
        PoolCommand::ClearPool { barcode_type } => CommandOutcome::Cleared {
            deleted: db.importer().clear_pool(barcode_type).await?,
        },
        PoolCommand::Assign {
            variant_id,
            barcode_type,
            preferred_code,
        } => CommandOutcome::Assigned(
            db.allocation()
                .assign(&variant_id, barcode_type, preferred_code.as_deref())
                .await?,
        ),
        PoolCommand::SetPrimary {
            variant_id,
            barcode_id,
        } => CommandOutcome::PrimarySet(db.allocation().set_primary(&variant_id, &barcode_id).await?),
        PoolCommand::Release { barcode_ids } => {
            CommandOutcome::Released(release_each(db, barcode_ids).await)
        }
        PoolCommand::DeleteVariant {
            variant_id,
            reason,
            notes,
        } => CommandOutcome::VariantDeleted(
            db.reconciler()
                .on_delete_variant(&variant_id, reason, notes.as_deref())
                .await?,
        ),
        PoolCommand::Stats => CommandOutcome::Stats(db.queries().stats().await?),
        PoolCommand::BatchHistory { limit } => {
            CommandOutcome::BatchHistory(db.queries().batch_history(limit).await?)
        }
        PoolCommand::Search { filter, page } => {
            CommandOutcome::Search(db.queries().search(&filter, page).await?)
        }
    };

    Ok(outcome)
}

async fn release_each(db: &Database, barcode_ids: Vec<String>) -> Vec<ReleaseResult> {
    let allocation = db.allocation();
    let mut results = Vec::with_capacity(barcode_ids.len());

    for barcode_id in barcode_ids {
        let result = match allocation.release(&barcode_id, ReleaseReason::Manual).await {
            Ok(outcome) => ReleaseResult {
                barcode_id,
                outcome: Some(outcome),
                error: None,
            },
            Err(err) => {
                warn!(barcode_id = %barcode_id, error = %err, "Release failed");
                ReleaseResult {
                    barcode_id,
                    outcome: None,
                    error: Some(err.user_message("release")),
                }
            }
        };
        results.push(result);
    }

    let failed = results.iter().filter(|r| !r.is_ok()).count();
    info!(total = results.len(), failed, "Bulk release finished");
    results
}
