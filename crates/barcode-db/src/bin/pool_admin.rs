//! # Pool Admin
//!
//! Command-line access to the barcode pool.
//!
//! ## Usage
//! ```bash
//! # Import a supplier file; codes <= 40000 are archived as legacy
//! cargo run -p barcode-db --bin pool-admin -- import codes.csv --type ean13 --threshold 40000
//!
//! # Pool overview and recent imports
//! cargo run -p barcode-db --bin pool-admin -- stats
//! cargo run -p barcode-db --bin pool-admin -- history --limit 10
//!
//! # Delete a variant, archiving and releasing its codes
//! cargo run -p barcode-db --bin pool-admin -- delete-variant <VARIANT_ID> --reason discontinued
//!
//! # Machine-readable output
//! cargo run -p barcode-db --bin pool-admin -- --json search --code 5012
//! ```
//!
//! Set `RUST_LOG=barcode=debug` for detailed logs.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use barcode_core::{
    BarcodeFilter, BarcodeStatus, BarcodeType, CommandOutcome, DeletionReason, ImportRequest, Page,
    PoolCommand,
};
use barcode_db::{execute, Database, PoolConfig};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Barcode Pool Admin

Usage: pool-admin [--db PATH] [--config PATH] [--json] <COMMAND> [ARGS]

Commands:
  import <FILE> --type T --threshold N [--notes TEXT] [--clear] [--no-validate]
  clear [--type T]
  assign <VARIANT_ID> --type T [--code CODE]
  set-primary <VARIANT_ID> <BARCODE_ID>
  release <BARCODE_ID>...
  delete-variant <VARIANT_ID> --reason R [--notes TEXT]
  stats
  history [--limit N]
  search [--code TEXT] [--status S] [--type T] [--batch ID] [--offset N] [--limit N]

Types:    ean13, ean8, upc_a, itf14, gs1_128
Statuses: available, assigned, reserved, legacy_archive
Reasons:  discontinued, out_of_stock, duplicate, data_error, seasonal, supplier_change, other";

/// Flags that never take a value.
const SWITCHES: &[&str] = &["--json", "--clear", "--no-validate", "--help", "-h"];

#[derive(Debug, Default)]
struct Args {
    positionals: Vec<String>,
    options: HashMap<String, String>,
    switches: Vec<String>,
}

impl Args {
    fn parse(raw: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut args = Args::default();
        let mut raw = raw.into_iter();

        while let Some(arg) = raw.next() {
            if SWITCHES.contains(&arg.as_str()) {
                args.switches.push(arg);
            } else if arg.starts_with("--") {
                let value = raw
                    .next()
                    .ok_or_else(|| format!("{arg} needs a value"))?;
                args.options.insert(arg, value);
            } else {
                args.positionals.push(arg);
            }
        }

        Ok(args)
    }

    fn switch(&self, name: &str) -> bool {
        self.switches.iter().any(|s| s == name)
    }

    fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    fn required(&self, name: &str) -> Result<&str, String> {
        self.option(name).ok_or_else(|| format!("missing {name}"))
    }

    fn parsed<T>(&self, name: &str) -> Result<Option<T>, String>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.option(name)
            .map(|value| value.parse::<T>().map_err(|e| format!("{name}: {e}")))
            .transpose()
    }

    fn positional(&self, idx: usize, what: &str) -> Result<&str, String> {
        self.positionals
            .get(idx)
            .map(String::as_str)
            .ok_or_else(|| format!("missing {what}"))
    }
}

/// Builds the command from parsed arguments. `config` supplies import defaults.
fn build_command(args: &Args, config: &PoolConfig) -> Result<PoolCommand, String> {
    let name = args.positional(0, "command")?;

    let command = match name {
        "import" => {
            let path = PathBuf::from(args.positional(1, "file")?);
            let barcode_type: BarcodeType = args
                .parsed("--type")?
                .ok_or_else(|| "missing --type".to_string())?;
            let threshold: u64 = args
                .parsed("--threshold")?
                .ok_or_else(|| "missing --threshold".to_string())?;

            let mut request = ImportRequest::new(barcode_type, threshold)
                .clear_existing(args.switch("--clear"))
                .validate_format(config.import.validate_format && !args.switch("--no-validate"));
            if let Some(notes) = args.option("--notes") {
                request = request.legacy_notes(notes);
            }
            PoolCommand::Import { path, request }
        }
        "clear" => PoolCommand::ClearPool {
            barcode_type: args.parsed("--type")?,
        },
        "assign" => PoolCommand::Assign {
            variant_id: args.positional(1, "variant id")?.to_string(),
            barcode_type: args
                .parsed("--type")?
                .ok_or_else(|| "missing --type".to_string())?,
            preferred_code: args.option("--code").map(str::to_string),
        },
        "set-primary" => PoolCommand::SetPrimary {
            variant_id: args.positional(1, "variant id")?.to_string(),
            barcode_id: args.positional(2, "barcode id")?.to_string(),
        },
        "release" => {
            let barcode_ids: Vec<String> = args.positionals[1..].to_vec();
            if barcode_ids.is_empty() {
                return Err("missing barcode id".to_string());
            }
            PoolCommand::Release { barcode_ids }
        }
        "delete-variant" => PoolCommand::DeleteVariant {
            variant_id: args.positional(1, "variant id")?.to_string(),
            reason: args
                .required("--reason")?
                .parse::<DeletionReason>()
                .map_err(|e| format!("--reason: {e}"))?,
            notes: args.option("--notes").map(str::to_string),
        },
        "stats" => PoolCommand::Stats,
        "history" => PoolCommand::BatchHistory {
            limit: args.parsed("--limit")?.unwrap_or(20),
        },
        "search" => {
            let defaults = Page::default();
            PoolCommand::Search {
                filter: BarcodeFilter {
                    code_contains: args.option("--code").map(str::to_string),
                    status: args.parsed::<BarcodeStatus>("--status")?,
                    barcode_type: args.parsed::<BarcodeType>("--type")?,
                    batch_id: args.option("--batch").map(str::to_string),
                },
                page: Page {
                    offset: args.parsed("--offset")?.unwrap_or(defaults.offset),
                    limit: args.parsed("--limit")?.unwrap_or(defaults.limit),
                },
            }
        }
        other => return Err(format!("unknown command '{other}'")),
    };

    Ok(command)
}

// =============================================================================
// Output
// =============================================================================

fn render(outcome: &CommandOutcome) {
    match outcome {
        CommandOutcome::Imported(report) => {
            println!("Batch {}", report.batch_id);
            println!("  processed:  {}", report.total_processed);
            println!("  imported:   {}", report.imported);
            println!("    available: {}", report.available);
            println!("    legacy:    {}", report.legacy);
            println!("  duplicates: {}", report.duplicates);
            println!("  invalid:    {}", report.invalid);
            if report.cleared > 0 {
                println!("  cleared:    {}", report.cleared);
            }
            for error in &report.errors {
                println!("  ! {error}");
            }
            if report.errors_truncated() {
                println!("  … {} more", report.error_count - report.errors.len());
            }
        }
        CommandOutcome::Cleared { deleted } => println!("Deleted {deleted} available barcodes"),
        CommandOutcome::Assigned(barcode) | CommandOutcome::PrimarySet(barcode) => {
            let primary = if barcode.is_primary { " (primary)" } else { "" };
            println!(
                "{} {} → {}{}",
                barcode.barcode_type.label(),
                barcode.code,
                barcode.owner_variant_id.as_deref().unwrap_or("-"),
                primary
            );
        }
        CommandOutcome::Released(results) => {
            for result in results {
                match (&result.outcome, &result.error) {
                    (Some(outcome), _) => println!("{}: {:?}", result.barcode_id, outcome),
                    (None, Some(error)) => println!("{}: {}", result.barcode_id, error),
                    (None, None) => println!("{}: -", result.barcode_id),
                }
            }
        }
        CommandOutcome::VariantDeleted(archive) => {
            println!("Deleted {} ({})", archive.variant_sku, archive.product_name);
            println!("  reason:   {}", archive.deletion_reason);
            println!(
                "  primary:  {}",
                archive.primary_barcode.as_deref().unwrap_or("-")
            );
            println!("  released: {}", archive.released_codes().join(", "));
        }
        CommandOutcome::Stats(stats) => {
            println!("{:<10} {:<16} {:>10}", "TYPE", "STATUS", "COUNT");
            for row in &stats.rows {
                println!(
                    "{:<10} {:<16} {:>10}",
                    row.barcode_type.as_str(),
                    row.status.as_str(),
                    row.count
                );
            }
            println!("{:<27} {:>10}", "total", stats.total);
        }
        CommandOutcome::BatchHistory(batches) => {
            for batch in batches {
                println!(
                    "{}  {}  {:<8} imported {:>7}  legacy {:>7}  dup {:>6}  invalid {:>6}  {}",
                    batch.created_at.format("%Y-%m-%d %H:%M"),
                    batch.batch_id,
                    batch.barcode_type.as_str(),
                    batch.imported_count,
                    batch.legacy_count,
                    batch.duplicate_count,
                    batch.invalid_count,
                    batch.source_name.as_deref().unwrap_or("")
                );
            }
        }
        CommandOutcome::Search(page) => {
            for barcode in &page.items {
                println!(
                    "{}  {:<20} {:<8} {:<15} {}",
                    barcode.id,
                    barcode.code,
                    barcode.barcode_type.as_str(),
                    barcode.status.as_str(),
                    barcode.owner_variant_id.as_deref().unwrap_or("")
                );
            }
            println!("{} of {} shown", page.items.len(), page.total);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,barcode=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = match Args::parse(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    if args.switch("--help") || args.switch("-h") || args.positionals.is_empty() {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    let mut config = match PoolConfig::load(args.option("--config").map(PathBuf::from)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };
    if let Some(path) = args.option("--db") {
        config.database.path = Some(PathBuf::from(path));
    }

    let command = match build_command(&args, &config) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("error: {e}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let db_path = config.database_path();
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("error: cannot create {}: {e}", parent.display());
            return ExitCode::FAILURE;
        }
    }

    let db = match Database::new(config.db_config()).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("error: cannot open {}: {e}", db_path.display());
            return ExitCode::FAILURE;
        }
    };

    let operation = command.name().replace('_', " ");
    let result = execute(&db, command).await;
    db.close().await;

    match result {
        Ok(outcome) => {
            if args.switch("--json") {
                match serde_json::to_string_pretty(&outcome) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("error: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                render(&outcome);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            eprintln!("error: {}", e.user_message(&operation));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Args {
        Args::parse(raw.iter().map(|s| s.to_string())).unwrap()
    }

    #[test]
    fn test_import_arguments() {
        let parsed = args(&[
            "--json", "import", "codes.csv", "--type", "ean-13", "--threshold", "40000", "--clear",
            "--notes", "old stock",
        ]);
        assert!(parsed.switch("--json"));

        let PoolCommand::Import { path, request } =
            build_command(&parsed, &PoolConfig::default()).unwrap()
        else {
            panic!("expected Import");
        };
        assert_eq!(path, PathBuf::from("codes.csv"));
        assert_eq!(request.barcode_type, BarcodeType::Ean13);
        assert_eq!(request.legacy_threshold, 40_000);
        assert_eq!(request.legacy_notes.as_deref(), Some("old stock"));
        assert!(request.options.clear_existing);
        assert!(request.options.validate_format);
    }

    #[test]
    fn test_no_validate_overrides_config() {
        let parsed = args(&["import", "codes.txt", "--type", "upc_a", "--threshold", "0", "--no-validate"]);
        let PoolCommand::Import { request, .. } =
            build_command(&parsed, &PoolConfig::default()).unwrap()
        else {
            panic!("expected Import");
        };
        assert!(!request.options.validate_format);
        assert!(!request.options.clear_existing);
    }

    #[test]
    fn test_release_takes_every_id() {
        let parsed = args(&["release", "a", "b", "c"]);
        let PoolCommand::Release { barcode_ids } =
            build_command(&parsed, &PoolConfig::default()).unwrap()
        else {
            panic!("expected Release");
        };
        assert_eq!(barcode_ids, vec!["a", "b", "c"]);

        assert!(build_command(&args(&["release"]), &PoolConfig::default()).is_err());
    }

    #[test]
    fn test_delete_variant_reason() {
        let parsed = args(&["delete-variant", "v-1", "--reason", "out-of-stock"]);
        let PoolCommand::DeleteVariant { reason, notes, .. } =
            build_command(&parsed, &PoolConfig::default()).unwrap()
        else {
            panic!("expected DeleteVariant");
        };
        assert_eq!(reason, DeletionReason::OutOfStock);
        assert_eq!(notes, None);

        let err = build_command(
            &args(&["delete-variant", "v-1", "--reason", "bored"]),
            &PoolConfig::default(),
        )
        .unwrap_err();
        assert!(err.starts_with("--reason"));
    }

    #[test]
    fn test_search_and_history_defaults() {
        let parsed = args(&["search", "--status", "available", "--limit", "10"]);
        let PoolCommand::Search { filter, page } =
            build_command(&parsed, &PoolConfig::default()).unwrap()
        else {
            panic!("expected Search");
        };
        assert_eq!(filter.status, Some(BarcodeStatus::Available));
        assert_eq!(filter.barcode_type, None);
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, 10);

        let PoolCommand::BatchHistory { limit } =
            build_command(&args(&["history"]), &PoolConfig::default()).unwrap()
        else {
            panic!("expected BatchHistory");
        };
        assert_eq!(limit, 20);
    }

    #[test]
    fn test_bad_arguments() {
        assert!(Args::parse(vec!["--type".to_string()]).is_err());
        assert!(build_command(&args(&["frobnicate"]), &PoolConfig::default()).is_err());
        assert!(build_command(&args(&["import", "x.csv", "--threshold", "1"]), &PoolConfig::default()).is_err());
        assert!(build_command(&args(&["assign", "v", "--type", "qr"]), &PoolConfig::default()).is_err());
    }
}
