//! # Database Pool Management
//!
//! Connection pool creation and the entry points to the pool services.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  pool-admin / calling workflow                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← pool + service settings (or PoolConfig)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ├── db.importer()    → PoolImporter                               │
//! │       ├── db.allocation()  → AllocationService                          │
//! │       ├── db.reconciler()  → ArchiveReconciler                          │
//! │       ├── db.queries()     → PoolQueryService                           │
//! │       └── db.catalog()     → CatalogRepository (products/variants)      │
//! │                                                                         │
//! │  Every service call runs in its own short transaction (or a single     │
//! │  autocommit statement); nothing is held between calls.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL mode lets query traffic read while an import or deletion
//! writes. Writers still serialize; `busy_timeout` decides how long a writer
//! waits for the lock before the call fails as retryable.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use barcode_core::symbology::FormatRules;
use barcode_core::{DEFAULT_CANDIDATE_WINDOW, DEFAULT_ERROR_DISPLAY_LIMIT};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::catalog::CatalogRepository;
use crate::service::allocation::AllocationService;
use crate::service::importer::PoolImporter;
use crate::service::query::PoolQueryService;
use crate::service::reconciler::ArchiveReconciler;

/// Default import size limit (64 MiB).
pub const DEFAULT_MAX_FILE_BYTES: usize = 64 * 1024 * 1024;

// =============================================================================
// Configuration
// =============================================================================

/// Knobs shared by the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Row-level messages kept in an import report.
    pub error_display_limit: usize,
    /// Candidates fetched per round of the allocation loop.
    pub candidate_window: u32,
    /// Imports larger than this are refused before parsing.
    pub max_file_bytes: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        ServiceSettings {
            error_display_limit: DEFAULT_ERROR_DISPLAY_LIMIT,
            candidate_window: DEFAULT_CANDIDATE_WINDOW,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/barcode-pool/pool.db")
///     .max_connections(5)
///     .candidate_window(32);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file, or `:memory:`.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection acquire timeout.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long a writer waits on SQLite's lock.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    pub services: ServiceSettings,
}

impl DbConfig {
    /// Creates a configuration for a database file (created if missing).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
            services: ServiceSettings::default(),
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the SQLite busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Sets how many row-level messages an import report keeps.
    pub fn error_display_limit(mut self, limit: usize) -> Self {
        self.services.error_display_limit = limit;
        self
    }

    /// Sets the allocation candidate window.
    pub fn candidate_window(mut self, window: u32) -> Self {
        self.services.candidate_window = window.max(1);
        self
    }

    /// Sets the import size limit.
    pub fn max_file_bytes(mut self, bytes: usize) -> Self {
        self.services.max_file_bytes = bytes;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let db = Database::new(DbConfig::in_memory()).await?;
    /// // Isolated per call, gone when the pool closes
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
            services: ServiceSettings::default(),
        }
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == ":memory:"
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing service access.
///
/// Cheap to clone; clones share the connection pool.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("pool.db")).await?;
///
/// let report = db.importer().import_file("codes.csv", request).await?;
/// let barcode = db.allocation().assign(&variant_id, BarcodeType::Ean13, None).await?;
/// let archive = db.reconciler().on_delete_variant(&variant_id, reason, None).await?;
/// let stats = db.queries().stats().await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    settings: ServiceSettings,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous
    ///    - Foreign keys enabled
    ///    - busy timeout for contended writes
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        let connect_options = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(true)
                // In-memory databases cannot use WAL
                .journal_mode(SqliteJournalMode::Wal)
        };

        let connect_options = connect_options
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has foreign keys disabled by default
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            settings: config.services,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    ///
    /// Called by `new()` when `run_migrations` is true.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the service settings.
    pub fn settings(&self) -> ServiceSettings {
        self.settings
    }

    /// Returns the product/variant repository.
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    /// Returns the importer with the built-in format rules.
    pub fn importer(&self) -> PoolImporter {
        self.importer_with_rules(FormatRules::standard())
    }

    /// Returns the importer with caller-supplied format rules.
    pub fn importer_with_rules(&self, rules: FormatRules) -> PoolImporter {
        PoolImporter::new(self.pool.clone(), rules, self.settings)
    }

    /// Returns the allocation service.
    pub fn allocation(&self) -> AllocationService {
        AllocationService::new(self.pool.clone(), self.settings.candidate_window)
    }

    /// Returns the deletion/archive reconciler.
    pub fn reconciler(&self) -> ArchiveReconciler {
        ArchiveReconciler::new(self.pool.clone())
    }

    /// Returns the read-only query service.
    pub fn queries(&self) -> PoolQueryService {
        PoolQueryService::new(self.pool.clone())
    }

    /// Closes the database connection pool.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
