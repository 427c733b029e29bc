//! # Database Error Types
//!
//! Error types for store access and for the pool services built on it.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError ← constraint / busy / connection categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ServiceError                                                           │
//! │  ├── Domain(CoreError)          PoolExhausted, CodeUnavailable, ...    │
//! │  └── TransactionAborted(DbError) everything rolled back                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  user_message() ← one actionable line for the caller                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use barcode_core::{CoreError, ParseError, ValidationError};
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Two rows with the same `code`
    /// - Second primary barcode for one owner
    /// - Duplicate variant SKU
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint or trigger rejected the write.
    ///
    /// ## When This Occurs
    /// - A write would break the status / owner / primary invariants
    /// - An UPDATE against the write-once archive table
    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    /// Another connection holds the write lock past the busy timeout.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Caller input refused before reaching SQLite.
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::PoolExhausted)
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite messages:
                //   "UNIQUE constraint failed: <table>.<column>"
                //   "FOREIGN KEY constraint failed"
                //   "CHECK constraint failed: <expr>"
                //   "database is locked" / "database table is locked"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") || msg.contains("write-once") {
                    DbError::ConstraintViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("is locked") || msg.contains("database is busy") {
                    DbError::Busy(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Service Error
// =============================================================================

/// Failure of one pool service call.
///
/// Every service call is all-or-nothing: whichever variant is returned, the
/// store is left exactly as it was before the call.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Domain rule refused the call (exhausted pool, wrong owner, bad input, ...).
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Unexpected store failure; the whole operation was rolled back.
    #[error("Transaction aborted: {0}")]
    TransactionAborted(#[from] DbError),
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::TransactionAborted(err.into())
    }
}

impl From<ParseError> for ServiceError {
    fn from(err: ParseError) -> Self {
        ServiceError::Domain(err.into())
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Domain(err.into())
    }
}

impl ServiceError {
    /// One actionable line for the caller.
    ///
    /// `operation` names what was attempted ("deletion", "import", ...) and is
    /// only used when the store aborted the transaction.
    pub fn user_message(&self, operation: &str) -> String {
        match self {
            ServiceError::Domain(CoreError::PoolExhausted { .. }) => {
                "no barcodes available".to_string()
            }
            ServiceError::Domain(CoreError::CodeUnavailable { code }) => {
                format!("barcode {code} is no longer available, pick another")
            }
            ServiceError::Domain(err) => err.to_string(),
            ServiceError::TransactionAborted(_) => {
                format!("could not complete {operation}, try again")
            }
        }
    }

    /// Returns true if repeating the identical call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Domain(_) => false,
            ServiceError::TransactionAborted(err) => err.is_transient(),
        }
    }

    /// Returns the domain error, if any.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            ServiceError::Domain(err) => Some(err),
            ServiceError::TransactionAborted(_) => None,
        }
    }
}

/// Result type for pool service calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// Unit Tests
// =============================================================================
