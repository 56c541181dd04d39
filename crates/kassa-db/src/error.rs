//! # Database Error Types
//!
//! Error types for storage operations and for the commit flows built on them.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError ← Adds context and categorization                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CommitError ← Rejected (CoreError, nothing written)                   │
//! │       │         Conflict (conditional update matched no row)           │
//! │       │         Storage  (DbError, transaction rolled back)            │
//! │       ▼                                                                 │
//! │  ErrorKind ← What the caller branches on (retry or not)                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use kassa_core::{CoreError, ErrorKind};
use thiserror::Error;

/// SQLite primary / extended result codes meaning "another writer holds
/// the lock": BUSY, LOCKED, LOCKED_SHAREDCACHE, BUSY_RECOVERY, BUSY_SNAPSHOT.
const SQLITE_CONTENTION_CODES: &[&str] = &["5", "6", "262", "261", "517"];

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
    /// - Inserting duplicate SKU
    /// - Duplicate order / return number
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (negative stock, credit over limit, ...).
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

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

    /// Stored data could not be mapped back into a domain value.
    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: String, reason: String },

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

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

    /// Creates a CorruptRow error.
    pub fn corrupt(table: impl Into<String>, reason: impl Into<String>) -> Self {
        DbError::CorruptRow {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failure came from a concurrent writer rather than from
    /// the request or the storage itself.
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            DbError::Busy(_) | DbError::UniqueViolation { .. } | DbError::CheckViolation { .. }
        )
    }

    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound { .. } => ErrorKind::NotFound,
            e if e.is_contention() => ErrorKind::ConflictRetryable,
            _ => ErrorKind::StorageFailure,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze code / message for constraint type
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
                let code = db_err.code();

                // SQLite error messages for constraints:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                // CHECK constraint: "CHECK constraint failed: <expr>"
                if code
                    .as_deref()
                    .is_some_and(|c| SQLITE_CONTENTION_CODES.contains(&c))
                    || msg.contains("database is locked")
                    || msg.contains("database table is locked")
                {
                    DbError::Busy(msg.to_string())
                } else if msg.contains("UNIQUE constraint failed") {
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
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
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
// Commit Error
// =============================================================================

/// Failure of a write flow (order commit, return commit, catalog writes).
///
/// In every variant nothing was persisted: either no transaction was opened
/// or it was rolled back.
#[derive(Debug, Error)]
pub enum CommitError {
    /// Request failed a business rule before any write.
    #[error("{0}")]
    Rejected(#[from] CoreError),

    /// A conditional update inside the transaction matched no row because
    /// state changed after validation. Carries the concrete cause.
    #[error("Conflict: {0}")]
    Conflict(CoreError),

    /// Storage failed inside the transaction.
    #[error("Storage failure: {0}")]
    Storage(#[from] DbError),
}

impl CommitError {
    /// Returns the taxonomy kind of this error.
    ///
    /// ```text
    /// Rejected(e)                 → e.kind()
    /// Conflict(_)                 → ConflictRetryable
    /// Storage(e)                  → e.kind()
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommitError::Rejected(e) => e.kind(),
            CommitError::Conflict(_) => ErrorKind::ConflictRetryable,
            CommitError::Storage(e) => e.kind(),
        }
    }

    /// Whether resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// The business-rule cause, when there is one.
    pub fn cause(&self) -> Option<&CoreError> {
        match self {
            CommitError::Rejected(e) | CommitError::Conflict(e) => Some(e),
            CommitError::Storage(_) => None,
        }
    }
}

impl From<sqlx::Error> for CommitError {
    fn from(err: sqlx::Error) -> Self {
        CommitError::Storage(err.into())
    }
}

impl From<kassa_core::ValidationError> for CommitError {
    fn from(err: kassa_core::ValidationError) -> Self {
        CommitError::Rejected(err.into())
    }
}

/// Result type for write flows.
pub type CommitResult<T> = Result<T, CommitError>;

// =============================================================================
// Unit Tests
// =============================================================================
