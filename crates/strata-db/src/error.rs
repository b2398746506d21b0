//! # Database Error Types
//!
//! Error types for ledger storage operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        CoreError (strata-core)             │
//! │       │                                  │                              │
//! │       └──────────────┬───────────────────┘                              │
//! │                      ▼                                                  │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError::class() ← NotFound / Validation / InsufficientInventory /    │
//! │                     Allocation / Conflict / Storage                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Caller decides: reject request, alert on integrity fault, or retry    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use strata_core::CoreError;
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx and domain errors and categorize them for callers.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Registering a duplicate SKU or location code
    /// - A second reversal of the same consumption or adjustment
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint or trigger rejected the write.
    ///
    /// ## When This Occurs
    /// - An update of an immutable layer column
    /// - A consumption getting both reversal links
    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    /// Another writer held the lock past the busy timeout.
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

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Costing or workflow rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Coarse category of a [`DbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    NotFound,
    Validation,
    /// Layers could not source a draw. Integrity fault, alert on it.
    InsufficientInventory,
    Allocation,
    /// Invalid state transition, duplicate, busy database.
    Conflict,
    Storage,
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            DbError::NotFound { .. } => ErrorClass::NotFound,
            DbError::UniqueViolation { .. } | DbError::Busy(_) => ErrorClass::Conflict,
            DbError::ForeignKeyViolation { .. } | DbError::ConstraintViolation { .. } => {
                ErrorClass::Validation
            }
            DbError::Domain(core) => match core {
                CoreError::NotFound { .. } => ErrorClass::NotFound,
                CoreError::Validation(_) | CoreError::Inactive { .. } => ErrorClass::Validation,
                CoreError::InsufficientInventory { .. } => ErrorClass::InsufficientInventory,
                CoreError::Allocation { .. } => ErrorClass::Allocation,
                CoreError::InvalidTransition { .. } => ErrorClass::Conflict,
                CoreError::InvariantViolation(_) => ErrorClass::Storage,
            },
            DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::TransactionFailed(_)
            | DbError::PoolExhausted
            | DbError::Internal(_) => ErrorClass::Storage,
        }
    }

    /// The wrapped domain error, if any.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            DbError::Domain(core) => Some(core),
            _ => None,
        }
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

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                // Trigger: RAISE(ABORT, '<message>')
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
                } else if msg.contains("CHECK constraint failed")
                    || msg.contains("immutable")
                    || msg.contains("append-only")
                    || msg.contains("never deleted")
                    || msg.contains("reversed_by")
                {
                    DbError::ConstraintViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("database is locked") || msg.contains("database is busy") {
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

impl From<strata_core::ValidationError> for DbError {
    fn from(err: strata_core::ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::ValidationError;

    #[test]
    fn test_classes_distinguish_integrity_faults() {
        let insufficient: DbError = CoreError::InsufficientInventory {
            item_id: "i".into(),
            location_id: "l".into(),
            requested: 3,
            available: 1,
        }
        .into();
        assert_eq!(insufficient.class(), ErrorClass::InsufficientInventory);

        let invalid: DbError = ValidationError::must_be_positive("quantity").into();
        assert_eq!(invalid.class(), ErrorClass::Validation);

        let transition: DbError =
            CoreError::invalid_transition("Transfer", "t", "received", "cancel").into();
        assert_eq!(transition.class(), ErrorClass::Conflict);

        assert_eq!(DbError::not_found("CostLayer", "x").class(), ErrorClass::NotFound);
        assert_eq!(DbError::PoolExhausted.class(), ErrorClass::Storage);
    }

    #[test]
    fn test_domain_message_is_transparent() {
        let err: DbError = CoreError::allocation("nothing to allocate").into();
        assert_eq!(err.to_string(), "Allocation failed: nothing to allocate");
        assert!(err.as_domain().is_some());
    }
}
