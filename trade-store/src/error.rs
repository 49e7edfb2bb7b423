//! Storage layer errors

use thiserror::Error;
use trade_domain::DomainError;

/// Coarse classification of a [`StoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    ValidationFailure,
    BackendUnavailable,
    Conflict,
    SchemaMismatch,
    Backend,
    Config,
}

/// Errors that can occur in the storage layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found where the caller required it to exist
    #[error("Trade not found: {trade_id}")]
    NotFound {
        /// Trade id that was looked up
        trade_id: String,
    },

    /// Aggregate or criteria rejected before any backend call
    #[error("Validation failed: {0}")]
    Validation(#[from] DomainError),

    /// Transient connectivity failure (retryable)
    #[error("Backend {backend} unavailable: {message}")]
    BackendUnavailable {
        /// Backend name (relational, document, columnar)
        backend: &'static str,
        /// Native failure description
        message: String,
    },

    /// Concurrent modification detected by a conditional write
    #[error("Conflict on trade {trade_id}: {message}")]
    Conflict {
        /// Trade id the write targeted
        trade_id: String,
        /// Description of the failed condition
        message: String,
    },

    /// Stored record does not fit the aggregate shape
    #[error("Schema mismatch in {source_name}: {reason}")]
    SchemaMismatch {
        /// Table or collection the record came from
        source_name: String,
        /// What did not fit
        reason: String,
    },

    /// Permanent backend failure
    #[error("Backend {backend} error: {message}")]
    Backend {
        /// Backend name
        backend: &'static str,
        /// Native failure description
        message: String,
    },

    /// Startup wiring error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Create a not found error
    pub fn not_found(trade_id: impl Into<String>) -> Self {
        Self::NotFound {
            trade_id: trade_id.into(),
        }
    }

    /// Create a transient backend error
    pub fn unavailable(backend: &'static str, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend,
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(trade_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            trade_id: trade_id.into(),
            message: message.into(),
        }
    }

    /// Create a schema mismatch error
    pub fn schema_mismatch(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a permanent backend error
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Validation(_) => ErrorKind::ValidationFailure,
            StoreError::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            StoreError::Conflict { .. } => ErrorKind::Conflict,
            StoreError::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            StoreError::Backend { .. } => ErrorKind::Backend,
            StoreError::Config(_) => ErrorKind::Config,
        }
    }

    /// Only transient backend failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::BackendUnavailable
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        const BACKEND: &str = "relational";
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::unavailable(BACKEND, err.to_string()),
            sqlx::Error::Database(db_err) => {
                match db_err.code().as_deref() {
                    // unique_violation
                    Some("23505") => StoreError::Conflict {
                        trade_id: "unknown".to_string(),
                        message: db_err.to_string(),
                    },
                    // serialization_failure, deadlock_detected, admin_shutdown, cannot_connect_now
                    Some("40001") | Some("40P01") | Some("57P01") | Some("57P03") => {
                        StoreError::unavailable(BACKEND, db_err.to_string())
                    },
                    _ => StoreError::backend(BACKEND, db_err.to_string()),
                }
            },
            sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => StoreError::schema_mismatch("postgres", err.to_string()),
            _ => StoreError::backend(BACKEND, err.to_string()),
        }
    }
}
