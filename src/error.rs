// ⚠️ Ledger Errors
// One taxonomy for every operation the ledger exposes.
//
// Only `Conflict` is transient. Everything else is permanent for the same
// inputs and must not be retried verbatim.

use thiserror::Error;

/// Result alias used across the ledger
pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed or out-of-range input (amount <= 0, self-recognition, ...)
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced student or recognition does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Student registration collision
    #[error("student with name '{0}' already exists")]
    DuplicateName(String),

    #[error("student {endorser_id} already endorsed recognition {recognition_id}")]
    DuplicateEndorsement { recognition_id: i64, endorser_id: i64 },

    /// Sending allowance exceeded
    #[error("insufficient available credits: {available} available, {requested} requested")]
    InsufficientCredits { available: i64, requested: i64 },

    /// Monthly sending quota exceeded
    #[error("monthly sending limit exceeded: {remaining} remaining, {requested} requested")]
    LimitExceeded { remaining: i64, requested: i64 },

    /// Redemption exceeds received balance
    #[error("insufficient received credits to redeem: {balance} available, {requested} requested")]
    InsufficientBalance { balance: i64, requested: i64 },

    /// Store kept reporting contention after every retry
    #[error("transaction conflict after {attempts} attempts, retry later")]
    Conflict { attempts: u32 },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    /// True only for errors a caller may safely retry unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Conflict { .. })
    }

    /// SQLite reported lock contention (SQLITE_BUSY / SQLITE_LOCKED)
    pub(crate) fn is_contention(&self) -> bool {
        match self {
            LedgerError::Storage(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    /// UNIQUE / CHECK constraint rejected the write
    pub(crate) fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            LedgerError::Storage(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }

    /// HTTP status code for transports that expose the ledger
    pub const fn status_code(&self) -> u16 {
        match self {
            LedgerError::Validation(_)
            | LedgerError::InsufficientCredits { .. }
            | LedgerError::LimitExceeded { .. }
            | LedgerError::InsufficientBalance { .. } => 400,
            LedgerError::NotFound(_) => 404,
            LedgerError::DuplicateName(_) | LedgerError::DuplicateEndorsement { .. } => 409,
            LedgerError::Conflict { .. } => 503,
            LedgerError::Storage(_) | LedgerError::Serialization(_) => 500,
        }
    }

    /// Stable machine-readable error code
    pub const fn error_code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "VALIDATION_ERROR",
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::DuplicateName(_) => "DUPLICATE_NAME",
            LedgerError::DuplicateEndorsement { .. } => "DUPLICATE_ENDORSEMENT",
            LedgerError::InsufficientCredits { .. } => "INSUFFICIENT_CREDITS",
            LedgerError::LimitExceeded { .. } => "LIMIT_EXCEEDED",
            LedgerError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            LedgerError::Conflict { .. } => "CONFLICT",
            LedgerError::Storage(_) => "STORAGE_ERROR",
            LedgerError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}
