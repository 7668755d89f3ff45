use thiserror::Error;

use crate::noid::NoidError;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Handle store unavailable at {path}: {reason}")]
    StorageUnavailable { path: String, reason: String },

    #[error("Handle already recorded: {0}")]
    ConstraintViolation(String),

    #[error("Handle store is closed")]
    StorageClosed,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Another writer recorded the handle between lookup and insert
    #[error("Concurrent insert for handle {0}; re-resolve to pick up the stored noid")]
    Conflict(String),

    #[error(transparent)]
    Template(#[from] NoidError),

    #[error(transparent)]
    Ledger(LedgerError),
}

impl From<LedgerError> for ResolveError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::ConstraintViolation(handle) => ResolveError::Conflict(handle),
            other => ResolveError::Ledger(other),
        }
    }
}
