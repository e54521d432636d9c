use crate::domain::ids::UserId;
use crate::domain::loan::LoanStatus;
use rust_decimal::Decimal;
use thiserror::Error;

/// Every failure a banking operation can report.
///
/// The first seven variants are the domain taxonomy: an operation failing with
/// one of them has committed nothing. The remaining variants come from the
/// surrounding infrastructure (scripts, configuration, storage backends).
#[derive(Error, Debug)]
pub enum BankError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid transition: cannot {action} a {from} loan")]
    InvalidTransition {
        from: LoanStatus,
        action: &'static str,
    },
    #[error("User {0} already has a pending loan application")]
    DuplicatePending(UserId),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl BankError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    /// True for optimistic-concurrency failures that are worth retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<serde_json::Error> for BankError {
    fn from(e: serde_json::Error) -> Self {
        Self::InternalError(Box::new(e))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for BankError {
    fn from(e: rocksdb::Error) -> Self {
        Self::InternalError(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, BankError>;
