use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    WalletUnavailable,
    UserRejected,
    Validation,
    ReadFailure,
    TransactionFailed,
    Busy,
}

/// Failure of a single client call. Every variant is terminal for that call;
/// nothing in the core retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BallotError {
    #[error("wallet unavailable: {0}")]
    WalletUnavailable(String),
    #[error("request rejected in wallet")]
    UserRejected,
    #[error("{0}")]
    Validation(String),
    #[error("failed to load ballot data: {0}")]
    ReadFailure(String),
    #[error("transaction failed: {reason}")]
    TransactionFailed { reason: String },
    #[error("another transaction is still in progress")]
    Busy,
}

impl BallotError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn read_failure(message: impl Into<String>) -> Self {
        Self::ReadFailure(message.into())
    }

    pub fn transaction_failed(reason: impl Into<String>) -> Self {
        Self::TransactionFailed {
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::WalletUnavailable(_) => ErrorCode::WalletUnavailable,
            Self::UserRejected => ErrorCode::UserRejected,
            Self::Validation(_) => ErrorCode::Validation,
            Self::ReadFailure(_) => ErrorCode::ReadFailure,
            Self::TransactionFailed { .. } => ErrorCode::TransactionFailed,
            Self::Busy => ErrorCode::Busy,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&BallotError> for ErrorReport {
    fn from(value: &BallotError) -> Self {
        Self {
            code: value.code(),
            message: value.to_string(),
        }
    }
}
