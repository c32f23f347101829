//! Result and error types for the core library

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    /// Rollback failed after the unit of work had already failed.
    /// Both errors are kept.
    #[error("Rollback failed: {rollback} (original error: {original})")]
    RollbackFailed {
        original: Box<Error>,
        rollback: String,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The closed set of failure kinds calling layers map to their own status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    ConstraintViolation,
    TransactionAborted,
    RollbackFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::ConstraintViolation => "constraint_violation",
            ErrorKind::TransactionAborted => "transaction_aborted",
            ErrorKind::RollbackFailed => "rollback_failed",
        }
    }
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a constraint violation
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::ConstraintViolation(msg.into())
    }

    /// Create a transaction aborted error
    pub fn aborted(msg: impl Into<String>) -> Self {
        Self::TransactionAborted(msg.into())
    }

    /// Collapse this error onto its [`ErrorKind`].
    ///
    /// Storage, IO and configuration failures all surface as
    /// `TransactionAborted`: callers cannot act on them beyond retrying.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            Error::RollbackFailed { .. } => ErrorKind::RollbackFailed,
            Error::TransactionAborted(_)
            | Error::Cancelled
            | Error::Database(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Json(_) => ErrorKind::TransactionAborted,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result with optional context (for JSON output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            context: None,
        }
    }

    /// Create a failed result
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            error_kind: None,
            context: None,
        }
    }

    /// Create a failed result from a core error, keeping its kind
    pub fn from_error(error: &Error) -> Self {
        Self {
            error_kind: Some(error.kind()),
            ..Self::fail(error.to_string())
        }
    }

    /// Attach a context value
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::from_error(&e),
        }
    }
}
