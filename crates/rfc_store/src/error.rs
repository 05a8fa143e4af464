//! Error types for parameter store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or writing parameters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The parameter name is not accepted by the store.
    #[error("invalid parameter name: {0:?}")]
    InvalidParameterName(String),

    /// The value cannot be stored for this parameter.
    #[error("invalid value {value:?} for {name}")]
    InvalidValue {
        /// Parameter name.
        name: String,
        /// Rejected value.
        value: String,
    },

    /// A store line could not be parsed.
    #[error("malformed store entry at line {line}: {content:?}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// Offending line content.
        content: String,
    },

    /// The store refused the operation for another reason.
    #[error("store failure: {0}")]
    Failure(String),
}
