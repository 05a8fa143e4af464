//! Manifest parse errors.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ParseError>;

/// Errors raised while interpreting a manifest.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The body is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(String),

    /// The `featureControl` object is missing.
    #[error("missing featureControl object")]
    MissingFeatureControl,

    /// `featureControl.features` is missing or not an array.
    #[error("missing features array")]
    MissingFeatures,

    /// A feature node is not a JSON object.
    #[error("feature at index {0} is not an object")]
    NotAnObject(usize),

    /// A required feature field is missing or has the wrong type.
    #[error("feature {feature:?}: missing or invalid field {field}")]
    InvalidField {
        /// Feature name, if it could be read.
        feature: Option<String>,
        /// Field name.
        field: &'static str,
    },
}
