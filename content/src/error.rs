//! Error types for content document operations

use thiserror::Error;

/// Errors that can occur while reading or reshaping a content document
#[derive(Error, Debug)]
pub enum ContentError {
    /// A field the transformation depends on is absent
    #[error("Missing field in content document: {0}")]
    MissingField(String),

    /// A field exists but has the wrong JSON shape
    #[error("Unexpected shape for field {field}: expected {expected}")]
    UnexpectedShape { field: String, expected: &'static str },

    /// The circulation data could not be transformed
    #[error("Circulation transform failed: {0}")]
    Circulation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
