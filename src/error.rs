// In: src/error.rs

//! This module defines the single, unified error type for the entire carrow library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! Errors reported by the native engine arrive as a message plus a status code
//! (see `native::result::StatusCode`); `CarrowError::from_native` maps the code onto
//! the variants below and always keeps the native message verbatim.

use thiserror::Error;

use crate::native::result::StatusCode;

#[derive(Error, Debug)]
pub enum CarrowError {
    // =========================================================================
    // === Construction & Access Errors
    // =========================================================================
    /// The native allocator returned an absent object (bad dtype, bad arguments).
    #[error("can't create {0}")]
    Creation(String),

    /// An array's dtype disagrees with the dtype expected by a field or accessor.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Positional access outside `[0, len)`.
    #[error("index {index} out of bounds for length {length}")]
    Bounds { index: usize, length: usize },

    /// `column_by_name` found no matching field.
    #[error("{0}")]
    NotFound(String),

    /// A table-level invariant was violated (row counts, schema/column arity).
    #[error("{0}")]
    Validation(String),

    /// Appending a value the native builder can't represent.
    #[error("can't append value: {0}")]
    Append(String),

    /// A native call reported an error string. The message is the native one, verbatim.
    #[error("{0}")]
    Marshal(String),

    // =========================================================================
    // === Handle Lifecycle Errors
    // =========================================================================
    #[error("{0} handle used after release")]
    UseAfterRelease(&'static str),

    #[error("{0} handle released twice")]
    DoubleRelease(&'static str),

    /// A stream-bridge handle that is not (or no longer) registered.
    #[error("{0}: unknown id")]
    UnknownHandle(i64),

    // =========================================================================
    // === Object Store Errors
    // =========================================================================
    #[error("{0}")]
    Connection(String),

    #[error("{0}")]
    Timeout(String),

    #[error("wrong length, expected {expected}, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("client is disconnected")]
    Disconnected,

    // =========================================================================
    // === Configuration Errors
    // =========================================================================
    #[error("invalid option: {0}")]
    InvalidOption(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the Arrow library.
    #[error("Arrow operation failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// An error originating from the underlying I/O subsystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically while loading options.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl CarrowError {
    /// Maps a native status code and message onto the host error taxonomy.
    pub(crate) fn from_native(code: StatusCode, message: String) -> Self {
        match code {
            StatusCode::Validation => CarrowError::Validation(message),
            StatusCode::KeyError => CarrowError::NotFound(message),
            StatusCode::Timeout => CarrowError::Timeout(message),
            StatusCode::Connection => CarrowError::Connection(message),
            _ => CarrowError::Marshal(message),
        }
    }

    /// Returns `true` if this error is a `read_table` deadline expiring.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CarrowError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, CarrowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_codes_map_to_taxonomy() {
        let err = CarrowError::from_native(StatusCode::Timeout, "deadline".into());
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "deadline");

        let err = CarrowError::from_native(StatusCode::KeyError, "no column x".into());
        assert!(matches!(err, CarrowError::NotFound(_)));

        let err = CarrowError::from_native(StatusCode::Validation, "rows differ".into());
        assert!(matches!(err, CarrowError::Validation(_)));

        // Anything without a dedicated variant stays a marshal error with the raw message.
        let err = CarrowError::from_native(StatusCode::IoError, "disk on fire".into());
        assert!(matches!(err, CarrowError::Marshal(ref m) if m == "disk on fire"));
    }
}
