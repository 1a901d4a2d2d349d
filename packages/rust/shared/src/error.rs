//! Error types for Articulate.
//!
//! Library crates use [`ArticulateError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Articulate operations.
#[derive(Debug, thiserror::Error)]
pub enum ArticulateError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to the transfer API.
    #[error("network error: {0}")]
    Network(String),

    /// A raw agreement payload could not be repaired into valid JSON.
    #[error("malformed response: {message} (near `{fragment}`)")]
    MalformedResponse { message: String, fragment: String },

    /// The repaired document lacks the expected articulation list.
    ///
    /// This usually means the upstream API changed its contract, so callers
    /// should report it louder than a malformed payload.
    #[error("schema mismatch at `{path}`: {message}")]
    SchemaMismatch { path: String, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad directory file, invalid output, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ArticulateError>;

impl ArticulateError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a malformed-response error carrying the offending text fragment.
    pub fn malformed(msg: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: msg.into(),
            fragment: fragment.into(),
        }
    }

    /// Create a schema-mismatch error for the given document path.
    pub fn schema_mismatch(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
