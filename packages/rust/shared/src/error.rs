//! Error types for InviteBoard.
//!
//! Library crates use [`InviteBoardError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all InviteBoard operations.
#[derive(Debug, thiserror::Error)]
pub enum InviteBoardError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Uploaded file could not be read as a delimited table.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (empty upload, duplicate headers, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Login or re-verification failed. Deliberately does not say which part
    /// of the credentials was wrong.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Delivery gateway setup error (not a per-recipient failure).
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Report rendering error (PDF/CSV writer).
    #[error("render error: {0}")]
    Render(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, InviteBoardError>;

impl InviteBoardError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
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

    /// True for errors caused by what the user supplied rather than by the
    /// environment.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Validation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = InviteBoardError::config("missing relay URL");
        assert_eq!(err.to_string(), "config error: missing relay URL");

        let err = InviteBoardError::validation("uploaded file contains no records");
        assert!(err.to_string().contains("no records"));
    }

    #[test]
    fn credentials_error_is_generic() {
        let msg = InviteBoardError::InvalidCredentials.to_string();
        assert_eq!(msg, "invalid username or password");
    }

    #[test]
    fn input_error_classification() {
        assert!(InviteBoardError::parse("bad row").is_input_error());
        assert!(InviteBoardError::validation("empty").is_input_error());
        assert!(!InviteBoardError::Storage("locked".into()).is_input_error());
    }
}
