//! Error types for the slicefold core.

/// Core error type for slicefold infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum SliceFoldError {
    /// An object path could not be parsed.
    #[error("invalid object path: {path} ({reason})")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for slicefold operations.
pub type SliceFoldResult<T> = Result<T, SliceFoldError>;
