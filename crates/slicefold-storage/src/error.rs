//! Storage gateway error types.
//!
//! Defines [`StorageError`], the error every [`crate::StorageGateway`]
//! operation returns. Variants mirror the provider conditions the composer
//! and cleanup dispatcher react to differently: a missing object is benign
//! for deletion, an input-count violation is a programming error, and a rate
//! limit means the caller mutated an object too quickly.

use slicefold_core::{ObjectPath, SliceFoldError};

/// Storage gateway error type.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The object does not exist.
    #[error("object not found: {path}")]
    NotFound {
        /// The missing object.
        path: ObjectPath,
    },

    /// A compose call received more inputs than the provider allows.
    #[error("compose of {target} has {count} inputs, the provider limit is {limit}")]
    InvalidInputCount {
        /// The compose target.
        target: ObjectPath,
        /// Number of inputs supplied.
        count: usize,
        /// Provider ceiling.
        limit: usize,
    },

    /// A compose input lives in a different bucket than the target.
    #[error("compose source {source_path} is not in the bucket of {target}")]
    CrossBucket {
        /// The compose target.
        target: ObjectPath,
        /// The offending source.
        source_path: ObjectPath,
    },

    /// The object was mutated more often than the provider allows.
    #[error("mutation rate limit exceeded for {path}")]
    RateLimited {
        /// The object being mutated.
        path: ObjectPath,
    },

    /// The provider returned an unexpected HTTP status.
    #[error("storage request failed with status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Provider error message.
        message: String,
    },

    /// The request never produced a response.
    #[error("storage transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A response body could not be decoded.
    #[error("failed to decode storage response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A path reported by the provider was malformed.
    #[error(transparent)]
    Path(#[from] SliceFoldError),

    /// Injected or otherwise unexpected failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl StorageError {
    /// Whether this error means the object was already absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether retrying the same request later could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 408 || *status >= 500,
            _ => false,
        }
    }
}

/// Convenience result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
