//! Composition error types.
//!
//! Every variant that can occur after the accumulator was created carries
//! the accumulator's last valid [`ObjectRef`] and how many leading slices it
//! already holds, so callers can inspect the partial result or hand the rest
//! of the slices to [`crate::Composer::resume`].

use slicefold_core::{ObjectPath, ObjectRef, SliceFoldError};
use slicefold_storage::StorageError;

use crate::chunker::ChunkError;

/// Error returned by a composition run.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// The run configuration is inconsistent.
    #[error("invalid compose configuration: {0}")]
    InvalidConfig(#[from] SliceFoldError),

    /// The chunk size is unusable.
    #[error(transparent)]
    Chunk(#[from] ChunkError),

    /// The destination does not name an object.
    #[error("destination {destination} does not name an object")]
    InvalidDestination {
        /// The rejected destination.
        destination: ObjectPath,
    },

    /// A slice lives in a different bucket than the destination.
    #[error("slice {slice} is not in the bucket of destination {destination}")]
    CrossBucket {
        /// The destination.
        destination: ObjectPath,
        /// The offending slice.
        slice: ObjectPath,
    },

    /// The destination itself was passed as a slice.
    #[error("destination {destination} appears among the slices")]
    DestinationInSlices {
        /// The destination.
        destination: ObjectPath,
    },

    /// The same slice was passed more than once.
    #[error("slice {slice} appears more than once")]
    DuplicateSlice {
        /// The repeated slice.
        slice: ObjectPath,
    },

    /// A compose call would exceed the provider's input ceiling.
    #[error("compose call with {count} inputs exceeds the provider limit of {limit}")]
    InvalidInputCount {
        /// Inputs the call would have had.
        count: usize,
        /// Provider ceiling.
        limit: usize,
    },

    /// The empty accumulator could not be created.
    #[error("failed to create accumulator {destination}: {source}")]
    CreateFailed {
        /// The destination.
        destination: ObjectPath,
        /// Gateway failure.
        source: StorageError,
    },

    /// A compose call failed; the accumulator holds the previous chunks.
    #[error(
        "compose of chunk {chunk_index} into {accumulator} failed after {slices_folded} slices: {source}"
    )]
    ComposeFailed {
        /// Zero-based index of the failing chunk.
        chunk_index: usize,
        /// The accumulator as of the last successful compose.
        accumulator: Box<ObjectRef>,
        /// Leading slices already folded into the accumulator.
        slices_folded: usize,
        /// Gateway failure.
        source: StorageError,
    },

    /// The run was cancelled between compose calls.
    #[error("composition into {accumulator} cancelled after {slices_folded} slices")]
    Cancelled {
        /// The accumulator as of the last successful compose.
        accumulator: Box<ObjectRef>,
        /// Leading slices already folded into the accumulator.
        slices_folded: usize,
    },
}

impl ComposeError {
    /// The partial accumulator, if the run got far enough to create one.
    #[must_use]
    pub fn accumulator(&self) -> Option<&ObjectRef> {
        match self {
            Self::ComposeFailed { accumulator, .. } | Self::Cancelled { accumulator, .. } => {
                Some(accumulator)
            }
            _ => None,
        }
    }

    /// Number of leading slices the partial accumulator already contains.
    #[must_use]
    pub fn slices_folded(&self) -> usize {
        match self {
            Self::ComposeFailed { slices_folded, .. } | Self::Cancelled { slices_folded, .. } => {
                *slices_folded
            }
            _ => 0,
        }
    }
}
