//! Accumulator composition for slicefold.
//!
//! Object stores that support server-side composition cap the number of
//! sources per call (32 on Cloud Storage) and throttle repeated writes to one
//! object. This crate folds an arbitrarily long, ordered list of slices into a
//! single destination object within those limits:
//!
//! 1. [`chunker`] splits the slices into groups of `chunk_size` (31 by
//!    default, leaving one input for the accumulator).
//! 2. [`Composer`] creates the destination empty and composes
//!    `[accumulator, chunk...]` back onto it once per chunk, spacing the
//!    calls by the minimum mutation interval.
//! 3. [`CleanupDispatcher`] deletes each chunk's slices in the background,
//!    with bounded concurrency and a short ramp between submissions.
//!
//! [`order`] offers the orderings commonly applied to listed slices before a
//! run; the composer itself never reorders its input.

pub mod chunker;
pub mod cleanup;
pub mod composer;
pub mod error;
pub mod order;

pub use cleanup::{CleanupDispatcher, CleanupFailure, CleanupReport};
pub use composer::{Composer, CompositionReport};
pub use error::ComposeError;
pub use order::{SliceOrder, prepare_slices};
