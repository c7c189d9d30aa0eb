//! Splitting an ordered slice sequence into compose-sized groups.

use std::iter::FusedIterator;

/// Error returned for an unusable chunk size.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    /// The chunk size was zero.
    #[error("chunk size must be positive, got {size}")]
    InvalidChunkSize {
        /// The rejected size.
        size: usize,
    },
}

/// Lazy iterator over consecutive groups of at most `size` items.
///
/// Created by [`chunks`]. Items keep their input order; only the final group
/// may be shorter than `size`.
#[derive(Debug, Clone)]
pub struct Chunks<I> {
    iter: I,
    size: usize,
}

/// Group `items` into chunks of at most `size`, preserving order.
///
/// The input is consumed lazily, so it may be arbitrarily long.
///
/// # Errors
/// Returns [`ChunkError::InvalidChunkSize`] if `size` is zero.
///
/// # Examples
///
/// ```
/// use slicefold_compose::chunker::chunks;
///
/// let groups: Vec<Vec<u32>> = chunks(1..=7, 3).unwrap().collect();
/// assert_eq!(groups, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
/// ```
pub fn chunks<I: IntoIterator>(
    items: I,
    size: usize,
) -> Result<Chunks<I::IntoIter>, ChunkError> {
    if size == 0 {
        return Err(ChunkError::InvalidChunkSize { size });
    }
    Ok(Chunks {
        iter: items.into_iter(),
        size,
    })
}

/// Number of chunks [`chunks`] yields for `len` items.
#[must_use]
pub fn chunk_count(len: usize, size: usize) -> usize {
    if size == 0 { 0 } else { len.div_ceil(size) }
}

impl<I: Iterator> Iterator for Chunks<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk: Vec<I::Item> = self.iter.by_ref().take(self.size).collect();
        if chunk.is_empty() { None } else { Some(chunk) }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self.iter.size_hint();
        (
            chunk_count(lower, self.size),
            upper.map(|n| chunk_count(n, self.size)),
        )
    }
}

impl<I: FusedIterator> FusedIterator for Chunks<I> {}
