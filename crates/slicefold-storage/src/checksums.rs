//! Object checksums in the form Cloud Storage reports them.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

/// Compute the base64-encoded, big-endian CRC32C of `data`.
///
/// # Examples
///
/// ```
/// use slicefold_storage::checksums::compute_crc32c;
///
/// assert_eq!(compute_crc32c(b""), "AAAAAA==");
/// ```
#[must_use]
pub fn compute_crc32c(data: &[u8]) -> String {
    BASE64_STANDARD.encode(crc32c::crc32c(data).to_be_bytes())
}
