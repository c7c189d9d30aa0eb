//! Object addressing shared across gateways and the composer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::SliceFoldError;

/// URL scheme accepted by [`ObjectPath::from_str`].
const SCHEME: &str = "gs://";

/// Location of an object (or a listing prefix) in a bucket.
///
/// Displays and parses as `gs://bucket/name`. A path with an empty name is a
/// valid listing prefix for the whole bucket, but not a valid object.
///
/// # Examples
///
/// ```
/// use slicefold_core::ObjectPath;
///
/// let path: ObjectPath = "gs://lake/out/final.avro".parse().unwrap();
/// assert_eq!(path.bucket(), "lake");
/// assert_eq!(path.name(), "out/final.avro");
/// assert_eq!(path.to_string(), "gs://lake/out/final.avro");
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct ObjectPath {
    bucket: String,
    name: String,
}

impl ObjectPath {
    /// Create a path from its bucket and object name.
    ///
    /// # Errors
    /// Returns [`SliceFoldError::InvalidPath`] if the bucket is empty or
    /// contains a `/`.
    pub fn new(
        bucket: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, SliceFoldError> {
        let bucket = bucket.into();
        let name = name.into();
        if bucket.is_empty() {
            return Err(SliceFoldError::InvalidPath {
                path: format!("{SCHEME}/{name}"),
                reason: "bucket is empty",
            });
        }
        if bucket.contains('/') {
            return Err(SliceFoldError::InvalidPath {
                path: format!("{SCHEME}{bucket}/{name}"),
                reason: "bucket contains '/'",
            });
        }
        Ok(Self { bucket, name })
    }

    /// Parse a path that must name an object, not just a bucket.
    ///
    /// # Errors
    /// Returns [`SliceFoldError::InvalidPath`] if the path is malformed or
    /// the object name is empty.
    pub fn parse_object(s: &str) -> Result<Self, SliceFoldError> {
        let path: Self = s.parse()?;
        if path.name.is_empty() {
            return Err(SliceFoldError::InvalidPath {
                path: s.to_owned(),
                reason: "object name is empty",
            });
        }
        Ok(path)
    }

    /// The bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The object name (or prefix) within the bucket.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `other` lives in the same bucket and starts with this path's name.
    #[must_use]
    pub fn contains(&self, other: &ObjectPath) -> bool {
        self.bucket == other.bucket && other.name.starts_with(&self.name)
    }
}

impl FromStr for ObjectPath {
    type Err = SliceFoldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix(SCHEME).ok_or_else(|| SliceFoldError::InvalidPath {
            path: s.to_owned(),
            reason: "missing gs:// scheme",
        })?;
        let (bucket, name) = rest.split_once('/').unwrap_or((rest, ""));
        Self::new(bucket, name).map_err(|_| SliceFoldError::InvalidPath {
            path: s.to_owned(),
            reason: "bucket is empty",
        })
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}", self.bucket, self.name)
    }
}

/// A reference to a stored object, as returned by a storage gateway.
///
/// Carries the metadata the provider reports alongside the object's path.
/// Gateways only rely on [`ObjectRef::path`]; the rest is informational.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    /// Where the object lives.
    pub path: ObjectPath,
    /// Provider generation number of the referenced content, if known.
    pub generation: Option<i64>,
    /// Object size in bytes.
    pub size: u64,
    /// Base64 CRC32C of the content, as reported by the provider.
    pub crc32c: Option<String>,
    /// Number of source components for composite objects.
    pub component_count: Option<u32>,
    /// Last modification time.
    pub updated: Option<DateTime<Utc>>,
}

impl ObjectRef {
    /// A bare reference with no known metadata.
    #[must_use]
    pub fn new(path: ObjectPath) -> Self {
        Self {
            path,
            generation: None,
            size: 0,
            crc32c: None,
            component_count: None,
            updated: None,
        }
    }

    /// The object name within its bucket.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.name()
    }
}

impl From<ObjectPath> for ObjectRef {
    fn from(path: ObjectPath) -> Self {
        Self::new(path)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.generation {
            Some(generation) => write!(f, "{}#{generation}", self.path),
            None => fmt::Display::fmt(&self.path, f),
        }
    }
}
