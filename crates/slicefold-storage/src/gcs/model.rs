//! JSON API request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slicefold_core::{ObjectPath, ObjectRef};

use crate::error::StorageError;

/// The subset of the object resource the gateway uses.
///
/// The API encodes 64-bit integers (`generation`, `size`) as strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ObjectResource {
    pub bucket: String,
    pub name: String,
    #[serde(default)]
    pub generation: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub crc32c: Option<String>,
    #[serde(default)]
    pub component_count: Option<u32>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

impl TryFrom<ObjectResource> for ObjectRef {
    type Error = StorageError;

    fn try_from(resource: ObjectResource) -> Result<Self, Self::Error> {
        let generation = resource
            .generation
            .as_deref()
            .map(str::parse::<i64>)
            .transpose()
            .map_err(|e| anyhow::anyhow!("invalid generation for {}: {e}", resource.name))?;
        let size = resource
            .size
            .as_deref()
            .map(str::parse::<u64>)
            .transpose()
            .map_err(|e| anyhow::anyhow!("invalid size for {}: {e}", resource.name))?
            .unwrap_or_default();

        Ok(ObjectRef {
            path: ObjectPath::new(resource.bucket, resource.name)?,
            generation,
            size,
            crc32c: resource.crc32c,
            component_count: resource.component_count,
            updated: resource.updated,
        })
    }
}

/// Response of `objects.list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListResponse {
    #[serde(default)]
    pub items: Vec<ObjectResource>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Body of `objects.compose`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ComposeRequest {
    pub source_objects: Vec<SourceObject>,
    pub destination: Destination,
}

/// One compose source. Pinning the generation makes the request fail
/// instead of silently composing content that changed after listing.
#[derive(Debug, Serialize)]
pub(crate) struct SourceObject {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,
}

impl From<&ObjectRef> for SourceObject {
    fn from(object: &ObjectRef) -> Self {
        Self {
            name: object.name().to_owned(),
            generation: object.generation.map(|g| g.to_string()),
        }
    }
}

/// Destination resource of a compose call.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Destination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Error envelope returned with non-success statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: String,
}
