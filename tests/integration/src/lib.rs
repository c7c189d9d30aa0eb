//! Integration tests for slicefold.
//!
//! `test_memory` runs whole compositions against the in-memory gateway and is
//! part of the normal test run. `test_gcs` needs a Cloud Storage compatible
//! server (for example `fake-gcs-server`) at `GCS_ENDPOINT`; those tests are
//! marked `#[ignore]` so they don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! GCS_ENDPOINT=http://localhost:4443 cargo test -p slicefold-integration -- --ignored
//! ```

use std::sync::{Arc, Once};
use std::time::Duration;

use bytes::Bytes;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Url;
use slicefold_core::{ObjectPath, ObjectRef};
use slicefold_storage::{GcsConfig, GcsGateway, InMemoryGateway};

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Build an object path, panicking on malformed input.
#[must_use]
pub fn object(bucket: &str, name: &str) -> ObjectPath {
    ObjectPath::new(bucket, name).unwrap_or_else(|e| panic!("bad path {bucket}/{name}: {e}"))
}

/// Content of the `i`-th test slice.
#[must_use]
pub fn slice_body(i: usize) -> Bytes {
    Bytes::from(format!("record-{i:05}\n"))
}

/// Content the destination should hold after folding slices `0..count`.
#[must_use]
pub fn folded_body(count: usize) -> Bytes {
    let mut body = Vec::new();
    for i in 0..count {
        body.extend_from_slice(&slice_body(i));
    }
    Bytes::from(body)
}

/// Seed `count` slices named `{prefix}{i:05}` into an in-memory gateway.
pub fn seed_memory(
    gateway: &InMemoryGateway,
    bucket: &str,
    prefix: &str,
    count: usize,
) -> Vec<ObjectRef> {
    (0..count)
        .map(|i| {
            let path = object(bucket, &format!("{prefix}{i:05}"));
            gateway.put_object(&path, slice_body(i))
        })
        .collect()
}

/// A fresh in-memory gateway with the provider's mutation rate enforced.
#[must_use]
pub fn memory_gateway() -> Arc<InMemoryGateway> {
    init_tracing();
    Arc::new(InMemoryGateway::new().with_min_mutation_interval(Duration::from_secs(1)))
}

// ---------------------------------------------------------------------------
// Emulator helpers
// ---------------------------------------------------------------------------

/// Endpoint of the storage emulator.
#[must_use]
pub fn endpoint_url() -> String {
    std::env::var("GCS_ENDPOINT").unwrap_or_else(|_| "http://localhost:4443".to_owned())
}

/// A gateway pointing at the emulator.
#[must_use]
pub fn gcs_gateway() -> GcsGateway {
    init_tracing();
    let config = GcsConfig::builder().endpoint(endpoint_url()).build();
    GcsGateway::new(config).unwrap_or_else(|e| panic!("failed to build gateway: {e}"))
}

/// Generate a unique bucket name for a test.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

fn url(raw: &str) -> Url {
    Url::parse(raw).unwrap_or_else(|e| panic!("bad url {raw}: {e}"))
}

/// Create a bucket on the emulator and return its name.
pub async fn create_test_bucket(prefix: &str) -> String {
    let name = test_bucket_name(prefix);
    let response = reqwest::Client::new()
        .post(url(&format!("{}/storage/v1/b", endpoint_url())))
        .json(&serde_json::json!({ "name": name }))
        .send()
        .await
        .unwrap_or_else(|e| panic!("failed to create bucket {name}: {e}"));
    assert!(
        response.status().is_success(),
        "create bucket {name}: {}",
        response.status()
    );
    name
}

/// Upload `data` to `path` on the emulator.
pub async fn upload(path: &ObjectPath, data: Bytes) {
    let mut target = url(&format!(
        "{}/upload/storage/v1/b/{}/o",
        endpoint_url(),
        path.bucket()
    ));
    target
        .query_pairs_mut()
        .append_pair("uploadType", "media")
        .append_pair("name", path.name());
    let response = reqwest::Client::new()
        .post(target)
        .body(data)
        .send()
        .await
        .unwrap_or_else(|e| panic!("failed to upload {path}: {e}"));
    assert!(response.status().is_success(), "upload {path}: {}", response.status());
}

/// Download the content of `path` from the emulator.
pub async fn download(path: &ObjectPath) -> Bytes {
    let target = url(&format!(
        "{}/storage/v1/b/{}/o/{}?alt=media",
        endpoint_url(),
        path.bucket(),
        utf8_percent_encode(path.name(), NON_ALPHANUMERIC),
    ));
    let response = reqwest::get(target)
        .await
        .unwrap_or_else(|e| panic!("failed to download {path}: {e}"));
    assert!(response.status().is_success(), "download {path}: {}", response.status());
    response
        .bytes()
        .await
        .unwrap_or_else(|e| panic!("failed to read {path}: {e}"))
}

mod test_gcs;
mod test_memory;
