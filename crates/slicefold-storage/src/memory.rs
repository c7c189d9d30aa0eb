//! In-memory storage gateway.
//!
//! [`InMemoryGateway`] emulates the provider object model closely enough to
//! exercise the composer against real constraints: compose calls are limited
//! to a fixed number of inputs, every source must exist and live in the
//! target's bucket, deleting a missing object fails with `NotFound`, and an
//! optional minimum interval between mutations of one object is enforced
//! with `RateLimited`.
//!
//! Every call is recorded in a journal stamped with [`tokio::time::Instant`],
//! so tests running on a paused clock can assert on call timing. Faults can
//! be injected per compose call or per object deletion.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use slicefold_core::{ObjectPath, ObjectRef};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::checksums::compute_crc32c;
use crate::error::{StorageError, StorageResult};
use crate::gateway::StorageGateway;

/// Default compose input ceiling, matching Cloud Storage.
const DEFAULT_MAX_COMPOSE_INPUTS: usize = 32;

// ---------------------------------------------------------------------------
// Stored objects and the call journal
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct StoredObject {
    data: Bytes,
    generation: i64,
    component_count: u32,
    updated: DateTime<Utc>,
    last_mutation: Instant,
}

impl StoredObject {
    fn to_ref(&self, path: &ObjectPath) -> ObjectRef {
        ObjectRef {
            path: path.clone(),
            generation: Some(self.generation),
            size: self.data.len() as u64,
            crc32c: Some(compute_crc32c(&self.data)),
            component_count: Some(self.component_count),
            updated: Some(self.updated),
        }
    }
}

/// One call received by an [`InMemoryGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    /// `create_empty(path)`.
    CreateEmpty {
        /// Object created.
        path: ObjectPath,
        /// When the call arrived.
        at: Instant,
    },
    /// `compose(target, inputs)`.
    Compose {
        /// Compose target.
        target: ObjectPath,
        /// Inputs, in call order.
        inputs: Vec<ObjectPath>,
        /// When the call arrived.
        at: Instant,
    },
    /// `delete(object)`.
    Delete {
        /// Object deleted.
        path: ObjectPath,
        /// When the call arrived.
        at: Instant,
    },
    /// `list(prefix)`.
    List {
        /// Listing prefix.
        prefix: ObjectPath,
        /// When the call arrived.
        at: Instant,
    },
}

impl GatewayCall {
    /// When the call arrived.
    #[must_use]
    pub fn at(&self) -> Instant {
        match self {
            Self::CreateEmpty { at, .. }
            | Self::Compose { at, .. }
            | Self::Delete { at, .. }
            | Self::List { at, .. } => *at,
        }
    }
}

// ---------------------------------------------------------------------------
// InMemoryGateway
// ---------------------------------------------------------------------------

/// Thread-safe in-memory emulation of a compose-capable object store.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use slicefold_core::{ObjectPath, ObjectRef};
/// use slicefold_storage::{InMemoryGateway, StorageGateway};
///
/// # tokio_test::block_on(async {
/// let gateway = InMemoryGateway::new();
/// let a = gateway.put_object(&"gs://b/a".parse().unwrap(), Bytes::from("hello "));
/// let b = gateway.put_object(&"gs://b/b".parse().unwrap(), Bytes::from("world"));
///
/// let target: ObjectPath = "gs://b/out".parse().unwrap();
/// gateway.compose(&target, &[a, b]).await.unwrap();
/// assert_eq!(gateway.read(&target).unwrap().as_ref(), b"hello world");
/// # });
/// ```
pub struct InMemoryGateway {
    objects: DashMap<ObjectPath, StoredObject>,
    max_compose_inputs: usize,
    min_mutation_interval: Option<Duration>,
    delete_latency: Duration,
    journal: Mutex<Vec<GatewayCall>>,
    next_generation: AtomicI64,
    compose_calls: AtomicUsize,
    failing_compose_call: Mutex<Option<usize>>,
    failing_deletes: DashSet<ObjectPath>,
    deletes_in_flight: AtomicUsize,
    peak_deletes_in_flight: AtomicUsize,
}

impl std::fmt::Debug for InMemoryGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryGateway")
            .field("objects_count", &self.objects.len())
            .field("max_compose_inputs", &self.max_compose_inputs)
            .field("min_mutation_interval", &self.min_mutation_interval)
            .field("delete_latency", &self.delete_latency)
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    /// Create an empty gateway with the default compose ceiling and no
    /// mutation-rate enforcement.
    #[must_use]
    pub fn new() -> Self {
        debug!("creating InMemoryGateway");
        Self {
            objects: DashMap::new(),
            max_compose_inputs: DEFAULT_MAX_COMPOSE_INPUTS,
            min_mutation_interval: None,
            delete_latency: Duration::ZERO,
            journal: Mutex::new(Vec::new()),
            next_generation: AtomicI64::new(1),
            compose_calls: AtomicUsize::new(0),
            failing_compose_call: Mutex::new(None),
            failing_deletes: DashSet::new(),
            deletes_in_flight: AtomicUsize::new(0),
            peak_deletes_in_flight: AtomicUsize::new(0),
        }
    }

    /// Set the compose input ceiling.
    #[must_use]
    pub fn with_max_compose_inputs(mut self, limit: usize) -> Self {
        self.max_compose_inputs = limit;
        self
    }

    /// Reject mutations of one object that arrive less than `interval` apart.
    #[must_use]
    pub fn with_min_mutation_interval(mut self, interval: Duration) -> Self {
        self.min_mutation_interval = Some(interval);
        self
    }

    /// Make every delete take `latency` before completing.
    #[must_use]
    pub fn with_delete_latency(mut self, latency: Duration) -> Self {
        self.delete_latency = latency;
        self
    }

    // -----------------------------------------------------------------------
    // Seeding and inspection
    // -----------------------------------------------------------------------

    /// Store `data` at `path`, bypassing rate limits and the journal.
    pub fn put_object(&self, path: &ObjectPath, data: Bytes) -> ObjectRef {
        let stored = self.new_object(data, 1);
        let object = stored.to_ref(path);
        trace!(path = %path, size = object.size, "seeded object");
        self.objects.insert(path.clone(), stored);
        object
    }

    /// Read an object's content.
    pub fn read(&self, path: &ObjectPath) -> StorageResult<Bytes> {
        self.objects
            .get(path)
            .map(|entry| entry.data.clone())
            .ok_or_else(|| StorageError::NotFound { path: path.clone() })
    }

    /// Whether an object exists at `path`.
    #[must_use]
    pub fn exists(&self, path: &ObjectPath) -> bool {
        self.objects.contains_key(path)
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether no objects are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Every call received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.journal.lock().clone()
    }

    /// The compose calls received so far, in arrival order.
    #[must_use]
    pub fn compose_calls(&self) -> Vec<GatewayCall> {
        self.journal
            .lock()
            .iter()
            .filter(|call| matches!(call, GatewayCall::Compose { .. }))
            .cloned()
            .collect()
    }

    /// Highest number of deletes that were in progress at the same time.
    #[must_use]
    pub fn peak_deletes_in_flight(&self) -> usize {
        self.peak_deletes_in_flight.load(Ordering::SeqCst)
    }

    /// Remove every object, journal entry and injected fault.
    pub fn reset(&self) {
        debug!("resetting InMemoryGateway");
        self.objects.clear();
        self.journal.lock().clear();
        self.compose_calls.store(0, Ordering::SeqCst);
        *self.failing_compose_call.lock() = None;
        self.failing_deletes.clear();
        self.peak_deletes_in_flight.store(0, Ordering::SeqCst);
    }

    // -----------------------------------------------------------------------
    // Fault injection
    // -----------------------------------------------------------------------

    /// Fail the `n`-th compose call (1-based) received from now on.
    pub fn fail_compose_call(&self, n: usize) {
        let seen = self.compose_calls.load(Ordering::SeqCst);
        *self.failing_compose_call.lock() = Some(seen + n);
    }

    /// Fail every delete of `path` with an internal error.
    pub fn fail_deletes_of(&self, path: &ObjectPath) {
        self.failing_deletes.insert(path.clone());
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn record(&self, call: GatewayCall) {
        self.journal.lock().push(call);
    }

    fn new_object(&self, data: Bytes, component_count: u32) -> StoredObject {
        StoredObject {
            data,
            generation: self.next_generation.fetch_add(1, Ordering::SeqCst),
            component_count,
            updated: Utc::now(),
            last_mutation: Instant::now(),
        }
    }

    fn check_mutation_rate(&self, path: &ObjectPath, now: Instant) -> StorageResult<()> {
        let Some(interval) = self.min_mutation_interval else {
            return Ok(());
        };
        if let Some(existing) = self.objects.get(path) {
            if now.duration_since(existing.last_mutation) < interval {
                return Err(StorageError::RateLimited { path: path.clone() });
            }
        }
        Ok(())
    }

    fn validate_compose(&self, target: &ObjectPath, inputs: &[ObjectRef]) -> StorageResult<()> {
        if inputs.is_empty() {
            return Err(StorageError::Status {
                status: 400,
                message: "compose requires at least one source object".to_owned(),
            });
        }
        if inputs.len() > self.max_compose_inputs {
            return Err(StorageError::InvalidInputCount {
                target: target.clone(),
                count: inputs.len(),
                limit: self.max_compose_inputs,
            });
        }
        if let Some(foreign) = inputs.iter().find(|i| i.path.bucket() != target.bucket()) {
            return Err(StorageError::CrossBucket {
                target: target.clone(),
                source_path: foreign.path.clone(),
            });
        }
        Ok(())
    }

    fn take_compose_fault(&self) -> bool {
        let n = self.compose_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mut failing = self.failing_compose_call.lock();
        if *failing == Some(n) {
            *failing = None;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl StorageGateway for InMemoryGateway {
    fn max_compose_inputs(&self) -> usize {
        self.max_compose_inputs
    }

    async fn create_empty(&self, path: &ObjectPath) -> StorageResult<ObjectRef> {
        let now = Instant::now();
        self.record(GatewayCall::CreateEmpty {
            path: path.clone(),
            at: now,
        });
        self.check_mutation_rate(path, now)?;

        let stored = self.new_object(Bytes::new(), 1);
        let object = stored.to_ref(path);
        self.objects.insert(path.clone(), stored);
        debug!(path = %path, generation = ?object.generation, "created empty object");
        Ok(object)
    }

    async fn compose(
        &self,
        target: &ObjectPath,
        inputs: &[ObjectRef],
    ) -> StorageResult<ObjectRef> {
        let now = Instant::now();
        self.record(GatewayCall::Compose {
            target: target.clone(),
            inputs: inputs.iter().map(|i| i.path.clone()).collect(),
            at: now,
        });

        if self.take_compose_fault() {
            return Err(StorageError::Internal(anyhow::anyhow!(
                "injected compose failure for {target}"
            )));
        }
        self.validate_compose(target, inputs)?;
        self.check_mutation_rate(target, now)?;

        // Copy every source out before writing, so no map guard is held
        // across the insert into the same map.
        let mut combined = BytesMut::new();
        let mut component_count: u32 = 0;
        for input in inputs {
            let entry = self
                .objects
                .get(&input.path)
                .ok_or_else(|| StorageError::NotFound {
                    path: input.path.clone(),
                })?;
            combined.extend_from_slice(&entry.data);
            component_count = component_count.saturating_add(entry.component_count);
        }

        let stored = self.new_object(combined.freeze(), component_count);
        let object = stored.to_ref(target);
        self.objects.insert(target.clone(), stored);

        debug!(
            object = %target,
            inputs = inputs.len(),
            size = object.size,
            component_count,
            "composed object"
        );
        Ok(object)
    }

    async fn delete(&self, object: &ObjectRef) -> StorageResult<()> {
        self.record(GatewayCall::Delete {
            path: object.path.clone(),
            at: Instant::now(),
        });

        let in_flight = self.deletes_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_deletes_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);
        if !self.delete_latency.is_zero() {
            tokio::time::sleep(self.delete_latency).await;
        }
        self.deletes_in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_deletes.contains(&object.path) {
            return Err(StorageError::Internal(anyhow::anyhow!(
                "injected delete failure for {}",
                object.path
            )));
        }
        match self.objects.remove(&object.path) {
            Some(_) => {
                trace!(path = %object.path, "deleted object");
                Ok(())
            }
            None => Err(StorageError::NotFound {
                path: object.path.clone(),
            }),
        }
    }

    async fn list(&self, prefix: &ObjectPath) -> StorageResult<Vec<ObjectRef>> {
        self.record(GatewayCall::List {
            prefix: prefix.clone(),
            at: Instant::now(),
        });

        let mut objects: Vec<ObjectRef> = self
            .objects
            .iter()
            .filter(|entry| prefix.contains(entry.key()))
            .map(|entry| entry.value().to_ref(entry.key()))
            .collect();
        objects.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(objects)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
