//! Folding an ordered slice sequence into one accumulator object.
//!
//! The accumulator is created empty, then grown chunk by chunk: each compose
//! call lists the accumulator first and the chunk's slices after it, and
//! writes the result back onto the accumulator. After `n` successful calls
//! the accumulator holds exactly the first `n` chunks, in order.
//!
//! Mutations of one object are rate limited by the provider, so consecutive
//! mutations of the accumulator (its creation included) are spaced by at
//! least [`ComposeConfig::min_mutation_interval`]. The spacing is measured
//! from the moment the previous mutation returned.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use slicefold_compose::Composer;
//! use slicefold_core::{ComposeConfig, ObjectPath};
//! use slicefold_storage::InMemoryGateway;
//!
//! # tokio_test::block_on(async {
//! let gateway = Arc::new(InMemoryGateway::new());
//! let slices = vec![
//!     gateway.put_object(&"gs://b/s/1".parse().unwrap(), Bytes::from("a")),
//!     gateway.put_object(&"gs://b/s/2".parse().unwrap(), Bytes::from("b")),
//! ];
//! let config = ComposeConfig::builder().min_mutation_interval_ms(0).build();
//! let composer = Composer::new(gateway.clone(), config).unwrap();
//!
//! let destination: ObjectPath = "gs://b/out".parse().unwrap();
//! let report = composer.run(&destination, &slices).await.unwrap();
//! assert_eq!(report.chunks_composed, 1);
//! assert_eq!(gateway.read(&destination).unwrap().as_ref(), b"ab");
//! assert_eq!(gateway.len(), 1);
//! # });
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use slicefold_core::{ComposeConfig, ObjectPath, ObjectRef};
use slicefold_storage::StorageGateway;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::chunker::{chunk_count, chunks};
use crate::cleanup::{CleanupDispatcher, CleanupReport};
use crate::error::ComposeError;

/// Summary of a completed [`Composer::run`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionReport {
    /// Identifier attached to every log line of the run.
    pub run_id: Uuid,
    /// The final accumulator.
    pub accumulator: ObjectRef,
    /// Compose calls issued.
    pub chunks_composed: usize,
    /// Slices folded into the accumulator.
    pub slices_folded: usize,
    /// Outcome of slice deletion (empty when deletion is disabled).
    pub cleanup: CleanupReport,
    /// Wall time of the whole run, cleanup included.
    pub elapsed: Duration,
}

/// Sequential accumulator composer.
#[derive(Debug, Clone)]
pub struct Composer {
    gateway: Arc<dyn StorageGateway>,
    config: ComposeConfig,
    cancel: CancellationToken,
}

impl Composer {
    /// Create a composer over `gateway`.
    ///
    /// # Errors
    /// Returns [`ComposeError::InvalidConfig`] if `config` is inconsistent,
    /// and [`ComposeError::InvalidInputCount`] if a chunk plus the
    /// accumulator would exceed the gateway's compose ceiling.
    pub fn new(
        gateway: Arc<dyn StorageGateway>,
        config: ComposeConfig,
    ) -> Result<Self, ComposeError> {
        config.validate()?;
        let count = config.chunk_size.saturating_add(1);
        let limit = gateway.max_compose_inputs();
        if count > limit {
            return Err(ComposeError::InvalidInputCount { count, limit });
        }
        Ok(Self {
            gateway,
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Stop between compose calls once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &ComposeConfig {
        &self.config
    }

    /// Create an empty accumulator at `destination` and fold `slices` into
    /// it, in order.
    ///
    /// When `cleanup` is given, each chunk's slices are dispatched for
    /// deletion as soon as the compose call that consumed them succeeds. The
    /// accumulator itself is never dispatched.
    ///
    /// # Errors
    /// Fails before touching storage if the destination or a slice is
    /// unusable. Storage failures stop the run at once; errors raised after
    /// the accumulator was created carry its last valid state.
    pub async fn compose_all(
        &self,
        destination: &ObjectPath,
        slices: &[ObjectRef],
        cleanup: Option<&CleanupDispatcher>,
    ) -> Result<ObjectRef, ComposeError> {
        validate_inputs(destination, slices)?;

        let accumulator = self
            .gateway
            .create_empty(destination)
            .await
            .map_err(|source| {
                error!(destination = %destination, error = %source, "failed to create accumulator");
                ComposeError::CreateFailed {
                    destination: destination.clone(),
                    source,
                }
            })?;
        debug!(accumulator = %accumulator, "created empty accumulator");

        self.fold(accumulator, Instant::now(), slices, cleanup).await
    }

    /// Continue folding `slices` into an existing accumulator, typically the
    /// one carried by a failed run's error together with the slices it had
    /// not folded yet.
    ///
    /// The first compose call waits a full mutation interval, since the
    /// accumulator's last mutation time is unknown. Errors count
    /// `slices_folded` relative to `slices`.
    ///
    /// # Errors
    /// Same as [`compose_all`](Self::compose_all), minus creation failures.
    pub async fn resume(
        &self,
        accumulator: ObjectRef,
        slices: &[ObjectRef],
        cleanup: Option<&CleanupDispatcher>,
    ) -> Result<ObjectRef, ComposeError> {
        validate_inputs(&accumulator.path, slices)?;
        info!(accumulator = %accumulator, slices = slices.len(), "resuming composition");
        self.fold(accumulator, Instant::now(), slices, cleanup).await
    }

    /// Compose `slices` into `destination`, delete them if configured, and
    /// wait for the deletions before returning.
    ///
    /// # Errors
    /// See [`compose_all`](Self::compose_all). Deletions already dispatched
    /// when an error occurs are still awaited.
    pub async fn run(
        &self,
        destination: &ObjectPath,
        slices: &[ObjectRef],
    ) -> Result<CompositionReport, ComposeError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("composition", %run_id, destination = %destination);
        async move {
            let started = Instant::now();
            let chunks_composed = chunk_count(slices.len(), self.config.chunk_size);
            info!(slices = slices.len(), chunks = chunks_composed, "starting composition");

            let dispatcher = self.config.delete_slices.then(|| {
                CleanupDispatcher::from_config(Arc::clone(&self.gateway), &self.config)
            });
            let result = self
                .compose_all(destination, slices, dispatcher.as_ref())
                .await;
            let cleanup = match dispatcher {
                Some(dispatcher) => dispatcher.join().await,
                None => CleanupReport::default(),
            };

            match result {
                Ok(accumulator) => {
                    let elapsed = started.elapsed();
                    info!(
                        accumulator = %accumulator,
                        size = accumulator.size,
                        chunks = chunks_composed,
                        deleted = cleanup.deleted,
                        failed_deletes = cleanup.failures.len(),
                        elapsed_ms = elapsed.as_millis(),
                        "composition finished"
                    );
                    Ok(CompositionReport {
                        run_id,
                        accumulator,
                        chunks_composed,
                        slices_folded: slices.len(),
                        cleanup,
                        elapsed,
                    })
                }
                Err(e) => {
                    error!(
                        error = %e,
                        slices_folded = e.slices_folded(),
                        deleted = cleanup.deleted,
                        "composition failed"
                    );
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn fold(
        &self,
        mut accumulator: ObjectRef,
        mut last_mutation: Instant,
        slices: &[ObjectRef],
        cleanup: Option<&CleanupDispatcher>,
    ) -> Result<ObjectRef, ComposeError> {
        let interval = self.config.min_mutation_interval();
        let limit = self.gateway.max_compose_inputs();
        let mut folded = 0;

        for (index, chunk) in chunks(slices, self.config.chunk_size)?.enumerate() {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    warn!(accumulator = %accumulator, slices_folded = folded, "composition cancelled");
                    return Err(ComposeError::Cancelled {
                        accumulator: Box::new(accumulator),
                        slices_folded: folded,
                    });
                }
                () = sleep_until(last_mutation + interval) => {}
            }

            let mut inputs = Vec::with_capacity(chunk.len() + 1);
            inputs.push(accumulator.clone());
            inputs.extend(chunk.into_iter().cloned());
            if inputs.len() > limit {
                return Err(ComposeError::InvalidInputCount {
                    count: inputs.len(),
                    limit,
                });
            }

            match self.gateway.compose(&accumulator.path, &inputs).await {
                Ok(composed) => {
                    last_mutation = Instant::now();
                    let consumed = inputs.split_off(1);
                    folded += consumed.len();
                    debug!(
                        chunk = index,
                        inputs = consumed.len() + 1,
                        slices_folded = folded,
                        size = composed.size,
                        "folded chunk into accumulator"
                    );
                    accumulator = composed;
                    if let Some(cleanup) = cleanup {
                        cleanup.dispatch(consumed);
                    }
                }
                Err(source) => {
                    error!(
                        chunk = index,
                        slices_folded = folded,
                        error = %source,
                        "compose call failed"
                    );
                    return Err(ComposeError::ComposeFailed {
                        chunk_index: index,
                        accumulator: Box::new(accumulator),
                        slices_folded: folded,
                        source,
                    });
                }
            }
        }

        Ok(accumulator)
    }
}

/// Reject inputs that would make the provider fail mid-run.
fn validate_inputs(destination: &ObjectPath, slices: &[ObjectRef]) -> Result<(), ComposeError> {
    if destination.name().is_empty() {
        return Err(ComposeError::InvalidDestination {
            destination: destination.clone(),
        });
    }
    let mut seen = HashSet::with_capacity(slices.len());
    for slice in slices {
        if slice.path == *destination {
            return Err(ComposeError::DestinationInSlices {
                destination: destination.clone(),
            });
        }
        if !seen.insert(&slice.path) {
            return Err(ComposeError::DuplicateSlice {
                slice: slice.path.clone(),
            });
        }
        if slice.path.bucket() != destination.bucket() {
            return Err(ComposeError::CrossBucket {
                destination: destination.clone(),
                slice: slice.path.clone(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
