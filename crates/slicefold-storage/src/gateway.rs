//! The storage primitives the composition engine depends on.
//!
//! # Object safety
//!
//! The trait uses `#[async_trait]` so gateways can be shared as
//! `Arc<dyn StorageGateway>` between the composer and the cleanup tasks.

use async_trait::async_trait;
use slicefold_core::{ObjectPath, ObjectRef};

use crate::error::StorageResult;

/// Object storage operations consumed by the composer and cleanup dispatcher.
#[async_trait]
pub trait StorageGateway: Send + Sync + std::fmt::Debug {
    /// Maximum number of inputs a single [`compose`](Self::compose) accepts.
    fn max_compose_inputs(&self) -> usize;

    /// Create (or overwrite) an empty object at `path`.
    async fn create_empty(&self, path: &ObjectPath) -> StorageResult<ObjectRef>;

    /// Replace `target`'s content with the concatenation of `inputs`, in order.
    ///
    /// `inputs` may include `target` itself, which is how an accumulator
    /// grows in place.
    async fn compose(
        &self,
        target: &ObjectPath,
        inputs: &[ObjectRef],
    ) -> StorageResult<ObjectRef>;

    /// Remove an object. Fails with [`crate::StorageError::NotFound`] if it
    /// is already absent.
    async fn delete(&self, object: &ObjectRef) -> StorageResult<()>;

    /// List every object whose name starts with `prefix`'s name.
    ///
    /// Implementations return objects in lexicographic name order, but
    /// callers that depend on an order must impose it themselves.
    async fn list(&self, prefix: &ObjectPath) -> StorageResult<Vec<ObjectRef>>;
}
