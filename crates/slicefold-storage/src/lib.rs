//! Storage gateways for slicefold.
//!
//! The composition engine only talks to storage through the
//! [`StorageGateway`] trait. This crate provides the trait, its error type,
//! and two implementations:
//!
//! - [`InMemoryGateway`]: a thread-safe emulator of the provider object
//!   model, enforcing compose limits and mutation rates, with fault injection
//!   for tests.
//! - [`GcsGateway`]: a client for the Cloud Storage JSON API.
//!
//! # Architecture
//!
//! ```text
//! Composer / CleanupDispatcher
//!        |
//!        v
//! Arc<dyn StorageGateway>
//!        |
//!   +----+------------+
//!   v                 v
//! InMemoryGateway   GcsGateway --> storage.googleapis.com (or emulator)
//! ```

pub mod checksums;
pub mod error;
pub mod gateway;
pub mod gcs;
pub mod memory;

pub use error::{StorageError, StorageResult};
pub use gateway::StorageGateway;
pub use gcs::{GcsConfig, GcsGateway};
pub use memory::{GatewayCall, InMemoryGateway};
