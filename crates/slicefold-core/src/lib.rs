//! Core types, configuration, and errors for slicefold.
//!
//! This crate provides the building blocks shared by the storage gateways and
//! the composition engine: object addressing ([`ObjectPath`], [`ObjectRef`]),
//! the run configuration ([`ComposeConfig`]), and the base error type.

mod config;
mod error;
mod types;

pub use config::ComposeConfig;
pub use error::{SliceFoldError, SliceFoldResult};
pub use types::{ObjectPath, ObjectRef};
