//! Cloud Storage JSON API gateway.
//!
//! [`GcsGateway`] maps the four gateway primitives onto the JSON API:
//!
//! | Primitive | Request |
//! |-----------|---------|
//! | `create_empty` | `POST /upload/storage/v1/b/{bucket}/o?uploadType=media&name=...` |
//! | `compose` | `POST /storage/v1/b/{bucket}/o/{object}/compose` |
//! | `delete` | `DELETE /storage/v1/b/{bucket}/o/{object}` |
//! | `list` | `GET /storage/v1/b/{bucket}/o?prefix=...` (paginated) |
//!
//! The gateway never acquires credentials itself; an access token, if any,
//! is supplied through [`GcsConfig`].

mod client;
mod config;
mod model;

pub use client::GcsGateway;
pub use config::GcsConfig;
