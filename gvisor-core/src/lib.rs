//! Types and client-less behavior for the gVisor runtime extension
//!
//! This crate holds everything that does not need a running cluster:
//!
//! - [`ensure`] with the keyed upsert used to patch file and plugin lists
//! - [`extensions`] with the `extensions.gardener.cloud` resources the extension reads and mutates
//! - [`resources`] with the `resources.gardener.cloud` [`ManagedResource`](resources::ManagedResource)
//! - [`imagevector`] for resolving component names into image references
//! - [`gvisor`] with the names and paths shared between the controller and the webhook
//!
//! The controller and webhook built on top of these live in `gvisor-extension`.

pub mod ensure;
pub use ensure::{ensure, Keyed};

pub mod extensions;

pub mod gvisor;

pub mod imagevector;
pub use imagevector::ImageVector;

pub mod resources;

mod error;
pub use error::Error;

/// Convient alias for `Result<T, Error>`
pub type Result<T, E = Error> = std::result::Result<T, E>;
