//! Controller and admission webhook of the gVisor runtime extension
//!
//! The extension has two halves, sharing the types of [`gvisor_core`]:
//!
//! - the [`controller`] reconciles `ContainerRuntime` resources of type `gvisor` through the
//!   [`actuator`], which renders the gVisor chart ([`charts`]) into a managed resource
//!   ([`managedresources`]) for the shoot
//! - the [`webhook`] mutates `OperatingSystemConfig` resources so that machines get the
//!   `runsc` binaries and a containerd runtime handler for them

pub mod actuator;
pub use actuator::Actuator;

pub mod charts;

pub mod controller;

pub mod managedresources;
pub use managedresources::{KubeManagedResources, ManagedResources};

pub mod webhook;

mod error;
pub use error::Error;

/// Convient alias for `Result<T, Error>`
pub type Result<T, E = Error> = std::result::Result<T, E>;
