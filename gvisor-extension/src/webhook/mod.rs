//! Admission webhook mutating `OperatingSystemConfig` resources
//!
//! Machines of a shoot are bootstrapped from `OperatingSystemConfig`s. The webhook injects
//! the gVisor binaries as files extracted from the installation image, and registers the
//! `runsc` runtime handler with containerd next to the default `runc` one.
//!
//! The layers are:
//!
//! - [`OscEnsurer`] with the pure ensure functions, implemented by [`GVisorEnsurer`]
//! - [`Mutator`] applying an ensurer to an object and computing a JSON patch
//! - [`router`] exposing the mutator as an `AdmissionReview` endpoint
use thiserror::Error;

mod ensurer;
pub use ensurer::{GVisorEnsurer, OscEnsurer};

mod mutator;
pub use mutator::Mutator;

mod server;
pub use server::{admit, router, serve, TlsFiles};

/// Name of the webhook
pub const NAME: &str = "gvisor-operatingsystemconfig-webhook";

/// Path the webhook is served at
pub const PATH: &str = "/webhooks/gvisor-osc";

/// Possible errors while mutating an object
#[derive(Error, Debug)]
pub enum Error {
    /// The object carries no spec
    #[error("object has no spec")]
    MissingSpec,

    /// The spec could not be decoded
    #[error("failed to decode spec: {0}")]
    DecodeSpec(#[source] serde_json::Error),

    /// The mutated object could not be encoded
    #[error("failed to encode object: {0}")]
    EncodeObject(#[source] serde_json::Error),

    /// Errors from the client-less part of the extension
    #[error(transparent)]
    Core(#[from] gvisor_core::Error),
}
