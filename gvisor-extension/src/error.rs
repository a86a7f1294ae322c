use crate::charts::RenderError;
use thiserror::Error;

/// Possible errors when reconciling a `ContainerRuntime`
#[derive(Error, Debug)]
pub enum Error {
    /// No chart renderer could be built for the shoot
    #[error("could not create chart renderer for shoot '{namespace}', {source}")]
    ChartRenderer {
        /// Control plane namespace of the shoot
        namespace: String,
        /// The underlying renderer error
        #[source]
        source: RenderError,
    },

    /// The gVisor chart failed to render
    #[error("failed to render gVisor chart for shoot '{namespace}': {source}")]
    RenderChart {
        /// Control plane namespace of the shoot
        namespace: String,
        /// The underlying renderer error
        #[source]
        source: RenderError,
    },

    /// A managed resource could not be written
    #[error("failed to {action} managed resource {namespace}/{name}: {source}")]
    ManagedResource {
        /// What was attempted
        action: &'static str,
        /// Namespace of the managed resource
        namespace: String,
        /// Name of the managed resource
        name: String,
        /// The underlying api error
        #[source]
        source: kube::Error,
    },

    /// The `Cluster` of the shoot could not be read
    #[error("failed to get cluster {name}: {source}")]
    GetCluster {
        /// Name of the cluster
        name: String,
        /// The underlying api error
        #[source]
        source: kube::Error,
    },

    /// The resource or its annotations could not be updated
    #[error("failed to {action} of {namespace}/{name}: {source}")]
    Update {
        /// What was attempted
        action: &'static str,
        /// Namespace of the resource
        namespace: String,
        /// Name of the resource
        name: String,
        /// The underlying api error
        #[source]
        source: kube::Error,
    },

    /// A patch could not be built
    #[error("failed to build patch: {0}")]
    BuildPatch(#[source] serde_json::Error),

    /// The resource is not namespaced
    #[error("{0} has no namespace")]
    MissingNamespace(String),

    /// Errors from the client-less part of the extension
    #[error(transparent)]
    Core(#[from] gvisor_core::Error),

    /// Adding, running or removing the finalizer failed
    #[error("finalizer error: {0}")]
    Finalizer(#[source] Box<kube::runtime::finalizer::Error<Error>>),
}
