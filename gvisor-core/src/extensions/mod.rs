//! Resources of the `extensions.gardener.cloud/v1alpha1` API group
//!
//! Only the parts the gVisor extension reads or writes are modelled.
//! Opaque sub-trees (provider configs, registries, raw shoots) are kept as [`serde_json::Value`]
//! so that they survive a round trip through these types.

mod cluster;
pub use cluster::{Cluster, ClusterSpec, Shoot, ShootKubernetes, ShootSpec};

mod container_runtime;
pub use container_runtime::{
    ContainerRuntime, ContainerRuntimeSpec, ContainerRuntimeStatus, ContainerRuntimeWorkerPool, LastError,
    LastOperation, LastOperationState, LastOperationType,
};

mod operatingsystemconfig;
pub use operatingsystemconfig::{
    ContainerdConfig, CriConfig, File, FileContent, FileContentImageRef, FileContentInline, FileContentSecretRef,
    OperatingSystemConfigPurpose, OperatingSystemConfigSpec, PluginConfig, PluginPathOperation, CRI_NAME_CONTAINERD,
};

/// API group of the extension resources
pub const GROUP: &str = "extensions.gardener.cloud";

/// Kind of the resource mutated by the webhook
pub const OPERATING_SYSTEM_CONFIG_KIND: &str = "OperatingSystemConfig";

/// Annotation through which gardener asks an extension to act on a resource
pub const OPERATION_ANNOTATION: &str = "gardener.cloud/operation";

/// The values of the [`OPERATION_ANNOTATION`] understood by the extension
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Reconcile regardless of generation
    Reconcile,
    /// Restore after a control plane migration
    Restore,
    /// Prepare for a control plane migration
    Migrate,
}

impl Operation {
    /// Parse an annotation value, ignoring values meant for other components
    pub fn from_annotation(value: &str) -> Option<Self> {
        match value {
            "reconcile" => Some(Self::Reconcile),
            "restore" => Some(Self::Restore),
            "migrate" => Some(Self::Migrate),
            _ => None,
        }
    }
}
