//! The `resources.gardener.cloud/v1alpha1` [`ManagedResource`]
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label naming the component that created a managed resource
pub const ORIGIN_LABEL: &str = "resources.gardener.cloud/origin";
/// Injected label that keeps shoot objects from being cleaned up on shoot deletion
pub const SHOOT_NO_CLEANUP_LABEL: &str = "shoot.gardener.cloud/no-cleanup";
/// Prefix of the secrets holding managed resource content
pub const SECRET_PREFIX: &str = "managedresource-";

/// A bundle of raw manifests applied to a target cluster by the gardener resource manager
///
/// The manifests are read from the referenced secrets, one object stream per data key.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "resources.gardener.cloud",
    version = "v1alpha1",
    kind = "ManagedResource",
    namespaced,
    shortname = "mr"
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResourceSpec {
    /// Resource manager class, absent for resources targeting the shoot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Secrets holding the manifests
    #[serde(default)]
    pub secret_refs: Vec<LocalObjectReference>,
    /// Labels added to every applied object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inject_labels: Option<BTreeMap<String, String>>,
    /// Leave the applied objects in place when the managed resource is deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_objects: Option<bool>,
}

/// Reference to an object in the same namespace
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct LocalObjectReference {
    /// Name of the referenced object
    pub name: String,
}

/// Name of the secret holding the content of the managed resource `name`
pub fn secret_name(name: &str) -> String {
    format!("{SECRET_PREFIX}{name}")
}
