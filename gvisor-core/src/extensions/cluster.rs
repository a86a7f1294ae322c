use crate::{Error, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Snapshot of the garden resources of a shoot, named like the shoot's control plane namespace
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(group = "extensions.gardener.cloud", version = "v1alpha1", kind = "Cluster")]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// The raw `CloudProfile`
    #[serde(default)]
    pub cloud_profile: serde_json::Value,
    /// The raw `Seed`
    #[serde(default)]
    pub seed: serde_json::Value,
    /// The raw `Shoot`
    #[serde(default)]
    pub shoot: serde_json::Value,
}

/// The parts of a `Shoot` the extension needs
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Shoot {
    /// Shoot metadata, the namespace being the project namespace
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Shoot spec
    #[serde(default)]
    pub spec: ShootSpec,
}

/// The parts of a shoot spec the extension needs
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct ShootSpec {
    /// Kubernetes settings of the shoot
    #[serde(default)]
    pub kubernetes: ShootKubernetes,
}

/// Kubernetes settings of a shoot
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct ShootKubernetes {
    /// Kubernetes version, e.g. `1.31.1`
    #[serde(default)]
    pub version: String,
}

impl Cluster {
    /// Decode the shoot embedded in this cluster
    pub fn shoot(&self) -> Result<Shoot> {
        if self.spec.shoot.is_null() {
            return Err(Error::MissingShoot(self.name_any()));
        }
        Shoot::deserialize(&self.spec.shoot).map_err(|source| Error::DecodeShoot {
            cluster: self.name_any(),
            source,
        })
    }
}

impl Shoot {
    /// Name of the shoot
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Project namespace of the shoot
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }
}
