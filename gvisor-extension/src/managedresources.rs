//! Managed resources targeting the shoot
//!
//! A managed resource is a `ManagedResource` plus a `Secret` holding the manifests.
//! The gardener resource manager applies the manifests to the shoot and removes them again
//! when the managed resource is deleted, unless it is asked to keep them.
use gvisor_core::{
    gvisor,
    resources::{self, LocalObjectReference, ManagedResource, ManagedResourceSpec},
};
use k8s_openapi::{api::core::v1::Secret, apimachinery::pkg::apis::meta::v1::ObjectMeta, ByteString};
use kube::{
    api::{DeleteParams, Patch, PatchParams},
    Api, Client,
};
use serde_json::json;
use std::{collections::BTreeMap, future::Future};

/// Create and delete managed resources for a shoot
pub trait ManagedResources {
    /// Create or update the managed resource `name` with `data` as manifests
    fn create_for_shoot(
        &self,
        namespace: &str,
        name: &str,
        origin: &str,
        keep_objects: bool,
        data: BTreeMap<String, Vec<u8>>,
    ) -> impl Future<Output = Result<(), kube::Error>> + Send;

    /// Delete the managed resource `name` and its secret, if present
    fn delete_for_shoot(&self, namespace: &str, name: &str) -> impl Future<Output = Result<(), kube::Error>> + Send;

    /// Change whether the objects of `name` survive its deletion, if present
    fn set_keep_objects(
        &self,
        namespace: &str,
        name: &str,
        keep_objects: bool,
    ) -> impl Future<Output = Result<(), kube::Error>> + Send;
}

/// [`ManagedResources`] talking to the seed's api server
#[derive(Clone)]
pub struct KubeManagedResources {
    client: Client,
}

impl KubeManagedResources {
    /// Manage resources through `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn ignore_not_found<T>(res: Result<T, kube::Error>) -> Result<Option<T>, kube::Error> {
    match res {
        Ok(t) => Ok(Some(t)),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(e) => Err(e),
    }
}

fn secret(namespace: &str, name: &str, origin: &str, data: BTreeMap<String, Vec<u8>>) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(resources::secret_name(name)),
            namespace: Some(namespace.to_owned()),
            labels: Some(BTreeMap::from([(resources::ORIGIN_LABEL.to_owned(), origin.to_owned())])),
            ..ObjectMeta::default()
        },
        type_: Some("Opaque".to_owned()),
        data: Some(data.into_iter().map(|(k, v)| (k, ByteString(v))).collect()),
        ..Secret::default()
    }
}

fn managed_resource(namespace: &str, name: &str, origin: &str, keep_objects: bool) -> ManagedResource {
    let mut mr = ManagedResource::new(name, ManagedResourceSpec {
        class: None,
        secret_refs: vec![LocalObjectReference {
            name: resources::secret_name(name),
        }],
        inject_labels: Some(BTreeMap::from([(
            resources::SHOOT_NO_CLEANUP_LABEL.to_owned(),
            "true".to_owned(),
        )])),
        keep_objects: Some(keep_objects),
    });
    mr.metadata.namespace = Some(namespace.to_owned());
    mr.metadata.labels = Some(BTreeMap::from([(resources::ORIGIN_LABEL.to_owned(), origin.to_owned())]));
    mr
}

impl ManagedResources for KubeManagedResources {
    async fn create_for_shoot(
        &self,
        namespace: &str,
        name: &str,
        origin: &str,
        keep_objects: bool,
        data: BTreeMap<String, Vec<u8>>,
    ) -> Result<(), kube::Error> {
        let pp = PatchParams::apply(gvisor::EXTENSION_NAME).force();

        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = secret(namespace, name, origin, data);
        secrets
            .patch(&resources::secret_name(name), &pp, &Patch::Apply(&secret))
            .await?;

        let mrs: Api<ManagedResource> = Api::namespaced(self.client.clone(), namespace);
        let mr = managed_resource(namespace, name, origin, keep_objects);
        mrs.patch(name, &pp, &Patch::Apply(&mr)).await?;
        tracing::debug!(namespace, name, "applied managed resource");
        Ok(())
    }

    async fn delete_for_shoot(&self, namespace: &str, name: &str) -> Result<(), kube::Error> {
        let dp = DeleteParams::default();
        let mrs: Api<ManagedResource> = Api::namespaced(self.client.clone(), namespace);
        ignore_not_found(mrs.delete(name, &dp).await)?;
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        ignore_not_found(secrets.delete(&resources::secret_name(name), &dp).await)?;
        tracing::debug!(namespace, name, "deleted managed resource");
        Ok(())
    }

    async fn set_keep_objects(&self, namespace: &str, name: &str, keep_objects: bool) -> Result<(), kube::Error> {
        let mrs: Api<ManagedResource> = Api::namespaced(self.client.clone(), namespace);
        let patch = json!({ "spec": { "keepObjects": keep_objects } });
        ignore_not_found(mrs.patch(name, &PatchParams::default(), &Patch::Merge(&patch)).await)?;
        Ok(())
    }
}
