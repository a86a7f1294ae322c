//! The operations the controller runs against a `ContainerRuntime`
use crate::{
    charts::{self, ChartRendererFactory, GVISOR_CONFIG_KEY},
    managedresources::ManagedResources,
    Error, Result,
};
use gvisor_core::{
    extensions::{Cluster, ContainerRuntime},
    gvisor,
};
use kube::ResourceExt;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{info, instrument};

/// Deploys gVisor for the shoot of a `ContainerRuntime`
pub struct Actuator<M, F> {
    managed_resources: M,
    charts: F,
}

fn namespace_of(cr: &ContainerRuntime) -> Result<String> {
    cr.namespace().ok_or_else(|| Error::MissingNamespace(cr.name_any()))
}

impl<M, F> Actuator<M, F>
where
    M: ManagedResources,
    F: ChartRendererFactory,
{
    /// Create an actuator writing managed resources through `managed_resources`
    pub fn new(managed_resources: M, charts: F) -> Self {
        Self {
            managed_resources,
            charts,
        }
    }

    fn render_chart(&self, namespace: &str, kubernetes_version: &str) -> Result<Vec<u8>> {
        let renderer = self
            .charts
            .new_chart_renderer_for_shoot(kubernetes_version)
            .map_err(|source| Error::ChartRenderer {
                namespace: namespace.to_owned(),
                source,
            })?;
        charts::render_gvisor_chart(&renderer).map_err(|source| Error::RenderChart {
            namespace: namespace.to_owned(),
            source,
        })
    }

    async fn delete_managed_resource(&self, namespace: &str, name: &str) -> Result<()> {
        self.managed_resources
            .delete_for_shoot(namespace, name)
            .await
            .map_err(|source| Error::ManagedResource {
                action: "delete",
                namespace: namespace.to_owned(),
                name: name.to_owned(),
                source,
            })
    }

    /// Deploy the gVisor chart into the shoot
    ///
    /// The per worker pool installation managed resource of older versions is removed.
    #[instrument(skip_all, fields(namespace = %cr.namespace().unwrap_or_default(), name = %cr.name_any()))]
    pub async fn reconcile(&self, cr: &ContainerRuntime, cluster: &Cluster) -> Result<()> {
        let namespace = namespace_of(cr)?;
        let shoot = cluster.shoot()?;
        let chart = self.render_chart(&namespace, &shoot.spec.kubernetes.version)?;

        info!(
            shoot = shoot.name(),
            shoot_namespace = shoot.namespace(),
            "Preparing gVisor installation"
        );
        let data = BTreeMap::from([(GVISOR_CONFIG_KEY.to_owned(), chart)]);
        self.managed_resources
            .create_for_shoot(
                &namespace,
                gvisor::MANAGED_RESOURCE_NAME,
                gvisor::EXTENSION_NAME,
                false,
                data,
            )
            .await
            .map_err(|source| Error::ManagedResource {
                action: "create",
                namespace: namespace.clone(),
                name: gvisor::MANAGED_RESOURCE_NAME.to_owned(),
                source,
            })?;

        let installation = gvisor::installation_managed_resource_name(&cr.spec.worker_pool.name);
        self.delete_managed_resource(&namespace, &installation).await
    }

    /// Restore gVisor after the shoot's control plane moved to this seed
    pub async fn restore(&self, cr: &ContainerRuntime, cluster: &Cluster) -> Result<()> {
        self.reconcile(cr, cluster).await
    }

    /// Remove gVisor for the worker pool of `cr`
    ///
    /// The shared managed resource is kept while `runtimes` holds another live gVisor
    /// `ContainerRuntime` in the same namespace.
    #[instrument(skip_all, fields(namespace = %cr.namespace().unwrap_or_default(), name = %cr.name_any()))]
    pub async fn delete(&self, cr: &ContainerRuntime, runtimes: &[Arc<ContainerRuntime>]) -> Result<()> {
        let namespace = namespace_of(cr)?;
        let installation = gvisor::installation_managed_resource_name(&cr.spec.worker_pool.name);
        self.delete_managed_resource(&namespace, &installation).await?;

        let remaining = remaining_runtimes(cr, runtimes);
        if remaining > 0 {
            info!(remaining, "Keeping gVisor managed resource for other worker pools");
            return Ok(());
        }
        info!("Deleting gVisor managed resource");
        self.delete_managed_resource(&namespace, gvisor::MANAGED_RESOURCE_NAME)
            .await
    }

    /// Release the managed resources without touching the objects in the shoot
    #[instrument(skip_all, fields(namespace = %cr.namespace().unwrap_or_default(), name = %cr.name_any()))]
    pub async fn migrate(&self, cr: &ContainerRuntime) -> Result<()> {
        let namespace = namespace_of(cr)?;
        let installation = gvisor::installation_managed_resource_name(&cr.spec.worker_pool.name);
        for name in [gvisor::MANAGED_RESOURCE_NAME, installation.as_str()] {
            self.managed_resources
                .set_keep_objects(&namespace, name, true)
                .await
                .map_err(|source| Error::ManagedResource {
                    action: "keep objects of",
                    namespace: namespace.clone(),
                    name: name.to_owned(),
                    source,
                })?;
            self.delete_managed_resource(&namespace, name).await?;
        }
        Ok(())
    }
}

/// Number of gVisor runtimes other than `cr` in its namespace that are not being deleted
fn remaining_runtimes(cr: &ContainerRuntime, runtimes: &[Arc<ContainerRuntime>]) -> usize {
    runtimes
        .iter()
        .filter(|other| {
            other.is_gvisor()
                && other.namespace() == cr.namespace()
                && other.name_any() != cr.name_any()
                && other.metadata.deletion_timestamp.is_none()
        })
        .count()
}
