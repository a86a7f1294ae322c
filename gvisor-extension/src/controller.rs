//! Controller reconciling `ContainerRuntime` resources of type `gvisor`
//!
//! Each operation records its progress in `status.lastOperation`. Gardener drives the
//! controller through the `gardener.cloud/operation` annotation, which is removed once the
//! requested operation succeeded.
use crate::{
    actuator::Actuator, charts::StaticChartRendererFactory, managedresources::KubeManagedResources, Error,
    Result,
};
use chrono::{SecondsFormat, Utc};
use futures::StreamExt;
use gvisor_core::extensions::{
    Cluster, ContainerRuntime, LastError, LastOperation, LastOperationState, LastOperationType, Operation,
    OPERATION_ANNOTATION,
};
use kube::{
    api::{Patch, PatchParams},
    runtime::{
        controller::{Action, Config as ControllerConfig},
        finalizer::{finalizer, Event},
        reflector::Store,
        watcher, Controller,
    },
    Api, Client, ResourceExt,
};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument, warn};

/// Finalizer guarding the cleanup of the managed resources
pub const FINALIZER: &str = "extensions.gardener.cloud/runtime-gvisor";

const ERROR_REQUEUE: Duration = Duration::from_secs(5);

/// The actuator the controller runs against the seed
pub type GVisorActuator = Actuator<KubeManagedResources, StaticChartRendererFactory>;

/// Settings of the controller
#[derive(Clone, Debug)]
pub struct Config {
    /// Upper bound of concurrently running reconciliations
    pub max_concurrent_reconciles: u16,
    /// Reconcile on spec changes without waiting for the operation annotation
    pub ignore_operation_annotation: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_reconciles: 5,
            ignore_operation_annotation: false,
        }
    }
}

/// State shared by all reconciliations
pub struct Context {
    client: Client,
    actuator: GVisorActuator,
    store: Store<ContainerRuntime>,
    config: Config,
}

impl Context {
    pub(crate) fn new(
        client: Client,
        actuator: GVisorActuator,
        store: Store<ContainerRuntime>,
        config: Config,
    ) -> Self {
        Self {
            client,
            actuator,
            store,
            config,
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn verb(type_: LastOperationType) -> &'static str {
    match type_ {
        LastOperationType::Create | LastOperationType::Reconcile => "reconcile",
        LastOperationType::Delete => "delete",
        LastOperationType::Migrate => "migrate",
        LastOperationType::Restore => "restore",
    }
}

fn last_operation(type_: LastOperationType, state: LastOperationState, description: String) -> LastOperation {
    let progress = match state {
        LastOperationState::Processing => 1,
        LastOperationState::Succeeded => 100,
        LastOperationState::Error | LastOperationState::Failed => 50,
    };
    LastOperation {
        description,
        last_update_time: now(),
        progress,
        state,
        type_,
    }
}

fn processing_status(type_: LastOperationType) -> Value {
    let op = last_operation(
        type_,
        LastOperationState::Processing,
        format!("Processing {} of gVisor container runtime", verb(type_)),
    );
    json!({ "status": { "lastOperation": op } })
}

fn succeeded_status(type_: LastOperationType, generation: Option<i64>) -> Value {
    let op = last_operation(
        type_,
        LastOperationState::Succeeded,
        format!("Successfully completed {} of gVisor container runtime", verb(type_)),
    );
    json!({ "status": { "lastOperation": op, "lastError": null, "observedGeneration": generation } })
}

fn error_status(type_: LastOperationType, err: &Error) -> Value {
    let description = format!("Error during {} of gVisor container runtime: {err}", verb(type_));
    let error = LastError {
        description: description.clone(),
        last_update_time: Some(now()),
    };
    let op = last_operation(type_, LastOperationState::Error, description);
    json!({ "status": { "lastOperation": op, "lastError": error } })
}

/// Whether `cr` has work left without an explicit request through the operation annotation
///
/// With `ignore_operation_annotation` any spec change is acted upon, otherwise only
/// operations that did not succeed yet are retried.
fn needs_reconcile(cr: &ContainerRuntime, ignore_operation_annotation: bool) -> bool {
    if cr.operation().is_some() {
        return true;
    }
    if ignore_operation_annotation {
        return !cr.is_up_to_date();
    }
    let succeeded = cr
        .status
        .as_ref()
        .and_then(|s| s.last_operation.as_ref())
        .is_some_and(|op| op.state == LastOperationState::Succeeded);
    !succeeded
}

fn remove_finalizer_patch(cr: &ContainerRuntime) -> Result<Option<json_patch::Patch>, serde_json::Error> {
    let Some(index) = cr.finalizers().iter().position(|f| f == FINALIZER) else {
        return Ok(None);
    };
    let path = format!("/metadata/finalizers/{index}");
    serde_json::from_value(json!([
        { "op": "test", "path": path, "value": FINALIZER },
        { "op": "remove", "path": path },
    ]))
    .map(Some)
}

async fn patch_status(api: &Api<ContainerRuntime>, cr: &ContainerRuntime, status: Value) -> Result<()> {
    let name = cr.name_any();
    api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&status))
        .await
        .map_err(|source| Error::Update {
            action: "patch status",
            namespace: cr.namespace().unwrap_or_default(),
            name,
            source,
        })?;
    Ok(())
}

/// Record the outcome of an operation and hand back its error
async fn finish(
    api: &Api<ContainerRuntime>,
    cr: &ContainerRuntime,
    type_: LastOperationType,
    res: Result<()>,
) -> Result<()> {
    match res {
        Ok(()) => patch_status(api, cr, succeeded_status(type_, cr.metadata.generation)).await,
        Err(err) => {
            if let Err(status_err) = patch_status(api, cr, error_status(type_, &err)).await {
                warn!(error = %status_err, "could not record failed operation");
            }
            Err(err)
        }
    }
}

async fn remove_operation_annotation(api: &Api<ContainerRuntime>, cr: &ContainerRuntime) -> Result<()> {
    if !cr.annotations().contains_key(OPERATION_ANNOTATION) {
        return Ok(());
    }
    let name = cr.name_any();
    let patch = json!({ "metadata": { "annotations": { OPERATION_ANNOTATION: null } } });
    api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .map_err(|source| Error::Update {
            action: "remove operation annotation",
            namespace: cr.namespace().unwrap_or_default(),
            name,
            source,
        })?;
    Ok(())
}

async fn get_cluster(client: &Client, namespace: &str) -> Result<Cluster> {
    Api::<Cluster>::all(client.clone())
        .get(namespace)
        .await
        .map_err(|source| Error::GetCluster {
            name: namespace.to_owned(),
            source,
        })
}

async fn apply(api: &Api<ContainerRuntime>, cr: &ContainerRuntime, ctx: &Context) -> Result<Action> {
    if !needs_reconcile(cr, ctx.config.ignore_operation_annotation) {
        debug!("nothing to do");
        return Ok(Action::await_change());
    }
    let restore = cr.operation() == Some(Operation::Restore);
    let type_ = if restore {
        LastOperationType::Restore
    } else {
        cr.reconcile_type()
    };

    let namespace = cr.namespace().ok_or_else(|| Error::MissingNamespace(cr.name_any()))?;
    let cluster = get_cluster(&ctx.client, &namespace).await?;

    patch_status(api, cr, processing_status(type_)).await?;
    let res = if restore {
        ctx.actuator.restore(cr, &cluster).await
    } else {
        ctx.actuator.reconcile(cr, &cluster).await
    };
    finish(api, cr, type_, res).await?;
    remove_operation_annotation(api, cr).await?;
    info!("Successfully completed {}", verb(type_));
    Ok(Action::await_change())
}

async fn cleanup(api: &Api<ContainerRuntime>, cr: &ContainerRuntime, ctx: &Context) -> Result<Action> {
    patch_status(api, cr, processing_status(LastOperationType::Delete)).await?;
    let res = ctx.actuator.delete(cr, &ctx.store.state()).await;
    finish(api, cr, LastOperationType::Delete, res).await?;
    info!("Successfully deleted");
    Ok(Action::await_change())
}

/// Hand the shoot over to another seed
///
/// The finalizer is removed so that the resource can be deleted in this seed without
/// touching the objects in the shoot.
async fn migrate(api: &Api<ContainerRuntime>, cr: &ContainerRuntime, ctx: &Context) -> Result<Action> {
    patch_status(api, cr, processing_status(LastOperationType::Migrate)).await?;
    let res = ctx.actuator.migrate(cr).await;
    finish(api, cr, LastOperationType::Migrate, res).await?;

    let name = cr.name_any();
    let namespace = cr.namespace().unwrap_or_default();
    let patch = remove_finalizer_patch(cr).map_err(Error::BuildPatch)?;
    if let Some(patch) = patch {
        api.patch(&name, &PatchParams::default(), &Patch::<()>::Json(patch))
            .await
            .map_err(|source| Error::Update {
                action: "remove finalizer",
                namespace,
                name,
                source,
            })?;
    }
    remove_operation_annotation(api, cr).await?;
    info!("Successfully migrated");
    Ok(Action::await_change())
}

#[instrument(skip_all, fields(namespace = %cr.namespace().unwrap_or_default(), name = %cr.name_any()))]
pub(crate) async fn reconcile(cr: Arc<ContainerRuntime>, ctx: Arc<Context>) -> Result<Action> {
    if !cr.is_gvisor() {
        return Ok(Action::await_change());
    }
    let namespace = cr.namespace().ok_or_else(|| Error::MissingNamespace(cr.name_any()))?;
    let api: Api<ContainerRuntime> = Api::namespaced(ctx.client.clone(), &namespace);

    if cr.metadata.deletion_timestamp.is_none() {
        match cr.operation() {
            Some(Operation::Migrate) => return migrate(&api, &cr, &ctx).await,
            Some(Operation::Restore) => {}
            _ if cr.is_migrated() => {
                debug!("skipping resource migrated to another seed");
                return Ok(Action::await_change());
            }
            _ => {}
        }
    }

    let (api, ctx) = (&api, &*ctx);
    finalizer(api, FINALIZER, cr, |event| async move {
        match event {
            Event::Apply(cr) => apply(api, &cr, ctx).await,
            Event::Cleanup(cr) => cleanup(api, &cr, ctx).await,
        }
    })
    .await
    .map_err(|e| Error::Finalizer(Box::new(e)))
}

fn error_policy(cr: Arc<ContainerRuntime>, error: &Error, _ctx: Arc<Context>) -> Action {
    warn!(name = %cr.name_any(), namespace = %cr.namespace().unwrap_or_default(), %error, "reconcile failed");
    Action::requeue(ERROR_REQUEUE)
}

/// Run the controller until a termination signal arrives
pub async fn run(client: Client, actuator: GVisorActuator, config: Config) {
    let runtimes = Api::<ContainerRuntime>::all(client.clone());
    let controller = Controller::new(runtimes, watcher::Config::default());
    let concurrency = config.max_concurrent_reconciles;
    let ctx = Arc::new(Context::new(client, actuator, controller.store(), config));

    info!(concurrency, "starting container runtime controller");
    controller
        .with_config(ControllerConfig::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!(name = %obj.name, "reconciled"),
                Err(error) => debug!(%error, "reconcile failed"),
            }
        })
        .await;
    info!("container runtime controller stopped");
}
