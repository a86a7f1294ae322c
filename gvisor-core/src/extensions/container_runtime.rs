use super::{Operation, OPERATION_ANNOTATION};
use crate::gvisor;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Declares that the machines of a worker pool should support a container runtime
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "extensions.gardener.cloud",
    version = "v1alpha1",
    kind = "ContainerRuntime",
    namespaced,
    status = "ContainerRuntimeStatus",
    shortname = "cr",
    printcolumn = r#"{"name":"Type", "type":"string", "jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"Worker Pool", "type":"string", "jsonPath":".spec.workerPool.name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRuntimeSpec {
    /// Runtime type, `gvisor` for this extension
    #[serde(rename = "type")]
    pub type_: String,
    /// Directory on the machine the runtime binaries are placed in
    #[serde(default)]
    pub binary_path: String,
    /// The worker pool the runtime is enabled for
    pub worker_pool: ContainerRuntimeWorkerPool,
    /// Runtime specific configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<serde_json::Value>,
}

/// Reference to the worker pool of a [`ContainerRuntime`]
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRuntimeWorkerPool {
    /// Name of the worker pool
    pub name: String,
    /// Label selector matching the nodes of the pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<serde_json::Value>,
}

/// Observed state of a [`ContainerRuntime`]
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRuntimeStatus {
    /// The last operation executed on the resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<LastOperation>,
    /// The last error seen, cleared on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
    /// Generation of the spec the last successful operation acted on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Describes the last operation executed on an extension resource
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LastOperation {
    /// Human readable description
    pub description: String,
    /// RFC 3339 time of the last update
    pub last_update_time: String,
    /// Progress in percent
    pub progress: i32,
    /// State of the operation
    pub state: LastOperationState,
    /// Type of the operation
    #[serde(rename = "type")]
    pub type_: LastOperationType,
}

/// Describes the last error of an extension resource
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LastError {
    /// Human readable description
    pub description: String,
    /// RFC 3339 time of the last update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,
}

/// Kind of operation recorded in [`LastOperation`]
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum LastOperationType {
    /// First reconciliation
    Create,
    /// Any later reconciliation
    Reconcile,
    /// Cleanup before deletion
    Delete,
    /// Hand over to another seed
    Migrate,
    /// Take over from another seed
    Restore,
}

/// State recorded in [`LastOperation`]
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum LastOperationState {
    /// Operation is running
    Processing,
    /// Operation finished
    Succeeded,
    /// Operation failed and will be retried
    Error,
    /// Operation failed permanently
    Failed,
}

impl ContainerRuntime {
    /// Whether this resource asks for gVisor
    pub fn is_gvisor(&self) -> bool {
        self.spec.type_ == gvisor::TYPE
    }

    /// The operation requested through the operation annotation
    pub fn operation(&self) -> Option<Operation> {
        self.annotations()
            .get(OPERATION_ANNOTATION)
            .and_then(|v| Operation::from_annotation(v))
    }

    /// Whether the current spec was already handled successfully
    pub fn is_up_to_date(&self) -> bool {
        let Some(status) = &self.status else {
            return false;
        };
        let succeeded = status
            .last_operation
            .as_ref()
            .is_some_and(|op| op.state == LastOperationState::Succeeded);
        succeeded && status.observed_generation.is_some() && status.observed_generation == self.metadata.generation
    }

    /// Whether the resource was handed over to another seed
    pub fn is_migrated(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.last_operation.as_ref())
            .is_some_and(|op| op.type_ == LastOperationType::Migrate && op.state == LastOperationState::Succeeded)
    }

    /// The operation type a reconciliation of this resource records
    pub fn reconcile_type(&self) -> LastOperationType {
        match self.status.as_ref().and_then(|s| s.last_operation.as_ref()) {
            None => LastOperationType::Create,
            Some(op) if op.type_ == LastOperationType::Create && op.state != LastOperationState::Succeeded => {
                LastOperationType::Create
            }
            Some(_) => LastOperationType::Reconcile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn runtime(value: serde_json::Value) -> ContainerRuntime {
        serde_json::from_value(value).unwrap()
    }

    fn gvisor_runtime() -> serde_json::Value {
        json!({
            "apiVersion": "extensions.gardener.cloud/v1alpha1",
            "kind": "ContainerRuntime",
            "metadata": {"name": "pool-a-gvisor", "namespace": "shoot--foo--bar", "generation": 2},
            "spec": {"type": "gvisor", "binaryPath": "/var/bin/containerruntimes", "workerPool": {"name": "pool-a"}}
        })
    }

    #[test]
    fn parses_gardener_object() {
        let cr = runtime(gvisor_runtime());
        assert!(cr.is_gvisor());
        assert_eq!(cr.spec.worker_pool.name, "pool-a");
        assert_eq!(cr.operation(), None);
        assert_eq!(cr.reconcile_type(), LastOperationType::Create);
    }

    #[test]
    fn reads_operation_annotation() {
        let mut value = gvisor_runtime();
        value["metadata"]["annotations"] = json!({"gardener.cloud/operation": "migrate"});
        assert_eq!(runtime(value.clone()).operation(), Some(Operation::Migrate));
        value["metadata"]["annotations"] = json!({"gardener.cloud/operation": "wait-for-state"});
        assert_eq!(runtime(value).operation(), None);
    }

    #[test]
    fn up_to_date_requires_success_on_current_generation() {
        let mut value = gvisor_runtime();
        value["status"] = json!({
            "observedGeneration": 2,
            "lastOperation": {
                "description": "done", "lastUpdateTime": "2024-01-01T00:00:00Z",
                "progress": 100, "state": "Succeeded", "type": "Reconcile"
            }
        });
        let cr = runtime(value.clone());
        assert!(cr.is_up_to_date());
        assert_eq!(cr.reconcile_type(), LastOperationType::Reconcile);

        value["metadata"]["generation"] = json!(3);
        assert!(!runtime(value.clone()).is_up_to_date());

        value["metadata"]["generation"] = json!(2);
        value["status"]["lastOperation"]["state"] = json!("Error");
        assert!(!runtime(value).is_up_to_date());
    }
}
