use crate::ensure::Keyed;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The CRI name for containerd
pub const CRI_NAME_CONTAINERD: &str = "containerd";

/// Why an `OperatingSystemConfig` is being generated
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperatingSystemConfigPurpose {
    /// Config used by the initial bootstrap of a machine
    Provision,
    /// Config applied continuously on running machines
    Reconcile,
}

/// The parts of an `OperatingSystemConfig` spec the webhook reads and mutates
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperatingSystemConfigSpec {
    /// Operating system type
    #[serde(rename = "type", default)]
    pub type_: String,
    /// Purpose of the config, absent on old objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<OperatingSystemConfigPurpose>,
    /// Files written onto the machine
    #[serde(default)]
    pub files: Vec<File>,
    /// Container runtime interface configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cri_config: Option<CriConfig>,
}

/// A file written onto a machine
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct File {
    /// Absolute path of the file on the machine
    pub path: String,
    /// Permission bits, `0644` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<i32>,
    /// Where the content comes from
    #[serde(default)]
    pub content: FileContent,
    /// Restricts the file to machines with this host name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    /// Fields not modelled here, kept so that round trips are lossless
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl File {
    /// An empty file at `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set permission bits
    #[must_use]
    pub fn permissions(mut self, mode: i32) -> Self {
        self.permissions = Some(mode);
        self
    }

    /// Source the content from `path_in_image` inside `image`
    #[must_use]
    pub fn image_ref(mut self, image: impl Into<String>, path_in_image: impl Into<String>) -> Self {
        self.content.image_ref = Some(FileContentImageRef {
            image: image.into(),
            file_path_in_image: path_in_image.into(),
        });
        self
    }
}

impl Keyed for File {
    type Key = str;

    fn key(&self) -> &str {
        &self.path
    }
}

/// Content source of a [`File`], exactly one source is expected to be set
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    /// Content taken from a key of a secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<FileContentSecretRef>,
    /// Content embedded in the resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<FileContentInline>,
    /// Content extracted from a container image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<FileContentImageRef>,
    /// Skip encoding the content when transmitting it to the machine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmit_unencoded: Option<bool>,
    /// Fields not modelled here, kept so that round trips are lossless
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// File content stored in a secret
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileContentSecretRef {
    /// Name of the secret
    pub name: String,
    /// Key within the secret data
    pub data_key: String,
}

/// File content embedded in the resource
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileContentInline {
    /// Encoding of `data`, e.g. `b64`
    ///
    /// Absent and empty both mean plain text. The two are kept apart so that an object
    /// re-encodes to exactly what was read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// The content
    pub data: String,
}

/// File content extracted from a container image
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileContentImageRef {
    /// Image reference
    pub image: String,
    /// Path of the file within the image
    pub file_path_in_image: String,
}

/// Container runtime interface configuration of an `OperatingSystemConfig`
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CriConfig {
    /// Name of the CRI, see [`CRI_NAME_CONTAINERD`]
    pub name: String,
    /// Cgroup driver of the kubelet and the runtime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cgroup_driver: Option<String>,
    /// Containerd specific settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub containerd: Option<ContainerdConfig>,
    /// Fields not modelled here, kept so that round trips are lossless
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CriConfig {
    /// Whether this config targets containerd
    pub fn is_containerd(&self) -> bool {
        self.name == CRI_NAME_CONTAINERD
    }
}

/// Containerd settings
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerdConfig {
    /// Registry mirrors, not interpreted by this extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registries: Option<Vec<Value>>,
    /// Image of the pause container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_image: Option<String>,
    /// Patches applied to the containerd plugin configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins: Option<Vec<PluginConfig>>,
    /// Fields not modelled here, kept so that round trips are lossless
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Operation applied at a plugin path
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PluginPathOperation {
    /// Merge the values into the path
    Add,
    /// Remove the path
    Remove,
}

/// A patch of the containerd plugin configuration at a structured path
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    /// Operation at `path`, `add` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<PluginPathOperation>,
    /// Path into the containerd config, e.g. `["io.containerd.grpc.v1.cri", "containerd"]`
    pub path: Vec<String>,
    /// Values to set at `path`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Value>,
}

impl PluginConfig {
    /// A plugin config setting `values` at `path`
    pub fn new<S: Into<String>>(path: impl IntoIterator<Item = S>, values: Value) -> Self {
        Self {
            op: None,
            path: path.into_iter().map(Into::into).collect(),
            values: Some(values),
        }
    }
}

impl Keyed for PluginConfig {
    type Key = [String];

    fn key(&self) -> &[String] {
        &self.path
    }

    fn update_from(&mut self, candidate: Self) {
        self.values = candidate.values;
    }
}
