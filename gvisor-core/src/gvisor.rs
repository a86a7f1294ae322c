//! Names and paths of the gVisor runtime

/// Type of the `ContainerRuntime` resources handled by this extension
pub const TYPE: &str = "gvisor";

/// Name of the extension, used as field manager and managed resource origin
pub const EXTENSION_NAME: &str = "extension-runtime-gvisor";

/// Path of the gVisor chart within the embedded charts
pub const CHART_PATH: &str = "internal/gvisor";
/// Release name the gVisor chart is rendered with
pub const RELEASE_NAME: &str = "gvisor";

/// Image vector name of the image carrying the runtime binaries
pub const INSTALLATION_IMAGE_NAME: &str = "runtime-gvisor-installation";

/// Folder on the machine containerd looks up runtime binaries in
pub const CONTAINERD_RUNTIME_BIN_FOLDER: &str = "/var/bin/containerruntimes";
/// Folder in the installation image holding the binaries
pub const IMAGE_CONTENT_FOLDER: &str = "/var/content";
/// The containerd shim binary
pub const SHIM_BINARY_NAME: &str = "containerd-shim-runsc-v1";
/// The sandbox runtime binary
pub const RUNSC_BINARY_NAME: &str = "runsc";
/// Permission bits of the injected binaries
pub const BINARY_PERMISSIONS: i32 = 0o644;

/// Path of the CRI runtimes within the containerd plugin configuration
pub const CRI_RUNTIMES_PATH: [&str; 3] = ["io.containerd.grpc.v1.cri", "containerd", "runtimes"];
/// Runtime handler name of gVisor
pub const RUNSC_HANDLER: &str = "runsc";
/// Runtime type of gVisor
pub const RUNSC_RUNTIME_TYPE: &str = "io.containerd.runsc.v1";
/// Runtime handler name of the default runtime
pub const RUNC_HANDLER: &str = "runc";
/// Runtime type of the default runtime
pub const RUNC_RUNTIME_TYPE: &str = "io.containerd.runc.v2";

/// Name of the managed resource with the gVisor chart
pub const MANAGED_RESOURCE_NAME: &str = "extension-runtime-gvisor";
/// Prefix of the per worker pool installation managed resources
pub const INSTALLATION_MANAGED_RESOURCE_NAME: &str = "extension-runtime-gvisor-installation";

/// Name of the installation managed resource of a worker pool
pub fn installation_managed_resource_name(worker_pool: &str) -> String {
    format!("{INSTALLATION_MANAGED_RESOURCE_NAME}-{worker_pool}")
}

/// Path a runtime binary is placed at on the machine
pub fn binary_path(binary: &str) -> String {
    format!("{CONTAINERD_RUNTIME_BIN_FOLDER}/{binary}")
}

/// Path a runtime binary is taken from in the installation image
pub fn binary_path_in_image(binary: &str) -> String {
    format!("{IMAGE_CONTENT_FOLDER}/{binary}")
}

/// Path of a runtime handler in the containerd plugin configuration
pub fn runtime_plugin_path(handler: &str) -> Vec<String> {
    CRI_RUNTIMES_PATH
        .iter()
        .copied()
        .chain([handler])
        .map(String::from)
        .collect()
}
