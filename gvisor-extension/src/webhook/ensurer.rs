use super::Error;
use gvisor_core::{
    ensure,
    extensions::{CriConfig, File, PluginConfig},
    gvisor,
    imagevector::{Image, ImageVector},
};
use serde::Serialize;
use tracing::{info, Span};

/// Ensures the parts of an `OperatingSystemConfig` an extension cares about
///
/// Both functions receive the desired state as computed so far and return it with their
/// additions. The state of the object before the update is absent on creation.
pub trait OscEnsurer {
    /// Ensure additional files
    fn ensure_additional_files(&self, new: Vec<File>, old: Option<&[File]>) -> Result<Vec<File>, Error>;

    /// Ensure the containerd configuration
    fn ensure_containerd_config(&self, new: CriConfig, old: Option<&CriConfig>) -> Result<CriConfig, Error>;
}

/// Injects the gVisor binaries and runtime handler
#[derive(Debug, Clone)]
pub struct GVisorEnsurer {
    image: Image,
    span: Span,
}

#[derive(Serialize)]
struct RuntimeOptions<'a> {
    runtime_type: &'a str,
}

fn runtime_plugin(handler: &str, runtime_type: &str) -> Result<PluginConfig, Error> {
    let values = serde_json::to_value(RuntimeOptions { runtime_type })
        .map_err(gvisor_core::Error::SerializePluginValues)?;
    Ok(PluginConfig::new(gvisor::runtime_plugin_path(handler), values))
}

impl GVisorEnsurer {
    /// Build an ensurer resolving the installation image from `images`
    ///
    /// Fails when the installation image is not part of the image vector.
    pub fn new(images: &ImageVector) -> gvisor_core::Result<Self> {
        Ok(Self {
            image: images.find_image(gvisor::INSTALLATION_IMAGE_NAME)?,
            span: tracing::info_span!("gvisor-controlplane-ensurer"),
        })
    }

    /// The image the binaries are extracted from
    pub fn image(&self) -> &Image {
        &self.image
    }

    fn binary(&self, name: &str) -> File {
        File::new(gvisor::binary_path(name))
            .permissions(gvisor::BINARY_PERMISSIONS)
            .image_ref(self.image.to_string(), gvisor::binary_path_in_image(name))
    }
}

impl OscEnsurer for GVisorEnsurer {
    fn ensure_additional_files(&self, new: Vec<File>, _old: Option<&[File]>) -> Result<Vec<File>, Error> {
        let _span = self.span.enter();
        info!("ensuring files");

        let files = ensure(new, self.binary(gvisor::SHIM_BINARY_NAME));
        Ok(ensure(files, self.binary(gvisor::RUNSC_BINARY_NAME)))
    }

    fn ensure_containerd_config(&self, mut new: CriConfig, _old: Option<&CriConfig>) -> Result<CriConfig, Error> {
        let _span = self.span.enter();
        info!("ensuring containerd config");

        let mut containerd = new.containerd.take().unwrap_or_default();
        let mut plugins = containerd.plugins.take().unwrap_or_default();
        for (handler, runtime_type) in [
            (gvisor::RUNSC_HANDLER, gvisor::RUNSC_RUNTIME_TYPE),
            (gvisor::RUNC_HANDLER, gvisor::RUNC_RUNTIME_TYPE),
        ] {
            plugins = ensure(plugins, runtime_plugin(handler, runtime_type)?);
        }
        containerd.plugins = Some(plugins);
        new.containerd = Some(containerd);
        Ok(new)
    }
}
