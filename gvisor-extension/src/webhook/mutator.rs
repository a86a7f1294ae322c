use super::{Error, OscEnsurer};
use gvisor_core::extensions::{OperatingSystemConfigPurpose, OperatingSystemConfigSpec};
use kube::core::DynamicObject;
use serde::Deserialize;

/// Applies an [`OscEnsurer`] to `OperatingSystemConfig` objects
pub struct Mutator<E> {
    ensurer: E,
}

fn decode_spec(obj: &DynamicObject) -> Result<OperatingSystemConfigSpec, Error> {
    let spec = obj.data.get("spec").ok_or(Error::MissingSpec)?;
    OperatingSystemConfigSpec::deserialize(spec).map_err(Error::DecodeSpec)
}

impl<E: OscEnsurer> Mutator<E> {
    /// Create a mutator running `ensurer`
    pub fn new(ensurer: E) -> Self {
        Self { ensurer }
    }

    /// Compute the patch the ensurer applies to `obj`
    ///
    /// `old` is the object before the update and absent on creation.
    /// Returns `None` when the object is already in the desired state, or is a provisioning
    /// config which the extension leaves alone.
    pub fn mutate(
        &self,
        obj: &DynamicObject,
        old: Option<&DynamicObject>,
    ) -> Result<Option<json_patch::Patch>, Error> {
        let spec = decode_spec(obj)?;
        if spec.purpose == Some(OperatingSystemConfigPurpose::Provision) {
            return Ok(None);
        }
        // an old object that fails to decode is treated as absent
        let old = old.and_then(|old| decode_spec(old).ok());

        let original = serde_json::to_value(obj).map_err(Error::EncodeObject)?;
        let mut mutated = original.clone();

        let files = self
            .ensurer
            .ensure_additional_files(spec.files, old.as_ref().map(|o| o.files.as_slice()))?;
        mutated["spec"]["files"] = serde_json::to_value(files).map_err(Error::EncodeObject)?;

        if let Some(cri) = spec.cri_config.filter(|cri| cri.is_containerd()) {
            let old_cri = old.as_ref().and_then(|o| o.cri_config.as_ref());
            let cri = self.ensurer.ensure_containerd_config(cri, old_cri)?;
            mutated["spec"]["criConfig"] = serde_json::to_value(cri).map_err(Error::EncodeObject)?;
        }

        let patch = json_patch::diff(&original, &mutated);
        Ok((!patch.0.is_empty()).then_some(patch))
    }
}
