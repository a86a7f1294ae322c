//! Resolution of component names into image references
//!
//! The extension ships an image vector (`imagevector/images.yaml`) naming every image it deploys.
//! Operators can replace references by pointing `IMAGEVECTOR_OVERWRITE` at a file in the same format.
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path};

const EMBEDDED: &str = include_str!("../imagevector/images.yaml");

/// Environment variable naming an image vector overwrite file
pub const OVERWRITE_ENV: &str = "IMAGEVECTOR_OVERWRITE";

/// A list of named images
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct ImageVector {
    /// The images
    #[serde(default)]
    pub images: Vec<ImageSource>,
}

/// One named image of an [`ImageVector`]
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageSource {
    /// Logical component name
    pub name: String,
    /// Repository of the sources the image is built from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_repository: Option<String>,
    /// Image repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Tag or `sha256:` digest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Full reference, takes precedence over repository and tag
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "ref")]
    pub reference: Option<String>,
}

/// A resolved image reference
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image(String);

impl Image {
    /// The reference as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Image> for String {
    fn from(image: Image) -> Self {
        image.0
    }
}

impl ImageSource {
    fn to_image(&self) -> Option<Image> {
        if let Some(reference) = &self.reference {
            return Some(Image(reference.clone()));
        }
        let repository = self.repository.as_deref()?;
        Some(Image(match self.tag.as_deref() {
            Some(digest) if digest.starts_with("sha256:") => format!("{repository}@{digest}"),
            Some(tag) => format!("{repository}:{tag}"),
            None => repository.to_owned(),
        }))
    }

    fn merge(&mut self, overwrite: ImageSource) {
        if overwrite.source_repository.is_some() {
            self.source_repository = overwrite.source_repository;
        }
        if overwrite.repository.is_some() {
            self.repository = overwrite.repository;
            // a new repository invalidates the old tag unless one is given
            self.tag = overwrite.tag.clone();
        }
        if overwrite.tag.is_some() {
            self.tag = overwrite.tag;
        }
        if overwrite.reference.is_some() {
            self.reference = overwrite.reference;
        }
    }
}

impl ImageVector {
    /// Parse an image vector from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::ParseImageVector)
    }

    /// The image vector shipped with the extension
    pub fn embedded() -> Result<Self> {
        Self::from_yaml(EMBEDDED)
    }

    /// The embedded image vector with the overwrite at `path` applied, if any
    pub fn load(overwrite: Option<&Path>) -> Result<Self> {
        let vector = Self::embedded()?;
        let Some(path) = overwrite else {
            return Ok(vector);
        };
        let yaml = std::fs::read_to_string(path).map_err(|source| Error::ReadImageVectorOverwrite {
            path: path.display().to_string(),
            source,
        })?;
        Ok(vector.overwrite(Self::from_yaml(&yaml)?))
    }

    /// Apply `other` on top of this vector
    ///
    /// Entries are matched by name. Fields set in `other` replace the existing ones,
    /// unknown names are appended.
    #[must_use]
    pub fn overwrite(mut self, other: ImageVector) -> Self {
        for source in other.images {
            match self.images.iter_mut().find(|s| s.name == source.name) {
                Some(existing) => existing.merge(source),
                None => self.images.push(source),
            }
        }
        self
    }

    /// Resolve the image registered as `name`
    pub fn find_image(&self, name: &str) -> Result<Image> {
        self.images
            .iter()
            .find(|s| s.name == name)
            .and_then(ImageSource::to_image)
            .ok_or_else(|| Error::ImageNotFound(name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gvisor;
    use std::io::Write;

    const VECTOR: &str = r#"
images:
- name: tagged
  repository: registry.example/tagged
  tag: v1.2.3
- name: pinned
  repository: registry.example/pinned
  tag: "sha256:0123abcd"
- name: bare
  repository: registry.example/bare
- name: referenced
  ref: registry.example/referenced:v9
- name: empty
"#;

    #[test]
    fn embedded_vector_has_installation_image() {
        let image = ImageVector::embedded()
            .unwrap()
            .find_image(gvisor::INSTALLATION_IMAGE_NAME)
            .unwrap();
        assert!(image.as_str().contains("runtime-gvisor-installation:"));
    }

    #[test]
    fn formats_references() {
        let vector = ImageVector::from_yaml(VECTOR).unwrap();
        let find = |name| vector.find_image(name).unwrap().to_string();
        assert_eq!(find("tagged"), "registry.example/tagged:v1.2.3");
        assert_eq!(find("pinned"), "registry.example/pinned@sha256:0123abcd");
        assert_eq!(find("bare"), "registry.example/bare");
        assert_eq!(find("referenced"), "registry.example/referenced:v9");
    }

    #[test]
    fn unknown_or_incomplete_images_are_errors() {
        let vector = ImageVector::from_yaml(VECTOR).unwrap();
        assert!(matches!(vector.find_image("missing"), Err(Error::ImageNotFound(n)) if n == "missing"));
        assert!(matches!(vector.find_image("empty"), Err(Error::ImageNotFound(_))));
    }

    #[test]
    fn overwrite_replaces_and_appends() {
        let overwrite = ImageVector::from_yaml(
            r#"
images:
- name: tagged
  tag: v2.0.0
- name: bare
  repository: mirror.example/bare
  tag: v1
- name: extra
  repository: registry.example/extra
  tag: v0
"#,
        )
        .unwrap();
        let vector = ImageVector::from_yaml(VECTOR).unwrap().overwrite(overwrite);
        let find = |name| vector.find_image(name).unwrap().to_string();
        assert_eq!(find("tagged"), "registry.example/tagged:v2.0.0");
        assert_eq!(find("bare"), "mirror.example/bare:v1");
        assert_eq!(find("extra"), "registry.example/extra:v0");
        assert_eq!(find("pinned"), "registry.example/pinned@sha256:0123abcd");
    }

    #[test]
    fn load_reads_overwrite_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "images:\n- name: {}\n  repository: mirror.example/gvisor\n  tag: dev",
            gvisor::INSTALLATION_IMAGE_NAME
        )
        .unwrap();

        let vector = ImageVector::load(Some(file.path())).unwrap();
        assert_eq!(
            vector.find_image(gvisor::INSTALLATION_IMAGE_NAME).unwrap().as_str(),
            "mirror.example/gvisor:dev"
        );
    }

    #[test]
    fn load_fails_on_missing_overwrite() {
        let err = ImageVector::load(Some(Path::new("/nonexistent/images.yaml"))).unwrap_err();
        assert!(matches!(err, Error::ReadImageVectorOverwrite { .. }));
    }
}
