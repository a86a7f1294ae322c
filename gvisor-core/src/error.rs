use thiserror::Error;

/// Possible errors from the client-less parts of the extension
#[derive(Error, Debug)]
pub enum Error {
    /// No image with this name is registered in the image vector
    #[error("image {0:?} not found in image vector")]
    ImageNotFound(String),

    /// The image vector could not be parsed
    #[error("failed to parse image vector: {0}")]
    ParseImageVector(#[source] serde_yaml::Error),

    /// The image vector overwrite file could not be read
    #[error("failed to read image vector overwrite {path}: {source}")]
    ReadImageVectorOverwrite {
        /// Path of the overwrite file
        path: String,
        /// The underlying io error
        #[source]
        source: std::io::Error,
    },

    /// A containerd plugin value could not be serialized
    #[error("unable to marshal containerd config: {0}")]
    SerializePluginValues(#[source] serde_json::Error),

    /// The shoot embedded in a `Cluster` could not be decoded
    #[error("failed to decode shoot from cluster {cluster}: {source}")]
    DecodeShoot {
        /// Name of the cluster resource
        cluster: String,
        /// The underlying decode error
        #[source]
        source: serde_json::Error,
    },

    /// The `Cluster` resource carries no shoot
    #[error("cluster {0} does not contain a shoot")]
    MissingShoot(String),
}
