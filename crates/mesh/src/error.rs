use propfield_assets::LoadError;
use propfield_common::ConfigError;
use propfield_render::BatchError;

#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("package load failed: {0}")]
    Load(#[from] LoadError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("packages are already loaded")]
    AlreadyLoaded,
}

impl MeshError {
    /// The batching error behind this one, if any.
    pub fn as_batch(&self) -> Option<&BatchError> {
        match self {
            Self::Batch(error) => Some(error),
            _ => None,
        }
    }
}
