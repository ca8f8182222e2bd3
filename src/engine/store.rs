use crate::error::ConfigurationError;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Resolves a stored descriptor reference to descriptor text.
#[async_trait]
pub trait DescriptorStore: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<String, ConfigurationError>;
}

/// References are file paths, relative ones resolved against `root` if set.
#[derive(Debug, Clone, Default)]
pub struct FsDescriptorStore {
    root: Option<PathBuf>,
}

impl FsDescriptorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, reference: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(reference),
            None => PathBuf::from(reference),
        }
    }
}

#[async_trait]
impl DescriptorStore for FsDescriptorStore {
    async fn fetch(&self, reference: &str) -> Result<String, ConfigurationError> {
        let path = self.resolve(reference);
        debug!("Reading pipeline descriptor from {}", path.display());
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigurationError::Read {
                reference: reference.to_string(),
                source,
            })
    }
}
