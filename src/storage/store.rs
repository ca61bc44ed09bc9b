use crate::capture::{ArtifactId, ArtifactMetadata, ArtifactPayload, VideoArtifact};
use crate::error::StoreError;
use async_trait::async_trait;
use std::cmp::Ordering;
use tokio::sync::RwLock;
use tracing::debug;

/// Persistence for finalized clips
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn append(&self, artifact: VideoArtifact) -> Result<ArtifactMetadata, StoreError>;

    /// All artifacts, newest first
    async fn list(&self) -> Result<Vec<ArtifactMetadata>, StoreError>;

    async fn get(&self, id: ArtifactId) -> Result<VideoArtifact, StoreError>;

    async fn remove(&self, id: ArtifactId) -> Result<ArtifactMetadata, StoreError>;

    /// Remove everything; returns how many artifacts were dropped
    async fn clear(&self) -> Result<usize, StoreError>;

    fn store_name(&self) -> &str;
}

/// Newest first; ids break ties between clips finalized in the same instant
pub(crate) fn recency_desc(a: &ArtifactMetadata, b: &ArtifactMetadata) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// Artifact store that keeps payloads in memory
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: RwLock<Vec<VideoArtifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.artifacts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.artifacts.read().await.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn append(&self, artifact: VideoArtifact) -> Result<ArtifactMetadata, StoreError> {
        let mut artifacts = self.artifacts.write().await;

        if artifacts.iter().any(|stored| stored.id() == artifact.id()) {
            return Err(StoreError::Duplicate {
                id: artifact.id().to_string(),
            });
        }

        // Keep payload bytes in memory even if handed a file-backed artifact
        let data = artifact.payload.read().await?;
        let metadata = artifact.metadata.clone();
        artifacts.push(VideoArtifact {
            metadata: metadata.clone(),
            payload: ArtifactPayload::InMemory(data.into()),
        });
        artifacts.sort_by(|a, b| recency_desc(&a.metadata, &b.metadata));

        debug!("Stored artifact {} in memory", metadata.id);
        Ok(metadata)
    }

    async fn list(&self) -> Result<Vec<ArtifactMetadata>, StoreError> {
        let artifacts = self.artifacts.read().await;
        Ok(artifacts.iter().map(|a| a.metadata.clone()).collect())
    }

    async fn get(&self, id: ArtifactId) -> Result<VideoArtifact, StoreError> {
        let artifacts = self.artifacts.read().await;
        artifacts
            .iter()
            .find(|a| a.id() == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    async fn remove(&self, id: ArtifactId) -> Result<ArtifactMetadata, StoreError> {
        let mut artifacts = self.artifacts.write().await;
        let index = artifacts
            .iter()
            .position(|a| a.id() == id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        Ok(artifacts.remove(index).metadata)
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        let mut artifacts = self.artifacts.write().await;
        let removed = artifacts.len();
        artifacts.clear();
        Ok(removed)
    }

    fn store_name(&self) -> &str {
        "memory"
    }
}
