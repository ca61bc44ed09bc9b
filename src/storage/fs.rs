use super::store::{recency_desc, ArtifactStore};
use crate::capture::{ArtifactId, ArtifactMetadata, ArtifactPayload, VideoArtifact};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const SIDECAR_EXTENSION: &str = "json";

/// Artifact store writing each clip and a JSON metadata sidecar to a directory
///
/// The sidecar is written after the payload, so a clip only becomes visible
/// to a later [`FileArtifactStore::open`] once it is complete.
pub struct FileArtifactStore {
    root: PathBuf,
    index: RwLock<HashMap<ArtifactId, ArtifactMetadata>>,
}

impl FileArtifactStore {
    /// Open (creating if needed) a store directory and register existing clips
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io(root.display().to_string(), e))?;

        let store = Self {
            root,
            index: RwLock::new(HashMap::new()),
        };
        store.scan_existing().await?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Highest id currently stored
    pub async fn last_id(&self) -> Option<ArtifactId> {
        self.index.read().await.keys().max().copied()
    }

    async fn scan_existing(&self) -> Result<(), StoreError> {
        debug!("Scanning for existing artifacts in: {}", self.root.display());

        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| StoreError::io(self.root.display().to_string(), e))?;

        let mut registered = HashMap::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(self.root.display().to_string(), e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SIDECAR_EXTENSION) {
                continue;
            }

            match self.load_sidecar(&path).await {
                Ok(metadata) => {
                    debug!("Registered existing artifact: {}", metadata.filename);
                    registered.insert(metadata.id, metadata);
                }
                Err(e) => {
                    warn!("Skipping artifact sidecar {}: {}", path.display(), e);
                }
            }
        }

        info!(
            "Registered {} existing artifacts in {}",
            registered.len(),
            self.root.display()
        );
        *self.index.write().await = registered;
        Ok(())
    }

    async fn load_sidecar(&self, path: &Path) -> Result<ArtifactMetadata, StoreError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::io(path.display().to_string(), e))?;

        let metadata: ArtifactMetadata =
            serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                path: path.display().to_string(),
                details: e.to_string(),
            })?;

        let payload_path = self.payload_path(&metadata)?;
        if fs::metadata(&payload_path).await.is_err() {
            return Err(StoreError::Corrupt {
                path: path.display().to_string(),
                details: format!("payload {} is missing", payload_path.display()),
            });
        }

        Ok(metadata)
    }

    fn payload_path(&self, metadata: &ArtifactMetadata) -> Result<PathBuf, StoreError> {
        // Filenames come from sidecars on disk; never follow one out of the root
        let name = Path::new(&metadata.filename);
        if name.components().count() != 1 || name.file_name().is_none() {
            return Err(StoreError::Corrupt {
                path: self.root.display().to_string(),
                details: format!("invalid artifact filename '{}'", metadata.filename),
            });
        }
        Ok(self.root.join(name))
    }

    fn sidecar_path(&self, metadata: &ArtifactMetadata) -> PathBuf {
        self.root
            .join(format!("{}.{}", metadata.filename, SIDECAR_EXTENSION))
    }

    async fn delete_files(&self, metadata: &ArtifactMetadata) -> Result<(), StoreError> {
        let sidecar = self.sidecar_path(metadata);
        remove_if_present(&sidecar).await?;

        let payload = self.payload_path(metadata)?;
        remove_if_present(&payload).await
    }
}

async fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Artifact file already deleted: {}", path.display());
            Ok(())
        }
        Err(e) => Err(StoreError::io(path.display().to_string(), e)),
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn append(&self, artifact: VideoArtifact) -> Result<ArtifactMetadata, StoreError> {
        let metadata = artifact.metadata.clone();

        if self.index.read().await.contains_key(&metadata.id) {
            return Err(StoreError::Duplicate {
                id: metadata.id.to_string(),
            });
        }

        let payload_path = self.payload_path(&metadata)?;
        let data = artifact.payload.read().await?;
        fs::write(&payload_path, &data)
            .await
            .map_err(|e| StoreError::io(payload_path.display().to_string(), e))?;

        let sidecar_path = self.sidecar_path(&metadata);
        let sidecar = serde_json::to_string_pretty(&metadata)?;
        if let Err(e) = fs::write(&sidecar_path, sidecar).await {
            let _ = fs::remove_file(&payload_path).await;
            return Err(StoreError::io(sidecar_path.display().to_string(), e));
        }

        self.index.write().await.insert(metadata.id, metadata.clone());
        info!(
            "Saved artifact {} ({} bytes) to {}",
            metadata.id,
            metadata.size_bytes,
            payload_path.display()
        );
        Ok(metadata)
    }

    async fn list(&self) -> Result<Vec<ArtifactMetadata>, StoreError> {
        let mut artifacts: Vec<ArtifactMetadata> =
            self.index.read().await.values().cloned().collect();
        artifacts.sort_by(recency_desc);
        Ok(artifacts)
    }

    async fn get(&self, id: ArtifactId) -> Result<VideoArtifact, StoreError> {
        let metadata = self
            .index
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        let payload = ArtifactPayload::File(self.payload_path(&metadata)?);
        Ok(VideoArtifact { metadata, payload })
    }

    async fn remove(&self, id: ArtifactId) -> Result<ArtifactMetadata, StoreError> {
        let metadata = self
            .index
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        self.delete_files(&metadata).await?;
        debug!("Deleted artifact {} ({})", metadata.id, metadata.filename);
        Ok(metadata)
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        let drained: Vec<ArtifactMetadata> = self.index.write().await.drain().map(|(_, m)| m).collect();

        let mut first_error = None;
        for metadata in &drained {
            if let Err(e) = self.delete_files(metadata).await {
                warn!("Failed to delete artifact {}: {}", metadata.id, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Cleared {} artifacts", drained.len());
                Ok(drained.len())
            }
        }
    }

    fn store_name(&self) -> &str {
        "file"
    }
}
