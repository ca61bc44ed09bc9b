use super::store::ArtifactStore;
use crate::capture::ArtifactId;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Outcome of a retention pass
#[derive(Debug, Clone, Default)]
pub struct RetentionResult {
    pub removed: Vec<ArtifactId>,
    pub bytes_freed: u64,
    pub errors: Vec<String>,
    pub duration: Duration,
}

impl RetentionResult {
    pub fn artifacts_removed(&self) -> usize {
        self.removed.len()
    }
}

/// Trim the store to `max_artifacts`, removing the oldest first
pub async fn enforce_retention(store: &dyn ArtifactStore, max_artifacts: usize) -> RetentionResult {
    let started = Instant::now();
    let mut result = RetentionResult::default();

    let artifacts = match store.list().await {
        Ok(artifacts) => artifacts,
        Err(e) => {
            let error_msg = format!("Failed to list artifacts for retention: {}", e);
            error!("{}", error_msg);
            result.errors.push(error_msg);
            result.duration = started.elapsed();
            return result;
        }
    };

    if artifacts.len() <= max_artifacts {
        debug!(
            "Retention: {} artifacts within cap of {}",
            artifacts.len(),
            max_artifacts
        );
        result.duration = started.elapsed();
        return result;
    }

    // list() is newest first, so everything past the cap is older
    for metadata in artifacts.iter().skip(max_artifacts).rev() {
        match store.remove(metadata.id).await {
            Ok(removed) => {
                debug!("Evicted artifact {} ({})", removed.id, removed.filename);
                result.bytes_freed += removed.size_bytes;
                result.removed.push(removed.id);
            }
            Err(e) => {
                let error_msg = format!("Failed to evict artifact {}: {}", metadata.id, e);
                error!("{}", error_msg);
                result.errors.push(error_msg);
            }
        }
    }

    result.duration = started.elapsed();
    info!(
        "Retention evicted {} artifacts ({} bytes) in {:?}",
        result.artifacts_removed(),
        result.bytes_freed,
        result.duration
    );
    result
}
