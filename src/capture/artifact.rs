use super::media::ContainerFormat;
use crate::detection::HitKind;
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;

pub type ArtifactId = u64;

/// Everything known about a stored clip except its bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub id: ArtifactId,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_kind: Option<HitKind>,
}

impl ArtifactMetadata {
    pub fn format(&self) -> Option<ContainerFormat> {
        self.filename
            .rsplit_once('.')
            .and_then(|(_, extension)| ContainerFormat::from_extension(extension))
    }
}

/// Where a clip's bytes live
#[derive(Debug, Clone)]
pub enum ArtifactPayload {
    InMemory(Arc<Vec<u8>>),
    File(PathBuf),
}

impl ArtifactPayload {
    pub async fn read(&self) -> Result<Vec<u8>, StoreError> {
        match self {
            ArtifactPayload::InMemory(data) => Ok(data.as_ref().clone()),
            ArtifactPayload::File(path) => fs::read(path)
                .await
                .map_err(|e| StoreError::io(path.display().to_string(), e)),
        }
    }
}

/// A finalized clip
#[derive(Debug, Clone)]
pub struct VideoArtifact {
    pub metadata: ArtifactMetadata,
    pub payload: ArtifactPayload,
}

impl VideoArtifact {
    /// Build an in-memory artifact for a freshly recorded clip
    pub fn from_clip(
        id: ArtifactId,
        created_at: DateTime<Utc>,
        format: ContainerFormat,
        timezone: &Tz,
        hit_kind: Option<HitKind>,
        data: Vec<u8>,
    ) -> Self {
        let metadata = ArtifactMetadata {
            id,
            filename: artifact_filename(created_at, timezone, format),
            created_at,
            size_bytes: data.len() as u64,
            mime_type: format.mime_type().to_string(),
            hit_kind,
        };

        Self {
            metadata,
            payload: ArtifactPayload::InMemory(Arc::new(data)),
        }
    }

    pub fn id(&self) -> ArtifactId {
        self.metadata.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.metadata.created_at
    }
}

/// `hit-2024-05-01T09-30-12-345.webm`, rendered in `timezone`
pub fn artifact_filename(created_at: DateTime<Utc>, timezone: &Tz, format: ContainerFormat) -> String {
    let local = created_at.with_timezone(timezone);
    format!(
        "hit-{}.{}",
        local.format("%Y-%m-%dT%H-%M-%S-%3f"),
        format.extension()
    )
}

/// Resolve a timezone name, falling back to UTC
pub fn resolve_timestamp_timezone(tz_name: &str) -> Tz {
    match tz_name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!(
                "Invalid timestamp timezone '{}', falling back to UTC",
                tz_name
            );
            chrono_tz::UTC
        }
    }
}

/// Millisecond-timestamp ids that never repeat or go backwards
#[derive(Debug, Default)]
pub struct ArtifactIdGenerator {
    last: AtomicU64,
}

impl ArtifactIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue after ids already present in a store
    pub fn starting_after(last: ArtifactId) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }

    pub fn next_id(&self, created_at: DateTime<Utc>) -> ArtifactId {
        let candidate = created_at.timestamp_millis().max(0) as u64;
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let id = candidate.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, id, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return id,
                Err(current) => last = current,
            }
        }
    }
}
