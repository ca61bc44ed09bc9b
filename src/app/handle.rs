use crate::capture::{
    ArtifactId, ArtifactMetadata, CaptureState, CaptureStatsSnapshot, ContainerFormat,
    RollingCapture,
};
use crate::error::StoreError;
use crate::events::{EventBus, TrainerEvent};
use crate::session::{SessionController, SessionMode, SessionSnapshot};
use crate::storage::ArtifactStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct CaptureStatus {
    pub state: CaptureState,
    pub format: Option<ContainerFormat>,
    pub stats: CaptureStatsSnapshot,
}

/// Everything the operator surfaces report about a running trainer
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    #[serde(flatten)]
    pub session: SessionSnapshot,
    pub capture: CaptureStatus,
}

/// Operator controls shared by the keyboard handler and the HTTP server
#[derive(Clone)]
pub struct TrainerHandle {
    controller: SessionController,
    store: Arc<dyn ArtifactStore>,
    capture: Arc<RollingCapture>,
    event_bus: Arc<EventBus>,
}

impl TrainerHandle {
    pub fn new(
        controller: SessionController,
        store: Arc<dyn ArtifactStore>,
        capture: Arc<RollingCapture>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            controller,
            store,
            capture,
            event_bus,
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn set_mode(&self, mode: SessionMode) {
        info!("Operator selected {} mode", mode);
        self.controller.set_mode(mode);
    }

    pub fn start_session(&self) -> bool {
        let started = self.controller.start_session();
        if !started {
            info!(
                "Session start ignored in {} mode ({:?})",
                self.controller.mode(),
                self.controller.snapshot(now()).phase
            );
        }
        started
    }

    pub fn reset_training(&self) {
        info!("Operator reset training");
        self.controller.reset_training();
    }

    pub fn end_session(&self) -> bool {
        self.controller.end_session()
    }

    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            session: self.controller.snapshot(now()),
            capture: CaptureStatus {
                state: self.capture.state(),
                format: self.capture.format(),
                stats: self.capture.stats(),
            },
        }
    }

    pub async fn list_videos(&self) -> Result<Vec<ArtifactMetadata>, StoreError> {
        self.store.list().await
    }

    /// Metadata and payload bytes of one stored clip
    pub async fn video(&self, id: ArtifactId) -> Result<(ArtifactMetadata, Vec<u8>), StoreError> {
        let artifact = self.store.get(id).await?;
        let data = artifact.payload.read().await?;
        Ok((artifact.metadata, data))
    }

    pub async fn delete_video(&self, id: ArtifactId) -> Result<ArtifactMetadata, StoreError> {
        let removed = self.store.remove(id).await?;
        info!("Deleted video {}", removed.filename);
        Ok(removed)
    }

    pub async fn clear_videos(&self) -> Result<usize, StoreError> {
        let removed = self.store.clear().await?;
        info!("Cleared {} videos", removed);
        Ok(removed)
    }

    pub fn request_shutdown(&self, reason: &str) {
        if let Err(e) = self.event_bus.publish(TrainerEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: reason.to_string(),
        }) {
            warn!("Failed to publish shutdown request: {}", e);
        }
    }
}

fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}
