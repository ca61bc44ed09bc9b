mod artifact;
mod media;
mod rolling;
mod segment;
mod synthetic;

pub use artifact::{
    artifact_filename, resolve_timestamp_timezone, ArtifactId, ArtifactIdGenerator,
    ArtifactMetadata, ArtifactPayload, VideoArtifact,
};
pub use media::{ContainerFormat, MediaCapability, MediaSignal, NoMedia};
pub use rolling::{CaptureState, CaptureStats, CaptureStatsSnapshot, RollingCapture};
pub use segment::{SegmentBuffer, SegmentBufferStats};
pub use synthetic::{SyntheticControl, SyntheticMedia, SyntheticMediaOptions};

use crate::config::{CaptureConfig, MediaBackend};

/// Build the recorder selected by configuration
pub fn media_from_config(config: &CaptureConfig) -> Box<dyn MediaCapability> {
    match config.backend {
        MediaBackend::Synthetic => Box::new(SyntheticMedia::default()),
        MediaBackend::None => Box::new(NoMedia),
    }
}
