pub mod app;
pub mod capture;
pub mod config;
pub mod detection;
pub mod error;
pub mod events;
pub mod keyboard_input;
pub mod pose;
pub mod replay;
pub mod session;
pub mod status;
pub mod storage;

#[cfg(feature = "http")]
pub mod server;

pub use app::{ComponentState, ShutdownReason, StatusReport, TrainerHandle, TrainerOrchestrator};
pub use capture::{
    ArtifactMetadata, CaptureState, ContainerFormat, MediaCapability, RollingCapture,
    VideoArtifact,
};
pub use config::TrainerConfig;
pub use detection::{Classification, HitEvent, HitJudge, HitKind, PoseClassifier};
pub use error::{Result, TrainerError};
pub use events::{EventBus, EventListener, TrainerEvent};
pub use pose::{Keypoint, KeypointKind, PoseSample, PoseSource};
pub use replay::ReplayPoseSource;
pub use session::{SessionController, SessionMode, SessionPhase, TrainerSession};
pub use status::{StatusBoard, StatusSink, TrainerStatus};
pub use storage::{ArtifactStore, FileArtifactStore, MemoryArtifactStore};

#[cfg(feature = "http")]
pub use server::ControlServer;
