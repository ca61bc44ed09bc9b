use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Artifact store error: {0}")]
    Store(#[from] StoreError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Pose source error: {0}")]
    PoseSource(#[from] PoseSourceError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl TrainerError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the recording capability and the rolling capture worker
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Recording not supported: {reason}")]
    Unsupported { reason: String },

    #[error("Failed to start segment: {details}")]
    SegmentStart { details: String },

    #[error("Failed to stop segment: {details}")]
    SegmentStop { details: String },

    #[error("Recorder failed mid-segment: {details}")]
    RecorderFailed { details: String },

    #[error("Capture worker already running")]
    AlreadyRunning,
}

/// Errors raised by artifact persistence
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Artifact {id} not found")]
    NotFound { id: String },

    #[error("Artifact {id} already exists")]
    Duplicate { id: String },

    #[error("Storage IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt artifact metadata at {path}: {details}")]
    Corrupt { path: String, details: String },

    #[error("Failed to serialize artifact metadata: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn io<P: Into<String>>(path: P, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by the event bus
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event channel closed")]
    ChannelClosed,
}

/// Errors raised by pose sources
#[derive(Error, Debug)]
pub enum PoseSourceError {
    #[error("Failed to read pose input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed pose record on line {line}: {details}")]
    Parse { line: usize, details: String },

    #[error("Pose inference failed: {details}")]
    Inference { details: String },
}

pub type Result<T> = std::result::Result<T, TrainerError>;
