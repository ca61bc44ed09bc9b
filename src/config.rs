use crate::session::SessionMode;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TrainerConfig {
    pub detection: DetectionConfig,
    pub session: SessionConfig,
    pub capture: CaptureConfig,
    pub pose: PoseConfig,
    pub server: ServerConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectionConfig {
    /// Continuous dwell required before a full-body hit fires (milliseconds)
    #[serde(default = "default_threshold_ms")]
    pub threshold_ms: u64,

    /// Window after a hit during which no new hit may fire (milliseconds)
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Overall pose score at or below which nobody is considered present
    #[serde(default = "default_person_score_threshold")]
    pub person_score_threshold: f32,

    /// Keypoint confidence a body part must exceed to count as visible
    #[serde(default = "default_keypoint_confidence_threshold")]
    pub keypoint_confidence_threshold: f32,

    /// Visible hips/knees required for a full-body classification
    #[serde(default = "default_full_body_min_keypoints")]
    pub full_body_min_keypoints: usize,

    /// Visible shoulders/elbows/wrists required for an arms-only classification
    #[serde(default = "default_arms_min_keypoints")]
    pub arms_min_keypoints: usize,

    /// Dwell threshold multiplier applied to arms-only samples
    #[serde(default = "default_arms_only_multiplier")]
    pub arms_only_multiplier: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Mode the trainer starts in
    #[serde(default = "default_initial_mode")]
    pub initial_mode: SessionMode,

    /// Countdown before a recording session arms (seconds)
    #[serde(default = "default_wait_seconds")]
    pub wait_seconds: u32,

    /// Delay between arming and the ready status (milliseconds)
    #[serde(default = "default_ready_settle_ms")]
    pub ready_settle_ms: u64,

    /// How long the hit status stays up before reverting (milliseconds)
    #[serde(default = "default_hit_status_ms")]
    pub hit_status_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaBackend {
    /// Placeholder chunks generated in-process
    Synthetic,
    /// No recorder available; capture reports unsupported
    None,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    File,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PreferredFormat {
    Webm,
    Mp4,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Enable rolling hit capture
    #[serde(default = "default_capture_enabled")]
    pub enabled: bool,

    /// Recorder backend
    #[serde(default = "default_media_backend")]
    pub backend: MediaBackend,

    /// Length of each rolling segment (milliseconds)
    #[serde(default = "default_segment_ms")]
    pub segment_ms: u64,

    /// Lead-in kept when a new segment starts (milliseconds)
    #[serde(default = "default_retention_ms")]
    pub retention_ms: u64,

    /// Recording kept running after a hit (milliseconds)
    #[serde(default = "default_postroll_ms")]
    pub postroll_ms: u64,

    /// Time allowed for the recorder to flush after a stop (milliseconds)
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,

    /// Maximum number of stored clips
    #[serde(default = "default_max_artifacts")]
    pub max_artifacts: usize,

    /// Directory for stored clips
    #[serde(default = "default_capture_path")]
    pub path: String,

    /// Artifact store backend
    #[serde(default = "default_store_backend")]
    pub store: StoreBackend,

    /// Container tried first when probing the recorder
    #[serde(default = "default_preferred_format")]
    pub preferred_format: PreferredFormat,

    /// Timezone used for clip filenames
    #[serde(default = "default_timestamp_timezone")]
    pub timestamp_timezone: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PoseConfig {
    /// JSON-lines pose recording to replay
    pub replay_path: Option<String>,

    /// Frame pacing of the detection loop (milliseconds)
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Request shutdown once the pose source is exhausted
    #[serde(default = "default_exit_on_end")]
    pub exit_on_end: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Enable the HTTP control server
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,

    /// IP address to bind to
    #[serde(default = "default_server_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_server_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Log every published event at debug level
    #[serde(default)]
    pub log_events: bool,
}

impl DetectionConfig {
    pub fn threshold(&self) -> Duration {
        Duration::from_millis(self.threshold_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl CaptureConfig {
    pub fn segment_duration(&self) -> Duration {
        Duration::from_millis(self.segment_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }

    pub fn postroll(&self) -> Duration {
        Duration::from_millis(self.postroll_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }
}

impl PoseConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl TrainerConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("lean-trainer.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("detection.threshold_ms", default_threshold_ms())?
            .set_default("detection.cooldown_ms", default_cooldown_ms())?
            .set_default(
                "detection.person_score_threshold",
                default_person_score_threshold() as f64,
            )?
            .set_default(
                "detection.keypoint_confidence_threshold",
                default_keypoint_confidence_threshold() as f64,
            )?
            .set_default(
                "detection.full_body_min_keypoints",
                default_full_body_min_keypoints() as u64,
            )?
            .set_default(
                "detection.arms_min_keypoints",
                default_arms_min_keypoints() as u64,
            )?
            .set_default(
                "detection.arms_only_multiplier",
                default_arms_only_multiplier(),
            )?
            .set_default("session.initial_mode", "normal")?
            .set_default("session.wait_seconds", default_wait_seconds())?
            .set_default("session.ready_settle_ms", default_ready_settle_ms())?
            .set_default("session.hit_status_ms", default_hit_status_ms())?
            .set_default("capture.enabled", default_capture_enabled())?
            .set_default("capture.backend", "synthetic")?
            .set_default("capture.segment_ms", default_segment_ms())?
            .set_default("capture.retention_ms", default_retention_ms())?
            .set_default("capture.postroll_ms", default_postroll_ms())?
            .set_default("capture.flush_timeout_ms", default_flush_timeout_ms())?
            .set_default("capture.max_artifacts", default_max_artifacts() as u64)?
            .set_default("capture.path", default_capture_path())?
            .set_default("capture.store", "file")?
            .set_default("capture.preferred_format", "webm")?
            .set_default("capture.timestamp_timezone", default_timestamp_timezone())?
            .set_default("pose.frame_interval_ms", default_frame_interval_ms())?
            .set_default("pose.exit_on_end", default_exit_on_end())?
            .set_default("server.enabled", default_server_enabled())?
            .set_default("server.ip", default_server_ip())?
            .set_default("server.port", default_server_port())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default("system.log_events", false)?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with LEAN_TRAINER_ prefix
            .add_source(
                Environment::with_prefix("LEAN_TRAINER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: TrainerConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detection.threshold_ms == 0 {
            return Err(ConfigError::Message(
                "Detection threshold_ms must be greater than 0".to_string(),
            ));
        }

        if self.detection.arms_only_multiplier == 0 {
            return Err(ConfigError::Message(
                "Detection arms_only_multiplier must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [
            (
                "person_score_threshold",
                self.detection.person_score_threshold,
            ),
            (
                "keypoint_confidence_threshold",
                self.detection.keypoint_confidence_threshold,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Message(format!(
                    "Detection {} must be within [0, 1]",
                    name
                )));
            }
        }

        if self.detection.full_body_min_keypoints == 0 || self.detection.arms_min_keypoints == 0 {
            return Err(ConfigError::Message(
                "Detection keypoint minimums must be greater than 0".to_string(),
            ));
        }

        if self.capture.segment_ms == 0 {
            return Err(ConfigError::Message(
                "Capture segment_ms must be greater than 0".to_string(),
            ));
        }

        if self.capture.postroll_ms == 0 {
            return Err(ConfigError::Message(
                "Capture postroll_ms must be greater than 0".to_string(),
            ));
        }

        if self.capture.max_artifacts == 0 {
            return Err(ConfigError::Message(
                "Capture max_artifacts must be greater than 0".to_string(),
            ));
        }

        if self.capture.path.is_empty() && self.capture.store == StoreBackend::File {
            return Err(ConfigError::Message(
                "Capture path cannot be empty with the file store".to_string(),
            ));
        }

        if self.pose.frame_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Pose frame_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig {
                threshold_ms: default_threshold_ms(),
                cooldown_ms: default_cooldown_ms(),
                person_score_threshold: default_person_score_threshold(),
                keypoint_confidence_threshold: default_keypoint_confidence_threshold(),
                full_body_min_keypoints: default_full_body_min_keypoints(),
                arms_min_keypoints: default_arms_min_keypoints(),
                arms_only_multiplier: default_arms_only_multiplier(),
            },
            session: SessionConfig {
                initial_mode: default_initial_mode(),
                wait_seconds: default_wait_seconds(),
                ready_settle_ms: default_ready_settle_ms(),
                hit_status_ms: default_hit_status_ms(),
            },
            capture: CaptureConfig {
                enabled: default_capture_enabled(),
                backend: default_media_backend(),
                segment_ms: default_segment_ms(),
                retention_ms: default_retention_ms(),
                postroll_ms: default_postroll_ms(),
                flush_timeout_ms: default_flush_timeout_ms(),
                max_artifacts: default_max_artifacts(),
                path: default_capture_path(),
                store: default_store_backend(),
                preferred_format: default_preferred_format(),
                timestamp_timezone: default_timestamp_timezone(),
            },
            pose: PoseConfig {
                replay_path: None,
                frame_interval_ms: default_frame_interval_ms(),
                exit_on_end: default_exit_on_end(),
            },
            server: ServerConfig {
                enabled: default_server_enabled(),
                ip: default_server_ip(),
                port: default_server_port(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
                log_events: false,
            },
        }
    }
}

// Default value functions
fn default_threshold_ms() -> u64 {
    1000
}
fn default_cooldown_ms() -> u64 {
    2000
}
fn default_person_score_threshold() -> f32 {
    0.3
}
fn default_keypoint_confidence_threshold() -> f32 {
    0.3
}
fn default_full_body_min_keypoints() -> usize {
    2
}
fn default_arms_min_keypoints() -> usize {
    3
}
fn default_arms_only_multiplier() -> u32 {
    2
}

fn default_initial_mode() -> SessionMode {
    SessionMode::Normal
}
fn default_wait_seconds() -> u32 {
    5
}
fn default_ready_settle_ms() -> u64 {
    1000
}
fn default_hit_status_ms() -> u64 {
    500
}

fn default_capture_enabled() -> bool {
    true
}
fn default_media_backend() -> MediaBackend {
    MediaBackend::Synthetic
}
fn default_segment_ms() -> u64 {
    3000
}
fn default_retention_ms() -> u64 {
    3000
}
fn default_postroll_ms() -> u64 {
    2000
}
fn default_flush_timeout_ms() -> u64 {
    500
}
fn default_max_artifacts() -> usize {
    10
}
fn default_capture_path() -> String {
    "./videos".to_string()
}
fn default_store_backend() -> StoreBackend {
    StoreBackend::File
}
fn default_preferred_format() -> PreferredFormat {
    PreferredFormat::Webm
}
fn default_timestamp_timezone() -> String {
    "UTC".to_string()
}

fn default_frame_interval_ms() -> u64 {
    16
}

fn default_exit_on_end() -> bool {
    true
}

fn default_server_enabled() -> bool {
    true
}
fn default_server_ip() -> String {
    "127.0.0.1".to_string()
}
fn default_server_port() -> u16 {
    8080
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = TrainerConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.detection.cooldown(), Duration::from_millis(2000));
        assert_eq!(config.capture.max_artifacts, 10);
        assert_eq!(config.session.initial_mode, SessionMode::Normal);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[detection]
threshold_ms = 1500

[session]
initial_mode = "recording"
wait_seconds = 3

[capture]
backend = "none"
store = "memory"
"#
        )
        .unwrap();

        let config = TrainerConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.detection.threshold_ms, 1500);
        assert_eq!(config.detection.cooldown_ms, 2000);
        assert_eq!(config.session.initial_mode, SessionMode::Recording);
        assert_eq!(config.session.wait_seconds, 3);
        assert_eq!(config.capture.backend, MediaBackend::None);
        assert_eq!(config.capture.store, StoreBackend::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = TrainerConfig::default();
        config.detection.threshold_ms = 0;
        assert!(config.validate().is_err());

        config.detection.threshold_ms = 1000;
        config.detection.person_score_threshold = 1.5;
        assert!(config.validate().is_err());

        config.detection.person_score_threshold = 0.3;
        config.capture.max_artifacts = 0;
        assert!(config.validate().is_err());

        config.capture.max_artifacts = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_serializes_to_toml() {
        let rendered = toml::to_string_pretty(&TrainerConfig::default()).unwrap();

        assert!(rendered.contains("[detection]"));
        assert!(rendered.contains("initial_mode = \"normal\""));
        assert!(rendered.contains("backend = \"synthetic\""));
    }
}
