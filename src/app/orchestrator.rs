use super::frame_loop::FrameLoopReport;
use super::handle::TrainerHandle;
use super::types::{ComponentState, ShutdownReason};
use crate::capture::{media_from_config, ArtifactIdGenerator, RollingCapture};
use crate::config::{StoreBackend, TrainerConfig};
use crate::error::Result;
use crate::events::{EventBus, EventFilter, EventReceiver};
use crate::keyboard_input::KeyboardInputHandler;
use crate::pose::PoseSource;
use crate::replay::ReplayPoseSource;
use crate::session::{SessionController, TaskScheduler, TrainerSession};
use crate::status::{LogStatusSink, StatusSinkListener};
use crate::storage::{ArtifactStore, FileArtifactStore, MemoryArtifactStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Main application coordinator that manages all trainer components
pub struct TrainerOrchestrator {
    pub(super) config: TrainerConfig,
    pub(super) event_bus: Arc<EventBus>,

    // Components
    pub(super) controller: SessionController,
    pub(super) store: Arc<dyn ArtifactStore>,
    pub(super) capture: Arc<RollingCapture>,
    pub(super) pose_source: Option<Box<dyn PoseSource>>,
    pub(super) frame_loop: Option<JoinHandle<FrameLoopReport>>,
    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
    pub(super) keyboard_enabled: bool,
    #[cfg(feature = "http")]
    pub(super) server_task: Option<JoinHandle<()>>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_requests: Option<EventReceiver>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl TrainerOrchestrator {
    /// Create a new orchestrator with the given configuration
    pub async fn new(config: TrainerConfig) -> Result<Self> {
        let event_bus = Arc::new(if config.system.log_events {
            EventBus::with_debug_logging(config.system.event_bus_capacity)
        } else {
            EventBus::new(config.system.event_bus_capacity)
        });
        event_bus.register_listener(Arc::new(StatusSinkListener::new(LogStatusSink)));

        // Subscribe before anything can request a shutdown
        let shutdown_requests = Some(EventReceiver::new(
            event_bus.subscribe(),
            EventFilter::EventTypes(vec!["shutdown_requested"]),
            "shutdown_watcher".to_string(),
        ));
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        let session = TrainerSession::new(&config, Arc::clone(&event_bus));
        let controller = SessionController::new(session, &config.session, TaskScheduler::new());

        let (store, ids): (Arc<dyn ArtifactStore>, ArtifactIdGenerator) = match config.capture.store
        {
            StoreBackend::File => {
                let store = FileArtifactStore::open(&config.capture.path).await?;
                let ids = match store.last_id().await {
                    Some(last) => ArtifactIdGenerator::starting_after(last),
                    None => ArtifactIdGenerator::new(),
                };
                (Arc::new(store) as Arc<dyn ArtifactStore>, ids)
            }
            StoreBackend::Memory => (
                Arc::new(MemoryArtifactStore::new()) as Arc<dyn ArtifactStore>,
                ArtifactIdGenerator::new(),
            ),
        };
        info!("Using {} artifact store", store.store_name());

        let capture = Arc::new(RollingCapture::new(
            config.capture.clone(),
            Arc::clone(&event_bus),
            Arc::clone(&store),
            media_from_config(&config.capture),
            ids,
        ));

        let pose_source: Option<Box<dyn PoseSource>> = match &config.pose.replay_path {
            Some(path) => Some(Box::new(ReplayPoseSource::open(path).await?) as Box<dyn PoseSource>),
            None => None,
        };

        Ok(Self {
            config,
            event_bus,
            controller,
            store,
            capture,
            pose_source,
            frame_loop: None,
            keyboard_handler: None,
            keyboard_enabled: false,
            #[cfg(feature = "http")]
            server_task: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_requests,
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Replace the configured pose source
    pub fn with_pose_source(mut self, source: Box<dyn PoseSource>) -> Self {
        self.pose_source = Some(source);
        self
    }

    /// Enable or disable the keyboard controls
    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    /// Operator controls for this trainer
    pub fn handle(&self) -> TrainerHandle {
        TrainerHandle::new(
            self.controller.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.capture),
            Arc::clone(&self.event_bus),
        )
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }
}
