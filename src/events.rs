use crate::capture::ArtifactMetadata;
use crate::detection::HitEvent;
use crate::error::EventBusError;
use crate::session::SessionMode;
use crate::status::TrainerStatus;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events that can occur in the trainer
#[derive(Debug, Clone)]
pub enum TrainerEvent {
    /// The dwell detector fired
    HitDetected(HitEvent),
    /// A recording session armed after its countdown
    TrainingStarted { session_id: String },
    /// A recording session stopped (hit, reset, mode change or end)
    TrainingStopped { session_id: Option<String> },
    /// The session mode changed
    ModeChanged { mode: SessionMode },
    /// The user-facing status changed
    StatusChanged { status: TrainerStatus },
    /// A hit clip was finalized and stored
    VideoSaved(ArtifactMetadata),
    /// The recorder cannot run on this system
    CaptureUnsupported { reason: String },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl TrainerEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            TrainerEvent::HitDetected(hit) => {
                format!("Hit detected ({}) in {} mode", hit.kind, hit.mode)
            }
            TrainerEvent::TrainingStarted { session_id } => {
                format!("Training started: {}", session_id)
            }
            TrainerEvent::TrainingStopped { session_id } => match session_id {
                Some(id) => format!("Training stopped: {}", id),
                None => "Training stopped".to_string(),
            },
            TrainerEvent::ModeChanged { mode } => format!("Mode changed to {}", mode),
            TrainerEvent::StatusChanged { status } => format!("Status: {}", status),
            TrainerEvent::VideoSaved(metadata) => {
                format!(
                    "Video saved: {} ({} bytes)",
                    metadata.filename, metadata.size_bytes
                )
            }
            TrainerEvent::CaptureUnsupported { reason } => {
                format!("Recording unsupported: {}", reason)
            }
            TrainerEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            TrainerEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            TrainerEvent::HitDetected(_) => "hit_detected",
            TrainerEvent::TrainingStarted { .. } => "training_started",
            TrainerEvent::TrainingStopped { .. } => "training_stopped",
            TrainerEvent::ModeChanged { .. } => "mode_changed",
            TrainerEvent::StatusChanged { .. } => "status_changed",
            TrainerEvent::VideoSaved(_) => "video_saved",
            TrainerEvent::CaptureUnsupported { .. } => "capture_unsupported",
            TrainerEvent::SystemError { .. } => "system_error",
            TrainerEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Synchronous observer invoked for every published event
///
/// Listeners run on the publisher's stack in registration order, before the
/// event is broadcast to async subscribers. They must not block.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &TrainerEvent);

    /// Get the name of this listener for logging
    fn listener_name(&self) -> &str;
}

/// Event bus: ordered synchronous listeners plus a broadcast channel for tasks
pub struct EventBus {
    sender: broadcast::Sender<TrainerEvent>,
    listeners: Arc<RwLock<Vec<Arc<dyn EventListener>>>>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            listeners: Arc::new(RwLock::new(Vec::new())),
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let mut bus = Self::new(capacity);
        bus.debug_logging = true;
        bus
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<TrainerEvent> {
        self.sender.subscribe()
    }

    /// Register a synchronous listener; delivery follows registration order
    pub fn register_listener(&self, listener: Arc<dyn EventListener>) {
        debug!("Registering event listener '{}'", listener.listener_name());
        self.listeners.write().push(listener);
    }

    /// Publish an event to all listeners and subscribers
    ///
    /// Returns the number of recipients. Having no broadcast subscribers is
    /// not an error.
    pub fn publish(&self, event: TrainerEvent) -> Result<usize, EventBusError> {
        if self.debug_logging {
            debug!("Publishing event: {}", event.description());
        }

        match &event {
            TrainerEvent::HitDetected(hit) => {
                info!("Hit detected: {} ({} mode)", hit.kind, hit.mode);
            }
            TrainerEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            TrainerEvent::CaptureUnsupported { reason } => {
                warn!("Recording unsupported: {}", reason);
            }
            TrainerEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        // Snapshot so listeners may publish without holding the lock
        let listeners: Vec<Arc<dyn EventListener>> = self.listeners.read().clone();
        for listener in &listeners {
            listener.on_event(&event);
        }

        if self.sender.receiver_count() == 0 {
            return Ok(listeners.len());
        }

        self.sender
            .send(event)
            .map(|subscribers| subscribers + listeners.len())
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the number of registered synchronous listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            listeners: Arc::clone(&self.listeners),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Custom filter function
    Custom(fn(&TrainerEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &TrainerEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<TrainerEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<TrainerEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<TrainerEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<TrainerEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tokio::time::{timeout, Duration};

    struct Recorder {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl EventListener for Recorder {
        fn on_event(&self, event: &TrainerEvent) {
            self.log
                .lock()
                .push(format!("{}:{}", self.name, event.event_type()));
        }

        fn listener_name(&self) -> &str {
            &self.name
        }
    }

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let delivered = event_bus
            .publish(TrainerEvent::ModeChanged {
                mode: SessionMode::Rest,
            })
            .unwrap();
        assert_eq!(delivered, 1);

        match receiver.recv().await.unwrap() {
            TrainerEvent::ModeChanged { mode } => assert_eq!(mode, SessionMode::Rest),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let event_bus = EventBus::new(10);
        let delivered = event_bus
            .publish(TrainerEvent::TrainingStopped { session_id: None })
            .unwrap();
        assert_eq!(delivered, 0);
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let event_bus = EventBus::new(10);
        let log = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            event_bus.register_listener(Arc::new(Recorder {
                name: name.to_string(),
                log: Arc::clone(&log),
            }));
        }

        event_bus
            .publish(TrainerEvent::TrainingStarted {
                session_id: "s1".to_string(),
            })
            .unwrap();
        event_bus
            .publish(TrainerEvent::TrainingStopped { session_id: None })
            .unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                "first:training_started",
                "second:training_started",
                "third:training_started",
                "first:training_stopped",
                "second:training_stopped",
                "third:training_stopped",
            ]
        );
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let filter = EventFilter::EventTypes(vec!["training_started"]);
        let mut filtered = EventReceiver::new(event_bus.subscribe(), filter, "test".to_string());

        event_bus
            .publish(TrainerEvent::ModeChanged {
                mode: SessionMode::Recording,
            })
            .unwrap();
        event_bus
            .publish(TrainerEvent::TrainingStarted {
                session_id: "abc".to_string(),
            })
            .unwrap();

        let received = timeout(Duration::from_millis(100), filtered.recv())
            .await
            .unwrap()
            .unwrap();
        match received {
            TrainerEvent::TrainingStarted { session_id } => assert_eq!(session_id, "abc"),
            other => panic!("Unexpected event: {:?}", other),
        }
        assert!(filtered.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_event_properties() {
        let event = TrainerEvent::CaptureUnsupported {
            reason: "no container".to_string(),
        };

        assert_eq!(event.event_type(), "capture_unsupported");
        assert!(event.description().contains("no container"));
    }
}
