use crate::detection::HitKind;
use crate::events::{EventBus, EventListener, TrainerEvent};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// User-facing status vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrainerStatus {
    Ready,
    Cooling,
    Countdown { remaining_seconds: u32 },
    Started,
    Hit { kind: HitKind },
    SessionComplete,
    RecordingUnsupported,
}

impl TrainerStatus {
    /// Higher values may replace lower ones through [`StatusBoard::offer`]
    pub fn priority(&self) -> u8 {
        match self {
            TrainerStatus::Ready => 0,
            TrainerStatus::Cooling => 1,
            TrainerStatus::RecordingUnsupported => 2,
            TrainerStatus::Countdown { .. } => 3,
            TrainerStatus::Started => 3,
            TrainerStatus::Hit { .. } => 4,
            TrainerStatus::SessionComplete => 5,
        }
    }
}

impl fmt::Display for TrainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainerStatus::Ready => write!(f, "READY"),
            TrainerStatus::Cooling => write!(f, "COOLING"),
            TrainerStatus::Countdown { remaining_seconds } => {
                write!(f, "STARTING IN {}s", remaining_seconds)
            }
            TrainerStatus::Started => write!(f, "START!"),
            TrainerStatus::Hit {
                kind: HitKind::FullBody,
            } => write!(f, "HIT! (full body)"),
            TrainerStatus::Hit {
                kind: HitKind::ArmsOnly,
            } => write!(f, "HIT! (arms)"),
            TrainerStatus::SessionComplete => write!(f, "SESSION COMPLETE"),
            TrainerStatus::RecordingUnsupported => write!(f, "RECORDING UNSUPPORTED"),
        }
    }
}

/// Holds the current status and arbitrates between competing updates
///
/// Every change is published as [`TrainerEvent::StatusChanged`].
pub struct StatusBoard {
    current: TrainerStatus,
    event_bus: Arc<EventBus>,
}

impl StatusBoard {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            current: TrainerStatus::Ready,
            event_bus,
        }
    }

    pub fn current(&self) -> TrainerStatus {
        self.current
    }

    /// Unconditionally replace the current status
    pub fn set(&mut self, status: TrainerStatus) {
        if self.current == status {
            return;
        }
        self.current = status;
        self.announce();
    }

    /// Replace the current status unless it has a higher priority
    pub fn offer(&mut self, status: TrainerStatus) -> bool {
        if status.priority() < self.current.priority() {
            debug!(
                "Status {} suppressed by higher priority {}",
                status, self.current
            );
            return false;
        }
        self.set(status);
        true
    }

    /// Revert to ready, but only if `expected` is still showing
    pub fn expire(&mut self, expected: TrainerStatus) -> bool {
        if self.current != expected {
            return false;
        }
        self.set(TrainerStatus::Ready);
        true
    }

    fn announce(&self) {
        debug!("Status changed to {}", self.current);
        if let Err(e) = self.event_bus.publish(TrainerEvent::StatusChanged {
            status: self.current,
        }) {
            warn!("Failed to publish status change: {}", e);
        }
    }
}

/// Outbound channel for status text
pub trait StatusSink: Send + Sync {
    fn show(&self, status: &TrainerStatus);
}

/// Status sink that writes to the log
#[derive(Debug, Default)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn show(&self, status: &TrainerStatus) {
        info!("Status: {}", status);
    }
}

/// Bridges [`TrainerEvent::StatusChanged`] events to a [`StatusSink`]
pub struct StatusSinkListener<S: StatusSink> {
    sink: S,
}

impl<S: StatusSink> StatusSinkListener<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }
}

impl<S: StatusSink> EventListener for StatusSinkListener<S> {
    fn on_event(&self, event: &TrainerEvent) {
        if let TrainerEvent::StatusChanged { status } = event {
            self.sink.show(status);
        }
    }

    fn listener_name(&self) -> &str {
        "status_sink"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct CollectingSink {
        seen: Arc<Mutex<Vec<TrainerStatus>>>,
    }

    impl StatusSink for CollectingSink {
        fn show(&self, status: &TrainerStatus) {
            self.seen.lock().push(*status);
        }
    }

    fn board_with_sink() -> (StatusBoard, CollectingSink) {
        let bus = Arc::new(EventBus::new(16));
        let sink = CollectingSink::default();
        bus.register_listener(Arc::new(StatusSinkListener::new(sink.clone())));
        (StatusBoard::new(bus), sink)
    }

    #[test]
    fn test_offer_respects_priority() {
        let (mut board, _) = board_with_sink();
        let hit = TrainerStatus::Hit {
            kind: HitKind::FullBody,
        };

        assert!(board.offer(hit));
        assert!(!board.offer(TrainerStatus::Cooling));
        assert_eq!(board.current(), hit);

        assert!(board.offer(TrainerStatus::SessionComplete));
        assert_eq!(board.current(), TrainerStatus::SessionComplete);
    }

    #[test]
    fn test_expire_only_reverts_matching_status() {
        let (mut board, sink) = board_with_sink();
        let hit = TrainerStatus::Hit {
            kind: HitKind::ArmsOnly,
        };

        board.set(hit);
        board.set(TrainerStatus::SessionComplete);

        assert!(!board.expire(hit));
        assert_eq!(board.current(), TrainerStatus::SessionComplete);

        assert!(board.expire(TrainerStatus::SessionComplete));
        assert_eq!(board.current(), TrainerStatus::Ready);
        assert_eq!(
            *sink.seen.lock(),
            vec![hit, TrainerStatus::SessionComplete, TrainerStatus::Ready]
        );
    }

    #[test]
    fn test_repeated_status_is_not_republished() {
        let (mut board, sink) = board_with_sink();

        board.offer(TrainerStatus::Cooling);
        board.offer(TrainerStatus::Cooling);

        assert_eq!(*sink.seen.lock(), vec![TrainerStatus::Cooling]);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TrainerStatus::Ready.to_string(), "READY");
        assert_eq!(
            TrainerStatus::Countdown {
                remaining_seconds: 3
            }
            .to_string(),
            "STARTING IN 3s"
        );
    }
}
