use super::machine::{CountdownTick, SessionMode, SessionPhase, SessionStateMachine};
use crate::config::TrainerConfig;
use crate::detection::{Classification, HitEvent, HitJudge, HitKind, Judgement, PoseClassifier};
use crate::events::{EventBus, TrainerEvent};
use crate::pose::PoseSample;
use crate::status::{StatusBoard, TrainerStatus};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Running tallies for the current process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub frames_processed: u64,
    /// Frames with a person present that did not fire a hit
    pub present_frames: u64,
    pub hits: u64,
    pub full_body_hits: u64,
    pub arms_only_hits: u64,
    pub completed_sessions: u64,
}

impl SessionStats {
    fn record_hit(&mut self, kind: HitKind) {
        self.hits += 1;
        match kind {
            HitKind::FullBody => self.full_body_hits += 1,
            HitKind::ArmsOnly => self.arms_only_hits += 1,
        }
    }
}

/// What happened to one frame of poses
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub classification: Classification,
    pub judgement: Judgement,
    pub hit: Option<HitEvent>,
}

/// Point-in-time view of the session for operator surfaces
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub mode: SessionMode,
    #[serde(flatten)]
    pub phase: SessionPhase,
    pub armed: bool,
    pub session_active: bool,
    pub status: TrainerStatus,
    pub dwell_ms: Option<u64>,
    pub cooldown_remaining_ms: u64,
    pub stats: SessionStats,
}

/// Classification, hit judgement, mode state and status for one trainer
pub struct TrainerSession {
    classifier: PoseClassifier,
    judge: HitJudge,
    machine: SessionStateMachine,
    status: StatusBoard,
    stats: SessionStats,
    event_bus: Arc<EventBus>,
}

impl TrainerSession {
    pub fn new(config: &TrainerConfig, event_bus: Arc<EventBus>) -> Self {
        Self {
            classifier: PoseClassifier::new(&config.detection),
            judge: HitJudge::new(&config.detection),
            machine: SessionStateMachine::new(config.session.initial_mode, Arc::clone(&event_bus)),
            status: StatusBoard::new(Arc::clone(&event_bus)),
            stats: SessionStats::default(),
            event_bus,
        }
    }

    /// Run one inference result through classification and the hit judge
    pub fn process_poses(&mut self, poses: &[PoseSample], now: Instant) -> FrameOutcome {
        self.stats.frames_processed += 1;

        let classification = self.classifier.classify_best(poses);
        let judgement = self
            .judge
            .evaluate(classification, self.machine.is_armed(), now);

        let mut hit = None;
        match judgement {
            Judgement::Hit(kind) => {
                let event = HitEvent::new(now, kind, self.machine.current_mode());
                self.on_hit(&event);
                hit = Some(event);
            }
            Judgement::Cooling => {
                self.status.offer(TrainerStatus::Cooling);
            }
            Judgement::Watching | Judgement::Disarmed => {
                if self.status.current() == TrainerStatus::Cooling {
                    self.status.set(TrainerStatus::Ready);
                }
            }
        }

        if hit.is_none() && classification.is_present() {
            self.stats.present_frames += 1;
        }

        FrameOutcome {
            classification,
            judgement,
            hit,
        }
    }

    fn on_hit(&mut self, hit: &HitEvent) {
        self.stats.record_hit(hit.kind);

        // Capture sees the hit before the machine stops training
        if let Err(e) = self.event_bus.publish(TrainerEvent::HitDetected(hit.clone())) {
            warn!("Failed to publish hit: {}", e);
        }

        self.status.offer(TrainerStatus::Hit { kind: hit.kind });

        if self.machine.on_hit(hit) {
            self.stats.completed_sessions += 1;
            info!(
                "Recording session complete ({} total)",
                self.stats.completed_sessions
            );
            self.status.offer(TrainerStatus::SessionComplete);
        }
    }

    pub fn set_mode(&mut self, mode: SessionMode) {
        self.machine.set_mode(mode);
        self.judge.reset_dwell();
        self.status.set(TrainerStatus::Ready);
    }

    pub fn start_waiting_phase(&mut self, wait_seconds: u32) -> bool {
        if !self.machine.start_waiting_phase(wait_seconds) {
            return false;
        }
        self.status.set(TrainerStatus::Countdown {
            remaining_seconds: wait_seconds,
        });
        true
    }

    pub fn tick_countdown(&mut self, generation: u64) -> CountdownTick {
        let tick = self.machine.tick_countdown(generation);
        match tick {
            CountdownTick::Stale => {
                debug!("Ignoring stale countdown tick (generation {})", generation);
            }
            CountdownTick::Remaining(remaining_seconds) => {
                self.status.set(TrainerStatus::Countdown { remaining_seconds });
            }
            CountdownTick::Armed => {
                self.judge.reset_dwell();
                self.status.set(TrainerStatus::Started);
            }
        }
        tick
    }

    pub fn reset_training(&mut self) {
        self.machine.reset_training();
        self.judge.reset_dwell();
        self.status.set(TrainerStatus::Ready);
    }

    pub fn end_session(&mut self) -> bool {
        let was_active = self.machine.end_session();
        self.judge.reset_dwell();
        self.status.set(TrainerStatus::Ready);
        was_active
    }

    /// Revert a transient status if nothing has replaced it
    pub fn expire_status(&mut self, expected: TrainerStatus) -> bool {
        self.status.expire(expected)
    }

    pub fn report_capture_unsupported(&mut self) {
        self.status.offer(TrainerStatus::RecordingUnsupported);
    }

    pub fn mode(&self) -> SessionMode {
        self.machine.current_mode()
    }

    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    pub fn is_armed(&self) -> bool {
        self.machine.is_armed()
    }

    pub fn status(&self) -> TrainerStatus {
        self.status.current()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn machine(&self) -> &SessionStateMachine {
        &self.machine
    }

    pub fn judge(&self) -> &HitJudge {
        &self.judge
    }

    pub fn snapshot(&self, now: Instant) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.machine.current_mode(),
            phase: self.machine.phase(),
            armed: self.machine.is_armed(),
            session_active: self.machine.is_session_active(),
            status: self.status.current(),
            dwell_ms: self
                .judge
                .dwell()
                .elapsed(now)
                .map(|elapsed| elapsed.as_millis() as u64),
            cooldown_remaining_ms: self.judge.gate().remaining(now).as_millis() as u64,
            stats: self.stats.clone(),
        }
    }
}
