use crate::detection::HitEvent;
use crate::events::{EventBus, TrainerEvent};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Always armed; every hit is counted
    Normal,
    /// Armed only after an explicit start and countdown; one hit per session
    Recording,
    /// Detection disabled
    Rest,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Normal => write!(f, "normal"),
            SessionMode::Recording => write!(f, "recording"),
            SessionMode::Rest => write!(f, "rest"),
        }
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(SessionMode::Normal),
            "recording" => Ok(SessionMode::Recording),
            "rest" => Ok(SessionMode::Rest),
            other => Err(format!("unknown session mode '{}'", other)),
        }
    }
}

/// Recording-mode sub-phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Waiting { remaining_seconds: u32 },
    Armed,
}

/// Result of a countdown tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    /// The tick belongs to a countdown that was reset or replaced
    Stale,
    Remaining(u32),
    Armed,
}

/// Owns the session mode and the recording sub-phase
pub struct SessionStateMachine {
    mode: SessionMode,
    phase: SessionPhase,
    session_active: bool,
    session_id: Option<Uuid>,
    countdown_generation: u64,
    completed_sessions: u64,
    event_bus: Arc<EventBus>,
}

impl SessionStateMachine {
    pub fn new(mode: SessionMode, event_bus: Arc<EventBus>) -> Self {
        Self {
            mode,
            phase: SessionPhase::Idle,
            session_active: false,
            session_id: None,
            countdown_generation: 0,
            completed_sessions: 0,
            event_bus,
        }
    }

    pub fn current_mode(&self) -> SessionMode {
        self.mode
    }

    /// Recording sub-phase; always `Idle` outside recording mode
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_armed(&self) -> bool {
        match self.mode {
            SessionMode::Normal => true,
            SessionMode::Recording => self.phase == SessionPhase::Armed,
            SessionMode::Rest => false,
        }
    }

    pub fn is_session_active(&self) -> bool {
        self.session_active
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Identifies the countdown currently allowed to tick
    pub fn countdown_generation(&self) -> u64 {
        self.countdown_generation
    }

    pub fn completed_sessions(&self) -> u64 {
        self.completed_sessions
    }

    pub fn set_mode(&mut self, mode: SessionMode) {
        self.stop_training("mode change");
        self.session_active = false;
        self.session_id = None;

        if self.mode != mode {
            info!("Session mode {} -> {}", self.mode, mode);
        }
        self.mode = mode;

        if let Err(e) = self.event_bus.publish(TrainerEvent::ModeChanged { mode }) {
            warn!("Failed to publish mode change: {}", e);
        }
    }

    /// Begin the pre-arm countdown; false unless recording and idle
    pub fn start_waiting_phase(&mut self, wait_seconds: u32) -> bool {
        if self.mode != SessionMode::Recording {
            debug!("Ignoring start request in {} mode", self.mode);
            return false;
        }

        if self.phase != SessionPhase::Idle {
            debug!("Ignoring start request while {:?}", self.phase);
            return false;
        }

        let session_id = Uuid::new_v4();
        self.countdown_generation += 1;
        self.phase = SessionPhase::Waiting {
            remaining_seconds: wait_seconds,
        };
        self.session_active = true;
        self.session_id = Some(session_id);

        info!(
            "Recording session {} waiting {}s before arming",
            session_id, wait_seconds
        );
        true
    }

    /// Advance the countdown by one second
    pub fn tick_countdown(&mut self, generation: u64) -> CountdownTick {
        if generation != self.countdown_generation {
            return CountdownTick::Stale;
        }

        let SessionPhase::Waiting { remaining_seconds } = self.phase else {
            return CountdownTick::Stale;
        };

        let remaining = remaining_seconds.saturating_sub(1);
        if remaining > 0 {
            self.phase = SessionPhase::Waiting {
                remaining_seconds: remaining,
            };
            return CountdownTick::Remaining(remaining);
        }

        self.phase = SessionPhase::Armed;
        let session_id = self.session_id.map(|id| id.to_string()).unwrap_or_default();
        info!("Recording session {} armed", session_id);

        if let Err(e) = self
            .event_bus
            .publish(TrainerEvent::TrainingStarted { session_id })
        {
            warn!("Failed to publish training start: {}", e);
        }
        CountdownTick::Armed
    }

    /// Close the recording session after a hit; true if one was completed
    pub fn on_hit(&mut self, hit: &HitEvent) -> bool {
        if self.mode != SessionMode::Recording {
            return false;
        }

        debug!("Hit ({}) completes the recording session", hit.kind);
        self.stop_training("hit");
        self.session_active = false;
        self.session_id = None;
        self.completed_sessions += 1;
        true
    }

    /// Drop back to idle without ending the user-visible session
    pub fn reset_training(&mut self) {
        self.stop_training("reset");
    }

    /// Explicit end of the user-visible session; true if one was active
    pub fn end_session(&mut self) -> bool {
        self.stop_training("session end");
        let was_active = self.session_active;
        self.session_active = false;
        self.session_id = None;
        was_active
    }

    fn stop_training(&mut self, reason: &str) {
        // Invalidates any countdown tick still in flight
        self.countdown_generation += 1;

        if self.phase == SessionPhase::Idle {
            return;
        }

        debug!("Training stopped from {:?} ({})", self.phase, reason);
        self.phase = SessionPhase::Idle;

        let session_id = self.session_id.map(|id| id.to_string());
        if let Err(e) = self
            .event_bus
            .publish(TrainerEvent::TrainingStopped { session_id })
        {
            warn!("Failed to publish training stop: {}", e);
        }
    }
}
