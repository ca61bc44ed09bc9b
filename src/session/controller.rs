use super::context::{FrameOutcome, SessionSnapshot, TrainerSession};
use super::machine::{CountdownTick, SessionMode};
use super::scheduler::{TaskHandle, TaskScheduler};
use crate::config::SessionConfig;
use crate::pose::PoseSample;
use crate::status::TrainerStatus;
use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Shared, timer-aware front end to a [`TrainerSession`]
///
/// Drives the one-second countdown and the transient status reverts through
/// a [`TaskScheduler`]. Cloning shares the underlying session.
#[derive(Clone)]
pub struct SessionController {
    session: Arc<Mutex<TrainerSession>>,
    scheduler: TaskScheduler,
    countdown: Arc<Mutex<Option<TaskHandle>>>,
    wait_seconds: u32,
    hit_status: Duration,
    ready_settle: Duration,
}

impl SessionController {
    pub fn new(session: TrainerSession, config: &SessionConfig, scheduler: TaskScheduler) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            scheduler,
            countdown: Arc::new(Mutex::new(None)),
            wait_seconds: config.wait_seconds,
            hit_status: Duration::from_millis(config.hit_status_ms),
            ready_settle: Duration::from_millis(config.ready_settle_ms),
        }
    }

    pub fn process_poses(&self, poses: &[PoseSample], now: Instant) -> FrameOutcome {
        let outcome = self.session.lock().process_poses(poses, now);

        if let Some(hit) = &outcome.hit {
            self.expire_later(TrainerStatus::Hit { kind: hit.kind }, self.hit_status);
        }
        outcome
    }

    pub fn set_mode(&self, mode: SessionMode) {
        self.cancel_countdown();
        self.session.lock().set_mode(mode);
    }

    /// Start the recording countdown; false if the session cannot start now
    pub fn start_session(&self) -> bool {
        let generation = {
            let mut session = self.session.lock();
            if !session.start_waiting_phase(self.wait_seconds) {
                return false;
            }
            session.machine().countdown_generation()
        };

        let session = Arc::clone(&self.session);
        let controller = self.clone();
        let handle = self
            .scheduler
            .schedule_every("countdown", COUNTDOWN_TICK, move || {
                let tick = session.lock().tick_countdown(generation);
                match tick {
                    CountdownTick::Remaining(_) => ControlFlow::Continue(()),
                    CountdownTick::Armed => {
                        controller.expire_later(TrainerStatus::Started, controller.ready_settle);
                        ControlFlow::Break(())
                    }
                    CountdownTick::Stale => ControlFlow::Break(()),
                }
            });

        if let Some(previous) = self.countdown.lock().replace(handle) {
            previous.cancel();
        }
        true
    }

    pub fn reset_training(&self) {
        self.cancel_countdown();
        self.session.lock().reset_training();
    }

    pub fn end_session(&self) -> bool {
        self.cancel_countdown();
        let was_active = self.session.lock().end_session();
        if was_active {
            info!("Session ended by operator");
        }
        was_active
    }

    pub fn report_capture_unsupported(&self) {
        self.session.lock().report_capture_unsupported();
    }

    pub fn snapshot(&self, now: Instant) -> SessionSnapshot {
        self.session.lock().snapshot(now)
    }

    pub fn mode(&self) -> SessionMode {
        self.session.lock().mode()
    }

    pub fn status(&self) -> TrainerStatus {
        self.session.lock().status()
    }

    /// Cancel every pending countdown and status timer
    pub fn shutdown(&self) {
        self.cancel_countdown();
        self.scheduler.shutdown();
    }

    fn cancel_countdown(&self) {
        if let Some(handle) = self.countdown.lock().take() {
            debug!("Cancelling pending countdown");
            handle.cancel();
        }
    }

    fn expire_later(&self, status: TrainerStatus, after: Duration) {
        let session = Arc::clone(&self.session);
        // Detached; superseded statuses make the revert a no-op
        let _ = self
            .scheduler
            .schedule_after("status_expiry", after, move || {
                session.lock().expire_status(status);
            });
    }
}
