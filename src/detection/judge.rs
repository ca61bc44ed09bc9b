use super::classifier::{Classification, HitKind};
use super::cooldown::CooldownGate;
use super::dwell::DwellDetector;
use crate::config::DetectionConfig;
use crate::session::SessionMode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::trace;

/// A detected hit
#[derive(Debug, Clone, Serialize)]
pub struct HitEvent {
    #[serde(skip)]
    pub at: Instant,
    pub timestamp: DateTime<Utc>,
    pub kind: HitKind,
    pub mode: SessionMode,
}

impl HitEvent {
    pub fn new(at: Instant, kind: HitKind, mode: SessionMode) -> Self {
        Self {
            at,
            timestamp: Utc::now(),
            kind,
            mode,
        }
    }

    pub fn is_arms_only(&self) -> bool {
        self.kind == HitKind::ArmsOnly
    }
}

/// Outcome of judging one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Judgement {
    /// Detection not armed; nothing evaluated
    Disarmed,
    /// Cooldown active; dwell frozen
    Cooling,
    /// Dwell evaluated without firing
    Watching,
    /// Dwell fired
    Hit(HitKind),
}

/// Dwell detection gated by the cooldown window
#[derive(Debug, Clone)]
pub struct HitJudge {
    dwell: DwellDetector,
    gate: CooldownGate,
}

impl HitJudge {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            dwell: DwellDetector::new(config.threshold(), config.arms_only_multiplier),
            gate: CooldownGate::new(config.cooldown()),
        }
    }

    /// Judge one classified frame
    ///
    /// While disarmed or cooling the dwell window is neither advanced nor
    /// cleared.
    pub fn evaluate(
        &mut self,
        classification: Classification,
        armed: bool,
        now: Instant,
    ) -> Judgement {
        if !armed {
            return Judgement::Disarmed;
        }

        if !self.gate.is_open(now) {
            trace!("Cooldown active, {:?} remaining", self.gate.remaining(now));
            return Judgement::Cooling;
        }

        match self.dwell.observe(classification, now) {
            Some(kind) => {
                self.gate.on_hit(now);
                Judgement::Hit(kind)
            }
            None => Judgement::Watching,
        }
    }

    /// Drop any open dwell window
    pub fn reset_dwell(&mut self) {
        self.dwell.reset();
    }

    pub fn dwell(&self) -> &DwellDetector {
        &self.dwell
    }

    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }
}
