use super::classifier::{Classification, HitKind};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DwellState {
    Idle,
    Accumulating { started: Instant },
}

/// Fires once a qualifying classification has persisted past its threshold
///
/// Only `NoPerson` clears an open window; switching between arms-only and
/// full-body keeps the original start. The threshold is recomputed from the
/// current sample, doubled (by default) for arms-only.
#[derive(Debug, Clone)]
pub struct DwellDetector {
    threshold: Duration,
    arms_only_multiplier: u32,
    state: DwellState,
}

impl DwellDetector {
    pub fn new(threshold: Duration, arms_only_multiplier: u32) -> Self {
        Self {
            threshold,
            arms_only_multiplier,
            state: DwellState::Idle,
        }
    }

    pub fn state(&self) -> DwellState {
        self.state
    }

    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, DwellState::Accumulating { .. })
    }

    /// Dwell accumulated so far, if a window is open
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        match self.state {
            DwellState::Idle => None,
            DwellState::Accumulating { started } => Some(now.saturating_duration_since(started)),
        }
    }

    pub fn threshold_for(&self, kind: HitKind) -> Duration {
        match kind {
            HitKind::FullBody => self.threshold,
            HitKind::ArmsOnly => self.threshold * self.arms_only_multiplier,
        }
    }

    /// Feed one classification; returns the hit kind when the window fires
    pub fn observe(&mut self, classification: Classification, now: Instant) -> Option<HitKind> {
        let Some(kind) = classification.hit_kind() else {
            if self.is_accumulating() {
                trace!("Dwell window cleared: nobody in frame");
            }
            self.state = DwellState::Idle;
            return None;
        };

        match self.state {
            DwellState::Idle => {
                trace!("Dwell window opened ({})", kind);
                self.state = DwellState::Accumulating { started: now };
                None
            }
            DwellState::Accumulating { started } => {
                let dwell = now.saturating_duration_since(started);
                let threshold = self.threshold_for(kind);

                if dwell > threshold {
                    debug!(
                        "Dwell {:?} exceeded {:?} threshold for {}",
                        dwell, threshold, kind
                    );
                    self.state = DwellState::Idle;
                    Some(kind)
                } else {
                    None
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = DwellState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(origin: Instant, ms: u64) -> Instant {
        origin + Duration::from_millis(ms)
    }

    #[test]
    fn test_first_qualifying_sample_opens_window() {
        let origin = Instant::now();
        let mut dwell = DwellDetector::new(Duration::from_millis(1000), 2);

        assert_eq!(dwell.observe(Classification::FullBody, origin), None);
        assert_eq!(
            dwell.state(),
            DwellState::Accumulating { started: origin }
        );
        assert_eq!(dwell.elapsed(at(origin, 250)), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_no_person_clears_window() {
        let origin = Instant::now();
        let mut dwell = DwellDetector::new(Duration::from_millis(1000), 2);

        dwell.observe(Classification::FullBody, origin);
        dwell.observe(Classification::NoPerson, at(origin, 500));
        assert_eq!(dwell.state(), DwellState::Idle);

        // Window restarts from the next qualifying sample
        dwell.observe(Classification::FullBody, at(origin, 600));
        assert_eq!(dwell.observe(Classification::FullBody, at(origin, 1100)), None);
        assert_eq!(
            dwell.observe(Classification::FullBody, at(origin, 1601)),
            Some(HitKind::FullBody)
        );
    }

    #[test]
    fn test_kind_switch_keeps_start() {
        let origin = Instant::now();
        let mut dwell = DwellDetector::new(Duration::from_millis(1000), 2);

        dwell.observe(Classification::ArmsOnly, origin);
        assert_eq!(dwell.observe(Classification::ArmsOnly, at(origin, 1500)), None);

        // Same window, now judged against the full-body threshold
        assert_eq!(
            dwell.observe(Classification::FullBody, at(origin, 1600)),
            Some(HitKind::FullBody)
        );
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let origin = Instant::now();
        let mut dwell = DwellDetector::new(Duration::from_millis(1000), 2);

        dwell.observe(Classification::FullBody, origin);
        dwell.reset();
        assert!(!dwell.is_accumulating());
        assert_eq!(dwell.elapsed(at(origin, 10)), None);
    }

    #[test]
    fn test_arms_only_threshold_uses_multiplier() {
        let dwell = DwellDetector::new(Duration::from_millis(800), 3);
        assert_eq!(dwell.threshold_for(HitKind::ArmsOnly), Duration::from_millis(2400));
        assert_eq!(dwell.threshold_for(HitKind::FullBody), Duration::from_millis(800));
    }
}
