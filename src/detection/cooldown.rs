use std::time::{Duration, Instant};

/// Closed for a fixed window after each hit
#[derive(Debug, Clone)]
pub struct CooldownGate {
    cooldown: Duration,
    last_hit: Option<Instant>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_hit: None,
        }
    }

    pub fn is_open(&self, now: Instant) -> bool {
        match self.last_hit {
            None => true,
            Some(last_hit) => now.saturating_duration_since(last_hit) >= self.cooldown,
        }
    }

    pub fn on_hit(&mut self, now: Instant) {
        self.last_hit = Some(now);
    }

    /// Time until the gate reopens; zero when open
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_hit {
            None => Duration::ZERO,
            Some(last_hit) => self
                .cooldown
                .saturating_sub(now.saturating_duration_since(last_hit)),
        }
    }

    pub fn last_hit(&self) -> Option<Instant> {
        self.last_hit
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_starts_open() {
        let gate = CooldownGate::new(Duration::from_millis(2000));
        assert!(gate.is_open(Instant::now()));
        assert_eq!(gate.remaining(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn test_gate_reopens_at_cooldown_boundary() {
        let origin = Instant::now();
        let mut gate = CooldownGate::new(Duration::from_millis(2000));
        gate.on_hit(origin);

        assert!(!gate.is_open(origin));
        assert!(!gate.is_open(origin + Duration::from_millis(1999)));
        assert_eq!(
            gate.remaining(origin + Duration::from_millis(1500)),
            Duration::from_millis(500)
        );
        assert!(gate.is_open(origin + Duration::from_millis(2000)));
    }
}
