mod classifier;
mod cooldown;
mod dwell;
mod judge;
#[cfg(test)]
mod tests;

pub use classifier::{Classification, HitKind, PoseClassifier};
pub use cooldown::CooldownGate;
pub use dwell::{DwellDetector, DwellState};
pub use judge::{HitEvent, HitJudge, Judgement};
