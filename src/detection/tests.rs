use super::*;
use crate::config::DetectionConfig;
use crate::config::TrainerConfig;
use std::time::{Duration, Instant};

fn detection_config(threshold_ms: u64) -> DetectionConfig {
    let mut config = TrainerConfig::default().detection;
    config.threshold_ms = threshold_ms;
    config
}

fn at(origin: Instant, ms: u64) -> Instant {
    origin + Duration::from_millis(ms)
}

/// Feed `classification` every `step_ms` from 0 to `until_ms` inclusive and
/// collect the sample times at which hits fired
fn hits_over(
    judge: &mut HitJudge,
    origin: Instant,
    classification: Classification,
    step_ms: u64,
    until_ms: u64,
) -> Vec<(u64, HitKind)> {
    let mut hits = Vec::new();
    let mut t = 0;
    while t <= until_ms {
        if let Judgement::Hit(kind) = judge.evaluate(classification, true, at(origin, t)) {
            hits.push((t, kind));
        }
        t += step_ms;
    }
    hits
}

#[test]
fn test_full_body_fires_after_threshold_not_at_it() {
    let origin = Instant::now();
    let mut judge = HitJudge::new(&detection_config(1000));

    let hits = hits_over(&mut judge, origin, Classification::FullBody, 200, 1200);

    assert_eq!(hits, vec![(1200, HitKind::FullBody)]);
}

#[test]
fn test_sample_exactly_at_threshold_does_not_fire() {
    let origin = Instant::now();
    let mut judge = HitJudge::new(&detection_config(1000));

    judge.evaluate(Classification::FullBody, true, origin);
    assert_eq!(
        judge.evaluate(Classification::FullBody, true, at(origin, 1000)),
        Judgement::Watching
    );
    assert_eq!(
        judge.evaluate(Classification::FullBody, true, at(origin, 1001)),
        Judgement::Hit(HitKind::FullBody)
    );
}

#[test]
fn test_arms_only_threshold_is_doubled() {
    let origin = Instant::now();
    let mut judge = HitJudge::new(&detection_config(1000));

    let hits = hits_over(&mut judge, origin, Classification::ArmsOnly, 100, 2200);

    // 1100 would satisfy the base threshold; the doubled one holds until 2100
    assert_eq!(hits, vec![(2100, HitKind::ArmsOnly)]);
    let hit = HitEvent::new(at(origin, 2100), HitKind::ArmsOnly, crate::session::SessionMode::Normal);
    assert!(hit.is_arms_only());
}

#[test]
fn test_arms_only_sampled_sparsely_fires_at_2200() {
    let origin = Instant::now();
    let mut judge = HitJudge::new(&detection_config(1000));

    let times = [0, 1100, 2000, 2200];
    let fired: Vec<u64> = times
        .iter()
        .filter(|t| {
            matches!(
                judge.evaluate(Classification::ArmsOnly, true, at(origin, **t)),
                Judgement::Hit(_)
            )
        })
        .copied()
        .collect();

    assert_eq!(fired, vec![2200]);
}

#[test]
fn test_exactly_one_hit_for_continuous_presence_within_cooldown() {
    let origin = Instant::now();
    let mut judge = HitJudge::new(&detection_config(500));

    // Continuous presence for 2.4s at 50ms cadence: first hit at 550ms, the
    // cooldown then covers everything up to 2550ms
    let hits = hits_over(&mut judge, origin, Classification::FullBody, 50, 2400);

    assert_eq!(hits, vec![(550, HitKind::FullBody)]);
}

#[test]
fn test_no_second_hit_inside_cooldown() {
    let origin = Instant::now();
    let mut judge = HitJudge::new(&detection_config(100));

    judge.evaluate(Classification::FullBody, true, origin);
    assert_eq!(
        judge.evaluate(Classification::FullBody, true, at(origin, 150)),
        Judgement::Hit(HitKind::FullBody)
    );

    let mut t = 160;
    while t < 150 + 2000 {
        assert_eq!(
            judge.evaluate(Classification::FullBody, true, at(origin, t)),
            Judgement::Cooling,
            "unexpected judgement at {}ms",
            t
        );
        t += 10;
    }

    // Gate reopens: a fresh window starts, then fires once past threshold
    assert_eq!(
        judge.evaluate(Classification::FullBody, true, at(origin, 2150)),
        Judgement::Watching
    );
    assert_eq!(
        judge.evaluate(Classification::FullBody, true, at(origin, 2251)),
        Judgement::Hit(HitKind::FullBody)
    );
}

#[test]
fn test_cooling_freezes_dwell_window() {
    let origin = Instant::now();
    let mut judge = HitJudge::new(&detection_config(100));

    judge.evaluate(Classification::FullBody, true, origin);
    judge.evaluate(Classification::FullBody, true, at(origin, 101));
    assert!(!judge.dwell().is_accumulating());

    // A NoPerson frame during cooldown is not evaluated at all
    judge.evaluate(Classification::FullBody, true, at(origin, 500));
    assert!(!judge.dwell().is_accumulating());
    assert_eq!(
        judge.evaluate(Classification::NoPerson, true, at(origin, 600)),
        Judgement::Cooling
    );
    assert_eq!(judge.dwell().state(), DwellState::Idle);
}

#[test]
fn test_disarmed_frames_leave_dwell_untouched() {
    let origin = Instant::now();
    let mut judge = HitJudge::new(&detection_config(1000));

    judge.evaluate(Classification::FullBody, true, origin);
    assert_eq!(
        judge.evaluate(Classification::NoPerson, false, at(origin, 100)),
        Judgement::Disarmed
    );
    assert_eq!(
        judge.dwell().state(),
        DwellState::Accumulating { started: origin }
    );
}

#[test]
fn test_reset_dwell_drops_window() {
    let origin = Instant::now();
    let mut judge = HitJudge::new(&detection_config(1000));

    judge.evaluate(Classification::FullBody, true, origin);
    judge.reset_dwell();

    assert_eq!(
        judge.evaluate(Classification::FullBody, true, at(origin, 1500)),
        Judgement::Watching
    );
}
