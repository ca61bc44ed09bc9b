use crate::config::DetectionConfig;
use crate::pose::{KeypointKind, PoseSample};
use serde::{Deserialize, Serialize};
use std::fmt;

const LOWER_BODY: [KeypointKind; 4] = [
    KeypointKind::LeftHip,
    KeypointKind::RightHip,
    KeypointKind::LeftKnee,
    KeypointKind::RightKnee,
];

const ARMS: [KeypointKind; 6] = [
    KeypointKind::LeftShoulder,
    KeypointKind::RightShoulder,
    KeypointKind::LeftElbow,
    KeypointKind::RightElbow,
    KeypointKind::LeftWrist,
    KeypointKind::RightWrist,
];

/// Body coverage of a single pose sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    NoPerson,
    ArmsOnly,
    FullBody,
}

/// Classifications that can trigger a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitKind {
    ArmsOnly,
    FullBody,
}

impl Classification {
    pub fn hit_kind(self) -> Option<HitKind> {
        match self {
            Classification::NoPerson => None,
            Classification::ArmsOnly => Some(HitKind::ArmsOnly),
            Classification::FullBody => Some(HitKind::FullBody),
        }
    }

    pub fn is_present(self) -> bool {
        self != Classification::NoPerson
    }
}

impl fmt::Display for HitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HitKind::ArmsOnly => write!(f, "arms only"),
            HitKind::FullBody => write!(f, "full body"),
        }
    }
}

/// Maps a pose sample to a [`Classification`]. Stateless.
#[derive(Debug, Clone)]
pub struct PoseClassifier {
    person_score_threshold: f32,
    keypoint_confidence_threshold: f32,
    full_body_min_keypoints: usize,
    arms_min_keypoints: usize,
}

impl PoseClassifier {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            person_score_threshold: config.person_score_threshold,
            keypoint_confidence_threshold: config.keypoint_confidence_threshold,
            full_body_min_keypoints: config.full_body_min_keypoints,
            arms_min_keypoints: config.arms_min_keypoints,
        }
    }

    pub fn classify(&self, sample: &PoseSample) -> Classification {
        if !sample.is_complete() || sample.score <= self.person_score_threshold {
            return Classification::NoPerson;
        }

        // Full body wins over arms when both qualify
        if self.visible(sample, &LOWER_BODY) >= self.full_body_min_keypoints {
            return Classification::FullBody;
        }

        if self.visible(sample, &ARMS) >= self.arms_min_keypoints {
            return Classification::ArmsOnly;
        }

        Classification::NoPerson
    }

    /// Classify the best pose of an inference result; empty means nobody
    pub fn classify_best(&self, poses: &[PoseSample]) -> Classification {
        poses
            .first()
            .map(|sample| self.classify(sample))
            .unwrap_or(Classification::NoPerson)
    }

    fn visible(&self, sample: &PoseSample, parts: &[KeypointKind]) -> usize {
        parts
            .iter()
            .filter_map(|kind| sample.keypoint(*kind))
            .filter(|keypoint| keypoint.confidence > self.keypoint_confidence_threshold)
            .count()
    }
}

impl Default for PoseClassifier {
    fn default() -> Self {
        Self::new(&crate::config::TrainerConfig::default().detection)
    }
}
