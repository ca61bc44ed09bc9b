use crate::error::PoseSourceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Body parts reported by a 17-point (MoveNet / COCO) pose model, in model order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeypointKind {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl KeypointKind {
    pub const COUNT: usize = 17;

    pub const ALL: [KeypointKind; Self::COUNT] = [
        KeypointKind::Nose,
        KeypointKind::LeftEye,
        KeypointKind::RightEye,
        KeypointKind::LeftEar,
        KeypointKind::RightEar,
        KeypointKind::LeftShoulder,
        KeypointKind::RightShoulder,
        KeypointKind::LeftElbow,
        KeypointKind::RightElbow,
        KeypointKind::LeftWrist,
        KeypointKind::RightWrist,
        KeypointKind::LeftHip,
        KeypointKind::RightHip,
        KeypointKind::LeftKnee,
        KeypointKind::RightKnee,
        KeypointKind::LeftAnkle,
        KeypointKind::RightAnkle,
    ];

    /// Position of this part in a model-ordered keypoint sequence
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub kind: KeypointKind,
    pub x: f32,
    pub y: f32,
    #[serde(alias = "score")]
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(kind: KeypointKind, x: f32, y: f32, confidence: f32) -> Self {
        Self {
            kind,
            x,
            y,
            confidence,
        }
    }
}

/// One scored pose from one inference cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseSample {
    pub score: f32,
    pub keypoints: Vec<Keypoint>,
}

impl PoseSample {
    pub fn new(score: f32, keypoints: Vec<Keypoint>) -> Self {
        Self { score, keypoints }
    }

    /// A sample with every keypoint at the given confidence
    pub fn uniform(score: f32, confidence: f32) -> Self {
        let keypoints = KeypointKind::ALL
            .iter()
            .map(|kind| Keypoint::new(*kind, 0.0, 0.0, confidence))
            .collect();
        Self { score, keypoints }
    }

    /// Override the confidence of selected parts
    pub fn with_confidence(mut self, kinds: &[KeypointKind], confidence: f32) -> Self {
        for kind in kinds {
            if let Some(keypoint) = self.keypoints.get_mut(kind.index()) {
                keypoint.confidence = confidence;
            }
        }
        self
    }

    /// Keypoint for a body part, by model position
    pub fn keypoint(&self, kind: KeypointKind) -> Option<&Keypoint> {
        self.keypoints.get(kind.index())
    }

    /// Whether the sample carries a full, model-ordered keypoint set
    pub fn is_complete(&self) -> bool {
        self.keypoints.len() >= KeypointKind::COUNT && self.score.is_finite()
    }
}

/// Source of pose estimates, one inference at a time
///
/// `Ok(Some(poses))` yields poses for the current frame, best first; an empty
/// vector means nobody was found. `Ok(None)` means the source is exhausted.
#[async_trait]
pub trait PoseSource: Send {
    async fn next_poses(&mut self) -> Result<Option<Vec<PoseSample>>, PoseSourceError>;

    fn source_name(&self) -> &str;
}
