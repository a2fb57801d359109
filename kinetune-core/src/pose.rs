//! Pose keypoint types shared by the model and renderer.

/// The 17 PoseNet/MoveNet keypoint indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointIndex {
    pub const COUNT: usize = 17;

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Nose),
            1 => Some(Self::LeftEye),
            2 => Some(Self::RightEye),
            3 => Some(Self::LeftEar),
            4 => Some(Self::RightEar),
            5 => Some(Self::LeftShoulder),
            6 => Some(Self::RightShoulder),
            7 => Some(Self::LeftElbow),
            8 => Some(Self::RightElbow),
            9 => Some(Self::LeftWrist),
            10 => Some(Self::RightWrist),
            11 => Some(Self::LeftHip),
            12 => Some(Self::RightHip),
            13 => Some(Self::LeftKnee),
            14 => Some(Self::RightKnee),
            15 => Some(Self::LeftAnkle),
            16 => Some(Self::RightAnkle),
            _ => None,
        }
    }
}

/// A single estimated keypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// Normalized x in [0, 1], left to right.
    pub x: f32,
    /// Normalized y in [0, 1], top to bottom.
    pub y: f32,
    /// Estimator confidence in [0, 1].
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// Whether the keypoint clears a minimum confidence.
    pub fn is_valid(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }

    /// Convert to pixel coordinates for a given output size.
    pub fn to_pixel(&self, width: usize, height: usize) -> (i32, i32) {
        let px = (self.x * width as f32) as i32;
        let py = (self.y * height as f32) as i32;
        (px, py)
    }
}

impl Default for Keypoint {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            confidence: 0.0,
        }
    }
}

/// A full 17-keypoint body pose.
#[derive(Debug, Clone)]
pub struct Pose {
    pub keypoints: [Keypoint; KeypointIndex::COUNT],
}

impl Pose {
    pub fn new(keypoints: [Keypoint; KeypointIndex::COUNT]) -> Self {
        Self { keypoints }
    }

    pub fn get(&self, index: KeypointIndex) -> &Keypoint {
        &self.keypoints[index as usize]
    }

    /// Mean confidence across all keypoints.
    pub fn average_confidence(&self) -> f32 {
        let sum: f32 = self.keypoints.iter().map(|k| k.confidence).sum();
        sum / KeypointIndex::COUNT as f32
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            keypoints: [Keypoint::default(); KeypointIndex::COUNT],
        }
    }
}

/// Opaque intermediate representation the estimator hands to the
/// classifier head (feature vector, layout is backend-defined).
#[derive(Debug, Clone)]
pub struct PoseEmbedding(pub Vec<f32>);

impl PoseEmbedding {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn keypoint_index_round_trips() {
        assert_eq!(KeypointIndex::from_index(0), Some(KeypointIndex::Nose));
        assert_eq!(
            KeypointIndex::from_index(16),
            Some(KeypointIndex::RightAnkle)
        );
        assert_eq!(KeypointIndex::from_index(17), None);
    }

    #[test]
    fn keypoint_validity_uses_inclusive_threshold() {
        let kp = Keypoint::new(0.5, 0.5, 0.5);
        assert!(kp.is_valid(0.5));
        assert!(!kp.is_valid(0.51));
    }

    #[test]
    fn keypoint_to_pixel_scales_normalized_coords() {
        let kp = Keypoint::new(0.5, 0.25, 1.0);
        assert_eq!(kp.to_pixel(700, 500), (350, 125));
    }

    #[test]
    fn average_confidence_over_uniform_pose() {
        let pose = Pose::new([Keypoint::new(0.0, 0.0, 0.4); KeypointIndex::COUNT]);
        assert_relative_eq!(pose.average_confidence(), 0.4, epsilon = 1e-6);
    }
}
