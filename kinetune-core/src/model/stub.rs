//! `StubModel` — scripted backend that replays canned predictions.
//!
//! Used during development before an ONNX export is wired up, and by the
//! pipeline tests. Cycles through a script of prediction vectors, one per
//! `classify` call, so activation-edge behavior can be exercised
//! deterministically end-to-end.

use tracing::debug;

use crate::capture::Frame;
use crate::error::Result;
use crate::model::{PoseEstimate, PoseModel, Prediction};
use crate::pose::{Keypoint, KeypointIndex, Pose, PoseEmbedding};

/// Replays a fixed script of prediction vectors.
///
/// The emitted pose is a centered T-pose-ish skeleton at 0.9 confidence so
/// the overlay renderer has something to draw.
pub struct StubModel {
    script: Vec<Vec<Prediction>>,
    cursor: usize,
    labels: Vec<String>,
}

impl StubModel {
    /// A stub for the standard six-class demo model, idling on `"pose1"`.
    pub fn new() -> Self {
        let labels: Vec<String> = (1..=6).map(|i| format!("pose{i}")).collect();
        let idle: Vec<Prediction> = labels
            .iter()
            .enumerate()
            .map(|(i, l)| Prediction::new(l.clone(), if i == 0 { 0.95 } else { 0.01 }))
            .collect();
        Self {
            script: vec![idle],
            cursor: 0,
            labels,
        }
    }

    /// A stub replaying the given script. Class labels are taken from the
    /// first entry; an empty script classifies everything as nothing.
    pub fn scripted(script: Vec<Vec<Prediction>>) -> Self {
        let labels = script
            .first()
            .map(|preds| preds.iter().map(|p| p.label.clone()).collect())
            .unwrap_or_default();
        Self {
            script,
            cursor: 0,
            labels,
        }
    }

    fn neutral_pose() -> Pose {
        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        for (i, kp) in keypoints.iter_mut().enumerate() {
            // Spread keypoints down the frame center, head at the top.
            let y = 0.15 + 0.05 * i as f32;
            *kp = Keypoint::new(0.5, y, 0.9);
        }
        Pose::new(keypoints)
    }
}

impl Default for StubModel {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseModel for StubModel {
    fn warm_up(&mut self) -> Result<()> {
        debug!("StubModel::warm_up — no-op");
        Ok(())
    }

    fn estimate(&mut self, frame: &Frame) -> Result<PoseEstimate> {
        debug!(
            width = frame.width,
            height = frame.height,
            "StubModel::estimate"
        );
        Ok(PoseEstimate {
            pose: Self::neutral_pose(),
            embedding: PoseEmbedding(vec![0.0; 64]),
        })
    }

    fn classify(&mut self, _embedding: &PoseEmbedding) -> Result<Vec<Prediction>> {
        if self.script.is_empty() {
            return Ok(vec![]);
        }
        let preds = self.script[self.cursor % self.script.len()].clone();
        self.cursor += 1;
        Ok(preds)
    }

    fn total_classes(&self) -> usize {
        self.labels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_stub_cycles_through_script() {
        let mut model = StubModel::scripted(vec![
            vec![Prediction::new("pose1", 0.9), Prediction::new("pose2", 0.1)],
            vec![Prediction::new("pose1", 0.1), Prediction::new("pose2", 0.9)],
        ]);
        let embedding = PoseEmbedding(vec![]);

        let first = model.classify(&embedding).unwrap();
        let second = model.classify(&embedding).unwrap();
        let third = model.classify(&embedding).unwrap();

        assert_eq!(first[0].probability, 0.9);
        assert_eq!(second[1].probability, 0.9);
        assert_eq!(third[0].probability, 0.9, "script wraps around");
        assert_eq!(model.total_classes(), 2);
    }

    #[test]
    fn default_stub_idles_on_first_label() {
        let mut model = StubModel::new();
        let est = model.estimate(&Frame::blank(8, 8)).unwrap();
        assert_eq!(est.pose.keypoints.len(), KeypointIndex::COUNT);

        let preds = model.classify(&est.embedding).unwrap();
        assert_eq!(preds.len(), 6);
        assert_eq!(preds[0].label, "pose1");
        assert!(preds[0].probability > 0.9);
    }
}
