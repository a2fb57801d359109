//! Pose model abstraction.
//!
//! The `PoseModel` trait decouples the pipeline from any specific backend
//! (scripted stub, ONNX estimator + classifier head, etc.).
//!
//! `&mut self` on `estimate`/`classify` intentionally expresses that
//! backends are stateful — session scratch buffers, smoothing state. All
//! mutation is therefore serialised through `ModelHandle`'s
//! `parking_lot::Mutex`.

pub mod stub;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::{OnnxPoseModel, OnnxPoseModelConfig};

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::capture::Frame;
use crate::error::Result;
use crate::pose::{Pose, PoseEmbedding};

/// One class score produced by the classifier head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    /// Class label (e.g. `"pose1"`).
    pub label: String,
    /// Classifier score in [0.0, 1.0].
    pub probability: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, probability: f32) -> Self {
        Self {
            label: label.into(),
            probability,
        }
    }
}

/// Output of one pose-estimation pass: keypoints for rendering plus the
/// feature vector the classifier head consumes.
#[derive(Debug, Clone)]
pub struct PoseEstimate {
    pub pose: Pose,
    pub embedding: PoseEmbedding,
}

/// Contract for pose classification backends.
pub trait PoseModel: Send + 'static {
    /// One-time warm-up: load weights, run a dummy inference to populate
    /// caches. Called once at engine startup.
    ///
    /// # Errors
    /// Returns an error if model files are missing or corrupt.
    fn warm_up(&mut self) -> Result<()>;

    /// Run pose estimation on a frame.
    fn estimate(&mut self, frame: &Frame) -> Result<PoseEstimate>;

    /// Run the classifier head on an estimator embedding.
    ///
    /// # Returns
    /// One `Prediction` per class, in the model's class order. Scores are
    /// fresh every call; the caller owns ranking and thresholding.
    fn classify(&mut self, embedding: &PoseEmbedding) -> Result<Vec<Prediction>>;

    /// Number of classes the classifier head emits.
    fn total_classes(&self) -> usize;
}

/// Thread-safe reference-counted handle to any `PoseModel` implementor.
///
/// Uses `parking_lot::Mutex` for non-poisoning on panic and a faster
/// uncontended lock than `std::sync::Mutex`.
#[derive(Clone)]
pub struct ModelHandle(pub Arc<Mutex<dyn PoseModel>>);

impl ModelHandle {
    /// Wrap any `PoseModel` in a `ModelHandle`.
    pub fn new<M: PoseModel>(model: M) -> Self {
        Self(Arc::new(Mutex::new(model)))
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle").finish_non_exhaustive()
    }
}
