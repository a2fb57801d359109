//! Pose model backend via the `ort` crate.
//!
//! Targets a Teachable-Machine-style two-part export:
//! - `estimator.onnx`  — input `image [1,3,257,257]` → `keypoints [1,17,3]`
//!   (y, x, score per keypoint) + `embedding [1,D]`
//! - `classifier.onnx` — input `embedding [1,D]` → `logits [1,C]`
//! - `metadata.json`   — sidecar with the ordered class labels
//!
//! The classifier logits are softmax'd here so every backend hands the
//! pipeline probabilities in [0, 1].

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{Array2, Array4};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::value::Value;
use serde::Deserialize;
use tracing::{debug, info};

use crate::capture::Frame;
use crate::error::{KinetuneError, Result};
use crate::model::{PoseEstimate, PoseModel, Prediction};
use crate::pose::{Keypoint, KeypointIndex, Pose, PoseEmbedding};

/// Estimator input is square RGB at this edge length.
const ESTIMATOR_INPUT: usize = 257;

pub struct OnnxPoseModelConfig {
    pub estimator_path: PathBuf,
    pub classifier_path: PathBuf,
    pub metadata_path: PathBuf,
}

impl OnnxPoseModelConfig {
    /// Conventional layout: all three files in one model directory.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            estimator_path: dir.join("estimator.onnx"),
            classifier_path: dir.join("classifier.onnx"),
            metadata_path: dir.join("metadata.json"),
        }
    }
}

/// Class labels sidecar, matching the original export's `metadata.json`.
#[derive(Debug, Deserialize)]
struct ModelMetadata {
    labels: Vec<String>,
}

pub struct OnnxPoseModel {
    config: OnnxPoseModelConfig,
    estimator: Option<Session>,
    classifier: Option<Session>,
    labels: Vec<String>,
}

impl OnnxPoseModel {
    /// Create an unloaded model. Call `warm_up()` before inference.
    pub fn new(config: OnnxPoseModelConfig) -> Self {
        Self {
            config,
            estimator: None,
            classifier: None,
            labels: Vec::new(),
        }
    }

    fn create_session(model_path: &Path) -> Result<Session> {
        if !model_path.exists() {
            return Err(KinetuneError::ModelNotFound {
                path: model_path.to_path_buf(),
            });
        }

        SessionBuilder::new()
            .map_err(|e| KinetuneError::OnnxSession(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::All)
            .map_err(|e| KinetuneError::OnnxSession(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| KinetuneError::OnnxSession(e.to_string()))
    }

    /// Resize (nearest neighbor) and normalize a frame into the estimator's
    /// `[1, 3, S, S]` input tensor, channels in [-1, 1].
    fn preprocess(frame: &Frame) -> Array4<f32> {
        let mut input = Array4::<f32>::zeros((1, 3, ESTIMATOR_INPUT, ESTIMATOR_INPUT));
        if frame.width == 0 || frame.height == 0 {
            return input;
        }
        for oy in 0..ESTIMATOR_INPUT {
            let sy = oy * frame.height / ESTIMATOR_INPUT;
            for ox in 0..ESTIMATOR_INPUT {
                let sx = ox * frame.width / ESTIMATOR_INPUT;
                let px = frame.pixels[sy * frame.width + sx];
                let r = ((px >> 16) & 0xFF) as f32;
                let g = ((px >> 8) & 0xFF) as f32;
                let b = (px & 0xFF) as f32;
                input[[0, 0, oy, ox]] = r / 127.5 - 1.0;
                input[[0, 1, oy, ox]] = g / 127.5 - 1.0;
                input[[0, 2, oy, ox]] = b / 127.5 - 1.0;
            }
        }
        input
    }

    fn softmax(logits: &[f32]) -> Vec<f32> {
        let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let exp: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
        let sum: f32 = exp.iter().sum();
        if sum <= 0.0 {
            return vec![0.0; logits.len()];
        }
        exp.iter().map(|&e| e / sum).collect()
    }
}

impl PoseModel for OnnxPoseModel {
    fn warm_up(&mut self) -> Result<()> {
        info!("=== OnnxPoseModel warm-up ===");

        info!("loading estimator from {:?}", self.config.estimator_path);
        self.estimator = Some(Self::create_session(&self.config.estimator_path)?);

        info!("loading classifier from {:?}", self.config.classifier_path);
        self.classifier = Some(Self::create_session(&self.config.classifier_path)?);

        info!("loading metadata from {:?}", self.config.metadata_path);
        let raw = fs::read_to_string(&self.config.metadata_path).map_err(|_| {
            KinetuneError::ModelNotFound {
                path: self.config.metadata_path.clone(),
            }
        })?;
        let metadata: ModelMetadata = serde_json::from_str(&raw)
            .map_err(|e| KinetuneError::Inference(format!("bad metadata.json: {e}")))?;
        if metadata.labels.is_empty() {
            return Err(KinetuneError::Inference(
                "metadata.json declares zero labels".into(),
            ));
        }
        info!("  {} classes: {:?}", metadata.labels.len(), metadata.labels);
        self.labels = metadata.labels;

        // Dummy estimator forward pass to populate caches.
        let dummy = Array4::<f32>::zeros((1, 3, ESTIMATOR_INPUT, ESTIMATOR_INPUT));
        let dummy_val = Value::from_array(dummy)
            .map_err(|e: ort::Error| KinetuneError::OnnxSession(e.to_string()))?;
        let est = self.estimator.as_mut().expect("just loaded");
        est.run(ort::inputs!["image" => dummy_val])
            .map_err(|e| KinetuneError::OnnxSession(e.to_string()))?;

        info!("=== OnnxPoseModel warm-up complete ===");
        Ok(())
    }

    fn estimate(&mut self, frame: &Frame) -> Result<PoseEstimate> {
        let estimator = self
            .estimator
            .as_mut()
            .ok_or_else(|| KinetuneError::OnnxSession("model not loaded — call warm_up()".into()))?;

        let input = Self::preprocess(frame);
        let input_val = Value::from_array(input)
            .map_err(|e: ort::Error| KinetuneError::OnnxSession(e.to_string()))?;

        let outputs = estimator
            .run(ort::inputs!["image" => input_val])
            .map_err(|e| KinetuneError::OnnxSession(e.to_string()))?;

        let (_, kp_data) = outputs["keypoints"]
            .try_extract_tensor::<f32>()
            .map_err(|e| KinetuneError::OnnxSession(e.to_string()))?;
        if kp_data.len() < KeypointIndex::COUNT * 3 {
            return Err(KinetuneError::Inference(format!(
                "estimator emitted {} keypoint values, expected {}",
                kp_data.len(),
                KeypointIndex::COUNT * 3
            )));
        }

        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        for (i, kp) in keypoints.iter_mut().enumerate() {
            let y = kp_data[i * 3];
            let x = kp_data[i * 3 + 1];
            let score = kp_data[i * 3 + 2];
            *kp = Keypoint::new(x.clamp(0.0, 1.0), y.clamp(0.0, 1.0), score.clamp(0.0, 1.0));
        }

        let (_, emb_data) = outputs["embedding"]
            .try_extract_tensor::<f32>()
            .map_err(|e| KinetuneError::OnnxSession(e.to_string()))?;

        debug!(embedding_len = emb_data.len(), "pose estimated");

        Ok(PoseEstimate {
            pose: Pose::new(keypoints),
            embedding: PoseEmbedding(emb_data.to_vec()),
        })
    }

    fn classify(&mut self, embedding: &PoseEmbedding) -> Result<Vec<Prediction>> {
        let classifier = self
            .classifier
            .as_mut()
            .ok_or_else(|| KinetuneError::OnnxSession("model not loaded — call warm_up()".into()))?;

        let input = Array2::from_shape_vec((1, embedding.len()), embedding.0.clone())
            .map_err(|e| KinetuneError::Inference(e.to_string()))?;
        let input_val = Value::from_array(input)
            .map_err(|e: ort::Error| KinetuneError::OnnxSession(e.to_string()))?;

        let outputs = classifier
            .run(ort::inputs!["embedding" => input_val])
            .map_err(|e| KinetuneError::OnnxSession(e.to_string()))?;

        let (_, logits) = outputs["logits"]
            .try_extract_tensor::<f32>()
            .map_err(|e| KinetuneError::OnnxSession(e.to_string()))?;
        if logits.len() != self.labels.len() {
            return Err(KinetuneError::Inference(format!(
                "classifier emitted {} logits for {} labels",
                logits.len(),
                self.labels.len()
            )));
        }

        let probabilities = Self::softmax(logits);
        Ok(self
            .labels
            .iter()
            .zip(probabilities)
            .map(|(label, probability)| Prediction::new(label.clone(), probability))
            .collect())
    }

    fn total_classes(&self) -> usize {
        self.labels.len()
    }
}
