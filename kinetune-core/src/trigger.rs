//! Gesture activation-edge detection.
//!
//! ## Algorithm
//!
//! 1. Scan the frame's prediction vector once, tracking the running
//!    maximum with strict `>` (first-seen wins ties).
//! 2. After the scan, fire iff the winner differs from the previously
//!    active label AND its probability is strictly above the threshold.
//! 3. On fire, the winner becomes the active label — sustained confidence
//!    on the same label never re-fires.
//!
//! The comparison uses the raw probability; the threshold is exclusive,
//! so exactly 0.8 does not fire.

use crate::model::Prediction;

/// Default trigger confidence threshold.
pub const DEFAULT_TRIGGER_THRESHOLD: f32 = 0.8;

/// A single activation edge: the winning label changed while above
/// threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureActivation {
    /// The newly active class label.
    pub label: String,
    /// Its probability on the triggering frame.
    pub probability: f32,
}

/// Stateful edge detector over per-frame prediction vectors.
///
/// Holds the one piece of cross-frame state the trigger loop needs: the
/// previously activated label.
#[derive(Debug, Clone)]
pub struct GestureDetector {
    threshold: f32,
    active: Option<String>,
}

impl GestureDetector {
    /// Create a detector with an exclusive confidence threshold.
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            active: None,
        }
    }

    /// The label that last fired, if any.
    pub fn active_label(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Forget the active label; the next above-threshold winner fires
    /// even if it matches the label active before the reset.
    pub fn reset(&mut self) {
        self.active = None;
    }

    /// Evaluate one frame's predictions, firing at most once.
    pub fn evaluate(&mut self, predictions: &[Prediction]) -> Option<GestureActivation> {
        let winner = top_prediction(predictions)?;

        if winner.probability <= self.threshold {
            return None;
        }
        if self.active.as_deref() == Some(winner.label.as_str()) {
            return None;
        }

        self.active = Some(winner.label.clone());
        Some(GestureActivation {
            label: winner.label.clone(),
            probability: winner.probability,
        })
    }
}

/// The strictly-maximum entry; the first encountered wins ties.
pub fn top_prediction(predictions: &[Prediction]) -> Option<&Prediction> {
    let mut best: Option<&Prediction> = None;
    for prediction in predictions {
        match best {
            Some(current) if prediction.probability > current.probability => {
                best = Some(prediction);
            }
            None => best = Some(prediction),
            _ => {}
        }
    }
    best
}

impl Default for GestureDetector {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGER_THRESHOLD)
    }
}
