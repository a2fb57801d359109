//! Host settings (JSON file next to the binary, all fields optional).

use std::fs;
use std::path::{Path, PathBuf};

use kinetune_core::Instrument;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_SETTINGS_PATH: &str = "kinetune.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    /// Starting sample set; switchable at runtime with the 1/2 keys.
    pub instrument: Instrument,
    /// ONNX model directory (estimator.onnx + classifier.onnx +
    /// metadata.json). `None` runs the scripted stub model.
    pub model_dir: Option<PathBuf>,
    /// Camera device index for the `camera` feature.
    pub camera_index: i32,
    pub frame_width: usize,
    pub frame_height: usize,
    /// Mirror the camera horizontally.
    pub flip_camera: bool,
    /// Exclusive gesture confidence threshold.
    pub trigger_threshold: f32,
    /// Minimum keypoint confidence for overlay drawing.
    pub min_part_confidence: f32,
    /// Decode all mapped wav tracks into memory at startup.
    pub preload_tracks: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            instrument: Instrument::Piano,
            model_dir: None,
            camera_index: 0,
            frame_width: 700,
            frame_height: 500,
            flip_camera: true,
            trigger_threshold: 0.8,
            min_part_confidence: 0.5,
            preload_tracks: true,
        }
    }
}

/// Load settings, falling back to defaults when the file is missing or
/// malformed. A malformed file is a warning, not a startup failure.
pub fn load_settings(path: &Path) -> AppSettings {
    match fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "settings file malformed; using defaults");
                AppSettings::default()
            }
        },
        Err(_) => AppSettings::default(),
    }
}
