//! # kinetune-core
//!
//! Reusable pose-to-music engine SDK.
//!
//! ## Architecture
//!
//! ```text
//! Webcam → FrameSource ── pull ──► Pipeline(spawn_blocking)
//!                                       │
//!                            PoseModel::estimate + classify
//!                                       │
//!                            GestureDetector (activation edge)
//!                                       │
//!                      SamplePlayer (fire-and-forget voices)
//!                                       │
//!                    broadcast::Sender<GestureTriggerEvent>
//! ```
//!
//! The loop is chained per frame: the next frame is pulled only after the
//! current frame's inference, trigger evaluation, and overlay rendering
//! complete. Playback is the one thing never awaited.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod capture;
pub mod engine;
pub mod error;
pub mod events;
pub mod model;
pub mod playback;
pub mod pose;
pub mod render;
pub mod trigger;

// Convenience re-exports for downstream crates
pub use capture::{Frame, FrameSource};
pub use engine::{Engine, EngineConfig};
pub use error::KinetuneError;
pub use events::{
    EngineStatus, EngineStatusEvent, FrameActivityEvent, GestureTriggerEvent,
};
pub use model::{ModelHandle, PoseModel, Prediction};
pub use playback::{Instrument, PlayerHandle, SamplePlayer};
pub use trigger::{GestureActivation, GestureDetector};

#[cfg(feature = "onnx")]
pub use model::{OnnxPoseModel, OnnxPoseModelConfig};

#[cfg(feature = "playback-rodio")]
pub use playback::RodioPlayer;

#[cfg(feature = "camera-opencv")]
pub use capture::OpenCvCamera;
