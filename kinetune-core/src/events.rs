//! Event types broadcast by the engine.
//!
//! | Event | Channel |
//! |-------|---------|
//! | `GestureTriggerEvent` | `Engine::subscribe_triggers` |
//! | `FrameActivityEvent` | `Engine::subscribe_activity` |
//! | `EngineStatusEvent` | `Engine::subscribe_status` |
//!
//! All types serialize camelCase so hosts can forward them to a UI layer
//! unchanged.

use serde::{Deserialize, Serialize};

use crate::playback::Instrument;

// ---------------------------------------------------------------------------
// Trigger events
// ---------------------------------------------------------------------------

/// Emitted once per activation edge — the winning label changed while its
/// confidence cleared the trigger threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GestureTriggerEvent {
    /// Monotonically increasing trigger sequence number.
    pub seq: u64,
    /// The newly active class label.
    pub label: String,
    /// Its probability on the triggering frame.
    pub probability: f32,
    /// Instrument selected at trigger time.
    pub instrument: Instrument,
    /// Resolved track path, `None` when the label has no mapping.
    pub track: Option<String>,
}

// ---------------------------------------------------------------------------
// Frame activity events
// ---------------------------------------------------------------------------

/// Emitted for each processed frame with a non-empty prediction vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameActivityEvent {
    /// Monotonically increasing frame sequence number.
    pub seq: u64,
    /// The frame's winning class label.
    pub label: String,
    /// The winner's probability in [0.0, 1.0].
    pub probability: f32,
    /// Whether this frame fired a trigger.
    pub triggered: bool,
}

// ---------------------------------------------------------------------------
// Engine status events
// ---------------------------------------------------------------------------

/// Emitted when the engine state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of the Kinetune engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Engine created but `start()` not yet called.
    Idle,
    /// Warming up the model (loading weights, dummy inference).
    WarmingUp,
    /// Actively pulling frames and classifying poses.
    Running,
    /// Frame loop ended cleanly; engine may be restarted.
    Stopped,
    /// The frame loop halted on a source or inference failure.
    Error,
}
