//! `Engine` — top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! Engine::new()
//!     └─► warm_up()          → model loaded, status = WarmingUp → Idle
//!         └─► start(source)  → pipeline spawned, status = Running
//!             └─► stop()     → running=false, status = Stopped
//! ```
//!
//! `start()`/`stop()` are idempotent: calling them in the wrong state
//! returns an error rather than panicking. The running flag is the loop's
//! cancellation token — there is no other way to interrupt it.
//!
//! ## Threading
//!
//! The frame loop is blocking (camera reads, ONNX inference) and runs
//! under `tokio::task::spawn_blocking`, keeping the async executor free
//! for the host. The `FrameSource` is moved into that thread and owned by
//! the pipeline for its whole life.

pub mod pipeline;

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use crate::{
    capture::{Frame, FrameSource},
    error::{KinetuneError, Result},
    events::{EngineStatus, EngineStatusEvent, FrameActivityEvent, GestureTriggerEvent},
    model::ModelHandle,
    playback::{Instrument, PlayerHandle},
    render::DEFAULT_MIN_PART_CONFIDENCE,
    trigger::DEFAULT_TRIGGER_THRESHOLD,
};

/// Broadcast channel capacity: events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

/// Overlay hand-off capacity. One in flight: the viewer always gets the
/// freshest frame and the pipeline never blocks on a slow window.
const OVERLAY_CAP: usize = 1;

/// Configuration for `Engine`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Exclusive confidence threshold for gesture activation. A winning
    /// probability must be strictly greater to fire. Default: 0.8.
    pub trigger_threshold: f32,
    /// Minimum keypoint confidence for overlay drawing. Default: 0.5.
    pub min_part_confidence: f32,
    /// Whether to render and offer overlay frames at all. Default: true.
    pub emit_overlay: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trigger_threshold: DEFAULT_TRIGGER_THRESHOLD,
            min_part_confidence: DEFAULT_MIN_PART_CONFIDENCE,
            emit_overlay: true,
        }
    }
}

/// The top-level engine handle.
///
/// `Engine` is `Send + Sync` — all fields use interior mutability. Wrap in
/// `Arc<Engine>` to share between the host UI and event-forwarding tasks.
pub struct Engine {
    config: EngineConfig,
    model: ModelHandle,
    player: PlayerHandle,
    /// Current sample set; read by the pipeline at trigger time.
    instrument: Arc<Mutex<Instrument>>,
    /// `true` while the pipeline is active.
    running: Arc<AtomicBool>,
    /// Canonical status (written atomically via Mutex, read from hosts).
    status: Arc<Mutex<EngineStatus>>,
    trigger_tx: broadcast::Sender<GestureTriggerEvent>,
    activity_tx: broadcast::Sender<FrameActivityEvent>,
    status_tx: broadcast::Sender<EngineStatusEvent>,
    /// Monotonically increasing trigger sequence counter.
    seq: Arc<AtomicU64>,
    overlay_tx: crossbeam_channel::Sender<Frame>,
    overlay_rx: crossbeam_channel::Receiver<Frame>,
    /// Shared pipeline diagnostics counters.
    diagnostics: Arc<pipeline::PipelineDiagnostics>,
}

impl Engine {
    /// Create a new engine. Does not start — call `warm_up()` then
    /// `start()`.
    pub fn new(config: EngineConfig, model: ModelHandle, player: PlayerHandle) -> Self {
        let (trigger_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (activity_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (overlay_tx, overlay_rx) = crossbeam_channel::bounded(OVERLAY_CAP);

        Self {
            config,
            model,
            player,
            instrument: Arc::new(Mutex::new(Instrument::default())),
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(EngineStatus::Idle)),
            trigger_tx,
            activity_tx,
            status_tx,
            seq: Arc::new(AtomicU64::new(0)),
            overlay_tx,
            overlay_rx,
            diagnostics: Arc::new(pipeline::PipelineDiagnostics::default()),
        }
    }

    /// Warm up the pose model (load weights, run dummy inference).
    ///
    /// Call once at application startup, before `start()`.
    pub fn warm_up(&self) -> Result<()> {
        self.set_status(EngineStatus::WarmingUp, None);
        info!("warming up pose model");
        self.model.0.lock().warm_up()?;
        self.set_status(EngineStatus::Idle, None);
        info!(
            classes = self.model.0.lock().total_classes(),
            "pose model ready"
        );
        Ok(())
    }

    /// Start the frame loop over the given source.
    ///
    /// Returns immediately; the pipeline runs in a background blocking
    /// thread until `stop()`, source exhaustion, or a fatal failure.
    ///
    /// # Errors
    /// - `KinetuneError::AlreadyRunning` if already started.
    pub fn start<S: FrameSource>(&self, source: S) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(KinetuneError::AlreadyRunning);
        }

        self.diagnostics.reset();
        self.set_status(EngineStatus::Running, None);

        // Clone all Arc-wrapped state before moving into the closure.
        let ctx = pipeline::PipelineContext {
            config: self.config.clone(),
            model: self.model.clone(),
            player: self.player.clone(),
            source: Box::new(source),
            instrument: Arc::clone(&self.instrument),
            running: Arc::clone(&self.running),
            trigger_tx: self.trigger_tx.clone(),
            activity_tx: self.activity_tx.clone(),
            status_tx: self.status_tx.clone(),
            status: Arc::clone(&self.status),
            seq: Arc::clone(&self.seq),
            overlay_tx: self.overlay_tx.clone(),
            diagnostics: Arc::clone(&self.diagnostics),
        };

        tokio::task::spawn_blocking(move || pipeline::run(ctx));

        info!("engine started — classifying frames");
        Ok(())
    }

    /// Stop the frame loop.
    ///
    /// # Errors
    /// - `KinetuneError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(KinetuneError::NotRunning);
        }

        self.set_status(EngineStatus::Stopped, None);
        info!("engine stop requested");
        Ok(())
    }

    /// Switch the active sample set. Takes effect on the next trigger.
    pub fn set_instrument(&self, instrument: Instrument) {
        *self.instrument.lock() = instrument;
        info!(%instrument, "instrument selected");
    }

    /// Currently selected sample set.
    pub fn instrument(&self) -> Instrument {
        *self.instrument.lock()
    }

    /// Current engine status (snapshot).
    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    /// Subscribe to gesture trigger events.
    pub fn subscribe_triggers(&self) -> broadcast::Receiver<GestureTriggerEvent> {
        self.trigger_tx.subscribe()
    }

    /// Subscribe to per-frame activity events (winning label + score).
    pub fn subscribe_activity(&self) -> broadcast::Receiver<FrameActivityEvent> {
        self.activity_tx.subscribe()
    }

    /// Subscribe to engine status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Receiver for rendered overlay frames (latest-wins, capacity 1).
    pub fn overlay_frames(&self) -> crossbeam_channel::Receiver<Frame> {
        self.overlay_rx.clone()
    }

    /// Snapshot of pipeline counters for observability.
    pub fn diagnostics_snapshot(&self) -> pipeline::DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn set_status(&self, new_status: EngineStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(EngineStatusEvent {
            status: new_status,
            detail,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::stub::StubModel;
    use crate::playback::NullPlayer;

    fn engine() -> Engine {
        Engine::new(
            EngineConfig::default(),
            ModelHandle::new(StubModel::new()),
            PlayerHandle::new(NullPlayer),
        )
    }

    #[test]
    fn stop_when_idle_is_an_error() {
        let engine = engine();
        assert!(matches!(engine.stop(), Err(KinetuneError::NotRunning)));
        assert_eq!(engine.status(), EngineStatus::Idle);
    }

    #[test]
    fn warm_up_settles_back_to_idle() {
        let engine = engine();
        engine.warm_up().expect("stub warm-up cannot fail");
        assert_eq!(engine.status(), EngineStatus::Idle);
    }

    #[test]
    fn instrument_setter_round_trips() {
        let engine = engine();
        assert_eq!(engine.instrument(), Instrument::Piano);
        engine.set_instrument(Instrument::Guitar);
        assert_eq!(engine.instrument(), Instrument::Guitar);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn double_start_is_an_error() {
        struct EmptySource;
        impl FrameSource for EmptySource {
            fn next_frame(&mut self) -> Result<Option<Frame>> {
                // Hold the pipeline open without producing frames.
                std::thread::sleep(std::time::Duration::from_millis(5));
                Ok(Some(Frame::blank(2, 2)))
            }
        }

        let engine = engine();
        engine.start(EmptySource).expect("first start succeeds");
        assert!(matches!(
            engine.start(EmptySource),
            Err(KinetuneError::AlreadyRunning)
        ));
        engine.stop().expect("stop succeeds");
    }
}
