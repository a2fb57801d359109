//! Blocking frame-loop pipeline.
//!
//! ## Pipeline stages (per iteration)
//!
//! ```text
//! 1. Pull one frame from the FrameSource
//! 2. PoseModel::estimate → keypoints + embedding
//! 3. PoseModel::classify → per-class probabilities
//! 4. GestureDetector::evaluate → at most one activation edge
//! 5. On activation: resolve (instrument, label) → track, start playback
//!    (fire-and-forget), broadcast GestureTriggerEvent
//! 6. Broadcast FrameActivityEvent for the frame's winner
//! 7. Render the overlay and offer it to the viewer channel
//! ```
//!
//! The loop is chained: step 1 for frame N+1 happens only after steps 2–7
//! for frame N complete, so slow inference throttles the effective frame
//! rate instead of queueing frames. The whole loop runs in
//! `spawn_blocking`, keeping the Tokio async executor free for the host.
//!
//! Source and inference failures halt the loop with status `Error`;
//! playback and overlay failures are logged and skipped.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, info, info_span, warn};

use crate::{
    capture::{Frame, FrameSource},
    engine::EngineConfig,
    events::{EngineStatus, EngineStatusEvent, FrameActivityEvent, GestureTriggerEvent},
    model::ModelHandle,
    playback::{resolve_track, Instrument, PlayerHandle},
    render::render_overlay,
    trigger::{top_prediction, GestureDetector},
};

pub struct PipelineDiagnostics {
    pub frames_in: AtomicUsize,
    pub inference_calls: AtomicUsize,
    pub inference_errors: AtomicUsize,
    pub activations: AtomicUsize,
    pub playback_errors: AtomicUsize,
    pub overlay_frames: AtomicUsize,
}

impl Default for PipelineDiagnostics {
    fn default() -> Self {
        Self {
            frames_in: AtomicUsize::new(0),
            inference_calls: AtomicUsize::new(0),
            inference_errors: AtomicUsize::new(0),
            activations: AtomicUsize::new(0),
            playback_errors: AtomicUsize::new(0),
            overlay_frames: AtomicUsize::new(0),
        }
    }
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.frames_in.store(0, Ordering::Relaxed);
        self.inference_calls.store(0, Ordering::Relaxed);
        self.inference_errors.store(0, Ordering::Relaxed);
        self.activations.store(0, Ordering::Relaxed);
        self.playback_errors.store(0, Ordering::Relaxed);
        self.overlay_frames.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            frames_in: self.frames_in.load(Ordering::Relaxed),
            inference_calls: self.inference_calls.load(Ordering::Relaxed),
            inference_errors: self.inference_errors.load(Ordering::Relaxed),
            activations: self.activations.load(Ordering::Relaxed),
            playback_errors: self.playback_errors.load(Ordering::Relaxed),
            overlay_frames: self.overlay_frames.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsSnapshot {
    pub frames_in: usize,
    pub inference_calls: usize,
    pub inference_errors: usize,
    pub activations: usize,
    pub playback_errors: usize,
    pub overlay_frames: usize,
}

/// All context the pipeline needs, passed as one struct so the closure stays tidy.
pub struct PipelineContext {
    pub config: EngineConfig,
    pub model: ModelHandle,
    pub player: PlayerHandle,
    pub source: Box<dyn FrameSource>,
    pub instrument: Arc<Mutex<Instrument>>,
    pub running: Arc<AtomicBool>,
    pub trigger_tx: broadcast::Sender<GestureTriggerEvent>,
    pub activity_tx: broadcast::Sender<FrameActivityEvent>,
    pub status_tx: broadcast::Sender<EngineStatusEvent>,
    pub status: Arc<Mutex<EngineStatus>>,
    pub seq: Arc<AtomicU64>,
    pub overlay_tx: crossbeam_channel::Sender<Frame>,
    pub diagnostics: Arc<PipelineDiagnostics>,
}

/// Run the blocking frame loop until `ctx.running` becomes false, the
/// source drains, or a fatal source/inference failure occurs.
pub fn run(mut ctx: PipelineContext) {
    info!("pipeline started");

    let mut detector = GestureDetector::new(ctx.config.trigger_threshold);
    // Independent sequence for activity events.
    let mut activity_seq = 0u64;

    loop {
        // ── 0. Check running flag ─────────────────────────────────────────
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }

        // ── 1. Pull one frame ─────────────────────────────────────────────
        let frame = match ctx.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("frame source drained — pipeline ending");
                set_status(&ctx, EngineStatus::Stopped, None);
                break;
            }
            Err(e) => {
                error!(error = %e, "frame source failed — halting pipeline");
                set_status(&ctx, EngineStatus::Error, Some(e.to_string()));
                break;
            }
        };
        ctx.diagnostics.frames_in.fetch_add(1, Ordering::Relaxed);

        // ── 2+3. Estimate pose, classify embedding (one model lock) ──────
        ctx.diagnostics
            .inference_calls
            .fetch_add(1, Ordering::Relaxed);
        let inference = {
            let mut model = ctx.model.0.lock();
            model
                .estimate(&frame)
                .and_then(|estimate| {
                    let predictions = model.classify(&estimate.embedding)?;
                    Ok((estimate, predictions))
                })
        };
        let (estimate, predictions) = match inference {
            Ok(out) => out,
            Err(e) => {
                ctx.diagnostics
                    .inference_errors
                    .fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "inference failed — halting pipeline");
                set_status(&ctx, EngineStatus::Error, Some(e.to_string()));
                break;
            }
        };

        debug!(
            width = frame.width,
            height = frame.height,
            classes = predictions.len(),
            "frame classified"
        );

        // ── 4. Activation edge detection ─────────────────────────────────
        let activation = detector.evaluate(&predictions);

        // ── 5. Playback + trigger event ──────────────────────────────────
        if let Some(ref activation) = activation {
            let span = info_span!("activation", label = %activation.label);
            let _enter = span.enter();

            let instrument = *ctx.instrument.lock();
            let track = resolve_track(instrument, &activation.label);

            match track {
                Some(track) => {
                    if let Err(e) = ctx.player.0.lock().play(track) {
                        ctx.diagnostics
                            .playback_errors
                            .fetch_add(1, Ordering::Relaxed);
                        warn!(track, error = %e, "playback failed; continuing");
                    }
                }
                None => {
                    // Unmapped labels play nothing, silently.
                    debug!(
                        instrument = %instrument,
                        "no track mapped for triggered label"
                    );
                }
            }

            ctx.diagnostics.activations.fetch_add(1, Ordering::Relaxed);
            let seq = ctx.seq.fetch_add(1, Ordering::Relaxed);
            let event = GestureTriggerEvent {
                seq,
                label: activation.label.clone(),
                probability: activation.probability,
                instrument,
                track: track.map(ToOwned::to_owned),
            };
            let emitted = ctx.trigger_tx.send(event).is_ok();
            info!(
                seq,
                probability = activation.probability,
                instrument = %instrument,
                track = track.unwrap_or("<unmapped>"),
                emitted,
                "gesture trigger fired"
            );
        }

        // ── 6. Per-frame activity event ──────────────────────────────────
        if let Some(top) = top_prediction(&predictions) {
            let event = FrameActivityEvent {
                seq: activity_seq,
                label: top.label.clone(),
                probability: top.probability,
                triggered: activation.is_some(),
            };
            activity_seq = activity_seq.saturating_add(1);
            let _ = ctx.activity_tx.send(event);
        }

        // ── 7. Overlay (best-effort, never decision-affecting) ───────────
        if ctx.config.emit_overlay {
            let overlay = render_overlay(
                &frame,
                Some(&estimate.pose),
                ctx.config.min_part_confidence,
            );
            if ctx.overlay_tx.try_send(overlay).is_ok() {
                ctx.diagnostics
                    .overlay_frames
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    ctx.running.store(false, Ordering::SeqCst);

    let snap = ctx.diagnostics.snapshot();
    info!(
        frames_in = snap.frames_in,
        inference_calls = snap.inference_calls,
        inference_errors = snap.inference_errors,
        activations = snap.activations,
        playback_errors = snap.playback_errors,
        overlay_frames = snap.overlay_frames,
        "pipeline stopped — diagnostics"
    );
}

fn set_status(ctx: &PipelineContext, status: EngineStatus, detail: Option<String>) {
    *ctx.status.lock() = status;
    let _ = ctx.status_tx.send(EngineStatusEvent { status, detail });
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::{KinetuneError, Result};
    use crate::model::{PoseEstimate, PoseModel, Prediction};
    use crate::playback::SamplePlayer;
    use crate::pose::{Pose, PoseEmbedding};

    struct ScriptedSource {
        frames: Vec<Frame>,
        idx: usize,
    }

    impl ScriptedSource {
        fn with_frames(count: usize) -> Self {
            Self {
                frames: (0..count).map(|_| Frame::blank(8, 8)).collect(),
                idx: 0,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            let frame = self.frames.get(self.idx).cloned();
            self.idx += 1;
            Ok(frame)
        }
    }

    struct FailingSource;

    impl FrameSource for FailingSource {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            Err(KinetuneError::FrameSource("camera unplugged".into()))
        }
    }

    struct ScriptedModel {
        script: Vec<Vec<Prediction>>,
        cursor: usize,
        fail_classify: bool,
    }

    impl ScriptedModel {
        fn new(script: Vec<Vec<Prediction>>) -> Self {
            Self {
                script,
                cursor: 0,
                fail_classify: false,
            }
        }
    }

    impl PoseModel for ScriptedModel {
        fn warm_up(&mut self) -> Result<()> {
            Ok(())
        }

        fn estimate(&mut self, _frame: &Frame) -> Result<PoseEstimate> {
            Ok(PoseEstimate {
                pose: Pose::default(),
                embedding: PoseEmbedding(vec![]),
            })
        }

        fn classify(&mut self, _embedding: &PoseEmbedding) -> Result<Vec<Prediction>> {
            if self.fail_classify {
                return Err(KinetuneError::Inference("intentional test failure".into()));
            }
            let preds = self
                .script
                .get(self.cursor)
                .cloned()
                .unwrap_or_default();
            self.cursor += 1;
            Ok(preds)
        }

        fn total_classes(&self) -> usize {
            6
        }
    }

    struct RecordingPlayer {
        played: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl SamplePlayer for RecordingPlayer {
        fn play(&mut self, track: &str) -> Result<()> {
            if self.fail {
                return Err(KinetuneError::AudioOutput("no device".into()));
            }
            self.played.lock().push(track.to_string());
            Ok(())
        }
    }

    fn preds(entries: &[(&str, f32)]) -> Vec<Prediction> {
        entries
            .iter()
            .map(|(label, p)| Prediction::new(*label, *p))
            .collect()
    }

    struct TestHarness {
        ctx: PipelineContext,
        trigger_rx: broadcast::Receiver<GestureTriggerEvent>,
        activity_rx: broadcast::Receiver<FrameActivityEvent>,
        overlay_rx: crossbeam_channel::Receiver<Frame>,
        played: Arc<Mutex<Vec<String>>>,
        status: Arc<Mutex<EngineStatus>>,
    }

    fn harness(source: Box<dyn FrameSource>, model: ScriptedModel) -> TestHarness {
        let (trigger_tx, trigger_rx) = broadcast::channel(64);
        let (activity_tx, activity_rx) = broadcast::channel(64);
        let (status_tx, _) = broadcast::channel(16);
        let (overlay_tx, overlay_rx) = crossbeam_channel::bounded(64);

        let played = Arc::new(Mutex::new(Vec::new()));
        let player = PlayerHandle::new(RecordingPlayer {
            played: Arc::clone(&played),
            fail: false,
        });
        let status = Arc::new(Mutex::new(EngineStatus::Running));

        let ctx = PipelineContext {
            config: EngineConfig::default(),
            model: ModelHandle::new(model),
            player,
            source,
            instrument: Arc::new(Mutex::new(Instrument::Piano)),
            running: Arc::new(AtomicBool::new(true)),
            trigger_tx,
            activity_tx,
            status_tx,
            status: Arc::clone(&status),
            seq: Arc::new(AtomicU64::new(0)),
            overlay_tx,
            diagnostics: Arc::new(PipelineDiagnostics::default()),
        };

        TestHarness {
            ctx,
            trigger_rx,
            activity_rx,
            overlay_rx,
            played,
            status,
        }
    }

    fn drain_triggers(rx: &mut broadcast::Receiver<GestureTriggerEvent>) -> Vec<GestureTriggerEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    fn drain_activity(rx: &mut broadcast::Receiver<FrameActivityEvent>) -> Vec<FrameActivityEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[test]
    fn triggers_once_per_edge_and_plays_mapped_tracks() {
        let model = ScriptedModel::new(vec![
            preds(&[("pose1", 0.9), ("pose2", 0.1)]),
            preds(&[("pose1", 0.9), ("pose2", 0.1)]),
            preds(&[("pose1", 0.1), ("pose2", 0.95)]),
            preds(&[("pose1", 0.1), ("pose2", 0.95)]),
        ]);
        let mut h = harness(Box::new(ScriptedSource::with_frames(4)), model);
        let diagnostics = Arc::clone(&h.ctx.diagnostics);

        run(h.ctx);

        let triggers = drain_triggers(&mut h.trigger_rx);
        assert_eq!(triggers.len(), 2);
        assert_eq!(triggers[0].seq, 0);
        assert_eq!(triggers[0].label, "pose1");
        assert_eq!(triggers[0].track.as_deref(), Some("./tracks/piano-1.wav"));
        assert_eq!(triggers[1].seq, 1);
        assert_eq!(triggers[1].label, "pose2");

        assert_eq!(
            &*h.played.lock(),
            &vec![
                "./tracks/piano-1.wav".to_string(),
                "./tracks/piano-2.wav".to_string()
            ]
        );

        let activity = drain_activity(&mut h.activity_rx);
        assert_eq!(activity.len(), 4);
        assert_eq!(
            activity.iter().map(|a| a.triggered).collect::<Vec<_>>(),
            vec![true, false, true, false]
        );

        let snap = diagnostics.snapshot();
        assert_eq!(snap.frames_in, 4);
        assert_eq!(snap.activations, 2);
        assert_eq!(*h.status.lock(), EngineStatus::Stopped);
    }

    #[test]
    fn below_threshold_never_triggers() {
        let model = ScriptedModel::new(vec![
            preds(&[("pose1", 0.79), ("pose2", 0.21)]),
            preds(&[("pose1", 0.79), ("pose2", 0.21)]),
        ]);
        let mut h = harness(Box::new(ScriptedSource::with_frames(2)), model);

        run(h.ctx);

        assert!(drain_triggers(&mut h.trigger_rx).is_empty());
        assert!(h.played.lock().is_empty());
        let activity = drain_activity(&mut h.activity_rx);
        assert_eq!(activity.len(), 2);
        assert!(activity.iter().all(|a| !a.triggered));
        assert_eq!(activity[0].label, "pose1");
    }

    #[test]
    fn instrument_selection_changes_played_track() {
        let model = ScriptedModel::new(vec![preds(&[("pose3", 0.9)])]);
        let mut h = harness(Box::new(ScriptedSource::with_frames(1)), model);
        *h.ctx.instrument.lock() = Instrument::Guitar;

        run(h.ctx);

        assert_eq!(&*h.played.lock(), &vec!["./tracks/guitar-3.wav".to_string()]);
        let triggers = drain_triggers(&mut h.trigger_rx);
        assert_eq!(triggers[0].instrument, Instrument::Guitar);
        assert_eq!(triggers[0].track.as_deref(), Some("./tracks/guitar-3.wav"));
    }

    #[test]
    fn unmapped_label_fires_event_but_plays_nothing() {
        let model = ScriptedModel::new(vec![preds(&[("freestyle", 0.97)])]);
        let mut h = harness(Box::new(ScriptedSource::with_frames(1)), model);

        run(h.ctx);

        let triggers = drain_triggers(&mut h.trigger_rx);
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].track, None);
        assert!(h.played.lock().is_empty());
    }

    #[test]
    fn playback_failure_does_not_halt_the_loop() {
        let model = ScriptedModel::new(vec![
            preds(&[("pose1", 0.9)]),
            preds(&[("pose2", 0.9)]),
        ]);
        let mut h = harness(Box::new(ScriptedSource::with_frames(2)), model);
        h.ctx.player = PlayerHandle::new(RecordingPlayer {
            played: Arc::clone(&h.played),
            fail: true,
        });
        let diagnostics = Arc::clone(&h.ctx.diagnostics);

        run(h.ctx);

        assert_eq!(drain_triggers(&mut h.trigger_rx).len(), 2);
        let snap = diagnostics.snapshot();
        assert_eq!(snap.frames_in, 2);
        assert_eq!(snap.playback_errors, 2);
        assert_eq!(*h.status.lock(), EngineStatus::Stopped);
    }

    #[test]
    fn inference_failure_halts_with_error_status() {
        let mut model = ScriptedModel::new(vec![]);
        model.fail_classify = true;
        let h = harness(Box::new(ScriptedSource::with_frames(5)), model);
        let diagnostics = Arc::clone(&h.ctx.diagnostics);
        let status = Arc::clone(&h.status);
        let running = Arc::clone(&h.ctx.running);

        run(h.ctx);

        let snap = diagnostics.snapshot();
        assert_eq!(snap.frames_in, 1, "no further frames after the failure");
        assert_eq!(snap.inference_errors, 1);
        assert_eq!(*status.lock(), EngineStatus::Error);
        assert!(!running.load(Ordering::SeqCst));
    }

    #[test]
    fn source_failure_halts_with_error_status() {
        let model = ScriptedModel::new(vec![]);
        let h = harness(Box::new(FailingSource), model);
        let status = Arc::clone(&h.status);

        run(h.ctx);

        assert_eq!(*status.lock(), EngineStatus::Error);
    }

    #[test]
    fn cleared_running_flag_stops_before_any_frame() {
        let model = ScriptedModel::new(vec![preds(&[("pose1", 0.9)])]);
        let h = harness(Box::new(ScriptedSource::with_frames(3)), model);
        h.ctx.running.store(false, Ordering::SeqCst);
        let diagnostics = Arc::clone(&h.ctx.diagnostics);

        run(h.ctx);

        assert_eq!(diagnostics.snapshot().frames_in, 0);
    }

    #[test]
    fn overlay_frames_are_offered_to_the_viewer() {
        let model = ScriptedModel::new(vec![preds(&[("pose1", 0.9)])]);
        let h = harness(Box::new(ScriptedSource::with_frames(1)), model);
        let overlay_rx = h.overlay_rx.clone();

        run(h.ctx);

        let overlay = overlay_rx.try_recv().expect("one overlay frame");
        assert_eq!(overlay.width, 8);
        assert_eq!(overlay.height, 8);
    }
}
