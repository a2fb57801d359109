use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use kinetune_core::engine::{pipeline, EngineConfig};
use kinetune_core::events::EngineStatus;
use kinetune_core::model::{PoseEstimate, PoseModel, Prediction};
use kinetune_core::playback::{Instrument, PlayerHandle, SamplePlayer};
use kinetune_core::pose::{Pose, PoseEmbedding};
use kinetune_core::{Frame, FrameSource, KinetuneError, ModelHandle};
use parking_lot::Mutex;
use tokio::sync::broadcast;

/// Produces `count` blank frames, then drains.
struct CountedSource {
    count: usize,
    produced: usize,
}

impl FrameSource for CountedSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, KinetuneError> {
        if self.produced >= self.count {
            return Ok(None);
        }
        self.produced += 1;
        Ok(Some(Frame::blank(16, 16)))
    }
}

/// Alternates the winning label every `period` frames, with a fixed
/// per-classification delay simulating slow inference.
struct SlowAlternatingModel {
    delay: Duration,
    period: usize,
    calls: usize,
}

impl PoseModel for SlowAlternatingModel {
    fn warm_up(&mut self) -> Result<(), KinetuneError> {
        Ok(())
    }

    fn estimate(&mut self, _frame: &Frame) -> Result<PoseEstimate, KinetuneError> {
        Ok(PoseEstimate {
            pose: Pose::default(),
            embedding: PoseEmbedding(vec![]),
        })
    }

    fn classify(&mut self, _embedding: &PoseEmbedding) -> Result<Vec<Prediction>, KinetuneError> {
        thread::sleep(self.delay);
        let phase = (self.calls / self.period) % 2;
        self.calls += 1;
        let (p1, p2) = if phase == 0 { (0.9, 0.1) } else { (0.1, 0.9) };
        Ok(vec![
            Prediction::new("pose1", p1),
            Prediction::new("pose2", p2),
        ])
    }

    fn total_classes(&self) -> usize {
        2
    }
}

struct RecordingPlayer {
    played: Arc<Mutex<Vec<String>>>,
}

impl SamplePlayer for RecordingPlayer {
    fn play(&mut self, track: &str) -> Result<(), KinetuneError> {
        self.played.lock().push(track.to_string());
        Ok(())
    }
}

#[test]
fn slow_inference_throttles_the_loop_and_triggers_stay_edge_bound() {
    const FRAMES: usize = 10;
    const DELAY_MS: u64 = 10;

    let (trigger_tx, mut trigger_rx) = broadcast::channel(64);
    let (activity_tx, mut activity_rx) = broadcast::channel(64);
    let (status_tx, _) = broadcast::channel(16);
    let (overlay_tx, _overlay_rx) = crossbeam_channel::bounded(1);

    let played = Arc::new(Mutex::new(Vec::new()));
    let status = Arc::new(Mutex::new(EngineStatus::Running));

    let ctx = pipeline::PipelineContext {
        config: EngineConfig::default(),
        model: ModelHandle::new(SlowAlternatingModel {
            delay: Duration::from_millis(DELAY_MS),
            period: 5,
            calls: 0,
        }),
        player: PlayerHandle::new(RecordingPlayer {
            played: Arc::clone(&played),
        }),
        source: Box::new(CountedSource {
            count: FRAMES,
            produced: 0,
        }),
        instrument: Arc::new(Mutex::new(Instrument::Piano)),
        running: Arc::new(AtomicBool::new(true)),
        trigger_tx,
        activity_tx,
        status_tx,
        status: Arc::clone(&status),
        seq: Arc::new(AtomicU64::new(0)),
        overlay_tx,
        diagnostics: Arc::new(pipeline::PipelineDiagnostics::default()),
    };

    let start = Instant::now();
    let handle = thread::spawn(move || pipeline::run(ctx));
    handle.join().expect("pipeline thread panicked");
    let elapsed = start.elapsed();

    // Chained loop: every frame waits out its own inference, so total
    // wall time is at least frames × inference delay.
    assert!(
        elapsed >= Duration::from_millis(FRAMES as u64 * DELAY_MS),
        "elapsed {elapsed:?} too short for {FRAMES} chained inferences"
    );

    // 10 frames, winner flips at frame 5: exactly two activation edges.
    let mut triggers = Vec::new();
    while let Ok(ev) = trigger_rx.try_recv() {
        triggers.push(ev);
    }
    assert_eq!(triggers.len(), 2);
    assert_eq!(triggers[0].label, "pose1");
    assert_eq!(triggers[1].label, "pose2");
    assert_eq!(
        &*played.lock(),
        &vec![
            "./tracks/piano-1.wav".to_string(),
            "./tracks/piano-2.wav".to_string()
        ]
    );

    // One activity event per frame, all carrying that frame's winner.
    let mut activity = Vec::new();
    while let Ok(ev) = activity_rx.try_recv() {
        activity.push(ev);
    }
    assert_eq!(activity.len(), FRAMES);
    assert!(activity[..5].iter().all(|a| a.label == "pose1"));
    assert!(activity[5..].iter().all(|a| a.label == "pose2"));

    assert_eq!(*status.lock(), EngineStatus::Stopped);
}
