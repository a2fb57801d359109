//! Kinetune demo host.
//!
//! Wires a frame source (webcam with the `camera` feature, synthetic
//! otherwise), a pose model (ONNX export with the `onnx` feature, scripted
//! stub otherwise) and the rodio sample player into an `Engine`, then
//! shows the overlay in a minifb window. Keys `1`/`2` switch instrument,
//! Escape quits.

mod settings;
mod synth;

use std::path::Path;

use anyhow::Result;
use kinetune_core::model::stub::StubModel;
use kinetune_core::playback::{NullPlayer, TRACK_TABLE};
use kinetune_core::{
    Engine, EngineConfig, EngineStatus, Frame, Instrument, ModelHandle, PlayerHandle, Prediction,
};
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use settings::{load_settings, AppSettings, DEFAULT_SETTINGS_PATH};
use synth::SyntheticWebcam;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Frames each demo pose is held for in stub mode (~1.5 s at 30 fps).
const STUB_HOLD_FRAMES: usize = 45;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SETTINGS_PATH.to_string());
    let settings = load_settings(Path::new(&settings_path));
    info!(?settings, "settings loaded");

    let config = EngineConfig {
        trigger_threshold: settings.trigger_threshold,
        min_part_confidence: settings.min_part_confidence,
        emit_overlay: true,
    };

    let engine = Engine::new(config, build_model(&settings), build_player(&settings));
    engine.set_instrument(settings.instrument);
    engine.warm_up()?;

    start_frames(&engine, &settings)?;

    let trigger_rx = engine.subscribe_triggers();
    let overlay_rx = engine.overlay_frames();

    match Window::new(
        "Kinetune (1: piano, 2: guitar, Esc: quit)",
        settings.frame_width,
        settings.frame_height,
        WindowOptions::default(),
    ) {
        Ok(window) => run_windowed(&engine, window, trigger_rx, overlay_rx),
        Err(e) => {
            warn!(error = %e, "no display available; running headless");
            run_headless(&engine, trigger_rx).await;
        }
    }

    if engine.status() == EngineStatus::Running {
        engine.stop()?;
    }
    let snap = engine.diagnostics_snapshot();
    info!(
        frames = snap.frames_in,
        activations = snap.activations,
        "session finished"
    );
    Ok(())
}

fn build_model(settings: &AppSettings) -> ModelHandle {
    #[cfg(feature = "onnx")]
    if let Some(dir) = &settings.model_dir {
        use kinetune_core::{OnnxPoseModel, OnnxPoseModelConfig};
        info!(dir = %dir.display(), "using ONNX pose model");
        return ModelHandle::new(OnnxPoseModel::new(OnnxPoseModelConfig::from_dir(dir)));
    }

    #[cfg(not(feature = "onnx"))]
    if settings.model_dir.is_some() {
        warn!("modelDir set but binary built without the `onnx` feature; using stub model");
    }
    info!("using scripted stub model");
    ModelHandle::new(StubModel::scripted(demo_script()))
}

/// Cycles pose1..pose6, holding each long enough to hear the sample.
fn demo_script() -> Vec<Vec<Prediction>> {
    let labels: Vec<String> = (1..=6).map(|i| format!("pose{i}")).collect();
    let mut script = Vec::with_capacity(labels.len() * STUB_HOLD_FRAMES);
    for active in 0..labels.len() {
        let vector: Vec<Prediction> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                Prediction::new(label.clone(), if i == active { 0.93 } else { 0.01 })
            })
            .collect();
        for _ in 0..STUB_HOLD_FRAMES {
            script.push(vector.clone());
        }
    }
    script
}

fn build_player(settings: &AppSettings) -> PlayerHandle {
    let preload: Vec<&str> = if settings.preload_tracks {
        TRACK_TABLE.iter().map(|(_, path)| *path).collect()
    } else {
        Vec::new()
    };

    match kinetune_core::RodioPlayer::with_preload(&preload) {
        Ok(player) => PlayerHandle::new(player),
        Err(e) => {
            warn!(error = %e, "audio output unavailable; triggers will be silent");
            PlayerHandle::new(NullPlayer)
        }
    }
}

#[cfg(feature = "camera")]
fn start_frames(engine: &Engine, settings: &AppSettings) -> Result<()> {
    use kinetune_core::OpenCvCamera;

    match OpenCvCamera::open(
        settings.camera_index,
        settings.frame_width,
        settings.frame_height,
        settings.flip_camera,
    ) {
        Ok(camera) => {
            engine.start(camera)?;
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "camera unavailable; using synthetic frames");
            engine.start(SyntheticWebcam::new(
                settings.frame_width,
                settings.frame_height,
            ))?;
            Ok(())
        }
    }
}

#[cfg(not(feature = "camera"))]
fn start_frames(engine: &Engine, settings: &AppSettings) -> Result<()> {
    engine.start(SyntheticWebcam::new(
        settings.frame_width,
        settings.frame_height,
    ))?;
    Ok(())
}

fn run_windowed(
    engine: &Engine,
    mut window: Window,
    mut trigger_rx: tokio::sync::broadcast::Receiver<kinetune_core::GestureTriggerEvent>,
    overlay_rx: crossbeam_channel::Receiver<Frame>,
) {
    window.limit_update_rate(Some(std::time::Duration::from_micros(16_600)));
    let mut last_overlay: Option<Frame> = None;

    while window.is_open() && !window.is_key_down(Key::Escape) {
        if engine.status() != EngineStatus::Running {
            info!(status = ?engine.status(), "engine left the running state");
            break;
        }

        if window.is_key_pressed(Key::Key1, KeyRepeat::No) {
            engine.set_instrument(Instrument::Piano);
        }
        if window.is_key_pressed(Key::Key2, KeyRepeat::No) {
            engine.set_instrument(Instrument::Guitar);
        }

        while let Ok(event) = trigger_rx.try_recv() {
            info!(
                label = %event.label,
                probability = event.probability,
                track = event.track.as_deref().unwrap_or("<unmapped>"),
                "triggered"
            );
        }

        if let Ok(frame) = overlay_rx.try_recv() {
            last_overlay = Some(frame);
        }
        match &last_overlay {
            Some(frame) => {
                if let Err(e) = window.update_with_buffer(&frame.pixels, frame.width, frame.height)
                {
                    warn!(error = %e, "window update failed");
                    break;
                }
            }
            None => window.update(),
        }
    }
}

async fn run_headless(
    engine: &Engine,
    mut trigger_rx: tokio::sync::broadcast::Receiver<kinetune_core::GestureTriggerEvent>,
) {
    loop {
        if engine.status() != EngineStatus::Running {
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            _ = tokio::time::sleep(std::time::Duration::from_millis(200)) => {
                while let Ok(event) = trigger_rx.try_recv() {
                    info!(
                        label = %event.label,
                        probability = event.probability,
                        track = event.track.as_deref().unwrap_or("<unmapped>"),
                        "triggered"
                    );
                }
            }
        }
    }
}
