//! Synthesize the 12 demo sample tracks into a `tracks/` directory.
//!
//! Usage: `gen_tracks [out_dir]` (default `./tracks`).
//!
//! Each (instrument, pose) pair gets a short decaying tone on a pentatonic
//! scale so stub-mode demos are audible without shipping recorded audio.

use std::path::{Path, PathBuf};

use kinetune_core::playback::{Instrument, TRACK_TABLE};

const SAMPLE_RATE: u32 = 44_100;
const DURATION_SECS: f32 = 1.2;

/// A minor-pentatonic run starting at A3.
const SCALE_HZ: [f32; 6] = [220.0, 261.63, 293.66, 329.63, 392.0, 440.0];

fn main() {
    if let Err(e) = run() {
        eprintln!("gen_tracks failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./tracks"));
    std::fs::create_dir_all(&out_dir).map_err(|e| e.to_string())?;

    for ((instrument, label), mapped_path) in TRACK_TABLE {
        let pose_number: usize = label
            .strip_prefix("pose")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| format!("unexpected label in track table: {label}"))?;
        let freq = SCALE_HZ[(pose_number - 1) % SCALE_HZ.len()];

        let file_name = Path::new(mapped_path)
            .file_name()
            .ok_or_else(|| format!("bad mapped path: {mapped_path}"))?;
        let out_path = out_dir.join(file_name);

        write_tone(&out_path, instrument, freq).map_err(|e| e.to_string())?;
        println!("{} ({freq} Hz) -> {}", label, out_path.display());
    }

    Ok(())
}

fn write_tone(path: &Path, instrument: Instrument, freq: f32) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;

    let total = (SAMPLE_RATE as f32 * DURATION_SECS) as usize;
    for i in 0..total {
        let t = i as f32 / SAMPLE_RATE as f32;
        let envelope = (-t * 3.5).exp();
        let phase = t * freq * std::f32::consts::TAU;

        let sample = match instrument {
            // Rounded, near-sine voice.
            Instrument::Piano => phase.sin() + 0.25 * (2.0 * phase).sin(),
            // Brighter voice with more upper harmonics.
            Instrument::Guitar => {
                phase.sin() + 0.5 * (2.0 * phase).sin() + 0.25 * (3.0 * phase).sin()
            }
        };

        let normalized = (sample * envelope * 0.5).clamp(-1.0, 1.0);
        writer.write_sample((normalized * i16::MAX as f32) as i16)?;
    }

    writer.finalize()
}
