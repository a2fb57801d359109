//! Sample playback via the `rodio` crate.
//!
//! # Threading note
//!
//! `rodio::OutputStream` wraps a `cpal::Stream`, which is `!Send` on
//! Windows/macOS. The stream is therefore created and owned by a dedicated
//! playback thread; `RodioPlayer` itself only holds the command sender and
//! stays `Send`, so it can live inside a `PlayerHandle` on the pipeline
//! thread. A sync oneshot channel propagates open-device errors back to
//! the constructor.
//!
//! Each trigger appends to a fresh detached `Sink`, so voices overlap
//! freely and nothing is awaited.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::thread;

use crossbeam_channel::{unbounded, Sender};
use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, Sink, Source};
use tracing::{debug, info, warn};

use crate::error::{KinetuneError, Result};
use crate::playback::SamplePlayer;

/// A wav track decoded up front so triggering skips disk + decode latency.
#[derive(Debug)]
struct PreloadedTrack {
    channels: u16,
    sample_rate: u32,
    samples: Vec<f32>,
}

/// Fire-and-forget player backed by the default audio output device.
pub struct RodioPlayer {
    tx: Sender<String>,
    _thread: thread::JoinHandle<()>,
}

impl RodioPlayer {
    /// Open the default output device with no preloaded tracks.
    pub fn new() -> Result<Self> {
        Self::with_preload(&[])
    }

    /// Open the default output device and preload the given wav tracks
    /// into memory. Tracks that fail to decode are skipped with a warning
    /// and fall back to streaming from disk at trigger time.
    pub fn with_preload(tracks: &[&str]) -> Result<Self> {
        let mut preloaded: HashMap<String, PreloadedTrack> = HashMap::new();
        for track in tracks {
            match decode_wav(Path::new(track)) {
                Ok(decoded) => {
                    debug!(
                        track,
                        samples = decoded.samples.len(),
                        "track preloaded"
                    );
                    preloaded.insert((*track).to_string(), decoded);
                }
                Err(e) => warn!(track, error = %e, "track preload failed; will stream"),
            }
        }
        info!(preloaded = preloaded.len(), "audio player starting");

        let (tx, rx) = unbounded::<String>();
        // Oneshot: playback thread reports whether the output device opened.
        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<()>>();

        let handle = thread::spawn(move || {
            // Must happen on THIS thread — the stream is !Send.
            let (_stream, stream_handle) = match OutputStream::try_default() {
                Ok(pair) => {
                    let _ = open_tx.send(Ok(()));
                    pair
                }
                Err(e) => {
                    let _ = open_tx.send(Err(KinetuneError::AudioOutput(e.to_string())));
                    return;
                }
            };

            for track in rx {
                let sink = match Sink::try_new(&stream_handle) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(track, error = %e, "could not open playback voice");
                        continue;
                    }
                };

                if let Some(loaded) = preloaded.get(&track) {
                    sink.append(SamplesBuffer::new(
                        loaded.channels,
                        loaded.sample_rate,
                        loaded.samples.clone(),
                    ));
                } else {
                    let file = match File::open(&track) {
                        Ok(f) => f,
                        Err(e) => {
                            // Missing audio resources fail silently at playback time.
                            warn!(track, error = %e, "track missing; nothing played");
                            continue;
                        }
                    };
                    match Decoder::new(BufReader::new(file)) {
                        Ok(source) => sink.append(source.convert_samples::<f32>()),
                        Err(e) => {
                            warn!(track, error = %e, "track undecodable; nothing played");
                            continue;
                        }
                    }
                }

                debug!(track, "voice started");
                sink.detach();
            }
            // Sender dropped — player shut down, stream released here.
        });

        match open_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                tx,
                _thread: handle,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(KinetuneError::AudioOutput(
                "playback thread died before opening a device".into(),
            )),
        }
    }
}

impl SamplePlayer for RodioPlayer {
    fn play(&mut self, track: &str) -> Result<()> {
        // Fire-and-forget: hand the track to the playback thread and return.
        self.tx
            .send(track.to_string())
            .map_err(|_| KinetuneError::AudioOutput("playback thread is gone".into()))
    }
}

/// Decode a wav file into interleaved f32 samples.
fn decode_wav(path: &Path) -> Result<PreloadedTrack> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| KinetuneError::AudioOutput(format!("{}: {e}", path.display())))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| KinetuneError::AudioOutput(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| KinetuneError::AudioOutput(e.to_string()))?
        }
    };

    Ok(PreloadedTrack {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_wav(path: &Path) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..220 {
            let t = i as f32 / 22_050.0;
            let sample = (t * 440.0 * std::f32::consts::TAU).sin();
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn decode_wav_normalizes_int_samples() {
        let dir = std::env::temp_dir().join("kinetune-decode-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tone.wav");
        write_test_wav(&path);

        let decoded = decode_wav(&path).unwrap();
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.sample_rate, 22_050);
        assert_eq!(decoded.samples.len(), 220);
        assert!(decoded.samples.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn decode_wav_reports_missing_file() {
        let err = decode_wav(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, KinetuneError::AudioOutput(_)));
    }
}
