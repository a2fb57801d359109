//! Sample playback abstraction.
//!
//! Playback is fire-and-forget: each trigger starts a fresh voice
//! immediately, without waiting for earlier voices to finish, so rapid
//! gesture changes layer their samples. A missing or unreadable track is
//! a warning, never a pipeline error.

pub mod tracks;

#[cfg(feature = "playback-rodio")]
pub mod rodio;

#[cfg(feature = "playback-rodio")]
pub use self::rodio::RodioPlayer;

pub use tracks::{resolve_track, TRACK_TABLE};

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which sample set a triggered gesture plays from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    Piano,
    Guitar,
}

impl Default for Instrument {
    fn default() -> Self {
        Instrument::Piano
    }
}

impl std::str::FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "piano" => Ok(Instrument::Piano),
            "guitar" => Ok(Instrument::Guitar),
            other => Err(format!("unknown instrument: {other}")),
        }
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instrument::Piano => write!(f, "piano"),
            Instrument::Guitar => write!(f, "guitar"),
        }
    }
}

/// Contract for sample playback backends.
pub trait SamplePlayer: Send + 'static {
    /// Start playing `track` now and return without waiting for it.
    ///
    /// Overlap with earlier voices is expected. Implementations should
    /// swallow missing-file conditions (log, return `Ok`) — only a broken
    /// output device is an error, and even that never halts the trigger
    /// loop.
    fn play(&mut self, track: &str) -> Result<()>;
}

/// Thread-safe reference-counted handle to any `SamplePlayer` implementor.
#[derive(Clone)]
pub struct PlayerHandle(pub Arc<Mutex<dyn SamplePlayer>>);

impl PlayerHandle {
    /// Wrap any `SamplePlayer` in a `PlayerHandle`.
    pub fn new<P: SamplePlayer>(player: P) -> Self {
        Self(Arc::new(Mutex::new(player)))
    }
}

impl std::fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerHandle").finish_non_exhaustive()
    }
}

/// Playback backend that discards every trigger. For hosts without an
/// audio device and for benchmarks.
#[derive(Debug, Default)]
pub struct NullPlayer;

impl SamplePlayer for NullPlayer {
    fn play(&mut self, track: &str) -> Result<()> {
        tracing::debug!(track, "NullPlayer::play — discarded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instrument_parses_case_insensitively() {
        assert_eq!("Piano".parse::<Instrument>().unwrap(), Instrument::Piano);
        assert_eq!(" guitar ".parse::<Instrument>().unwrap(), Instrument::Guitar);
        assert!("theremin".parse::<Instrument>().is_err());
    }

    #[test]
    fn instrument_serializes_lowercase() {
        let json = serde_json::to_string(&Instrument::Guitar).unwrap();
        assert_eq!(json, r#""guitar""#);
        let back: Instrument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Instrument::Guitar);
    }

    #[test]
    fn null_player_accepts_anything() {
        let mut player = NullPlayer;
        assert!(player.play("./tracks/piano-1.wav").is_ok());
        assert!(player.play("nonsense").is_ok());
    }
}
