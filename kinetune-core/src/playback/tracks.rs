//! Static (instrument, pose label) → track path table.
//!
//! Fixed at build time: six pose classes × two instruments. Labels outside
//! the table resolve to `None` and playback does nothing.

use crate::playback::Instrument;

/// All mapped tracks. Paths are relative to the process working directory,
/// matching the shipped `tracks/` layout.
pub const TRACK_TABLE: [((Instrument, &str), &str); 12] = [
    ((Instrument::Piano, "pose1"), "./tracks/piano-1.wav"),
    ((Instrument::Piano, "pose2"), "./tracks/piano-2.wav"),
    ((Instrument::Piano, "pose3"), "./tracks/piano-3.wav"),
    ((Instrument::Piano, "pose4"), "./tracks/piano-4.wav"),
    ((Instrument::Piano, "pose5"), "./tracks/piano-5.wav"),
    ((Instrument::Piano, "pose6"), "./tracks/piano-6.wav"),
    ((Instrument::Guitar, "pose1"), "./tracks/guitar-1.wav"),
    ((Instrument::Guitar, "pose2"), "./tracks/guitar-2.wav"),
    ((Instrument::Guitar, "pose3"), "./tracks/guitar-3.wav"),
    ((Instrument::Guitar, "pose4"), "./tracks/guitar-4.wav"),
    ((Instrument::Guitar, "pose5"), "./tracks/guitar-5.wav"),
    ((Instrument::Guitar, "pose6"), "./tracks/guitar-6.wav"),
];

/// Resolve the track for a triggered gesture, or `None` when unmapped.
pub fn resolve_track(instrument: Instrument, label: &str) -> Option<&'static str> {
    TRACK_TABLE
        .iter()
        .find(|((inst, l), _)| *inst == instrument && *l == label)
        .map(|(_, path)| *path)
}
