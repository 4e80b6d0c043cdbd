// Note model: pitched notes and notes placed on the tick timeline.
//
// A `Note` is a MIDI pitch with a duration in ticks. A `PlacedNote` pairs a
// `Note` with its start tick. Ticks and pitches are unsigned, so the
// "never negative" invariant holds by construction; pitches above 127 are
// rejected by the checked constructors.
//
// PlacedNotes are plain `Copy` values. A composition owns its note vector
// outright, so every clone is a deep copy and no two candidates ever share
// a note.

use serde::{Deserialize, Serialize};

/// Highest MIDI note number.
pub const MIDI_MAX_PITCH: u8 = 127;

/// A MIDI pitch with a duration in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    pub pitch: u8,
    pub duration: u32,
}

impl Note {
    /// Create a note, or `None` if the pitch is outside the MIDI range.
    pub fn new(pitch: u8, duration: u32) -> Option<Self> {
        (pitch <= MIDI_MAX_PITCH).then_some(Note { pitch, duration })
    }

    /// Pitch class (0 = C, 1 = C#, ... 11 = B).
    pub fn pitch_class(self) -> u8 {
        self.pitch % 12
    }
}

/// A note placed at an absolute tick from the start of its composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacedNote {
    pub note: Note,
    pub start_time: u32,
}

impl PlacedNote {
    /// Create a placed note, or `None` if the pitch is outside the MIDI range
    /// or the note would end past the last representable tick.
    pub fn new(pitch: u8, start_time: u32, duration: u32) -> Option<Self> {
        start_time.checked_add(duration)?;
        Note::new(pitch, duration).map(|note| PlacedNote { note, start_time })
    }

    pub fn pitch(&self) -> u8 {
        self.note.pitch
    }

    pub fn duration(&self) -> u32 {
        self.note.duration
    }

    pub fn pitch_class(&self) -> u8 {
        self.note.pitch_class()
    }

    /// Tick at which the note is released.
    pub fn end_time(&self) -> u32 {
        self.start_time.saturating_add(self.note.duration)
    }

    /// The same note moved to a different pitch.
    pub fn with_pitch(&self, pitch: u8) -> Self {
        PlacedNote {
            note: Note {
                pitch,
                duration: self.note.duration,
            },
            start_time: self.start_time,
        }
    }
}

/// Convert a pitch class to its note name, preferring flats for black keys.
pub fn pitch_class_name(pc: u8) -> &'static str {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
    ];
    NAMES[(pc % 12) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_time() {
        let n = PlacedNote::new(60, 384, 192).unwrap();
        assert_eq!(n.end_time(), 576);
        assert_eq!(n.pitch(), 60);
        assert_eq!(n.duration(), 192);
    }

    #[test]
    fn test_pitch_out_of_range_rejected() {
        assert!(Note::new(127, 10).is_some());
        assert!(Note::new(128, 10).is_none());
        assert!(PlacedNote::new(200, 0, 10).is_none());
    }

    #[test]
    fn test_end_past_tick_range_rejected() {
        assert!(PlacedNote::new(60, u32::MAX - 10, 10).is_some());
        assert!(PlacedNote::new(60, u32::MAX - 10, 11).is_none());
        let literal = PlacedNote {
            note: Note {
                pitch: 60,
                duration: 20,
            },
            start_time: u32::MAX - 10,
        };
        assert_eq!(literal.end_time(), u32::MAX);
    }

    #[test]
    fn test_with_pitch_keeps_placement() {
        let n = PlacedNote::new(60, 384, 192).unwrap();
        let moved = n.with_pitch(67);
        assert_eq!(moved.pitch(), 67);
        assert_eq!(moved.start_time, 384);
        assert_eq!(moved.duration(), 192);
        assert_eq!(n.pitch(), 60);
    }

    #[test]
    fn test_pitch_class() {
        assert_eq!(PlacedNote::new(61, 0, 1).unwrap().pitch_class(), 1);
        assert_eq!(pitch_class_name(61 % 12), "C#");
        assert_eq!(pitch_class_name(10), "Bb");
    }
}
