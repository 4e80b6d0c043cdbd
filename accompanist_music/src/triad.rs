// Triad shapes: the fixed chord catalogue and chord-shape recognition.
//
// A chord's "shape" is its sorted pitches expressed as offsets from the
// octave base of its lowest note (`(lowest / 12) * 12`). Shapes are compared
// exactly against the catalogue below. Because the base is octave-aligned
// rather than the lowest note itself, C-rooted chords land on the catalogue
// offsets directly while other roots keep their pitch-class offset; key.rs
// builds its in-key triad tables in the same octave-aligned form so the two
// compare like with like.
//
// The catalogue doubles as the vocabulary of the search: random candidates
// and the replace mutation draw from `TriadShape::ALL` (empty chord
// included).

use std::fmt;

/// One entry of the fixed triad catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TriadShape {
    MajorTriad,
    MinorTriad,
    MajorTriadFirstInversion,
    MajorTriadSecondInversion,
    MinorTriadFirstInversion,
    MinorTriadSecondInversion,
    Diminished,
    Sus2,
    Sus4,
    /// No notes at all. A valid draw for generators; never recognized in a
    /// sounding chord slot since a slot always holds at least one note.
    Empty,
}

impl TriadShape {
    pub const ALL: [TriadShape; 10] = [
        TriadShape::MajorTriad,
        TriadShape::MinorTriad,
        TriadShape::MajorTriadFirstInversion,
        TriadShape::MajorTriadSecondInversion,
        TriadShape::MinorTriadFirstInversion,
        TriadShape::MinorTriadSecondInversion,
        TriadShape::Diminished,
        TriadShape::Sus2,
        TriadShape::Sus4,
        TriadShape::Empty,
    ];

    /// Sorted semitone offsets from the chord's base.
    pub fn offsets(self) -> &'static [u8] {
        match self {
            TriadShape::MajorTriad => &[0, 4, 7],
            TriadShape::MinorTriad => &[0, 3, 7],
            TriadShape::MajorTriadFirstInversion => &[0, 3, 8],
            TriadShape::MajorTriadSecondInversion => &[0, 5, 9],
            TriadShape::MinorTriadFirstInversion => &[0, 4, 9],
            TriadShape::MinorTriadSecondInversion => &[0, 5, 8],
            TriadShape::Diminished => &[0, 3, 6],
            TriadShape::Sus2 => &[0, 2, 7],
            TriadShape::Sus4 => &[0, 5, 7],
            TriadShape::Empty => &[],
        }
    }

    /// Largest offset, i.e. the span from base to top note (0 for the empty chord).
    pub fn span(self) -> u8 {
        self.offsets().last().copied().unwrap_or(0)
    }

    pub fn name(self) -> &'static str {
        match self {
            TriadShape::MajorTriad => "major_triad",
            TriadShape::MinorTriad => "minor_triad",
            TriadShape::MajorTriadFirstInversion => "major_triad_1st_inversion",
            TriadShape::MajorTriadSecondInversion => "major_triad_2nd_inversion",
            TriadShape::MinorTriadFirstInversion => "minor_triad_1st_inversion",
            TriadShape::MinorTriadSecondInversion => "minor_triad_2nd_inversion",
            TriadShape::Diminished => "diminished_chord",
            TriadShape::Sus2 => "sus2_chord",
            TriadShape::Sus4 => "sus4_chord",
            TriadShape::Empty => "empty_chord",
        }
    }

    /// Find the catalogue entry whose offsets equal `shape` exactly.
    pub fn from_offsets(shape: &[u8]) -> Option<TriadShape> {
        TriadShape::ALL
            .into_iter()
            .find(|triad| triad.offsets() == shape)
    }
}

impl fmt::Display for TriadShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Octave-aligned shape of a chord given its pitches sorted ascending.
///
/// Returns an empty shape for an empty chord.
pub fn canonical_shape(sorted_pitches: &[u8]) -> Vec<u8> {
    let Some(&lowest) = sorted_pitches.first() else {
        return Vec::new();
    };
    let base = (lowest / 12) * 12;
    sorted_pitches.iter().map(|&p| p - base).collect()
}

/// Shape of a chord relative to its own lowest pitch, so inversions and
/// transpositions of one chord share a shape.
pub fn root_relative_shape(sorted_pitches: &[u8]) -> Vec<u8> {
    let Some(&lowest) = sorted_pitches.first() else {
        return Vec::new();
    };
    sorted_pitches.iter().map(|&p| p - lowest).collect()
}

/// Recognition result for one chord slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChordLabel {
    Known(TriadShape),
    /// No chord at the slot, or a chord outside the catalogue.
    Unknown,
}

impl ChordLabel {
    /// Label a chord from its pitches sorted ascending.
    pub fn classify(sorted_pitches: &[u8]) -> ChordLabel {
        if sorted_pitches.is_empty() {
            return ChordLabel::Unknown;
        }
        match TriadShape::from_offsets(&canonical_shape(sorted_pitches)) {
            Some(shape) => ChordLabel::Known(shape),
            None => ChordLabel::Unknown,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChordLabel::Known(shape) => shape.name(),
            ChordLabel::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ChordLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The recognized chord at one beat: its lowest raw pitch plus its label.
///
/// Unknown and absent chords carry base 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BeatTriad {
    pub base: u8,
    pub label: ChordLabel,
}

impl BeatTriad {
    pub const UNKNOWN: BeatTriad = BeatTriad {
        base: 0,
        label: ChordLabel::Unknown,
    };

    /// Recognize a chord from its pitches sorted ascending.
    pub fn from_sorted_pitches(sorted_pitches: &[u8]) -> BeatTriad {
        match ChordLabel::classify(sorted_pitches) {
            ChordLabel::Known(shape) => BeatTriad {
                base: sorted_pitches[0],
                label: ChordLabel::Known(shape),
            },
            ChordLabel::Unknown => BeatTriad::UNKNOWN,
        }
    }

    /// Recognize a chord by its shape above its own bass, in any octave.
    /// Progression matching reads chords this way.
    pub fn from_bass_relative(sorted_pitches: &[u8]) -> BeatTriad {
        match TriadShape::from_offsets(&root_relative_shape(sorted_pitches)) {
            Some(shape) if !sorted_pitches.is_empty() => BeatTriad {
                base: sorted_pitches[0],
                label: ChordLabel::Known(shape),
            },
            _ => BeatTriad::UNKNOWN,
        }
    }
}
