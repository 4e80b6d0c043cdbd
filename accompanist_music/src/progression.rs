// Harmonic progression catalogue and window matching.
//
// The beat-by-beat chord labels of an accompaniment (from
// `Composition::progression_triads_by_beats`) are cut into non-overlapping windows
// of four beats. Each window is compared step by step against every
// progression in the catalogue; the best progression's matched-step count
// (0-4) is the window's result. fitness.rs turns those counts into the
// partial- and completed-progression metrics.
//
// A step is (bass interval from the previous beat, triad shape). The bass is
// the chord's lowest raw pitch (0 for unknown chords) and intervals compare
// modulo 12, so a progression matches in any octave. The first step of a
// progression has no interval constraint.

use crate::triad::TriadShape::{MajorTriad as Maj, MinorTriad as Min};
use crate::triad::{BeatTriad, ChordLabel, TriadShape};

/// Beats per progression window.
pub const PROGRESSION_LENGTH: usize = 4;

/// One step of a progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressionStep {
    /// Semitones (mod 12) the bass moves from the previous beat.
    /// `None` accepts any motion.
    pub bass_interval: Option<u8>,
    pub shape: TriadShape,
}

const fn first(shape: TriadShape) -> ProgressionStep {
    ProgressionStep {
        bass_interval: None,
        shape,
    }
}

const fn step(bass_interval: u8, shape: TriadShape) -> ProgressionStep {
    ProgressionStep {
        bass_interval: Some(bass_interval),
        shape,
    }
}

/// A named four-chord progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progression {
    pub name: &'static str,
    pub steps: [ProgressionStep; PROGRESSION_LENGTH],
}

/// The fixed catalogue, all chords in root position.
pub const PROGRESSIONS: &[Progression] = &[
    Progression {
        name: "I-IV-V-I",
        steps: [first(Maj), step(5, Maj), step(2, Maj), step(5, Maj)],
    },
    Progression {
        name: "I-V-vi-IV",
        steps: [first(Maj), step(7, Maj), step(2, Min), step(8, Maj)],
    },
    Progression {
        name: "I-vi-IV-V",
        steps: [first(Maj), step(9, Min), step(8, Maj), step(2, Maj)],
    },
    Progression {
        name: "I-IV-I-V",
        steps: [first(Maj), step(5, Maj), step(7, Maj), step(7, Maj)],
    },
    Progression {
        name: "ii-V-I-I",
        steps: [first(Min), step(5, Maj), step(5, Maj), step(0, Maj)],
    },
    Progression {
        name: "i-iv-v-i",
        steps: [first(Min), step(5, Min), step(2, Min), step(5, Min)],
    },
    Progression {
        name: "i-VI-III-VII",
        steps: [first(Min), step(8, Maj), step(7, Maj), step(7, Maj)],
    },
    Progression {
        name: "i-iv-V-i",
        steps: [first(Min), step(5, Min), step(2, Maj), step(5, Min)],
    },
];

/// Bass motion in semitones mod 12 from `previous` to `current`.
fn bass_interval(previous: &BeatTriad, current: &BeatTriad) -> u8 {
    (current.base as i16 - previous.base as i16).rem_euclid(12) as u8
}

impl Progression {
    /// Count the steps of `window` that match this progression.
    ///
    /// `previous` is the beat before the window, if any; only the first step's
    /// interval would read it, and the first step is unconstrained.
    pub fn matched_steps(&self, previous: Option<&BeatTriad>, window: &[BeatTriad]) -> usize {
        let mut matched = 0;
        for (i, (expected, actual)) in self.steps.iter().zip(window).enumerate() {
            if actual.label != ChordLabel::Known(expected.shape) {
                continue;
            }
            let before = if i == 0 { previous } else { window.get(i - 1) };
            let interval_ok = match (expected.bass_interval, before) {
                (None, _) => true,
                (Some(want), Some(before)) => bass_interval(before, actual) == want,
                (Some(_), None) => false,
            };
            if interval_ok {
                matched += 1;
            }
        }
        matched
    }
}

/// Best matched-step count for every full 4-beat window of `beats`.
///
/// A trailing partial window is ignored.
pub fn window_matches(beats: &[BeatTriad]) -> Vec<usize> {
    beats
        .chunks_exact(PROGRESSION_LENGTH)
        .enumerate()
        .map(|(w, window)| {
            let previous = (w * PROGRESSION_LENGTH).checked_sub(1).map(|i| &beats[i]);
            PROGRESSIONS
                .iter()
                .map(|p| p.matched_steps(previous, window))
                .max()
                .unwrap_or(0)
        })
        .collect()
}
