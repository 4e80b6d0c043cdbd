// Key inference and in-key triad tables.
//
// The melody's key steers the search toward in-key chords: fitness.rs
// rewards accompaniment chords whose shape matches one of the key's diatonic
// triads (in any inversion).
//
// Key inference is a greedy best-fit-scale heuristic rather than a formal
// key-finding algorithm. For each candidate root from `lowest - 12` up to
// `highest`, it sums how often the melody hits each degree of the major and
// minor scale built on that root (absolute pitches, octave included) and
// keeps the best. Ties keep the first maximum in iteration order (lowest
// root first, major before minor). The tie-break is an artifact of the
// search order, not music theory, but results depend on it, so it is kept
// exactly.

use crate::note::pitch_class_name;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scale degrees (semitones from the root) scanned by key inference,
/// octave included.
const MAJOR_KEY_OFFSETS: [i32; 8] = [0, 2, 4, 5, 7, 9, 11, 12];
const MINOR_KEY_OFFSETS: [i32; 8] = [0, 2, 3, 5, 7, 8, 10, 12];

/// Root-position diatonic triads of the major scale, as offsets from the tonic.
const MAJOR_SCALE_TRIADS: [[u8; 3]; 7] = [
    [0, 4, 7],    // I
    [2, 5, 9],    // ii
    [4, 7, 11],   // iii
    [5, 9, 12],   // IV
    [7, 11, 14],  // V
    [9, 12, 16],  // vi
    [11, 14, 17], // vii°
];

/// Natural-minor triads plus the harmonic-minor dominant.
const MINOR_SCALE_TRIADS: [[u8; 3]; 8] = [
    [0, 3, 7],    // i
    [2, 5, 8],    // ii°
    [3, 7, 10],   // III
    [5, 8, 12],   // iv
    [7, 10, 14],  // v
    [8, 12, 15],  // VI
    [10, 14, 17], // VII
    [7, 11, 14],  // V
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Major,
    Minor,
}

impl Scale {
    pub fn name(self) -> &'static str {
        match self {
            Scale::Major => "major",
            Scale::Minor => "minor",
        }
    }

    fn key_offsets(self) -> &'static [i32; 8] {
        match self {
            Scale::Major => &MAJOR_KEY_OFFSETS,
            Scale::Minor => &MINOR_KEY_OFFSETS,
        }
    }

    fn root_position_triads(self) -> &'static [[u8; 3]] {
        match self {
            Scale::Major => &MAJOR_SCALE_TRIADS,
            Scale::Minor => &MINOR_SCALE_TRIADS,
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A key: tonic pitch class (0 = C ... 11 = B) plus scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub tonic: u8,
    pub scale: Scale,
}

impl Key {
    pub fn new(tonic: u8, scale: Scale) -> Self {
        Key {
            tonic: tonic % 12,
            scale,
        }
    }

    /// Infer the most probable key of a sequence of pitches.
    ///
    /// Returns `None` when there are no pitches.
    pub fn detect(pitches: impl IntoIterator<Item = u8>) -> Option<Key> {
        let mut histogram = [0u32; 128];
        let mut lowest: Option<u8> = None;
        let mut highest: Option<u8> = None;
        for pitch in pitches {
            histogram[(pitch & 0x7f) as usize] += 1;
            lowest = Some(lowest.map_or(pitch, |l| l.min(pitch)));
            highest = Some(highest.map_or(pitch, |h| h.max(pitch)));
        }
        let (lowest, highest) = (lowest?, highest?);

        let count_at = |pitch: i32| -> u32 {
            if (0..128).contains(&pitch) {
                histogram[pitch as usize]
            } else {
                0
            }
        };

        let mut best = Key::new(lowest % 12, Scale::Major);
        let mut best_similarity = 0u32;
        for root in (lowest as i32 - 12)..=(highest as i32) {
            for scale in [Scale::Major, Scale::Minor] {
                let similarity: u32 = scale
                    .key_offsets()
                    .iter()
                    .map(|&offset| count_at(root + offset))
                    .sum();
                if similarity > best_similarity {
                    best = Key::new(root.rem_euclid(12) as u8, scale);
                    best_similarity = similarity;
                }
            }
        }
        Some(best)
    }

    /// Octave-aligned shapes of every in-key triad, all inversions included.
    ///
    /// Each triad is transposed to the tonic and then lowered by whole octaves
    /// until its lowest note lies in `[0, 12)`, matching the form produced by
    /// `triad::canonical_shape` for a sounding chord.
    pub fn triad_shapes(&self) -> Vec<[u8; 3]> {
        let mut shapes = Vec::new();
        for &[root, third, fifth] in self.scale.root_position_triads() {
            for voicing in [
                [root, third, fifth],
                [third, fifth, root + 12],
                [fifth, root + 12, third + 12],
            ] {
                let mut shape = voicing.map(|offset| offset + self.tonic);
                let octave_drop = (shape[0] / 12) * 12;
                shape = shape.map(|p| p - octave_drop);
                if !shapes.contains(&shape) {
                    shapes.push(shape);
                }
            }
        }
        shapes
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", pitch_class_name(self.tonic), self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repeated(pitches: &[u8], times: usize) -> Vec<u8> {
        pitches.iter().copied().cycle().take(pitches.len() * times).collect()
    }

    #[test]
    fn test_c_major_scale() {
        let melody = repeated(&[60, 62, 64, 65, 67, 69, 71, 72], 4);
        assert_eq!(Key::detect(melody), Some(Key::new(0, Scale::Major)));
    }

    #[test]
    fn test_a_natural_minor_scale() {
        // Only root 57 minor covers all eight pitches.
        let melody = repeated(&[57, 59, 60, 62, 64, 65, 67, 69], 3);
        let key = Key::detect(melody).unwrap();
        assert_eq!(key, Key::new(9, Scale::Minor));
    }

    #[test]
    fn test_tie_keeps_lowest_root_major_first() {
        // A single pitch: root 48 (C, octave offset 12) is the first candidate
        // that reaches similarity 1, checked as major before minor.
        assert_eq!(Key::detect([60]), Some(Key::new(0, Scale::Major)));
    }

    #[test]
    fn test_low_pitches_with_negative_roots() {
        // Candidates start at root -10. Root -8 minor is the first to cover
        // both pitches (offsets 10 and 12 land on 2 and 4); root 0 major ties
        // later and loses under the strict comparison.
        assert_eq!(Key::detect([2, 4]), Some(Key::new(4, Scale::Minor)));
    }

    #[test]
    fn test_empty_melody_has_no_key() {
        assert_eq!(Key::detect(std::iter::empty::<u8>()), None);
    }

    #[test]
    fn test_triad_shapes_c_major() {
        let shapes = Key::new(0, Scale::Major).triad_shapes();
        assert!(shapes.contains(&[0, 4, 7])); // I
        assert!(shapes.contains(&[4, 7, 12])); // I6
        assert!(shapes.contains(&[7, 11, 14])); // V
        assert!(shapes.contains(&[5, 9, 12])); // IV
        assert!(!shapes.contains(&[0, 3, 7])); // c minor is out of key
    }

    #[test]
    fn test_triad_shapes_wrap_into_octave() {
        // A major: the I chord starting on A (pc 9) stays at 9.
        let shapes = Key::new(9, Scale::Major).triad_shapes();
        assert!(shapes.contains(&[9, 13, 16]));
        // V of A major is E major: 16 wraps down to 4.
        assert!(shapes.contains(&[4, 8, 11]));
        assert!(shapes.iter().all(|s| s[0] < 12));
    }

    #[test]
    fn test_display() {
        assert_eq!(Key::new(2, Scale::Minor).to_string(), "D minor");
    }
}
