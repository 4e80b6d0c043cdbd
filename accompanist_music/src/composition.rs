// Compositions: placed notes on a tick timeline plus tempo metadata.
//
// A `Composition` is both the fixed input melody and every candidate
// accompaniment the search evolves. It is the data-model surface the rest of
// the crate reads through:
// - `notes_at` / `chords`: grouping by start tick. A group of notes sharing a
//   start tick is a "chord slot"; `chords` sorts each slot by pitch, which is
//   the form fitness and crossover consume.
// - `notes_by_buckets`: fixed 4-beat windows, used to decide which melody
//   notes a chord has to cover.
// - `key`: best-fit key inference (see key.rs).
// - `triad_names_by_beats`: chord recognition at every beat boundary.
//   `progression_triads_by_beats` reads each chord above its own bass.
// - `merge` / `+`: melody + accompaniment into one playable composition.
//
// Notes are owned outright; cloning deep-copies them. Operators never edit a
// candidate in place. They build a fresh note list and call `with_notes`,
// which carries over the timing metadata unchanged.

use crate::error::CompositionError;
use crate::key::Key;
use crate::note::{PlacedNote, pitch_class_name};
use crate::triad::BeatTriad;
use std::collections::BTreeMap;
use std::ops::Add;

/// Beats per bucket in `notes_by_buckets`.
pub const BEATS_PER_BUCKET: u32 = 4;

/// A set of placed notes sharing one resolution and tempo.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    notes: Vec<PlacedNote>,
    /// MIDI resolution: ticks per quarter-note beat.
    ticks_per_beat: u16,
    /// Tempo in microseconds per beat, as stored in MIDI tempo events.
    tempo: u32,
    /// Lower bound on `duration`, e.g. to keep trailing silence.
    min_duration: Option<u32>,
}

impl Composition {
    /// Build a composition from an explicit note list.
    pub fn new(
        notes: Vec<PlacedNote>,
        ticks_per_beat: u16,
        tempo: u32,
    ) -> Result<Self, CompositionError> {
        if ticks_per_beat == 0 {
            return Err(CompositionError::ZeroTicksPerBeat);
        }
        if tempo == 0 {
            return Err(CompositionError::ZeroTempo);
        }
        Ok(Composition {
            notes,
            ticks_per_beat,
            tempo,
            min_duration: None,
        })
    }

    /// A composition with the same timing metadata and a different note list.
    pub fn with_notes(&self, notes: Vec<PlacedNote>) -> Self {
        Composition {
            notes,
            ticks_per_beat: self.ticks_per_beat,
            tempo: self.tempo,
            min_duration: self.min_duration,
        }
    }

    pub fn with_min_duration(mut self, min_duration: Option<u32>) -> Self {
        self.min_duration = min_duration;
        self
    }

    pub fn notes(&self) -> &[PlacedNote] {
        &self.notes
    }

    pub fn into_notes(self) -> Vec<PlacedNote> {
        self.notes
    }

    pub fn ticks_per_beat(&self) -> u16 {
        self.ticks_per_beat
    }

    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn min_duration(&self) -> Option<u32> {
        self.min_duration
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Ticks per beat as a `u32`, the unit of every beat-grid computation.
    pub fn beat_ticks(&self) -> u32 {
        self.ticks_per_beat as u32
    }

    /// Group notes by start tick. Within a slot, notes keep insertion order.
    pub fn notes_at(&self) -> BTreeMap<u32, Vec<PlacedNote>> {
        let mut notes_at: BTreeMap<u32, Vec<PlacedNote>> = BTreeMap::new();
        for note in &self.notes {
            notes_at.entry(note.start_time).or_default().push(*note);
        }
        notes_at
    }

    /// Chord slots: `notes_at` with every slot sorted ascending by pitch.
    pub fn chords(&self) -> BTreeMap<u32, Vec<PlacedNote>> {
        let mut chords = self.notes_at();
        for chord in chords.values_mut() {
            chord.sort_by_key(|n| n.pitch());
        }
        chords
    }

    /// Length of one bucket in ticks.
    pub fn bucket_ticks(&self) -> u32 {
        BEATS_PER_BUCKET * self.beat_ticks()
    }

    /// Partition notes into 4-beat windows keyed by bucket index
    /// (`start_time / bucket_ticks`). Empty buckets are absent.
    pub fn notes_by_buckets(&self) -> BTreeMap<u32, Vec<PlacedNote>> {
        let bucket_ticks = self.bucket_ticks();
        let mut buckets: BTreeMap<u32, Vec<PlacedNote>> = BTreeMap::new();
        for note in &self.notes {
            buckets
                .entry(note.start_time / bucket_ticks)
                .or_default()
                .push(*note);
        }
        buckets
    }

    /// Most probable key of the notes, or `None` without notes.
    pub fn key(&self) -> Option<Key> {
        Key::detect(self.notes.iter().map(|n| n.pitch()))
    }

    /// Latest note end, raised to `min_duration` if that is larger.
    ///
    /// `None` only for a composition with no notes and no `min_duration`.
    pub fn duration(&self) -> Option<u32> {
        let last_end = self.notes.iter().map(|n| n.end_time()).max();
        match (last_end, self.min_duration) {
            (Some(end), Some(min)) => Some(end.max(min)),
            (end, min) => end.or(min),
        }
    }

    /// Number of whole beats in the piece, rounding half to even.
    pub fn beat_count(&self) -> usize {
        let duration = self.duration().unwrap_or(0) as f64;
        (duration / self.beat_ticks() as f64).round_ties_even() as usize
    }

    /// Recognized chord at every beat boundary from 0 up to the duration
    /// (inclusive). Empty when the duration is undefined.
    pub fn triad_names_by_beats(&self) -> Vec<BeatTriad> {
        self.recognize_beats(BeatTriad::from_sorted_pitches)
    }

    /// Like `triad_names_by_beats`, but each chord is read relative to its
    /// own bass so that every root is recognized. Progressions use this.
    pub fn progression_triads_by_beats(&self) -> Vec<BeatTriad> {
        self.recognize_beats(BeatTriad::from_bass_relative)
    }

    fn recognize_beats(&self, recognize: fn(&[u8]) -> BeatTriad) -> Vec<BeatTriad> {
        let Some(duration) = self.duration() else {
            return Vec::new();
        };
        let chords = self.chords();
        (0..=duration)
            .step_by(self.beat_ticks() as usize)
            .map(|time| match chords.get(&time) {
                Some(chord) => {
                    let pitches: Vec<u8> = chord.iter().map(|n| n.pitch()).collect();
                    recognize(&pitches)
                }
                None => BeatTriad::UNKNOWN,
            })
            .collect()
    }

    /// Concatenate two compositions' notes.
    ///
    /// Both must share `ticks_per_beat` and `tempo`. The result keeps the
    /// larger `min_duration` (an unset value counts as smaller).
    pub fn merge(&self, other: &Composition) -> Result<Composition, CompositionError> {
        if self.ticks_per_beat != other.ticks_per_beat || self.tempo != other.tempo {
            return Err(CompositionError::MismatchedTiming {
                left_ticks_per_beat: self.ticks_per_beat,
                right_ticks_per_beat: other.ticks_per_beat,
                left_tempo: self.tempo,
                right_tempo: other.tempo,
            });
        }
        let mut notes = Vec::with_capacity(self.notes.len() + other.notes.len());
        notes.extend_from_slice(&self.notes);
        notes.extend_from_slice(&other.notes);
        Ok(Composition {
            notes,
            ticks_per_beat: self.ticks_per_beat,
            tempo: self.tempo,
            min_duration: self.min_duration.max(other.min_duration),
        })
    }

    /// One line per beat: the beat index, the chord's pitches, and its label.
    pub fn summary(&self) -> String {
        let chords = self.chords();
        let mut out = String::new();
        for (beat, triad) in self.triad_names_by_beats().iter().enumerate() {
            let time = beat as u32 * self.beat_ticks();
            let pitches: Vec<String> = chords
                .get(&time)
                .map(|chord| {
                    chord
                        .iter()
                        .map(|n| format!("{}{}", pitch_class_name(n.pitch_class()), n.pitch() / 12))
                        .collect()
                })
                .unwrap_or_default();
            out.push_str(&format!(
                "{:>4}: {:<16} {}\n",
                beat,
                pitches.join(" "),
                triad.label
            ));
        }
        out
    }
}

/// Melody + accompaniment. Mismatched timing is a contract violation and panics;
/// use [`Composition::merge`] to handle it as an error.
impl Add<&Composition> for &Composition {
    type Output = Composition;

    fn add(self, rhs: &Composition) -> Composition {
        match self.merge(rhs) {
            Ok(merged) => merged,
            Err(err) => panic!("{err}"),
        }
    }
}
