// Fitness evaluation: how well a candidate accompaniment fits the melody.
//
// Evaluation happens in two stages:
// 1. Metrics: a count or fraction for each named behaviour (uncovered melody
//    onsets, dissonant pairs, in-key triads, matched progressions, ...),
//    computed over the chord slots of melody and accompaniment.
// 2. Reduction: `score = -sum(weight * value)` over the weight table.
//
// Weights carry their musical sign: harmful behaviours have negative weights
// and desirable ones positive. The reduction negates the sum because the
// evolution engine minimizes: lower score = better accompaniment. An enabled
// metric with no weight contributes nothing; the evaluator logs it once at
// construction and lists it on every `Evaluation`.
//
// Everything derived from the melody alone (sorted chord slots, 4-beat
// buckets, key, in-key triad shapes) is computed once in
// `FitnessEvaluator::new`, since the melody is fixed for a whole run.
//
// Consumed by evolution.rs to rank candidates.

use crate::composition::Composition;
use crate::key::Key;
use crate::note::PlacedNote;
use crate::progression::{PROGRESSION_LENGTH, window_matches};
use crate::triad::canonical_shape;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Every behaviour the evaluator can measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Number of accompaniment chord slots.
    AccompanimentChordExists,
    /// 1 when the melody has no chord slots at all.
    EmptyAccompaniment,
    /// Melody onsets with no accompaniment chord at the same tick.
    MissingAccompanimentForMelodyTick,
    /// Accompaniment onsets with no melody note at the same tick.
    ExcessAccompanimentTick,
    /// Consecutive chords whose top or bottom note leaps too far.
    TooBigChordDrop,
    /// Chords whose top note reaches the melody's lowest concurrent note.
    AccompanimentNotBelowMelody,
    /// Major-seventh, major-second and tritone pitch-class pairs inside a chord.
    DissonanceInside,
    /// Chords whose bass strays from the piece's median bass.
    TooWideAccompanimentRange,
    /// Chords shaped like a diatonic triad of the melody's key.
    CorrectTriadForMelodyKey,
    /// Per chord, the fraction of melody notes in its 4-beat bucket whose
    /// pitch class the chord contains.
    ChordIncludesMelodyNote,
    /// Per 4-beat window, matched progression steps / 4.
    PartialProgression,
    /// Windows matching a whole progression.
    CompletedProgression,
    /// Chords whose bass sits at or below the floor pitch.
    TooLowChord,
    /// Reserved name for melody/accompaniment clashes. Never computed.
    DissonanceWithMelody,
}

impl Metric {
    /// Every metric the evaluator actually computes.
    pub const COMPUTED: [Metric; 13] = [
        Metric::AccompanimentChordExists,
        Metric::EmptyAccompaniment,
        Metric::MissingAccompanimentForMelodyTick,
        Metric::ExcessAccompanimentTick,
        Metric::TooBigChordDrop,
        Metric::AccompanimentNotBelowMelody,
        Metric::DissonanceInside,
        Metric::TooWideAccompanimentRange,
        Metric::CorrectTriadForMelodyKey,
        Metric::ChordIncludesMelodyNote,
        Metric::PartialProgression,
        Metric::CompletedProgression,
        Metric::TooLowChord,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::AccompanimentChordExists => "accompaniment_chord_exists",
            Metric::EmptyAccompaniment => "empty_accompaniment",
            Metric::MissingAccompanimentForMelodyTick => "missing_accompaniment_for_melody_tick",
            Metric::ExcessAccompanimentTick => "excess_accompaniment_tick",
            Metric::TooBigChordDrop => "too_big_chord_drop",
            Metric::AccompanimentNotBelowMelody => "accompaniment_not_below_melody",
            Metric::DissonanceInside => "dissonance_inside",
            Metric::TooWideAccompanimentRange => "too_wide_accompaniment_range",
            Metric::CorrectTriadForMelodyKey => "correct_triad_for_melody_key",
            Metric::ChordIncludesMelodyNote => "chord_includes_melody_note",
            Metric::PartialProgression => "partial_progression",
            Metric::CompletedProgression => "completed_progression",
            Metric::TooLowChord => "too_low_chord",
            Metric::DissonanceWithMelody => "dissonance_with_melody",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pitch-class distances counted as dissonant inside a chord: major seventh,
/// major second, tritone. Distances are `|pc1 - pc2|`, not folded.
const DISSONANT_PITCH_CLASS_DISTANCES: [u8; 3] = [11, 2, 6];

/// Which metrics run, how much each counts, and the numeric thresholds.
///
/// Immutable for the length of a run; defaults come from `Default`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessConfig {
    pub enabled: BTreeSet<Metric>,
    pub weights: BTreeMap<Metric, f64>,
    /// Semitone leap of a chord's top or bottom note that counts as a drop.
    pub too_big_chord_drop_in_notes: u8,
    /// Allowed spread of chord basses around the median is half of this.
    pub too_wide_range_in_notes: u8,
    /// Basses at or below this pitch count as too low.
    pub too_low_chord_pitch: u8,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        let weights = BTreeMap::from([
            // Rewards
            (Metric::AccompanimentChordExists, 5.0),
            (Metric::CorrectTriadForMelodyKey, 20.0),
            (Metric::ChordIncludesMelodyNote, 10.0),
            (Metric::PartialProgression, 10.0),
            (Metric::CompletedProgression, 30.0),
            // Penalties
            (Metric::EmptyAccompaniment, -1000.0),
            (Metric::MissingAccompanimentForMelodyTick, -10.0),
            (Metric::ExcessAccompanimentTick, -10.0),
            (Metric::TooBigChordDrop, -20.0),
            (Metric::AccompanimentNotBelowMelody, -5.0),
            (Metric::DissonanceInside, -15.0),
            (Metric::TooWideAccompanimentRange, -5.0),
            (Metric::TooLowChord, -10.0),
            (Metric::DissonanceWithMelody, -3.0),
        ]);
        FitnessConfig {
            enabled: Metric::COMPUTED.into_iter().collect(),
            weights,
            too_big_chord_drop_in_notes: 8,
            too_wide_range_in_notes: 12,
            too_low_chord_pitch: 40,
        }
    }
}

impl FitnessConfig {
    pub fn is_enabled(&self, metric: Metric) -> bool {
        self.enabled.contains(&metric)
    }

    /// Enabled metrics that will be computed but have no weight.
    pub fn unweighted_metrics(&self) -> Vec<Metric> {
        self.enabled
            .iter()
            .copied()
            .filter(|m| Metric::COMPUTED.contains(m) && !self.weights.contains_key(m))
            .collect()
    }
}

/// Computed metric values, keyed by metric. Only enabled metrics appear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metrics(BTreeMap<Metric, f64>);

impl Metrics {
    pub fn get(&self, metric: Metric) -> f64 {
        self.0.get(&metric).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.0.iter().map(|(&m, &v)| (m, v))
    }

    fn set(&mut self, metric: Metric, value: f64) {
        self.0.insert(metric, value);
    }

    /// Reduce to a score, lower is better: `-sum(weight * value)`.
    ///
    /// Metrics missing from `weights` contribute 0 and are returned.
    pub fn reduce(&self, weights: &BTreeMap<Metric, f64>) -> (f64, Vec<Metric>) {
        let mut award = 0.0;
        let mut unweighted = Vec::new();
        for (metric, value) in self.iter() {
            match weights.get(&metric) {
                Some(weight) => award += weight * value,
                None => unweighted.push(metric),
            }
        }
        (-award, unweighted)
    }
}

/// Full result of evaluating one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub metrics: Metrics,
    pub score: f64,
    /// Metrics that were computed but had no weight (contributed 0).
    pub unweighted: Vec<Metric>,
}

/// Chord slots sorted by pitch, reduced to pitches.
type ChordPitches = BTreeMap<u32, Vec<u8>>;

fn chord_pitches(composition: &Composition) -> ChordPitches {
    composition
        .chords()
        .into_iter()
        .map(|(time, chord)| (time, chord.iter().map(PlacedNote::pitch).collect()))
        .collect()
}

/// Scores accompaniments against one fixed melody.
#[derive(Debug, Clone)]
pub struct FitnessEvaluator {
    config: FitnessConfig,
    melody: Composition,
    melody_chords: ChordPitches,
    /// Melody pitch classes per 4-beat bucket (one entry per note).
    melody_buckets: BTreeMap<u32, Vec<u8>>,
    bucket_ticks: u32,
    key: Option<Key>,
    key_triads: Vec<[u8; 3]>,
}

impl FitnessEvaluator {
    pub fn new(config: FitnessConfig, melody: &Composition) -> Self {
        for metric in config.unweighted_metrics() {
            log::warn!("metric {metric} is enabled but has no weight; it will not affect fitness");
        }
        let key = melody.key();
        let key_triads = key.map(|k| k.triad_shapes()).unwrap_or_default();
        let melody_buckets = melody
            .notes_by_buckets()
            .into_iter()
            .map(|(bucket, notes)| (bucket, notes.iter().map(|n| n.pitch_class()).collect()))
            .collect();
        FitnessEvaluator {
            config,
            melody: melody.clone(),
            melody_chords: chord_pitches(melody),
            melody_buckets,
            bucket_ticks: melody.bucket_ticks(),
            key,
            key_triads,
        }
    }

    pub fn config(&self) -> &FitnessConfig {
        &self.config
    }

    /// The melody this evaluator scores against.
    pub fn melody(&self) -> &Composition {
        &self.melody
    }

    /// Key inferred from the melody, `None` for an empty melody.
    pub fn key(&self) -> Option<Key> {
        self.key
    }

    /// Scalar fitness of `accompaniment`; lower is better.
    pub fn score(&self, accompaniment: &Composition) -> f64 {
        self.metrics(accompaniment).reduce(&self.config.weights).0
    }

    /// Metrics, score and diagnostics for `accompaniment`.
    pub fn evaluate(&self, accompaniment: &Composition) -> Evaluation {
        let metrics = self.metrics(accompaniment);
        let (score, unweighted) = metrics.reduce(&self.config.weights);
        Evaluation {
            metrics,
            score,
            unweighted,
        }
    }

    /// Compute every enabled metric for `accompaniment`.
    pub fn metrics(&self, accompaniment: &Composition) -> Metrics {
        let config = &self.config;
        let m_chords = &self.melody_chords;
        let a_chords = chord_pitches(accompaniment);
        let mut metrics = Metrics::default();

        if config.is_enabled(Metric::AccompanimentChordExists) {
            metrics.set(Metric::AccompanimentChordExists, a_chords.len() as f64);
        }
        if config.is_enabled(Metric::EmptyAccompaniment) {
            let empty = if m_chords.is_empty() { 1.0 } else { 0.0 };
            metrics.set(Metric::EmptyAccompaniment, empty);
        }
        if config.is_enabled(Metric::MissingAccompanimentForMelodyTick) {
            let missing = m_chords.keys().filter(|t| !a_chords.contains_key(t)).count();
            metrics.set(Metric::MissingAccompanimentForMelodyTick, missing as f64);
        }
        if config.is_enabled(Metric::ExcessAccompanimentTick) {
            let excess = a_chords.keys().filter(|t| !m_chords.contains_key(t)).count();
            metrics.set(Metric::ExcessAccompanimentTick, excess as f64);
        }
        if config.is_enabled(Metric::TooBigChordDrop) {
            metrics.set(Metric::TooBigChordDrop, self.chord_drops(&a_chords) as f64);
        }
        if config.is_enabled(Metric::AccompanimentNotBelowMelody) {
            let overlapping = a_chords
                .iter()
                .filter(|(time, chord)| match (m_chords.get(time), chord.last()) {
                    (Some(melody), Some(&top)) => melody[0] <= top,
                    _ => false,
                })
                .count();
            metrics.set(Metric::AccompanimentNotBelowMelody, overlapping as f64);
        }
        if config.is_enabled(Metric::DissonanceInside) {
            let dissonances: usize = a_chords.values().map(|c| dissonant_pairs(c)).sum();
            metrics.set(Metric::DissonanceInside, dissonances as f64);
        }
        if config.is_enabled(Metric::TooWideAccompanimentRange) {
            metrics.set(Metric::TooWideAccompanimentRange, self.wide_range(&a_chords) as f64);
        }
        if config.is_enabled(Metric::CorrectTriadForMelodyKey) {
            let in_key = a_chords
                .values()
                .filter(|chord| {
                    let shape = canonical_shape(chord);
                    self.key_triads.iter().any(|t| t.as_slice() == shape.as_slice())
                })
                .count();
            metrics.set(Metric::CorrectTriadForMelodyKey, in_key as f64);
        }
        if config.is_enabled(Metric::ChordIncludesMelodyNote) {
            metrics.set(Metric::ChordIncludesMelodyNote, self.melody_coverage(&a_chords));
        }
        let wants_progressions = config.is_enabled(Metric::PartialProgression)
            || config.is_enabled(Metric::CompletedProgression);
        if wants_progressions {
            let windows = window_matches(&accompaniment.progression_triads_by_beats());
            if config.is_enabled(Metric::PartialProgression) {
                let partial: f64 = windows
                    .iter()
                    .map(|&m| m as f64 / PROGRESSION_LENGTH as f64)
                    .sum();
                metrics.set(Metric::PartialProgression, partial);
            }
            if config.is_enabled(Metric::CompletedProgression) {
                let completed = windows.iter().filter(|&&m| m == PROGRESSION_LENGTH).count();
                metrics.set(Metric::CompletedProgression, completed as f64);
            }
        }
        if config.is_enabled(Metric::TooLowChord) {
            let too_low = a_chords
                .values()
                .filter(|c| c[0] <= config.too_low_chord_pitch)
                .count();
            metrics.set(Metric::TooLowChord, too_low as f64);
        }
        metrics
    }

    /// Adjacent chords (in time order) where the top or the bottom note moves
    /// by at least the drop threshold.
    fn chord_drops(&self, a_chords: &ChordPitches) -> usize {
        let threshold = self.config.too_big_chord_drop_in_notes as i16;
        a_chords
            .values()
            .zip(a_chords.values().skip(1))
            .filter(|(prev, curr)| {
                let top_leap = (curr[curr.len() - 1] as i16 - prev[prev.len() - 1] as i16).abs();
                let bottom_leap = (prev[0] as i16 - curr[0] as i16).abs();
                top_leap >= threshold || bottom_leap >= threshold
            })
            .count()
    }

    /// Chords whose bass deviates from the median bass by more than half the
    /// range threshold.
    fn wide_range(&self, a_chords: &ChordPitches) -> usize {
        let mut basses: Vec<u8> = a_chords.values().map(|c| c[0]).collect();
        if basses.is_empty() {
            return 0;
        }
        basses.sort_unstable();
        let mid = basses.len() / 2;
        let median = if basses.len() % 2 == 0 {
            (basses[mid - 1] as f64 + basses[mid] as f64) / 2.0
        } else {
            basses[mid] as f64
        };
        let allowed = self.config.too_wide_range_in_notes as f64 / 2.0;
        a_chords
            .values()
            .filter(|c| (c[0] as f64 - median).abs() > allowed)
            .count()
    }

    /// Sum over chords of the fraction of bucket melody notes whose pitch
    /// class the chord contains.
    fn melody_coverage(&self, a_chords: &ChordPitches) -> f64 {
        a_chords
            .iter()
            .map(|(time, chord)| {
                let Some(melody_pcs) = self.melody_buckets.get(&(time / self.bucket_ticks)) else {
                    return 0.0;
                };
                let chord_pcs: BTreeSet<u8> = chord.iter().map(|p| p % 12).collect();
                let covered = melody_pcs.iter().filter(|pc| chord_pcs.contains(pc)).count();
                covered as f64 / melody_pcs.len() as f64
            })
            .sum()
    }
}

/// Count unordered note pairs of a chord at a dissonant pitch-class distance.
fn dissonant_pairs(chord: &[u8]) -> usize {
    let mut count = 0;
    for (i, &a) in chord.iter().enumerate() {
        for &b in &chord[i + 1..] {
            let distance = (a % 12).abs_diff(b % 12);
            if DISSONANT_PITCH_CLASS_DISTANCES.contains(&distance) {
                count += 1;
            }
        }
    }
    count
}

/// Stateless form: score `accompaniment` against `melody` under `config`.
pub fn score_pair(melody: &Composition, accompaniment: &Composition, config: &FitnessConfig) -> f64 {
    FitnessEvaluator::new(config.clone(), melody).score(accompaniment)
}
