// Accompanist: chord accompaniment for a melody by genetic search.
//
// Given a melody (a list of timed notes), the search evolves populations of
// candidate accompaniments (one chord per beat) toward a low fitness score.
// The score rewards in-key triads, coverage of melody onsets and recognizable
// progressions, and penalizes dissonance, leaps and clashes with the melody.
//
// Architecture:
// - note.rs: Note and PlacedNote values (pitch, start tick, duration)
// - triad.rs: Fixed triad catalogue, canonical chord shapes, chord labels
// - key.rs: Key inference and the in-key triad tables
// - progression.rs: Harmonic progression catalogue and 4-beat window matching
// - composition.rs: Composition (notes + timing) and its derived views
//   (chord slots, buckets, key, per-beat triads, merge)
// - fitness.rs: Metric computation and weighted reduction to a score
// - crossover.rs: Chord-wise uniform crossover
// - mutation.rs: Shift / teleport / replace chord mutations, random candidates
// - evolution.rs: Generational loop, selection, stop conditions, checkpoints
// - config.rs: JSON-loadable configuration with defaults
// - midi.rs: Standard MIDI File decoding and encoding
// - error.rs: Error types
//
// All randomness flows through an injected `accompanist_prng::SearchRng`, so
// a run is deterministic given a seed.

pub mod composition;
pub mod config;
pub mod crossover;
pub mod error;
pub mod evolution;
pub mod fitness;
pub mod key;
pub mod midi;
pub mod mutation;
pub mod note;
pub mod progression;
pub mod triad;
