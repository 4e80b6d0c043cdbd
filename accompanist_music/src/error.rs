// Error types for the accompaniment search.
//
// Three families, matching how failures surface:
// - `CompositionError`: malformed compositions and timing mismatches when
//   merging a melody with an accompaniment.
// - `ConfigError`: invalid generation parameters or weight tables, detected
//   before a run starts. A run never begins with a bad configuration.
// - `MidiError`: failures decoding or encoding Standard MIDI Files at the
//   I/O boundary (midi.rs).
//
// Data warnings (an enabled fitness metric without a weight) are not errors;
// fitness.rs logs them and reports them on each `Evaluation`.

use thiserror::Error;

/// Error type for building or combining compositions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompositionError {
    #[error("ticks_per_beat must be positive")]
    ZeroTicksPerBeat,

    #[error("tempo must be positive")]
    ZeroTempo,

    /// Melody and accompaniment must share resolution and tempo to be combined.
    #[error(
        "cannot combine compositions with different timing: \
         ticks_per_beat {left_ticks_per_beat} vs {right_ticks_per_beat}, \
         tempo {left_tempo} vs {right_tempo}"
    )]
    MismatchedTiming {
        left_ticks_per_beat: u16,
        right_ticks_per_beat: u16,
        left_tempo: u32,
        right_tempo: u32,
    },
}

/// Error type for invalid search configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A probability parameter outside [0, 1].
    #[error("{name} must belong to [0, 1], got {value}")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },

    #[error("exactly one of target_fitness and iterations_num must be set")]
    AmbiguousStopCondition,

    #[error("generation_size must be at least 2, got {0}")]
    GenerationTooSmall(usize),

    #[error("at least 2 parents are required, got {best} best + {random} random")]
    TooFewParents { best: usize, random: usize },

    #[error("parent pool of {requested} exceeds population of {population}")]
    ParentPoolTooLarge { requested: usize, population: usize },

    /// `max_note` must fit every catalogue triad and stay a MIDI pitch.
    #[error("max_note must lie between the widest triad span and 127, got {0}")]
    MaxNoteOutOfRange(u8),

    #[error("target_fitness must be a finite number, got {0}")]
    NonFiniteTarget(f64),

    #[error("melody has no notes, nothing to accompany")]
    EmptyMelody,

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
}

/// Error type for MIDI decoding and encoding.
#[derive(Debug, Error)]
pub enum MidiError {
    #[error("malformed MIDI file: {0}")]
    Parse(#[from] midly::Error),

    #[error("SMPTE timecode timing is not supported, only metrical (ticks per beat)")]
    UnsupportedTiming,

    /// An event kind that carries no note information and cannot be skipped safely.
    #[error("cannot read event of type {kind} at tick {tick}")]
    UnsupportedEvent { kind: String, tick: u32 },

    #[error("note-off for pitch {pitch} at tick {tick} has no pending note-on")]
    UnmatchedNoteOff { pitch: u8, tick: u32 },

    #[error("note-on for pitch {pitch} at tick {tick} is never released")]
    UnterminatedNote { pitch: u8, tick: u32 },

    /// A tempo, resolution, pitch or delta too wide for its MIDI field.
    #[error("{what} {value} does not fit in a MIDI file")]
    OutOfRange { what: &'static str, value: u32 },

    #[error("MIDI I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Composition(#[from] CompositionError),
}
