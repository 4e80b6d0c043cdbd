// Chord mutation and random chord generation.
//
// Mutation walks the beat slots of a candidate (`0, tpb, 2*tpb, ...` up to
// its rounded beat count) and, with probability `mutation_chance` per slot,
// rebuilds that slot's chord with one action drawn uniformly from:
// - shift: move every note by the same offset, at most `max_shift` semitones
//   and never outside `[0, max_note]`;
// - teleport: keep the chord's intervals but re-anchor its lowest note at a
//   uniformly drawn position that keeps the top note at or below `max_note`;
// - replace: draw a fresh catalogue shape (the empty chord included) anchored
//   at the old chord's lowest pitch, lowered just enough to fit `max_note`.
//
// Every rebuilt note starts at the slot time and lasts one beat. Slots that
// are not drawn are copied unchanged; notes that do not start on a beat slot
// are dropped, so a mutated candidate is always a clean beat grid.
//
// Each action is a `ChordMutation` variant carrying exactly the bounds it
// needs, computed from the chord before any random draw.
//
// The random generators at the bottom build the initial population in
// evolution.rs.

use crate::composition::Composition;
use crate::error::ConfigError;
use crate::note::{MIDI_MAX_PITCH, Note, PlacedNote};
use crate::triad::TriadShape;
use accompanist_prng::SearchRng;
use serde::{Deserialize, Serialize};

/// Pitch bounds for generated and mutated chords.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Highest pitch any generated or mutated chord may reach.
    pub max_note: u8,
    /// Largest offset, in semitones, of a shift mutation.
    pub max_shift: u8,
}

impl Default for MutationConfig {
    fn default() -> Self {
        MutationConfig {
            max_note: 84,
            max_shift: 7,
        }
    }
}

impl MutationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let widest = TriadShape::ALL.iter().map(|s| s.span()).max().unwrap_or(0);
        if self.max_note > MIDI_MAX_PITCH || self.max_note < widest {
            return Err(ConfigError::MaxNoteOutOfRange(self.max_note));
        }
        Ok(())
    }
}

/// Reject a mutation chance outside `[0, 1]`.
pub fn validate_mutation_chance(mutation_chance: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&mutation_chance) {
        Ok(())
    } else {
        Err(ConfigError::ProbabilityOutOfRange {
            name: "mutation_chance",
            value: mutation_chance,
        })
    }
}

/// Which mutation action to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Shift,
    Teleport,
    Replace,
}

impl MutationKind {
    pub const ALL: [MutationKind; 3] = [MutationKind::Shift, MutationKind::Teleport, MutationKind::Replace];
}

/// Placement shared by every note of a rebuilt chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub start_time: u32,
    pub duration: u32,
}

impl Slot {
    fn place(self, pitches: impl IntoIterator<Item = u8>) -> Vec<PlacedNote> {
        pitches
            .into_iter()
            .map(|pitch| PlacedNote {
                note: Note {
                    pitch,
                    duration: self.duration,
                },
                start_time: self.start_time,
            })
            .collect()
    }
}

/// A mutation action bound to one chord.
#[derive(Debug, Clone, PartialEq)]
pub enum ChordMutation {
    /// Move every note by an offset drawn from `min_offset..=max_offset`.
    Shift {
        pitches: Vec<u8>,
        min_offset: i16,
        max_offset: i16,
    },
    /// Re-anchor the chord's lowest note at a position in `0..=max_base`.
    Teleport { intervals: Vec<u8>, max_base: u8 },
    /// Draw a new shape from `catalogue`, anchored at `anchor`.
    Replace {
        catalogue: &'static [TriadShape],
        anchor: u8,
        max_note: u8,
    },
}

impl ChordMutation {
    /// Bind `kind` to a chord given as pitches sorted ascending.
    pub fn for_chord(kind: MutationKind, sorted_pitches: &[u8], config: &MutationConfig) -> Self {
        let bottom = sorted_pitches.first().copied().unwrap_or(0);
        let top = sorted_pitches.last().copied().unwrap_or(0);
        match kind {
            MutationKind::Shift => {
                let max_shift = config.max_shift as i16;
                let min_offset = -(bottom as i16).min(max_shift);
                let max_offset = (config.max_note as i16 - top as i16).min(max_shift);
                ChordMutation::Shift {
                    pitches: sorted_pitches.to_vec(),
                    min_offset,
                    // A chord already above max_note may only move down.
                    max_offset: max_offset.max(min_offset),
                }
            }
            MutationKind::Teleport => ChordMutation::Teleport {
                intervals: sorted_pitches.iter().map(|p| p - bottom).collect(),
                max_base: config.max_note.saturating_sub(top - bottom),
            },
            MutationKind::Replace => ChordMutation::Replace {
                catalogue: &TriadShape::ALL,
                anchor: bottom,
                max_note: config.max_note,
            },
        }
    }

    /// Draw the new chord and place it in `slot`.
    pub fn apply(&self, slot: Slot, rng: &mut SearchRng) -> Vec<PlacedNote> {
        match self {
            ChordMutation::Shift {
                pitches,
                min_offset,
                max_offset,
            } => {
                let offset = rng.range_i16_inclusive(*min_offset, *max_offset);
                slot.place(pitches.iter().map(|&p| (p as i16 + offset).clamp(0, 127) as u8))
            }
            ChordMutation::Teleport { intervals, max_base } => {
                if intervals.is_empty() {
                    return Vec::new();
                }
                let base = rng.range_u8_inclusive(0, *max_base);
                slot.place(intervals.iter().map(|&i| base + i))
            }
            ChordMutation::Replace {
                catalogue,
                anchor,
                max_note,
            } => {
                let Some(shape) = rng.choose(catalogue) else {
                    return Vec::new();
                };
                let top = *anchor as i16 + shape.span() as i16;
                let lowered = (*max_note as i16).min(top) - top;
                let base = (*anchor as i16 + lowered).max(0);
                slot.place(shape.offsets().iter().map(|&o| (base + o as i16) as u8))
            }
        }
    }
}

/// Mutate every beat slot of `candidate` with probability `mutation_chance`.
pub fn mutate(
    candidate: &Composition,
    mutation_chance: f64,
    config: &MutationConfig,
    rng: &mut SearchRng,
) -> Result<Composition, ConfigError> {
    validate_mutation_chance(mutation_chance)?;
    let beat_ticks = candidate.beat_ticks();
    let slots = candidate.notes_at();
    let mut notes = Vec::with_capacity(candidate.notes().len());
    for beat in 0..candidate.beat_count() as u32 {
        let start_time = beat * beat_ticks;
        let current = slots.get(&start_time).map(Vec::as_slice).unwrap_or_default();
        if rng.random_bool(mutation_chance) {
            let mut pitches: Vec<u8> = current.iter().map(PlacedNote::pitch).collect();
            pitches.sort_unstable();
            let kind = MutationKind::ALL[rng.range_usize(0, MutationKind::ALL.len())];
            let mutation = ChordMutation::for_chord(kind, &pitches, config);
            let slot = Slot {
                start_time,
                duration: beat_ticks,
            };
            notes.extend(mutation.apply(slot, rng));
        } else {
            notes.extend_from_slice(current);
        }
    }
    Ok(candidate.with_notes(notes))
}

/// A uniformly drawn catalogue shape, the empty chord included.
pub fn random_chord_shape(rng: &mut SearchRng) -> TriadShape {
    TriadShape::ALL[rng.range_usize(0, TriadShape::ALL.len())]
}

/// A random catalogue shape at a random position with its top note at or
/// below `max_note`. Sorted ascending; empty for the empty chord.
pub fn random_absolute_chord(config: &MutationConfig, rng: &mut SearchRng) -> Vec<u8> {
    let shape = random_chord_shape(rng);
    if shape == TriadShape::Empty {
        return Vec::new();
    }
    let base = rng.range_u8_inclusive(0, config.max_note.saturating_sub(shape.span()));
    shape.offsets().iter().map(|&o| base + o).collect()
}

/// A candidate with a random absolute chord on every beat of the melody.
///
/// The candidate copies the melody's timing, and its `min_duration` is the
/// melody's duration so an all-empty draw still spans the melody.
pub fn random_candidate(melody: &Composition, config: &MutationConfig, rng: &mut SearchRng) -> Composition {
    let beat_ticks = melody.beat_ticks();
    let mut notes = Vec::new();
    for beat in 0..melody.beat_count() as u32 {
        let slot = Slot {
            start_time: beat * beat_ticks,
            duration: beat_ticks,
        };
        notes.extend(slot.place(random_absolute_chord(config, rng)));
    }
    melody.with_notes(notes).with_min_duration(melody.duration())
}
