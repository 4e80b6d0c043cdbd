// Chord-wise uniform crossover.
//
// Two parents are cut into chord slots (notes sharing a start tick). For every
// onset present in either parent, in ascending time order, one uniform draw
// decides whether the children swap that slot: child A takes parent B's chord
// and child B takes parent A's. A draw above `similarity` swaps, so
// `similarity = 1.0` never swaps and `0.5` is an unbiased uniform crossover.
// A slot missing from one parent swaps as an empty chord.
//
// Children copy their own parent's metadata (timing, min duration) with the
// note list replaced.

use crate::composition::Composition;
use crate::error::ConfigError;
use crate::note::PlacedNote;
use accompanist_prng::SearchRng;
use std::collections::BTreeSet;

/// Reject a similarity outside `[0, 1]`.
pub fn validate_similarity(similarity: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&similarity) {
        Ok(())
    } else {
        Err(ConfigError::ProbabilityOutOfRange {
            name: "similarity_to_single_parent",
            value: similarity,
        })
    }
}

/// Produce two children by swapping whole chord slots between `a` and `b`.
pub fn crossover(
    a: &Composition,
    b: &Composition,
    similarity: f64,
    rng: &mut SearchRng,
) -> Result<(Composition, Composition), ConfigError> {
    validate_similarity(similarity)?;
    let a_slots = a.notes_at();
    let b_slots = b.notes_at();
    let times: BTreeSet<u32> = a_slots.keys().chain(b_slots.keys()).copied().collect();

    let mut a_child: Vec<PlacedNote> = Vec::with_capacity(a.notes().len());
    let mut b_child: Vec<PlacedNote> = Vec::with_capacity(b.notes().len());
    for time in times {
        let from_a = a_slots.get(&time).map(Vec::as_slice).unwrap_or_default();
        let from_b = b_slots.get(&time).map(Vec::as_slice).unwrap_or_default();
        if rng.next_f64() > similarity {
            a_child.extend_from_slice(from_b);
            b_child.extend_from_slice(from_a);
        } else {
            a_child.extend_from_slice(from_a);
            b_child.extend_from_slice(from_b);
        }
    }
    Ok((a.with_notes(a_child), b.with_notes(b_child)))
}
