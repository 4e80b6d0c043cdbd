// Deterministic, portable pseudo-random number generator for the accompaniment search.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding.
// Every stochastic step of the genetic search (random candidates, parent
// sampling, crossover swaps, chord mutations) draws from a `SearchRng` that
// the caller owns and passes in explicitly. There is no global generator:
// the same seed and the same configuration reproduce the same run, bit for
// bit, on every platform.
//
// On top of the raw generator this crate provides the handful of sampling
// helpers the search needs: bounded integers (half-open and inclusive,
// signed and unsigned), unit floats, Bernoulli draws, uniform choice from a
// slice, and sampling distinct indices without replacement.
//
// **Critical constraint: determinism.** Every method must produce identical
// output given the same prior state, regardless of platform, compiler version,
// or optimization level. Floating point appears only when converting the
// integer output to a unit float; the integer core never touches it.

use serde::{Deserialize, Serialize};

/// Xoshiro256++ PRNG, the search's sole source of randomness.
///
/// Cloning a `SearchRng` forks the stream: both copies produce the same
/// values from that point on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRng {
    s: [u64; 4],
}

impl SearchRng {
    /// Seed a generator; SplitMix64 expands the `u64` into the 256-bit state.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Advance the state and return the next raw 64-bit output.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Unit float in [0, 1) built from the top 53 bits of one output.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in `[low, high)` by rejection sampling, so no value
    /// is favoured when the span does not divide 2^64. Panics if `low >= high`.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: low must be less than high");
        let range = high - low;
        if range.is_power_of_two() {
            return low + (self.next_u64() & (range - 1));
        }
        // (2^64 - range) % range
        let threshold = range.wrapping_neg() % range;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range);
            }
        }
    }

    /// Half-open `usize` range; indexes into populations and catalogues.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        self.range_u64(low as u64, high as u64) as usize
    }

    /// Generate a uniform random `u8` in `[low, high]` (inclusive on both ends).
    ///
    /// Pitch positions are inclusive ranges (`0..=max_note - chord_span`), so
    /// this is the form the chord generators use.
    /// Panics if `low > high`.
    pub fn range_u8_inclusive(&mut self, low: u8, high: u8) -> u8 {
        assert!(low <= high, "range_u8_inclusive: low must be <= high");
        self.range_u64(low as u64, high as u64 + 1) as u8
    }

    /// Generate a uniform random `i16` in `[low, high]` (inclusive on both ends).
    ///
    /// Used for signed semitone offsets. Panics if `low > high`.
    pub fn range_i16_inclusive(&mut self, low: i16, high: i16) -> i16 {
        assert!(low <= high, "range_i16_inclusive: low must be <= high");
        let span = (high as i64 - low as i64) as u64 + 1;
        (low as i64 + self.range_u64(0, span) as i64) as i16
    }

    /// Return `true` with probability `p`, `false` otherwise.
    ///
    /// `p <= 0.0` always returns false, `p >= 1.0` always returns true.
    pub fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Pick a uniformly random element of `items`, or `None` if it is empty.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        Some(&items[self.range_usize(0, items.len())])
    }

    /// Sample `k` distinct indices from `0..n` uniformly, without replacement.
    ///
    /// Returns indices in draw order. Uses a partial Fisher-Yates shuffle over
    /// the index range, so the cost is O(n) regardless of `k`.
    /// Panics if `k > n`.
    pub fn sample_indices(&mut self, n: usize, k: usize) -> Vec<usize> {
        assert!(k <= n, "sample_indices: cannot draw {k} of {n}");
        let mut pool: Vec<usize> = (0..n).collect();
        for i in 0..k {
            let j = self.range_usize(i, n);
            pool.swap(i, j);
        }
        pool.truncate(k);
        pool
    }
}

// Seed expansion only.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn determinism_same_seed_same_output() {
        let mut a = SearchRng::new(42);
        let mut b = SearchRng::new(42);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_different_output() {
        let mut a = SearchRng::new(42);
        let mut b = SearchRng::new(43);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn clone_forks_the_stream() {
        let mut a = SearchRng::new(7);
        a.next_u64();
        let mut b = a.clone();
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn f64_in_unit_range() {
        let mut rng = SearchRng::new(12345);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "f64 out of range: {v}");
        }
    }

    #[test]
    fn range_usize_within_bounds() {
        let mut rng = SearchRng::new(555);
        for _ in 0..10_000 {
            let v = rng.range_usize(5, 15);
            assert!((5..15).contains(&v), "range_usize out of range: {v}");
        }
    }

    #[test]
    fn range_u8_inclusive_reaches_both_ends() {
        let mut rng = SearchRng::new(888);
        let mut seen = [false; 3];
        for _ in 0..10_000 {
            let v = rng.range_u8_inclusive(60, 62);
            assert!((60..=62).contains(&v), "range_u8_inclusive out of range: {v}");
            seen[(v - 60) as usize] = true;
        }
        assert!(seen.iter().all(|&s| s), "every value should be drawn: {seen:?}");
    }

    #[test]
    fn range_u8_inclusive_full_pitch_range() {
        let mut rng = SearchRng::new(3);
        for _ in 0..1_000 {
            let _ = rng.range_u8_inclusive(0, 255);
        }
        assert_eq!(rng.range_u8_inclusive(9, 9), 9);
    }

    #[test]
    fn range_i16_inclusive_signed_bounds() {
        let mut rng = SearchRng::new(21);
        let mut saw_low = false;
        let mut saw_high = false;
        for _ in 0..10_000 {
            let v = rng.range_i16_inclusive(-7, 7);
            assert!((-7..=7).contains(&v), "range_i16_inclusive out of range: {v}");
            saw_low |= v == -7;
            saw_high |= v == 7;
        }
        assert!(saw_low && saw_high);
    }

    #[test]
    fn random_bool_distribution() {
        let mut rng = SearchRng::new(42);
        let n = 10_000;
        let true_count = (0..n).filter(|_| rng.random_bool(0.5)).count();
        let pct = true_count as f64 / n as f64;
        assert!(
            (0.45..0.55).contains(&pct),
            "random_bool(0.5) should be ~50%, got {:.1}%",
            pct * 100.0
        );
    }

    #[test]
    fn random_bool_extremes() {
        let mut rng = SearchRng::new(42);
        for _ in 0..100 {
            assert!(!rng.random_bool(0.0));
            assert!(rng.random_bool(1.0));
        }
    }

    #[test]
    fn choose_empty_and_nonempty() {
        let mut rng = SearchRng::new(5);
        let empty: [u8; 0] = [];
        assert_eq!(rng.choose(&empty), None);
        let items = [1, 2, 3];
        for _ in 0..100 {
            assert!(items.contains(rng.choose(&items).unwrap()));
        }
    }

    #[test]
    fn sample_indices_are_distinct_and_in_range() {
        let mut rng = SearchRng::new(99);
        for k in 0..=10 {
            let mut picked = rng.sample_indices(10, k);
            assert_eq!(picked.len(), k);
            assert!(picked.iter().all(|&i| i < 10));
            picked.sort_unstable();
            picked.dedup();
            assert_eq!(picked.len(), k, "indices must be distinct");
        }
    }

    #[test]
    #[should_panic]
    fn sample_indices_rejects_oversized_draw() {
        SearchRng::new(1).sample_indices(3, 4);
    }

    #[test]
    fn serialization_roundtrip() {
        let mut rng = SearchRng::new(42);
        for _ in 0..100 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: SearchRng = serde_json::from_str(&json).unwrap();
        for _ in 0..100 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
