// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The per-lane random stream.  Every lane owns one multiply-with-carry
//! generator.  The generator is tiny (three words), costs one 64-bit
//! multiply per draw, and is `Copy`, so the caller can keep an array of
//! them alive between launches and hand each lane its own slot.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The multiplier `a` for which `a * 2^32 - 1` is a safe prime, giving
/// a period of roughly 2^63 for every non-degenerate seed.
pub const MWC_MULTIPLIER: u32 = 4_294_883_355;

const UNIT_SCALE: f32 = 1.0 / 4_294_967_296.0;
const SIGNED_SCALE: f32 = 1.0 / 2_147_483_648.0;

/// A multiply-with-carry generator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Mwc {
    mul: u32,
    state: u32,
    carry: u32,
}

impl Mwc {
    /// Build a stream from raw parts.  A carry of zero with a state of
    /// zero is a fixed point; callers should use `seed_lanes` unless
    /// they are replaying a stored state.
    pub fn new(mul: u32, state: u32, carry: u32) -> Self {
        Mwc { mul, state, carry }
    }

    /// The next raw 32-bit output.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let val = u64::from(self.mul) * u64::from(self.state) + u64::from(self.carry);
        self.state = val as u32;
        self.carry = (val >> 32) as u32;
        self.state
    }

    /// Uniform in [0, 1].
    #[inline]
    pub fn next_unit(&mut self) -> f32 {
        self.next_u32() as f32 * UNIT_SCALE
    }

    /// Uniform in [-1, 1].
    #[inline]
    pub fn next_signed(&mut self) -> f32 {
        (self.next_u32() as i32) as f32 * SIGNED_SCALE
    }
}

/// Builds one stream per lane from a single seed.  The carry is drawn
/// from `[1, mul)` so that no lane starts on a degenerate fixed point.
pub fn seed_lanes(count: usize, seed: u64) -> Vec<Mwc> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| Mwc::new(MWC_MULTIPLIER, rng.gen(), rng.gen_range(1, MWC_MULTIPLIER)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_draws_stay_in_range() {
        let mut rng = seed_lanes(1, 7)[0];
        for _ in 0..100_000 {
            let f = rng.next_unit();
            assert!(f >= 0.0 && f <= 1.0);
        }
    }

    #[test]
    fn signed_draws_stay_in_range_and_cover_both_signs() {
        let mut rng = seed_lanes(1, 11)[0];
        let (mut neg, mut pos) = (false, false);
        for _ in 0..10_000 {
            let f = rng.next_signed();
            assert!(f >= -1.0 && f <= 1.0);
            neg |= f < 0.0;
            pos |= f > 0.0;
        }
        assert!(neg && pos);
    }

    #[test]
    fn unit_mean_is_roughly_one_half() {
        let mut rng = seed_lanes(1, 3)[0];
        let n = 200_000;
        let sum: f64 = (0..n).map(|_| f64::from(rng.next_unit())).sum();
        let mean = sum / f64::from(n);
        assert!((mean - 0.5).abs() < 0.01, "mean was {}", mean);
    }

    #[test]
    fn lanes_get_distinct_streams() {
        let mut lanes = seed_lanes(64, 42);
        let firsts: Vec<u32> = lanes.iter_mut().map(|l| l.next_u32()).collect();
        let mut sorted = firsts.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), firsts.len());
    }

    #[test]
    fn seeding_is_deterministic() {
        assert_eq!(seed_lanes(8, 99), seed_lanes(8, 99));
        assert_ne!(seed_lanes(8, 99), seed_lanes(8, 100));
    }

    #[test]
    fn stored_state_continues_the_same_stream() {
        let mut straight = seed_lanes(1, 5)[0];
        let mut split = straight;
        let expected: Vec<u32> = (0..1000).map(|_| straight.next_u32()).collect();

        let mut got: Vec<u32> = (0..400).map(|_| split.next_u32()).collect();
        let stored = vec![split];
        let mut resumed = stored[0];
        got.extend((0..600).map(|_| resumed.next_u32()));
        assert_eq!(got, expected);
    }
}
