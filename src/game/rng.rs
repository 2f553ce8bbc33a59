//! Randomness behind a trait so outcomes can be seeded or scripted in tests.

use std::collections::VecDeque;

use rand::{Rng, RngCore};

/// Uniform randomness used by every chance-based resolution in the engine.
pub trait RandomSource {
    /// Uniform sample in `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    /// Bernoulli trial with probability `p`.
    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform sample in `[lo, hi)`; returns `lo` when the range is empty.
    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        lo + (hi - lo) * self.next_f64()
    }

    /// Uniform index in `0..n`. `n` must be non-zero.
    fn below(&mut self, n: usize) -> usize {
        let idx = (self.next_f64() * n as f64) as usize;
        idx.min(n.saturating_sub(1))
    }

    /// Draw an index with probability `weights[i] / sum(weights)`.
    fn weighted_index(&mut self, weights: &[f64]) -> Option<usize> {
        let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
        if total <= 0.0 {
            return None;
        }
        let mut roll = self.next_f64() * total;
        let mut last = None;
        for (idx, weight) in weights.iter().enumerate() {
            if *weight <= 0.0 {
                continue;
            }
            if roll < *weight {
                return Some(idx);
            }
            roll -= weight;
            last = Some(idx);
        }
        last
    }
}

impl<R: RngCore> RandomSource for R {
    fn next_f64(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Replays a fixed sequence of samples, then repeats `fallback`.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    values: VecDeque<f64>,
    fallback: f64,
}

impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: values.into_iter().collect(),
            fallback: 0.5,
        }
    }

    pub fn with_fallback(mut self, fallback: f64) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn push(&mut self, value: f64) {
        self.values.push_back(value);
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f64(&mut self) -> f64 {
        self.values.pop_front().unwrap_or(self.fallback).clamp(0.0, 0.999_999_999)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn weighted_index_respects_weights() {
        let mut rng = ScriptedRandom::new([0.0, 0.24, 0.26, 0.99]);
        let weights = [1.0, 3.0];
        assert_eq!(rng.weighted_index(&weights), Some(0));
        assert_eq!(rng.weighted_index(&weights), Some(0));
        assert_eq!(rng.weighted_index(&weights), Some(1));
        assert_eq!(rng.weighted_index(&weights), Some(1));
    }

    #[test]
    fn weighted_index_skips_zero_weights() {
        let mut rng = ScriptedRandom::new([0.0]);
        assert_eq!(rng.weighted_index(&[0.0, 2.0]), Some(1));
        assert_eq!(rng.weighted_index(&[0.0, 0.0]), None);
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        for _ in 0..16 {
            assert_eq!(RandomSource::next_f64(&mut a), RandomSource::next_f64(&mut b));
        }
    }

    #[test]
    fn below_never_reaches_n() {
        let mut rng = ScriptedRandom::new([0.999_999_999_9]);
        assert_eq!(rng.below(6), 5);
    }
}
