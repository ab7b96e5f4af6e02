//! Deterministic train/test splitting
//!
//! The split is stratified over target-quantile buckets so that skewed
//! targets keep comparable distributions on both sides, mirroring the
//! quantile stratification the training data was validated with.

use crate::error::{Result, WellcastError};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Number of target-quantile strata.
const N_STRATA: usize = 5;

/// A disjoint train/test partition of row indices covering every row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    pub seed: u64,
    pub train_ratio: f64,
}

/// Seeded, stratified splitter.
#[derive(Debug, Clone)]
pub struct Splitter {
    train_ratio: f64,
    seed: u64,
}

impl Splitter {
    pub fn new(train_ratio: f64, seed: u64) -> Self {
        Self { train_ratio, seed }
    }

    /// Partition `targets.len()` rows. Re-running with the same seed and
    /// input size reproduces an identical split.
    pub fn split(&self, targets: &Array1<f64>) -> Result<Split> {
        let n = targets.len();
        if n < 2 {
            return Err(WellcastError::Validation(format!(
                "need at least 2 rows to split, got {n}"
            )));
        }
        if !(0.0..1.0).contains(&self.train_ratio) || self.train_ratio == 0.0 {
            return Err(WellcastError::Validation(format!(
                "train ratio must be in (0, 1), got {}",
                self.train_ratio
            )));
        }

        // Rank rows by target and cut into contiguous quantile buckets.
        let mut ranked: Vec<usize> = (0..n).collect();
        ranked.sort_by(|&a, &b| {
            targets[a]
                .partial_cmp(&targets[b])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        let n_strata = N_STRATA.min(n);
        let mut buckets: Vec<Vec<usize>> = Vec::with_capacity(n_strata);
        let base = n / n_strata;
        let remainder = n % n_strata;
        let mut cursor = 0;
        for b in 0..n_strata {
            let size = base + usize::from(b < remainder);
            buckets.push(ranked[cursor..cursor + size].to_vec());
            cursor += size;
        }

        // Proportional test allocation with largest-remainder rounding so the
        // totals come out exact (e.g. 400 rows at 0.8 -> 320/80).
        let total_test = n - (n as f64 * self.train_ratio).floor() as usize;
        let mut counts: Vec<usize> = Vec::with_capacity(n_strata);
        let mut fractions: Vec<(usize, f64)> = Vec::with_capacity(n_strata);
        for (b, bucket) in buckets.iter().enumerate() {
            let exact = bucket.len() as f64 * (1.0 - self.train_ratio);
            let floor = (exact.floor() as usize).min(bucket.len());
            counts.push(floor);
            fractions.push((b, exact - floor as f64));
        }
        let mut assigned: usize = counts.iter().sum();
        fractions.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        for &(b, _) in fractions.iter().cycle() {
            if assigned >= total_test {
                break;
            }
            if counts[b] < buckets[b].len() {
                counts[b] += 1;
                assigned += 1;
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut train = Vec::with_capacity(n - total_test);
        let mut test = Vec::with_capacity(total_test);
        for (bucket, &test_count) in buckets.iter_mut().zip(counts.iter()) {
            bucket.shuffle(&mut rng);
            test.extend_from_slice(&bucket[..test_count]);
            train.extend_from_slice(&bucket[test_count..]);
        }
        train.sort_unstable();
        test.sort_unstable();

        Ok(Split {
            train,
            test,
            seed: self.seed,
            train_ratio: self.train_ratio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(n: usize) -> Array1<f64> {
        Array1::from_iter((0..n).map(|i| (i % 100) as f64))
    }

    #[test]
    fn test_partition_is_exact_and_disjoint() {
        let split = Splitter::new(0.8, 42).split(&targets(400)).unwrap();

        assert_eq!(split.train.len(), 320);
        assert_eq!(split.test.len(), 80);

        let mut all: Vec<usize> = split
            .train
            .iter()
            .chain(split.test.iter())
            .copied()
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 400);
    }

    #[test]
    fn test_same_seed_reproduces_split() {
        let y = targets(173);
        let a = Splitter::new(0.8, 7).split(&y).unwrap();
        let b = Splitter::new(0.8, 7).split(&y).unwrap();
        assert_eq!(a.train, b.train);
        assert_eq!(a.test, b.test);
    }

    #[test]
    fn test_different_seed_changes_split() {
        let y = targets(173);
        let a = Splitter::new(0.8, 7).split(&y).unwrap();
        let b = Splitter::new(0.8, 8).split(&y).unwrap();
        assert_ne!(a.test, b.test);
    }

    #[test]
    fn test_stratification_balances_target_means() {
        // Strongly trending target: an unstratified head/tail split would
        // separate the means by ~200.
        let y = Array1::from_iter((0..200).map(|i| i as f64 * 2.0));
        let split = Splitter::new(0.8, 3).split(&y).unwrap();

        let mean = |idx: &[usize]| idx.iter().map(|&i| y[i]).sum::<f64>() / idx.len() as f64;
        assert!((mean(&split.train) - mean(&split.test)).abs() < 30.0);
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        assert!(Splitter::new(1.2, 0).split(&targets(10)).is_err());
        assert!(Splitter::new(0.0, 0).split(&targets(10)).is_err());
    }
}
