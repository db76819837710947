use std::ops::Range;

use log::{debug, warn};
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::{
    error::{DsfdrError, Result},
    statistic::PreparedStatistic,
};

/// Below this many samples permutation inference is unreliable
const MIN_RELIABLE_SAMPLES: usize = 4;

/// Whether there are too few samples for permutation p-values to be trusted
pub(crate) fn unreliable_sample_count(n_samples: usize) -> bool {
    n_samples < MIN_RELIABLE_SAMPLES
}

/// Statistics of every feature under every label permutation
///
/// Stored feature-major: the null values of one feature are contiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct NullDistribution {
    n_features: usize,
    n_permutations: usize,
    values: Vec<f64>,
}

impl NullDistribution {
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_permutations(&self) -> usize {
        self.n_permutations
    }

    /// Null statistics of a single feature, one per permutation
    pub fn feature(&self, feature: usize) -> &[f64] {
        let start = feature * self.n_permutations;
        &self.values[start..start + self.n_permutations]
    }

    /// Wraps precomputed null statistics laid out feature-major
    pub fn from_feature_major(n_features: usize, n_permutations: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != n_features * n_permutations {
            return Err(DsfdrError::DimensionMismatch {
                expected: n_features * n_permutations,
                actual: values.len(),
            });
        }
        Ok(Self {
            n_features,
            n_permutations,
            values,
        })
    }

    /// Stitches permutation-major batches back into one feature-major table
    fn from_batches(n_features: usize, n_permutations: usize, batches: Vec<(Range<usize>, Vec<f64>)>) -> Self {
        let mut values = vec![0.0; n_features * n_permutations];
        for (range, batch) in batches {
            for (local, stats) in batch.chunks_exact(n_features.max(1)).enumerate() {
                let perm = range.start + local;
                for (feature, stat) in stats.iter().enumerate() {
                    values[feature * n_permutations + perm] = *stat;
                }
            }
        }
        Self {
            n_features,
            n_permutations,
            values,
        }
    }
}

/// The sample order used by permutation `iteration` of a run seeded with `seed`
///
/// Each iteration draws from its own ChaCha stream, so an iteration's order does
/// not depend on how iterations are distributed across workers.
pub fn permutation_order(seed: u64, iteration: usize, n_samples: usize) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(iteration as u64);
    let mut order = (0..n_samples).collect::<Vec<_>>();
    order.shuffle(&mut rng);
    order
}

/// Builds the null distribution of a prepared statistic by shuffling labels
pub struct PermutationEngine<'a> {
    statistic: &'a PreparedStatistic,
    permutations: usize,
    seed: u64,
}

impl<'a> PermutationEngine<'a> {
    pub fn new(statistic: &'a PreparedStatistic, permutations: usize, seed: u64) -> Result<Self> {
        if permutations == 0 {
            return Err(DsfdrError::InvalidPermutationCount {
                received: permutations,
            });
        }
        if unreliable_sample_count(statistic.n_samples()) {
            warn!(
                "Only {} samples available, permutation p-values will be unreliable",
                statistic.n_samples()
            );
        }
        Ok(Self {
            statistic,
            permutations,
            seed,
        })
    }

    /// Runs all permutations on the current rayon pool
    ///
    /// Iterations are split into one contiguous batch per worker thread. The
    /// result is identical for any number of workers.
    pub fn run(&self) -> NullDistribution {
        let n_batches = rayon::current_num_threads().clamp(1, self.permutations);
        let batch_size = self.permutations.div_ceil(n_batches);
        debug!(
            "Running {} permutations of {} in {} batches",
            self.permutations,
            self.statistic.kind(),
            n_batches
        );

        let batches = (0..n_batches)
            .into_par_iter()
            .map(|b| {
                let start = b * batch_size;
                let end = ((b + 1) * batch_size).min(self.permutations);
                let range = start..end;
                let batch = self.run_batch(range.clone());
                (range, batch)
            })
            .collect::<Vec<_>>();

        NullDistribution::from_batches(self.statistic.n_features(), self.permutations, batches)
    }

    /// Evaluates the statistic under each permutation of `range`, permutation-major
    fn run_batch(&self, range: Range<usize>) -> Vec<f64> {
        let n_features = self.statistic.n_features();
        let mut out = vec![0.0; range.len() * n_features];
        if n_features == 0 {
            return out;
        }
        for (iteration, stats) in range.zip(out.chunks_exact_mut(n_features)) {
            let order = permutation_order(self.seed, iteration, self.statistic.n_samples());
            self.statistic.evaluate(&order, stats);
        }
        out
    }
}
