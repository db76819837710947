//! Permutation p-values and false discovery rate control
//!
//! With `P` permutations every p-value lies on the grid `k / (P + 1)` for
//! `k = 1..=P + 1`. The discrete procedure works on that grid directly: each
//! permuted draw is ranked among the draws of its own feature to give a null
//! p-value, and the rejection threshold is the largest observed p-value whose
//! estimated FDR (observed plus null p-values below it) stays within alpha.

use std::iter::once;

use adjustp::{adjust, Procedure};
use itertools::Itertools;
use log::{debug, warn};

use crate::{
    config::FdrMethod,
    data::{FeatureTable, Groups},
    error::{DsfdrError, Result},
    math::{binomial, is_close},
    permutation::NullDistribution,
};

/// Grid positions of one feature's observed statistic and of its permuted draws
///
/// A position `k` stands for the p-value `k / (P + 1)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureGrid {
    pub observed: usize,
    pub null: Vec<usize>,
}

impl FeatureGrid {
    /// Ranks `|observed|` and every `|null|` among all `P + 1` absolute statistics
    ///
    /// Draws numerically indistinguishable from the observed statistic are snapped
    /// onto it and count as at least as extreme.
    pub fn new(observed: f64, null: &[f64]) -> Self {
        let target = observed.abs();
        let all = once(target)
            .chain(null.iter().map(|u| {
                let u = u.abs();
                if is_close(u, target) {
                    target
                } else {
                    u
                }
            }))
            .collect::<Vec<_>>();
        let descending = all
            .iter()
            .copied()
            .sorted_by(|a, b| b.total_cmp(a))
            .collect::<Vec<_>>();
        let position = |v: f64| descending.partition_point(|x| *x >= v);

        Self {
            observed: position(target),
            null: all[1..].iter().map(|v| position(*v)).collect(),
        }
    }
}

/// Two-sided permutation p-value: `(#{|null| >= |observed|} + 1) / (P + 1)`
pub fn permutation_pvalue(observed: f64, null: &[f64]) -> f64 {
    FeatureGrid::new(observed, null).observed as f64 / (null.len() + 1) as f64
}

/// Outcome of a correction, aligned with the input feature order
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub pvalues: Vec<f64>,
    pub reject: Vec<bool>,
    /// Largest p-value still rejected, `None` when nothing is rejected
    pub threshold: Option<f64>,
}

/// Applies one [`FdrMethod`] at a fixed alpha
#[derive(Debug, Clone, Copy)]
pub struct Corrector {
    method: FdrMethod,
    alpha: f64,
}

impl Corrector {
    pub fn new(method: FdrMethod, alpha: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(DsfdrError::InvalidAlpha { received: alpha });
        }
        Ok(Self { method, alpha })
    }

    pub fn method(&self) -> FdrMethod {
        self.method
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Computes p-values and rejections for every feature
    ///
    /// `testable` masks out features excluded before testing (used by
    /// [`FdrMethod::FilterBh`]); excluded features keep their p-value but are
    /// never rejected. The observed statistics, the null distribution and the
    /// mask must all cover the same features.
    pub fn correct(
        &self,
        observed: &[f64],
        null: &NullDistribution,
        testable: Option<&[bool]>,
    ) -> Result<Correction> {
        if observed.len() != null.n_features() {
            return Err(DsfdrError::DimensionMismatch {
                expected: null.n_features(),
                actual: observed.len(),
            });
        }
        if let Some(mask) = testable {
            if mask.len() != observed.len() {
                return Err(DsfdrError::DimensionMismatch {
                    expected: observed.len(),
                    actual: mask.len(),
                });
            }
        }

        let n_permutations = null.n_permutations();
        let resolution = 1.0 / (n_permutations + 1) as f64;
        if unresolvable(n_permutations, self.alpha) {
            warn!(
                "With {} permutations the smallest achievable p-value {:.4} exceeds alpha {}",
                n_permutations, resolution, self.alpha
            );
        }

        let grids = observed
            .iter()
            .enumerate()
            .map(|(i, t)| FeatureGrid::new(*t, null.feature(i)))
            .collect::<Vec<_>>();
        let pvalues = grids
            .iter()
            .map(|g| g.observed as f64 * resolution)
            .collect::<Vec<_>>();

        let (reject, threshold) = match self.method {
            FdrMethod::DsFdr => {
                match discrete_threshold(&grids, n_permutations, self.alpha) {
                    Some(k) => {
                        let reject = grids.iter().map(|g| g.observed <= k).collect();
                        (reject, Some(k as f64 * resolution))
                    }
                    None => (vec![false; grids.len()], None),
                }
            }
            FdrMethod::Bh => self.step_up(&pvalues, None, Procedure::BenjaminiHochberg),
            FdrMethod::By => self.step_up(&pvalues, None, Procedure::BenjaminiYekutieli),
            FdrMethod::FilterBh => self.step_up(&pvalues, testable, Procedure::BenjaminiHochberg),
        };
        debug!(
            "{} rejected {} of {} features (threshold {:?})",
            self.method,
            reject.iter().filter(|r| **r).count(),
            reject.len(),
            threshold
        );

        Ok(Correction {
            pvalues,
            reject,
            threshold,
        })
    }

    /// Adjusts the testable p-values with `procedure` and rejects q-values within alpha
    fn step_up(
        &self,
        pvalues: &[f64],
        testable: Option<&[bool]>,
        procedure: Procedure,
    ) -> (Vec<bool>, Option<f64>) {
        let tested = (0..pvalues.len())
            .filter(|&i| testable.map_or(true, |mask| mask[i]))
            .collect::<Vec<_>>();
        let mut reject = vec![false; pvalues.len()];
        if tested.is_empty() {
            return (reject, None);
        }

        let subset = tested.iter().map(|&i| pvalues[i]).collect::<Vec<_>>();
        let qvalues = adjust(&subset, procedure);
        let mut threshold: Option<f64> = None;
        for (&i, q) in tested.iter().zip(qvalues) {
            if q <= self.alpha {
                reject[i] = true;
                threshold = Some(threshold.map_or(pvalues[i], |t| t.max(pvalues[i])));
            }
        }
        (reject, threshold)
    }
}

/// Whether even the smallest achievable p-value, `1 / (P + 1)`, exceeds alpha
pub(crate) fn unresolvable(n_permutations: usize, alpha: f64) -> bool {
    1.0 / (n_permutations + 1) as f64 > alpha
}

/// Largest grid position whose estimated FDR is within alpha
///
/// Candidates are the distinct observed positions, visited from the largest down.
/// At position `k`, with `R` observed and `V` null positions at or below `k`, the
/// estimated FDR is `(R + V) / (R (P + 1))`.
pub fn discrete_threshold(grids: &[FeatureGrid], n_permutations: usize, alpha: f64) -> Option<usize> {
    let size = n_permutations + 1;
    let mut observed = vec![0usize; size + 1];
    let mut null = vec![0usize; size + 1];
    for grid in grids {
        observed[grid.observed] += 1;
        for k in &grid.null {
            null[*k] += 1;
        }
    }

    // cumulative counts at or below each position
    for k in 1..=size {
        observed[k] += observed[k - 1];
        null[k] += null[k - 1];
    }

    let threshold = grids
        .iter()
        .map(|g| g.observed)
        .sorted_unstable_by(|a, b| b.cmp(a))
        .dedup()
        .find(|&k| {
            let r = observed[k] as f64;
            let v = null[k] as f64;
            (r + v) / (r * size as f64) <= alpha
        });
    debug!("Discrete FDR threshold position: {:?} of {}", threshold, size);
    threshold
}

/// Marks the features whose smallest achievable p-value can reach alpha
///
/// A feature present in `z` samples, with `z` below both group sizes, can at best
/// have all its non-zero samples in one group, which happens with probability
/// `(C(n0, z) + C(n1, z)) / C(n, z)` under random labelling.
pub fn testable_features(table: &FeatureTable, groups: &Groups, alpha: f64) -> Result<Vec<bool>> {
    if groups.n_groups() != 2 {
        return Err(DsfdrError::InvalidLabelCardinality {
            statistic: FdrMethod::FilterBh.to_string(),
            expected: "exactly 2".to_string(),
            found: groups.n_groups(),
        });
    }
    let (n0, n1) = (groups.sizes[0], groups.sizes[1]);
    let n = n0 + n1;
    let testable = (0..table.n_features())
        .map(|i| {
            let z = table.nonzero_count(i);
            if z < n0.min(n1) {
                let min_pvalue = (binomial(n0, z) + binomial(n1, z)) / binomial(n, z);
                min_pvalue <= alpha
            } else {
                true
            }
        })
        .collect();
    Ok(testable)
}
