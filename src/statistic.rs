//! Per-feature test statistics
//!
//! A statistic is prepared once per run from the transformed table and the true
//! labels. Anything that does not depend on the label order (row ranks, centered
//! rows, norms, tie corrections, non-zero masks) is computed up front so that
//! evaluating every feature under one sample order costs O(features × samples).
//!
//! A sample order `order` describes a relabelling: sample `j` receives the label
//! originally attached to sample `order[j]`. The identity order yields the
//! observed statistics.

use crate::{
    config::{LabelRequirement, StatisticKind},
    data::{FeatureTable, Groups, Labels},
    error::{DsfdrError, Result},
    math::{average_rank, center, tie_sum},
};

/// Pooled standard deviations below this fraction of a row's overall standard
/// deviation are treated as zero spread
const POOLED_SD_FLOOR: f64 = 1e-6;

/// A statistic bound to one table and one label vector
#[derive(Debug, Clone)]
pub struct PreparedStatistic {
    kind: StatisticKind,
    n_features: usize,
    n_samples: usize,
    kernel: Kernel,
}

#[derive(Debug, Clone)]
enum Kernel {
    MeanDiff {
        rows: Vec<f64>,
        groups: Groups,
    },
    StdMeanDiff {
        centered: Vec<f64>,
        /// Overall standard deviation of every row
        scales: Vec<f64>,
        groups: Groups,
    },
    MannWhitney {
        ranks: Vec<f64>,
        groups: Groups,
    },
    KruskalWallis {
        ranks: Vec<f64>,
        tie_corrections: Vec<f64>,
        groups: Groups,
    },
    Correlation {
        centered: Vec<f64>,
        norms: Vec<f64>,
        labels: Vec<f64>,
        label_norm: f64,
    },
    NonZeroCorrelation {
        features: Vec<NonZeroFeature>,
    },
}

/// Correlation inputs restricted to the samples where a feature is present
#[derive(Debug, Clone)]
struct NonZeroFeature {
    /// Membership of every sample in the non-zero subset
    member: Vec<bool>,
    /// Centered values of the subset in ascending sample order
    values: Vec<f64>,
    norm: f64,
    /// Centered labels of the subset indexed by sample, zero outside the subset
    labels: Vec<f64>,
    label_norm: f64,
}

impl NonZeroFeature {
    fn new(raw: &[f64], row: &[f64], labels: &[f64], ranked: bool) -> Self {
        let member = raw.iter().map(|v| *v > 0.0).collect::<Vec<_>>();
        let subset = (0..raw.len()).filter(|&j| member[j]).collect::<Vec<_>>();

        let mut values = subset.iter().map(|&j| row[j]).collect::<Vec<_>>();
        let mut sub_labels = subset.iter().map(|&j| labels[j]).collect::<Vec<_>>();
        if ranked {
            values = average_rank(&values);
            sub_labels = average_rank(&sub_labels);
        }

        let (values, norm) = center(&values);
        let (sub_labels, label_norm) = center(&sub_labels);
        let mut dense = vec![0.0; raw.len()];
        for (&j, l) in subset.iter().zip(sub_labels) {
            dense[j] = l;
        }

        Self {
            member,
            values,
            norm,
            labels: dense,
            label_norm,
        }
    }

    /// Correlation under `order`, walking the order and keeping only member samples
    /// yields the permutation it induces on the subset
    fn evaluate(&self, order: &[usize]) -> f64 {
        if self.values.len() < 2 {
            return 0.0;
        }
        let denom = self.norm * self.label_norm;
        if denom == 0.0 {
            return 0.0;
        }
        let mut slot = 0;
        let mut dot = 0.0;
        for &source in order {
            if self.member[source] {
                dot += self.values[slot] * self.labels[source];
                slot += 1;
            }
        }
        dot / denom
    }
}

fn check_cardinality(kind: StatisticKind, groups: &Groups) -> Result<()> {
    let found = groups.n_groups();
    let expected = match kind.label_requirement() {
        LabelRequirement::TwoGroups if found != 2 => "exactly 2",
        LabelRequirement::Groups if found < 2 => "at least 2",
        _ => return Ok(()),
    };
    Err(DsfdrError::InvalidLabelCardinality {
        statistic: kind.to_string(),
        expected: expected.to_string(),
        found,
    })
}

fn map_rows<F: FnMut(&[f64]) -> Vec<f64>>(table: &FeatureTable, f: F) -> Vec<f64> {
    table.rows().flat_map(f).collect()
}

impl StatisticKind {
    /// Prepares the statistic for repeated evaluation
    ///
    /// `raw` is the untransformed table, used only for the non-zero masks of the
    /// zero-aware correlations. `transformed` supplies the values.
    pub fn prepare(
        &self,
        raw: &FeatureTable,
        transformed: &FeatureTable,
        labels: &Labels,
    ) -> Result<PreparedStatistic> {
        if labels.len() != transformed.n_samples() {
            return Err(DsfdrError::DimensionMismatch {
                expected: transformed.n_samples(),
                actual: labels.len(),
            });
        }
        if raw.n_samples() != transformed.n_samples() || raw.n_features() != transformed.n_features() {
            return Err(DsfdrError::DimensionMismatch {
                expected: transformed.n_features() * transformed.n_samples(),
                actual: raw.n_features() * raw.n_samples(),
            });
        }

        let kernel = match self.label_requirement() {
            LabelRequirement::TwoGroups | LabelRequirement::Groups => {
                let groups = labels.groups();
                check_cardinality(*self, &groups)?;
                match self {
                    StatisticKind::MeanDiff => Kernel::MeanDiff {
                        rows: map_rows(transformed, <[f64]>::to_vec),
                        groups,
                    },
                    StatisticKind::StdMeanDiff => {
                        let dof = (transformed.n_samples() - 1) as f64;
                        let mut scales = Vec::with_capacity(transformed.n_features());
                        let centered = map_rows(transformed, |row| {
                            let (c, norm) = center(row);
                            scales.push(norm / dof.sqrt());
                            c
                        });
                        Kernel::StdMeanDiff {
                            centered,
                            scales,
                            groups,
                        }
                    }
                    StatisticKind::MannWhitney => Kernel::MannWhitney {
                        ranks: map_rows(transformed, average_rank),
                        groups,
                    },
                    _ => {
                        let n = transformed.n_samples() as f64;
                        let tie_corrections = transformed
                            .rows()
                            .map(|row| 1.0 - tie_sum(row) / (n * n * n - n))
                            .collect();
                        Kernel::KruskalWallis {
                            ranks: map_rows(transformed, average_rank),
                            tie_corrections,
                            groups,
                        }
                    }
                }
            }
            LabelRequirement::Continuous => match self {
                StatisticKind::Spearman | StatisticKind::Pearson => {
                    let ranked = *self == StatisticKind::Spearman;
                    let (labels, label_norm) = if ranked {
                        center(&average_rank(labels.values()))
                    } else {
                        center(labels.values())
                    };
                    let mut norms = Vec::with_capacity(transformed.n_features());
                    let centered = map_rows(transformed, |row| {
                        let (c, norm) = if ranked {
                            center(&average_rank(row))
                        } else {
                            center(row)
                        };
                        norms.push(norm);
                        c
                    });
                    Kernel::Correlation {
                        centered,
                        norms,
                        labels,
                        label_norm,
                    }
                }
                _ => {
                    let ranked = *self == StatisticKind::NonZeroSpearman;
                    let features = raw
                        .rows()
                        .zip(transformed.rows())
                        .map(|(r, t)| NonZeroFeature::new(r, t, labels.values(), ranked))
                        .collect();
                    Kernel::NonZeroCorrelation { features }
                }
            },
        };

        Ok(PreparedStatistic {
            kind: *self,
            n_features: transformed.n_features(),
            n_samples: transformed.n_samples(),
            kernel,
        })
    }

    /// Computes the statistic of a single row against the labels
    ///
    /// The row serves both as the values and as the non-zero mask.
    pub fn compute(&self, row: &[f64], labels: &Labels) -> Result<f64> {
        let table = FeatureTable::from_raw(1, row.len(), row.to_vec());
        let prepared = self.prepare(&table, &table, labels)?;
        Ok(prepared.observed()[0])
    }
}

impl PreparedStatistic {
    pub fn kind(&self) -> StatisticKind {
        self.kind
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Statistics under the true label assignment
    pub fn observed(&self) -> Vec<f64> {
        let identity = (0..self.n_samples).collect::<Vec<_>>();
        let mut out = vec![0.0; self.n_features];
        self.evaluate(&identity, &mut out);
        out
    }

    /// Writes the statistic of every feature under `order` into `out`
    pub fn evaluate(&self, order: &[usize], out: &mut [f64]) {
        debug_assert_eq!(order.len(), self.n_samples);
        debug_assert_eq!(out.len(), self.n_features);
        let n = self.n_samples;
        if n == 0 {
            out.fill(0.0);
            return;
        }

        match &self.kernel {
            Kernel::MeanDiff { rows, groups } => {
                let permuted = permute_groups(groups, order);
                let (n0, n1) = (groups.sizes[0] as f64, groups.sizes[1] as f64);
                for (stat, row) in out.iter_mut().zip(rows.chunks_exact(n)) {
                    let mut sums = [0.0_f64; 2];
                    for (v, g) in row.iter().zip(&permuted) {
                        sums[*g] += v;
                    }
                    *stat = sums[1] / n1 - sums[0] / n0;
                }
            }
            Kernel::StdMeanDiff {
                centered,
                scales,
                groups,
            } => {
                let permuted = permute_groups(groups, order);
                let (n0, n1) = (groups.sizes[0] as f64, groups.sizes[1] as f64);
                let df = n0 + n1 - 2.0;
                for ((stat, row), scale) in out
                    .iter_mut()
                    .zip(centered.chunks_exact(n))
                    .zip(scales)
                {
                    let mut sums = [0.0_f64; 2];
                    let mut squares = [0.0_f64; 2];
                    for (v, g) in row.iter().zip(&permuted) {
                        sums[*g] += v;
                        squares[*g] += v * v;
                    }
                    let diff = sums[1] / n1 - sums[0] / n0;
                    // constant rows and balanced splits carry no signal
                    if *scale == 0.0 || diff.abs() <= 1e-12 * scale {
                        *stat = 0.0;
                        continue;
                    }
                    let ss0 = squares[0] - sums[0] * sums[0] / n0;
                    let ss1 = squares[1] - sums[1] * sums[1] / n1;
                    let pooled = if df > 0.0 { ((ss0 + ss1) / df).max(0.0).sqrt() } else { 0.0 };
                    // groups without internal spread are bounded by the floor, so
                    // rounding residue cannot decide between zero and a huge value
                    *stat = diff / pooled.max(POOLED_SD_FLOOR * scale);
                }
            }
            Kernel::MannWhitney { ranks, groups } => {
                let permuted = permute_groups(groups, order);
                let (n0, n1) = (groups.sizes[0] as f64, groups.sizes[1] as f64);
                let offset = n1 * (n1 + 1.0) / 2.0 + n0 * n1 / 2.0;
                for (stat, row) in out.iter_mut().zip(ranks.chunks_exact(n)) {
                    let rank_sum = row
                        .iter()
                        .zip(&permuted)
                        .filter(|(_, g)| **g == 1)
                        .map(|(r, _)| r)
                        .sum::<f64>();
                    *stat = rank_sum - offset;
                }
            }
            Kernel::KruskalWallis {
                ranks,
                tie_corrections,
                groups,
            } => {
                let permuted = permute_groups(groups, order);
                let total = n as f64;
                let mut sums = vec![0.0_f64; groups.n_groups()];
                for ((stat, row), correction) in out
                    .iter_mut()
                    .zip(ranks.chunks_exact(n))
                    .zip(tie_corrections)
                {
                    if *correction <= 0.0 {
                        *stat = 0.0;
                        continue;
                    }
                    sums.iter_mut().for_each(|s| *s = 0.0);
                    for (r, g) in row.iter().zip(&permuted) {
                        sums[*g] += r;
                    }
                    let between = sums
                        .iter()
                        .zip(&groups.sizes)
                        .map(|(s, size)| s * s / *size as f64)
                        .sum::<f64>();
                    let h = 12.0 / (total * (total + 1.0)) * between - 3.0 * (total + 1.0);
                    *stat = h / correction;
                }
            }
            Kernel::Correlation {
                centered,
                norms,
                labels,
                label_norm,
            } => {
                let permuted = order.iter().map(|&j| labels[j]).collect::<Vec<_>>();
                for ((stat, row), norm) in out.iter_mut().zip(centered.chunks_exact(n)).zip(norms) {
                    let denom = norm * label_norm;
                    *stat = if denom == 0.0 {
                        0.0
                    } else {
                        row.iter().zip(&permuted).map(|(v, l)| v * l).sum::<f64>() / denom
                    };
                }
            }
            Kernel::NonZeroCorrelation { features } => {
                for (stat, feature) in out.iter_mut().zip(features) {
                    *stat = feature.evaluate(order);
                }
            }
        }
    }
}

fn permute_groups(groups: &Groups, order: &[usize]) -> Vec<usize> {
    order.iter().map(|&j| groups.index[j]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::pearson;
    use approx::assert_relative_eq;

    fn labels(values: &[f64]) -> Labels {
        Labels::new(values.to_vec()).unwrap()
    }

    #[test]
    fn test_mean_diff() {
        let stat = StatisticKind::MeanDiff
            .compute(&[1.0, 2.0, 3.0, 7.0, 8.0, 9.0], &labels(&[0., 0., 0., 1., 1., 1.]))
            .unwrap();
        assert_relative_eq!(stat, 6.0);
    }

    #[test]
    fn test_mean_diff_orientation_follows_label_order() {
        // the larger label value is always group 1
        let stat = StatisticKind::MeanDiff
            .compute(&[1.0, 2.0, 3.0, 7.0], &labels(&[5., 5., 2., 2.]))
            .unwrap();
        assert_relative_eq!(stat, -3.5);
    }

    #[test]
    fn test_std_mean_diff() {
        // group variances are both 1, pooled sd 1
        let stat = StatisticKind::StdMeanDiff
            .compute(&[1.0, 2.0, 3.0, 3.0, 4.0, 5.0], &labels(&[0., 0., 0., 1., 1., 1.]))
            .unwrap();
        assert_relative_eq!(stat, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_std_mean_diff_zero_variance() {
        let stat = StatisticKind::StdMeanDiff
            .compute(&[4.0, 4.0, 4.0, 4.0], &labels(&[0., 0., 1., 1.]))
            .unwrap();
        assert_relative_eq!(stat, 0.0);
    }

    #[test]
    fn test_std_mean_diff_without_group_spread() {
        let labels = labels(&[0., 0., 0., 1., 1., 1.]);
        let separated = StatisticKind::StdMeanDiff
            .compute(&[0.0, 0.0, 0.0, 5.0, 5.0, 5.0], &labels)
            .unwrap();
        assert!(separated.is_finite() && separated > 0.0);
        // the statistic is scale free, residue from inexact values does not matter
        let shifted = StatisticKind::StdMeanDiff
            .compute(&[0.3, 0.3, 0.3, 0.7, 0.7, 0.7], &labels)
            .unwrap();
        assert_relative_eq!(separated, shifted, max_relative = 1e-6);
        let reversed = StatisticKind::StdMeanDiff
            .compute(&[2.0, 2.0, 2.0, 1.0, 1.0, 1.0], &labels)
            .unwrap();
        assert_relative_eq!(reversed, -separated, max_relative = 1e-6);
    }

    #[test]
    fn test_mann_whitney() {
        // complete separation: U1 = n0 * n1 = 9, centered by n0 * n1 / 2
        let stat = StatisticKind::MannWhitney
            .compute(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &labels(&[0., 0., 0., 1., 1., 1.]))
            .unwrap();
        assert_relative_eq!(stat, 4.5);

        let stat = StatisticKind::MannWhitney
            .compute(&[6.0, 5.0, 4.0, 3.0, 2.0, 1.0], &labels(&[0., 0., 0., 1., 1., 1.]))
            .unwrap();
        assert_relative_eq!(stat, -4.5);
    }

    #[test]
    fn test_kruskal_wallis() {
        // ranks 1..6 in three separated groups: H = 12/42 * (9/2 + 49/2 + 121/2) - 21
        let stat = StatisticKind::KruskalWallis
            .compute(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &labels(&[0., 0., 1., 1., 2., 2.]))
            .unwrap();
        assert_relative_eq!(stat, 12.0 / 42.0 * 89.5 - 21.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kruskal_wallis_all_tied() {
        let stat = StatisticKind::KruskalWallis
            .compute(&[0.0; 6], &labels(&[0., 0., 1., 1., 2., 2.]))
            .unwrap();
        assert_relative_eq!(stat, 0.0);
    }

    #[test]
    fn test_pearson_and_spearman() {
        let row = [1.0, 4.0, 9.0, 16.0, 25.0];
        let covariate = [1.0, 2.0, 3.0, 4.0, 5.0];
        let p = StatisticKind::Pearson.compute(&row, &labels(&covariate)).unwrap();
        assert_relative_eq!(p, pearson(&row, &covariate), epsilon = 1e-12);
        let s = StatisticKind::Spearman.compute(&row, &labels(&covariate)).unwrap();
        assert_relative_eq!(s, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nonzero_correlation_ignores_zeros() {
        let row = [0.0, 2.0, 0.0, 4.0, 6.0];
        let covariate = [9.0, 1.0, -3.0, 2.0, 3.0];
        let stat = StatisticKind::NonZeroPearson.compute(&row, &labels(&covariate)).unwrap();
        assert_relative_eq!(stat, 1.0, epsilon = 1e-12);
        let stat = StatisticKind::NonZeroSpearman.compute(&row, &labels(&covariate)).unwrap();
        assert_relative_eq!(stat, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nonzero_correlation_sentinel() {
        let stat = StatisticKind::NonZeroSpearman
            .compute(&[0.0, 0.0, 3.0, 0.0], &labels(&[1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        assert_relative_eq!(stat, 0.0);
        let stat = StatisticKind::NonZeroPearson
            .compute(&[0.0; 4], &labels(&[1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        assert_relative_eq!(stat, 0.0);
    }

    #[test]
    fn test_label_cardinality() {
        let err = StatisticKind::MeanDiff
            .compute(&[1.0, 2.0, 3.0], &labels(&[0., 1., 2.]))
            .unwrap_err();
        assert!(matches!(err, DsfdrError::InvalidLabelCardinality { found: 3, .. }));

        let err = StatisticKind::KruskalWallis
            .compute(&[1.0, 2.0, 3.0], &labels(&[1., 1., 1.]))
            .unwrap_err();
        assert!(matches!(err, DsfdrError::InvalidLabelCardinality { found: 1, .. }));

        // continuous statistics accept any label vector
        assert!(StatisticKind::Pearson
            .compute(&[1.0, 2.0, 3.0], &labels(&[1., 1., 1.]))
            .is_ok());
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = StatisticKind::Pearson
            .compute(&[1.0, 2.0, 3.0], &labels(&[1., 2.]))
            .unwrap_err();
        assert!(matches!(
            err,
            DsfdrError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_evaluate_matches_relabelled_compute() {
        let raw = FeatureTable::from_rows(vec![
            vec![0.0, 3.0, 1.0, 0.0, 8.0, 2.0],
            vec![5.0, 0.0, 0.0, 2.0, 1.0, 7.0],
        ])
        .unwrap();
        let order = [4, 2, 5, 0, 3, 1];
        let continuous = [0.0, 0.0, 1.0, 1.0, 2.0, 3.5];
        let binary = [0.0, 1.0, 0.0, 1.0, 1.0, 0.0];

        for (kind, truth) in [
            (StatisticKind::MeanDiff, binary),
            (StatisticKind::StdMeanDiff, binary),
            (StatisticKind::MannWhitney, binary),
            (StatisticKind::KruskalWallis, binary),
            (StatisticKind::Spearman, continuous),
            (StatisticKind::Pearson, continuous),
        ] {
            let relabelled = order.iter().map(|&j| truth[j]).collect::<Vec<_>>();
            let prepared = kind.prepare(&raw, &raw, &labels(&truth)).unwrap();
            let mut out = vec![0.0; 2];
            prepared.evaluate(&order, &mut out);
            for (i, stat) in out.iter().enumerate() {
                let expected = kind.compute(raw.row(i), &labels(&relabelled)).unwrap();
                assert_relative_eq!(*stat, expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_nonzero_permutation_is_induced_on_subset() {
        let raw = FeatureTable::from_rows(vec![vec![0.0, 3.0, 1.0, 0.0, 8.0, 2.0]]).unwrap();
        let truth = [0.0, 0.0, 1.0, 1.0, 2.0, 3.5];
        // non-zero samples are 1, 2, 4, 5 and the order visits them as 4, 2, 5, 1
        let order = [4, 2, 5, 0, 3, 1];
        let subset_values = [3.0, 1.0, 8.0, 2.0];
        let subset_labels = [truth[4], truth[2], truth[5], truth[1]];

        for kind in [StatisticKind::NonZeroSpearman, StatisticKind::NonZeroPearson] {
            let prepared = kind.prepare(&raw, &raw, &labels(&truth)).unwrap();
            let mut out = vec![0.0];
            prepared.evaluate(&order, &mut out);
            let expected = kind.compute(&subset_values, &labels(&subset_labels)).unwrap();
            assert_relative_eq!(out[0], expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_observed_is_identity_evaluation() {
        let raw = FeatureTable::from_rows(vec![vec![1.0, 0.0, 4.0, 2.0], vec![0.0, 0.0, 3.0, 9.0]]).unwrap();
        let prepared = StatisticKind::MeanDiff
            .prepare(&raw, &raw, &labels(&[0., 0., 1., 1.]))
            .unwrap();
        assert_eq!(prepared.n_features(), 2);
        assert_eq!(prepared.n_samples(), 4);
        assert_eq!(prepared.kind(), StatisticKind::MeanDiff);
        let observed = prepared.observed();
        assert_relative_eq!(observed[0], 2.5);
        assert_relative_eq!(observed[1], 6.0);
    }
}
