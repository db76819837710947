use itertools::Itertools;

use crate::error::{DsfdrError, Result};

/// A dense features × samples abundance matrix stored row-major
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    n_features: usize,
    n_samples: usize,
    values: Vec<f64>,
}

impl FeatureTable {
    /// Builds a table from a flat row-major buffer
    ///
    /// Every value must be finite and non-negative.
    pub fn from_flat(n_features: usize, n_samples: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != n_features * n_samples {
            return Err(DsfdrError::DimensionMismatch {
                expected: n_features * n_samples,
                actual: values.len(),
            });
        }
        if let Some((idx, value)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(DsfdrError::InvalidValue {
                feature: idx / n_samples,
                sample: idx % n_samples,
                value: *value,
            });
        }
        Ok(Self {
            n_features,
            n_samples,
            values,
        })
    }

    /// Builds a table from one vector per feature
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_features = rows.len();
        let n_samples = rows.first().map_or(0, Vec::len);
        if let Some((row, r)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != n_samples)
        {
            return Err(DsfdrError::RaggedTable {
                row,
                expected: n_samples,
                actual: r.len(),
            });
        }
        Self::from_flat(n_features, n_samples, rows.into_iter().flatten().collect())
    }

    /// Wraps an already validated buffer
    pub(crate) fn from_raw(n_features: usize, n_samples: usize, values: Vec<f64>) -> Self {
        Self {
            n_features,
            n_samples,
            values,
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn row(&self, feature: usize) -> &[f64] {
        let start = feature * self.n_samples;
        &self.values[start..start + self.n_samples]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.n_features).map(move |i| self.row(i))
    }

    /// Number of strictly positive entries of a feature
    pub fn nonzero_count(&self, feature: usize) -> usize {
        self.row(feature).iter().filter(|v| **v > 0.0).count()
    }
}

/// One label per sample, aligned with the table's columns
#[derive(Debug, Clone, PartialEq)]
pub struct Labels {
    values: Vec<f64>,
}

impl Labels {
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if let Some((sample, value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(DsfdrError::InvalidLabel {
                sample,
                value: *value,
            });
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Encodes the labels as group indices, groups ordered by ascending label value
    pub fn groups(&self) -> Groups {
        let levels = self
            .values
            .iter()
            .copied()
            .sorted_by(f64::total_cmp)
            .dedup()
            .collect::<Vec<_>>();
        let mut sizes = vec![0; levels.len()];
        let index = self
            .values
            .iter()
            .map(|v| {
                // labels are finite so every value is present in `levels`
                let g = levels.partition_point(|l| l < v);
                sizes[g] += 1;
                g
            })
            .collect();
        Groups {
            levels,
            sizes,
            index,
        }
    }
}

impl TryFrom<Vec<f64>> for Labels {
    type Error = DsfdrError;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Self::new(values)
    }
}

/// Group encoding of a label vector
#[derive(Debug, Clone, PartialEq)]
pub struct Groups {
    /// Distinct label values in ascending order
    pub levels: Vec<f64>,
    /// Number of samples per group
    pub sizes: Vec<usize>,
    /// Group index of every sample
    pub index: Vec<usize>,
}

impl Groups {
    pub fn n_groups(&self) -> usize {
        self.levels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows() {
        let table = FeatureTable::from_rows(vec![vec![1.0, 0.0, 2.0], vec![0.0, 0.0, 5.0]]).unwrap();
        assert_eq!(table.n_features(), 2);
        assert_eq!(table.n_samples(), 3);
        assert_eq!(table.row(1), &[0.0, 0.0, 5.0]);
        assert_eq!(table.nonzero_count(0), 2);
        assert_eq!(table.rows().count(), 2);
    }

    #[test]
    fn test_ragged_rows() {
        let err = FeatureTable::from_rows(vec![vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(matches!(
            err,
            DsfdrError::RaggedTable {
                row: 1,
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_invalid_values() {
        let err = FeatureTable::from_flat(2, 2, vec![1.0, 2.0, -1.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            DsfdrError::InvalidValue {
                feature: 1,
                sample: 0,
                ..
            }
        ));
        assert!(FeatureTable::from_flat(1, 2, vec![f64::NAN, 0.0]).is_err());
        assert!(FeatureTable::from_flat(1, 3, vec![0.0, 0.0]).is_err());
    }

    #[test]
    fn test_empty_table() {
        let table = FeatureTable::from_flat(0, 4, vec![]).unwrap();
        assert_eq!(table.n_features(), 0);
        assert_eq!(table.n_samples(), 4);
    }

    #[test]
    fn test_groups() {
        let labels = Labels::new(vec![2.0, 0.5, 2.0, 7.0, 0.5]).unwrap();
        let groups = labels.groups();
        assert_eq!(groups.levels, vec![0.5, 2.0, 7.0]);
        assert_eq!(groups.sizes, vec![2, 2, 1]);
        assert_eq!(groups.index, vec![1, 0, 1, 2, 0]);
        assert_eq!(groups.n_groups(), 3);
    }

    #[test]
    fn test_invalid_labels() {
        assert!(Labels::new(vec![0.0, f64::INFINITY]).is_err());
        assert!(Labels::try_from(vec![0.0, 1.0]).is_ok());
    }
}
