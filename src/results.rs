use derive_new::new;

use crate::correction::Correction;

/// Outcome of a single feature
#[derive(Debug, Clone, Copy, PartialEq, new)]
pub struct FeatureResult {
    pub feature: usize,
    pub statistic: f64,
    pub pvalue: f64,
    pub reject: bool,
}

/// Per-feature outcomes of a run, in the order of the input table
#[derive(Debug, Clone, PartialEq)]
pub struct DsfdrResults {
    pub reject: Vec<bool>,
    pub statistics: Vec<f64>,
    pub pvalues: Vec<f64>,
    /// Largest rejected p-value, `None` when nothing was rejected
    pub threshold: Option<f64>,
    pub n_permutations: usize,
}

impl DsfdrResults {
    pub fn from_correction(statistics: Vec<f64>, correction: Correction, n_permutations: usize) -> Self {
        Self {
            reject: correction.reject,
            statistics,
            pvalues: correction.pvalues,
            threshold: correction.threshold,
            n_permutations,
        }
    }

    pub fn len(&self) -> usize {
        self.reject.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reject.is_empty()
    }

    pub fn n_rejected(&self) -> usize {
        self.reject.iter().filter(|r| **r).count()
    }

    pub fn get(&self, feature: usize) -> Option<FeatureResult> {
        Some(FeatureResult::new(
            feature,
            *self.statistics.get(feature)?,
            *self.pvalues.get(feature)?,
            *self.reject.get(feature)?,
        ))
    }

    pub fn iter(&self) -> impl Iterator<Item = FeatureResult> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }

    /// Consumes the results into the `(reject, statistics, pvalues)` triple
    pub fn into_parts(self) -> (Vec<bool>, Vec<f64>, Vec<f64>) {
        (self.reject, self.statistics, self.pvalues)
    }

    pub fn pprint(&self) {
        println!("Feature\tStatistic\tPValue\tReject");
        for result in self.iter() {
            println!(
                "{}\t{}\t{}\t{}",
                result.feature, result.statistic, result.pvalue, result.reject
            );
        }
    }
}
