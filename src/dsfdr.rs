use bon::Builder;
use log::debug;
use rand::{thread_rng, Rng};

use crate::{
    config::{FdrMethod, StatisticKind, TransformKind},
    correction::{testable_features, Corrector},
    data::{FeatureTable, Labels},
    error::{DsfdrError, Result},
    permutation::PermutationEngine,
    results::DsfdrResults,
};

/// A configured discrete FDR permutation test
///
/// ```
/// use dsfdr::{Dsfdr, FeatureTable, Labels, StatisticKind};
///
/// let table = FeatureTable::from_rows(vec![
///     vec![0.0, 1.0, 0.0, 8.0, 9.0, 7.0],
///     vec![3.0, 2.0, 4.0, 3.0, 2.0, 4.0],
/// ])
/// .unwrap();
/// let labels = Labels::new(vec![0., 0., 0., 1., 1., 1.]).unwrap();
///
/// let results = Dsfdr::builder()
///     .statistic(StatisticKind::MeanDiff)
///     .permutations(200)
///     .seed(42)
///     .build()
///     .run(&table, &labels)
///     .unwrap();
/// assert_eq!(results.len(), 2);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct Dsfdr {
    #[builder(default)]
    transform: TransformKind,
    #[builder(default)]
    statistic: StatisticKind,
    #[builder(default)]
    fdr_method: FdrMethod,
    #[builder(default = 0.1)]
    alpha: f64,
    #[builder(default = 1000)]
    permutations: usize,
    /// Master seed, drawn from the thread rng when absent
    seed: Option<u64>,
    /// Worker threads, the global rayon pool is used when absent
    threads: Option<usize>,
}

impl Dsfdr {
    /// Run the discrete FDR test
    ///
    /// The run is a four-step process:
    /// 1. Transform the table
    /// 2. Compute the observed statistic of every feature
    /// 3. Build each feature's null distribution from shared label permutations
    /// 4. Convert to p-values and select the rejections
    ///
    /// Every argument is validated before any statistic is computed.
    pub fn run(&self, table: &FeatureTable, labels: &Labels) -> Result<DsfdrResults> {
        if labels.len() != table.n_samples() {
            return Err(DsfdrError::DimensionMismatch {
                expected: table.n_samples(),
                actual: labels.len(),
            });
        }
        // also checked by the engine, repeated so it fails before any statistic is computed
        if self.permutations == 0 {
            return Err(DsfdrError::InvalidPermutationCount {
                received: self.permutations,
            });
        }
        let corrector = Corrector::new(self.fdr_method, self.alpha)?;

        let testable = match self.fdr_method {
            FdrMethod::FilterBh => Some(testable_features(table, &labels.groups(), self.alpha)?),
            _ => None,
        };

        let seed = self.seed.unwrap_or_else(|| thread_rng().gen());
        debug!(
            "dsfdr: {} features x {} samples, transform={} statistic={} method={} alpha={} permutations={} seed={}",
            table.n_features(),
            table.n_samples(),
            self.transform,
            self.statistic,
            self.fdr_method,
            self.alpha,
            self.permutations,
            seed
        );

        let transformed = self.transform.apply(table);
        let statistic = self.statistic.prepare(table, &transformed, labels)?;
        let engine = PermutationEngine::new(&statistic, self.permutations, seed)?;
        let null = match self.threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?
                .install(|| engine.run()),
            None => engine.run(),
        };

        let observed = statistic.observed();
        let correction = corrector.correct(&observed, &null, testable.as_deref())?;
        Ok(DsfdrResults::from_correction(
            observed,
            correction,
            self.permutations,
        ))
    }
}

/// Runs the discrete FDR test with the default FDR method and an unseeded rng
///
/// Returns `(reject, statistics, pvalues)`, each aligned with the table's features.
pub fn dsfdr(
    table: &FeatureTable,
    labels: &Labels,
    transform: TransformKind,
    statistic: StatisticKind,
    alpha: f64,
    permutations: usize,
) -> Result<(Vec<bool>, Vec<f64>, Vec<f64>)> {
    let results = Dsfdr::builder()
        .transform(transform)
        .statistic(statistic)
        .alpha(alpha)
        .permutations(permutations)
        .build()
        .run(table, labels)?;
    Ok(results.into_parts())
}
