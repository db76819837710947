//! DS-FDR: Discrete False Discovery Rate for sparse feature tables
//!
//! This library implements the discrete FDR permutation test, used to find
//! features (e.g. microbial taxa) whose abundance is associated with a sample
//! label while controlling the false discovery rate. Permutation p-values are
//! coarse and heavily tied on sparse, zero-inflated data; the discrete procedure
//! selects its rejection threshold on the grid of achievable p-values instead of
//! assuming continuous p-values.
//!
//! The main components of this library are:
//! - `TransformKind`: rank, log, presence/absence and normalization transforms
//! - `StatisticKind`: the per-feature test statistics
//! - `PermutationEngine`: the seeded, parallel null distribution builder
//! - `Corrector`: p-values and the discrete FDR (plus BH, BY and filtered BH)
//! - `Dsfdr`: the configured end-to-end test
//! - `DsfdrResults`: structure to hold and display the results

mod config;
mod correction;
mod data;
mod dsfdr;
mod error;
mod math;
mod permutation;
mod results;
mod statistic;
mod transform;

pub use config::{FdrMethod, LabelRequirement, StatisticKind, TransformKind};
pub use correction::{
    discrete_threshold, permutation_pvalue, testable_features, Correction, Corrector, FeatureGrid,
};
pub use data::{FeatureTable, Groups, Labels};
pub use dsfdr::{dsfdr, Dsfdr};
pub use error::{DsfdrError, Result};
pub use permutation::{permutation_order, NullDistribution, PermutationEngine};
pub use results::{DsfdrResults, FeatureResult};
pub use statistic::PreparedStatistic;
