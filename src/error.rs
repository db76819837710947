use thiserror::Error;

#[derive(Error, Debug)]
pub enum DsfdrError {
    #[error("Invalid transform '{received}': expected one of rank, log, pa, norm")]
    InvalidTransform { received: String },

    #[error("Unknown statistic '{received}': expected one of meandiff, mannwhitney, kruwallis, stdmeandiff, spearman, pearson, nonzerospearman, nonzeropearson")]
    UnknownStatistic { received: String },

    #[error("Unknown FDR method '{received}': expected one of dsfdr, bhfdr, byfdr, filterBH")]
    UnknownFdrMethod { received: String },

    #[error("Statistic '{statistic}' requires {expected} distinct label values, found {found}")]
    InvalidLabelCardinality {
        statistic: String,
        expected: String,
        found: usize,
    },

    #[error("Invalid permutation count {received}: at least one permutation is required")]
    InvalidPermutationCount { received: usize },

    #[error("Invalid alpha {received}: must lie in the open interval (0, 1)")]
    InvalidAlpha { received: f64 },

    #[error("Dimension mismatch: table has {expected} samples, labels have {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid value {value} at feature {feature}, sample {sample}: abundances must be finite and non-negative")]
    InvalidValue {
        feature: usize,
        sample: usize,
        value: f64,
    },

    #[error("Ragged table: row {row} has {actual} samples, expected {expected}")]
    RaggedTable {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid label {value} at sample {sample}: labels must be finite")]
    InvalidLabel { sample: usize, value: f64 },

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, DsfdrError>;
