use std::{fmt, str::FromStr};

use crate::error::DsfdrError;

/// Transformation applied to every feature row before a statistic is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformKind {
    /// Within-row ranks, ties receive their average rank
    #[default]
    Rank,
    /// Natural log of `value + 1`
    Log,
    /// Presence/absence indicator
    PresenceAbsence,
    /// Each row divided by its sum
    Normalize,
}

impl TransformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformKind::Rank => "rank",
            TransformKind::Log => "log",
            TransformKind::PresenceAbsence => "pa",
            TransformKind::Normalize => "norm",
        }
    }
}

impl FromStr for TransformKind {
    type Err = DsfdrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rank" | "rankdata" => Ok(TransformKind::Rank),
            "log" | "log2data" => Ok(TransformKind::Log),
            "pa" | "binarydata" => Ok(TransformKind::PresenceAbsence),
            "norm" | "normdata" => Ok(TransformKind::Normalize),
            _ => Err(DsfdrError::InvalidTransform {
                received: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-feature test statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatisticKind {
    #[default]
    MeanDiff,
    MannWhitney,
    KruskalWallis,
    StdMeanDiff,
    Spearman,
    Pearson,
    NonZeroSpearman,
    NonZeroPearson,
}

/// Constraint a statistic places on the number of distinct label values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelRequirement {
    /// Exactly two groups
    TwoGroups,
    /// Two or more groups
    Groups,
    /// Labels are treated as a continuous covariate
    Continuous,
}

impl StatisticKind {
    pub const ALL: [StatisticKind; 8] = [
        StatisticKind::MeanDiff,
        StatisticKind::MannWhitney,
        StatisticKind::KruskalWallis,
        StatisticKind::StdMeanDiff,
        StatisticKind::Spearman,
        StatisticKind::Pearson,
        StatisticKind::NonZeroSpearman,
        StatisticKind::NonZeroPearson,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticKind::MeanDiff => "meandiff",
            StatisticKind::MannWhitney => "mannwhitney",
            StatisticKind::KruskalWallis => "kruwallis",
            StatisticKind::StdMeanDiff => "stdmeandiff",
            StatisticKind::Spearman => "spearman",
            StatisticKind::Pearson => "pearson",
            StatisticKind::NonZeroSpearman => "nonzerospearman",
            StatisticKind::NonZeroPearson => "nonzeropearson",
        }
    }

    pub fn label_requirement(&self) -> LabelRequirement {
        match self {
            StatisticKind::MeanDiff | StatisticKind::StdMeanDiff | StatisticKind::MannWhitney => {
                LabelRequirement::TwoGroups
            }
            StatisticKind::KruskalWallis => LabelRequirement::Groups,
            StatisticKind::Spearman
            | StatisticKind::Pearson
            | StatisticKind::NonZeroSpearman
            | StatisticKind::NonZeroPearson => LabelRequirement::Continuous,
        }
    }
}

impl FromStr for StatisticKind {
    type Err = DsfdrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meandiff" => Ok(StatisticKind::MeanDiff),
            "mannwhitney" | "mannwhiteny" => Ok(StatisticKind::MannWhitney),
            "kruwallis" => Ok(StatisticKind::KruskalWallis),
            "stdmeandiff" => Ok(StatisticKind::StdMeanDiff),
            "spearman" => Ok(StatisticKind::Spearman),
            "pearson" => Ok(StatisticKind::Pearson),
            "nonzerospearman" => Ok(StatisticKind::NonZeroSpearman),
            "nonzeropearson" => Ok(StatisticKind::NonZeroPearson),
            _ => Err(DsfdrError::UnknownStatistic {
                received: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for StatisticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multiple testing procedure applied to the permutation p-values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FdrMethod {
    /// Discrete FDR: thresholds drawn from the achievable p-value grid
    #[default]
    DsFdr,
    /// Benjamini-Hochberg
    Bh,
    /// Benjamini-Yekutieli
    By,
    /// Benjamini-Hochberg after discarding features that cannot reach alpha
    FilterBh,
}

impl FdrMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FdrMethod::DsFdr => "dsfdr",
            FdrMethod::Bh => "bhfdr",
            FdrMethod::By => "byfdr",
            FdrMethod::FilterBh => "filterBH",
        }
    }
}

impl FromStr for FdrMethod {
    type Err = DsfdrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dsfdr" => Ok(FdrMethod::DsFdr),
            "bhfdr" => Ok(FdrMethod::Bh),
            "byfdr" => Ok(FdrMethod::By),
            "filterBH" => Ok(FdrMethod::FilterBh),
            _ => Err(DsfdrError::UnknownFdrMethod {
                received: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for FdrMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
