use crate::{config::TransformKind, data::FeatureTable, math::average_rank};

impl TransformKind {
    /// Transforms a single feature row
    pub fn apply_row(&self, row: &[f64]) -> Vec<f64> {
        match self {
            TransformKind::Rank => average_rank(row),
            TransformKind::Log => row.iter().map(|v| v.ln_1p()).collect(),
            TransformKind::PresenceAbsence => row
                .iter()
                .map(|v| if *v > 0.0 { 1.0 } else { 0.0 })
                .collect(),
            TransformKind::Normalize => {
                let total = row.iter().sum::<f64>();
                if total == 0.0 {
                    vec![0.0; row.len()]
                } else {
                    row.iter().map(|v| v / total).collect()
                }
            }
        }
    }

    /// Returns a transformed copy of the table, the input is left untouched
    pub fn apply(&self, table: &FeatureTable) -> FeatureTable {
        let values = table
            .rows()
            .flat_map(|row| self.apply_row(row))
            .collect::<Vec<_>>();
        FeatureTable::from_raw(table.n_features(), table.n_samples(), values)
    }
}
