//! Target-ordered ordinal encoding

use super::{
    categorical_values, column_series, float_series, require_columns, FittedTransformer,
    Transformer,
};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Code assigned to categories not seen at fit time, and to nulls
pub const UNSEEN_CODE: f64 = -1.0;

/// Maps each category to its rank by mean target value within the category.
///
/// Supervised: fitting requires the row-aligned target. Ranks start at 0 for
/// the category with the lowest mean; equal means are ordered by category name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdinalEncoder {
    variables: Vec<String>,
}

/// Ordinal encoder with learned category ranks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedOrdinalEncoder {
    mappings: Vec<(String, BTreeMap<String, f64>)>,
}

impl OrdinalEncoder {
    const NAME: &'static str = "ordinal_encoder";

    pub fn new(variables: Vec<String>) -> Self {
        Self { variables }
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }
}

/// Rank categories by ascending mean target, then by name
fn build_mapping(values: &[Option<String>], y: &[f64]) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for (val, target) in values.iter().zip(y) {
        if let Some(label) = val {
            let entry = sums.entry(label.as_str()).or_insert((0.0, 0));
            entry.0 += target;
            entry.1 += 1;
        }
    }

    let mut means: Vec<(&str, f64)> = sums
        .into_iter()
        .map(|(label, (sum, count))| (label, sum / count as f64))
        .collect();
    means.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));

    means
        .into_iter()
        .enumerate()
        .map(|(rank, (label, _))| (label.to_string(), rank as f64))
        .collect()
}

impl Transformer for OrdinalEncoder {
    type Fitted = FittedOrdinalEncoder;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&self, x: &DataFrame, y: Option<&[f64]>) -> Result<Self::Fitted> {
        let y = y.ok_or_else(|| {
            PipelineError::ValidationError(format!("{} requires the target at fit time", Self::NAME))
        })?;
        if y.len() != x.height() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} target values", x.height()),
                actual: format!("{} target values", y.len()),
            });
        }
        require_columns(x, Self::NAME, &self.variables)?;

        let mut mappings = Vec::with_capacity(self.variables.len());
        for col_name in &self.variables {
            let series = column_series(x, Self::NAME, col_name)?;
            let values = categorical_values(series)?;
            mappings.push((col_name.clone(), build_mapping(&values, y)));
        }

        Ok(FittedOrdinalEncoder { mappings })
    }
}

impl FittedOrdinalEncoder {
    /// Learned category ranks for a column
    pub fn mapping(&self, column: &str) -> Option<&BTreeMap<String, f64>> {
        self.mappings
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, m)| m)
    }
}

impl FittedTransformer for FittedOrdinalEncoder {
    fn name(&self) -> &'static str {
        OrdinalEncoder::NAME
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        let columns: Vec<String> = self.mappings.iter().map(|(c, _)| c.clone()).collect();
        require_columns(x, OrdinalEncoder::NAME, &columns)?;

        let mut result = x.clone();
        for (col_name, mapping) in &self.mappings {
            let series = column_series(x, OrdinalEncoder::NAME, col_name)?;
            let codes: Vec<Option<f64>> = categorical_values(series)?
                .into_iter()
                .map(|v| {
                    Some(
                        v.and_then(|label| mapping.get(&label).copied())
                            .unwrap_or(UNSEEN_CODE),
                    )
                })
                .collect();
            result.with_column(float_series(series.name().clone(), codes))?;
        }

        Ok(result)
    }
}
