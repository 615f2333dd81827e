//! Missing value imputation

use super::{
    categorical_values, column_series, float_series, numeric_values, require_columns,
    string_series, FittedTransformer, Transformer,
};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Replaces missing numeric values with the training median of each column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanMedianImputer {
    variables: Vec<String>,
}

/// Median imputer with learned fill values, in configured column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedMeanMedianImputer {
    fill_values: Vec<(String, f64)>,
}

impl MeanMedianImputer {
    const NAME: &'static str = "median_imputer";

    /// Create a new imputer for the given columns
    pub fn new(variables: Vec<String>) -> Self {
        Self { variables }
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }
}

/// Median of the observed values; `None` when nothing was observed
fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

impl Transformer for MeanMedianImputer {
    type Fitted = FittedMeanMedianImputer;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&self, x: &DataFrame, _y: Option<&[f64]>) -> Result<Self::Fitted> {
        require_columns(x, Self::NAME, &self.variables)?;

        let mut fill_values = Vec::with_capacity(self.variables.len());
        for col_name in &self.variables {
            let series = column_series(x, Self::NAME, col_name)?;
            let mut observed: Vec<f64> = numeric_values(series)?.into_iter().flatten().collect();
            let value = median(&mut observed).ok_or_else(|| {
                PipelineError::ValidationError(format!(
                    "column '{}' has no observed values to compute a median from",
                    col_name
                ))
            })?;
            fill_values.push((col_name.clone(), value));
        }

        Ok(FittedMeanMedianImputer { fill_values })
    }
}

impl FittedMeanMedianImputer {
    /// Learned fill value for a column
    pub fn fill_value(&self, column: &str) -> Option<f64> {
        self.fill_values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| *v)
    }
}

impl FittedTransformer for FittedMeanMedianImputer {
    fn name(&self) -> &'static str {
        MeanMedianImputer::NAME
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        let columns: Vec<String> = self.fill_values.iter().map(|(c, _)| c.clone()).collect();
        require_columns(x, MeanMedianImputer::NAME, &columns)?;

        let mut result = x.clone();
        for (col_name, fill) in &self.fill_values {
            let series = column_series(x, MeanMedianImputer::NAME, col_name)?;
            let filled: Vec<Option<f64>> = numeric_values(series)?
                .into_iter()
                .map(|v| Some(v.unwrap_or(*fill)))
                .collect();
            result.with_column(float_series(series.name().clone(), filled))?;
        }

        Ok(result)
    }
}

/// Replaces missing categorical values with the most frequent training category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalImputer {
    variables: Vec<String>,
}

/// Categorical imputer with learned modes, in configured column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedCategoricalImputer {
    fill_values: Vec<(String, String)>,
}

impl CategoricalImputer {
    const NAME: &'static str = "categorical_imputer";

    /// Create a new imputer for the given columns
    pub fn new(variables: Vec<String>) -> Self {
        Self { variables }
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }
}

/// Most frequent label; ties resolve to the smallest label
fn compute_mode(values: &[Option<String>]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for val in values.iter().flatten() {
        *counts.entry(val.as_str()).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (label, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label.to_string())
}

impl Transformer for CategoricalImputer {
    type Fitted = FittedCategoricalImputer;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&self, x: &DataFrame, _y: Option<&[f64]>) -> Result<Self::Fitted> {
        require_columns(x, Self::NAME, &self.variables)?;

        let mut fill_values = Vec::with_capacity(self.variables.len());
        for col_name in &self.variables {
            let series = column_series(x, Self::NAME, col_name)?;
            let values = categorical_values(series)?;
            let mode = compute_mode(&values).ok_or_else(|| {
                PipelineError::ValidationError(format!(
                    "column '{}' has no observed values to compute a mode from",
                    col_name
                ))
            })?;
            fill_values.push((col_name.clone(), mode));
        }

        Ok(FittedCategoricalImputer { fill_values })
    }
}

impl FittedCategoricalImputer {
    /// Learned fill value for a column
    pub fn fill_value(&self, column: &str) -> Option<&str> {
        self.fill_values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v.as_str())
    }
}

impl FittedTransformer for FittedCategoricalImputer {
    fn name(&self) -> &'static str {
        CategoricalImputer::NAME
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        let columns: Vec<String> = self.fill_values.iter().map(|(c, _)| c.clone()).collect();
        require_columns(x, CategoricalImputer::NAME, &columns)?;

        let mut result = x.clone();
        for (col_name, fill) in &self.fill_values {
            let series = column_series(x, CategoricalImputer::NAME, col_name)?;
            let filled: Vec<Option<String>> = categorical_values(series)?
                .into_iter()
                .map(|v| Some(v.unwrap_or_else(|| fill.clone())))
                .collect();
            result.with_column(string_series(series.name().clone(), filled))?;
        }

        Ok(result)
    }
}
