//! Feature scaling

use super::{
    column_series, float_series, is_numeric_dtype, numeric_values, require_columns,
    FittedTransformer, Transformer,
};
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Standard scaling (z-score normalization): (x - mean) / std
///
/// Acts on every numeric column present at fit time, using the population
/// standard deviation. Constant columns are centered with a scale of 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler;

/// Parameters for a fitted scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    column: String,
    center: f64,
    scale: f64,
}

/// Standard scaler with learned per-column center and scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedStandardScaler {
    params: Vec<ScalerParams>,
}

impl StandardScaler {
    const NAME: &'static str = "standard_scaler";

    pub fn new() -> Self {
        Self
    }

    fn compute_params(column: &str, values: &[f64]) -> ScalerParams {
        if values.is_empty() {
            return ScalerParams {
                column: column.to_string(),
                center: 0.0,
                scale: 1.0,
            };
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();

        ScalerParams {
            column: column.to_string(),
            center: mean,
            scale: if std == 0.0 || !std.is_finite() { 1.0 } else { std },
        }
    }
}

impl Transformer for StandardScaler {
    type Fitted = FittedStandardScaler;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&self, x: &DataFrame, _y: Option<&[f64]>) -> Result<Self::Fitted> {
        let mut params = Vec::new();
        for column in x.get_columns() {
            let series = column.as_materialized_series();
            if !is_numeric_dtype(series.dtype()) {
                continue;
            }
            let observed: Vec<f64> = numeric_values(series)?.into_iter().flatten().collect();
            params.push(Self::compute_params(series.name().as_str(), &observed));
        }

        Ok(FittedStandardScaler { params })
    }
}

impl FittedStandardScaler {
    /// Learned (center, scale) for a column
    pub fn params(&self, column: &str) -> Option<(f64, f64)> {
        self.params
            .iter()
            .find(|p| p.column == column)
            .map(|p| (p.center, p.scale))
    }

    /// Columns scaled, in frame order at fit time
    pub fn columns(&self) -> Vec<String> {
        self.params.iter().map(|p| p.column.clone()).collect()
    }
}

impl FittedTransformer for FittedStandardScaler {
    fn name(&self) -> &'static str {
        StandardScaler::NAME
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        require_columns(x, StandardScaler::NAME, &self.columns())?;

        let mut result = x.clone();
        for p in &self.params {
            let series = column_series(x, StandardScaler::NAME, &p.column)?;
            let scaled: Vec<Option<f64>> = numeric_values(series)?
                .into_iter()
                .map(|v| v.map(|x| (x - p.center) / p.scale))
                .collect();
            result.with_column(float_series(series.name().clone(), scaled))?;
        }

        Ok(result)
    }
}
