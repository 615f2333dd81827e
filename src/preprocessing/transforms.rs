//! Power transforms
//!
//! Yeo-Johnson and Box-Cox transforms with a per-column lambda estimated by
//! maximum likelihood: a coarse grid search over [-2, 2] followed by a finer
//! search around the best coarse value.

use super::{
    column_series, float_series, numeric_values, require_columns, FittedTransformer, Transformer,
};
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

const LAMBDA_BOUND: f64 = 2.0;
const COARSE_STEP: f64 = 0.1;
const FINE_STEP: f64 = 0.01;

/// Variance-stabilizing transform family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerMethod {
    /// Defined for any real input
    #[default]
    YeoJohnson,
    /// Requires strictly positive input; other values pass through
    BoxCox,
}

impl PowerMethod {
    /// Apply the transform to a single value
    pub fn apply(&self, x: f64, lambda: f64) -> f64 {
        match self {
            PowerMethod::YeoJohnson => yeojohnson_value(x, lambda),
            PowerMethod::BoxCox => {
                if x > 0.0 {
                    boxcox_value(x, lambda)
                } else {
                    x
                }
            }
        }
    }

    fn log_likelihood(&self, values: &[f64], lambda: f64) -> f64 {
        match self {
            PowerMethod::YeoJohnson => yeojohnson_log_likelihood(values, lambda),
            PowerMethod::BoxCox => boxcox_log_likelihood(values, lambda),
        }
    }

    /// Estimate lambda from the values the method accepts
    fn estimate_lambda(&self, values: &[f64]) -> f64 {
        let usable: Vec<f64> = match self {
            PowerMethod::YeoJohnson => values.to_vec(),
            PowerMethod::BoxCox => values.iter().copied().filter(|&x| x > 0.0).collect(),
        };
        if usable.len() < 2 {
            return 1.0;
        }

        let coarse = grid_search(-LAMBDA_BOUND, LAMBDA_BOUND, COARSE_STEP, |l| {
            self.log_likelihood(&usable, l)
        });
        let lo = (coarse - COARSE_STEP).max(-LAMBDA_BOUND);
        let hi = (coarse + COARSE_STEP).min(LAMBDA_BOUND);
        grid_search(lo, hi, FINE_STEP, |l| self.log_likelihood(&usable, l))
    }
}

/// Best lambda on an evenly spaced grid; the first maximum wins
fn grid_search(lo: f64, hi: f64, step: f64, score: impl Fn(f64) -> f64) -> f64 {
    let steps = ((hi - lo) / step).round() as i64;
    let mut best_lambda = 1.0;
    let mut best_ll = f64::NEG_INFINITY;

    for i in 0..=steps {
        // Round to kill accumulated float noise in the grid point
        let lambda = ((lo + i as f64 * step) * 1e6).round() / 1e6;
        let ll = score(lambda);
        if ll > best_ll {
            best_ll = ll;
            best_lambda = lambda;
        }
    }

    best_lambda
}

fn boxcox_value(x: f64, lambda: f64) -> f64 {
    if lambda.abs() < 1e-10 {
        x.ln()
    } else {
        (x.powf(lambda) - 1.0) / lambda
    }
}

fn yeojohnson_value(x: f64, lambda: f64) -> f64 {
    if x >= 0.0 {
        if lambda.abs() < 1e-10 {
            x.ln_1p()
        } else {
            ((x + 1.0).powf(lambda) - 1.0) / lambda
        }
    } else if (lambda - 2.0).abs() < 1e-10 {
        -(-x).ln_1p()
    } else {
        -(((-x + 1.0).powf(2.0 - lambda) - 1.0) / (2.0 - lambda))
    }
}

fn population_variance(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|&t| (t - mean).powi(2)).sum::<f64>() / n
}

fn boxcox_log_likelihood(values: &[f64], lambda: f64) -> f64 {
    let n = values.len() as f64;
    let transformed: Vec<f64> = values.iter().map(|&x| boxcox_value(x, lambda)).collect();
    let variance = population_variance(&transformed);
    if variance <= 0.0 || !variance.is_finite() {
        return f64::NEG_INFINITY;
    }

    let log_jacobian: f64 = values.iter().map(|&x| x.ln()).sum();
    -n / 2.0 * variance.ln() + (lambda - 1.0) * log_jacobian
}

fn yeojohnson_log_likelihood(values: &[f64], lambda: f64) -> f64 {
    let n = values.len() as f64;
    let transformed: Vec<f64> = values.iter().map(|&x| yeojohnson_value(x, lambda)).collect();
    let variance = population_variance(&transformed);
    if variance <= 0.0 || !variance.is_finite() {
        return f64::NEG_INFINITY;
    }

    let log_jacobian: f64 = values.iter().map(|&x| x.abs().ln_1p().copysign(x)).sum();
    -n / 2.0 * variance.ln() + (lambda - 1.0) * log_jacobian
}

/// Power transform over a set of numeric columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerTransformer {
    variables: Vec<String>,
    method: PowerMethod,
}

/// Power transformer with one learned lambda per column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPowerTransformer {
    method: PowerMethod,
    lambdas: Vec<(String, f64)>,
}

impl PowerTransformer {
    const NAME: &'static str = "power_transformer";

    pub fn new(variables: Vec<String>, method: PowerMethod) -> Self {
        Self { variables, method }
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn method(&self) -> PowerMethod {
        self.method
    }
}

impl Transformer for PowerTransformer {
    type Fitted = FittedPowerTransformer;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&self, x: &DataFrame, _y: Option<&[f64]>) -> Result<Self::Fitted> {
        require_columns(x, Self::NAME, &self.variables)?;

        let mut lambdas = Vec::with_capacity(self.variables.len());
        for col_name in &self.variables {
            let series = column_series(x, Self::NAME, col_name)?;
            let observed: Vec<f64> = numeric_values(series)?.into_iter().flatten().collect();
            lambdas.push((col_name.clone(), self.method.estimate_lambda(&observed)));
        }

        Ok(FittedPowerTransformer {
            method: self.method,
            lambdas,
        })
    }
}

impl FittedPowerTransformer {
    /// Learned lambda for a column
    pub fn lambda(&self, column: &str) -> Option<f64> {
        self.lambdas
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, l)| *l)
    }
}

impl FittedTransformer for FittedPowerTransformer {
    fn name(&self) -> &'static str {
        PowerTransformer::NAME
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        let columns: Vec<String> = self.lambdas.iter().map(|(c, _)| c.clone()).collect();
        require_columns(x, PowerTransformer::NAME, &columns)?;

        let mut result = x.clone();
        for (col_name, lambda) in &self.lambdas {
            let series = column_series(x, PowerTransformer::NAME, col_name)?;
            let transformed: Vec<Option<f64>> = numeric_values(series)?
                .into_iter()
                .map(|v| v.map(|x| self.method.apply(x, *lambda)))
                .collect();
            result.with_column(float_series(series.name().clone(), transformed))?;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    fn skewed() -> Vec<f64> {
        vec![1.0, 1.5, 2.0, 2.2, 3.0, 4.0, 6.0, 9.0, 15.0, 40.0, 120.0]
    }

    #[test]
    fn test_yeojohnson_identity_at_one() {
        for x in [-3.0, -0.5, 0.0, 0.5, 7.0] {
            assert!((yeojohnson_value(x, 1.0) - x).abs() < 1e-12);
        }
    }

    #[test]
    fn test_lambda_within_bounds_and_reduces_skew() {
        let df = df!("fare" => skewed()).unwrap();
        let fitted = PowerTransformer::new(vec!["fare".to_string()], PowerMethod::YeoJohnson)
            .fit(&df, None)
            .unwrap();

        let lambda = fitted.lambda("fare").unwrap();
        assert!((-2.0..=2.0).contains(&lambda));
        assert!(lambda < 1.0, "right-skewed data should shrink, got lambda {lambda}");
    }

    #[test]
    fn test_transform_is_monotonic() {
        let df = df!("fare" => skewed()).unwrap();
        let fitted = PowerTransformer::new(vec!["fare".to_string()], PowerMethod::YeoJohnson)
            .fit(&df, None)
            .unwrap();
        let result = fitted.transform(&df).unwrap();
        let values: Vec<f64> = result
            .column("fare")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_boxcox_passes_non_positive_through() {
        let train = df!("x" => skewed()).unwrap();
        let fitted = PowerTransformer::new(vec!["x".to_string()], PowerMethod::BoxCox)
            .fit(&train, None)
            .unwrap();

        let other = df!("x" => &[Some(-2.0), Some(0.0), None, Some(4.0)]).unwrap();
        let result = fitted.transform(&other).unwrap();
        let col = result.column("x").unwrap().f64().unwrap();
        assert_eq!(col.get(0), Some(-2.0));
        assert_eq!(col.get(1), Some(0.0));
        assert_eq!(col.get(2), None);
        assert!(col.get(3).unwrap().is_finite());
    }

    #[test]
    fn test_boxcox_without_positive_values_uses_identity_lambda() {
        let df = df!("x" => &[-1.0, -2.0, 0.0]).unwrap();
        let fitted = PowerTransformer::new(vec!["x".to_string()], PowerMethod::BoxCox)
            .fit(&df, None)
            .unwrap();
        assert_eq!(fitted.lambda("x"), Some(1.0));
    }

    #[test]
    fn test_rejects_string_column() {
        let df = df!("x" => &["a", "b"]).unwrap();
        let err = PowerTransformer::new(vec!["x".to_string()], PowerMethod::YeoJohnson)
            .fit(&df, None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::DataError(_)));
    }

    #[test]
    fn test_method_serde_names() {
        let m: PowerMethod = serde_json::from_str("\"box_cox\"").unwrap();
        assert_eq!(m, PowerMethod::BoxCox);
        assert_eq!(serde_json::to_string(&PowerMethod::YeoJohnson).unwrap(), "\"yeo_johnson\"");
    }
}
