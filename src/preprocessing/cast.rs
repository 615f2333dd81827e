//! Casting of numerically encoded discrete variables to categorical

use super::{
    categorical_values, column_series, require_columns, string_series, FittedTransformer,
    Transformer,
};
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Converts the configured columns to string labels.
///
/// Stateless: fitting returns an identical copy of the stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastVariables {
    features: Vec<String>,
}

impl CastVariables {
    const NAME: &'static str = "cast_variables";

    pub fn new(features: Vec<String>) -> Self {
        Self { features }
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }
}

impl Transformer for CastVariables {
    type Fitted = CastVariables;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&self, x: &DataFrame, _y: Option<&[f64]>) -> Result<Self::Fitted> {
        require_columns(x, Self::NAME, &self.features)?;
        Ok(self.clone())
    }
}

impl FittedTransformer for CastVariables {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        require_columns(x, Self::NAME, &self.features)?;

        let mut result = x.clone();
        for col_name in &self.features {
            let series = column_series(x, Self::NAME, col_name)?;
            if matches!(series.dtype(), DataType::String) {
                continue;
            }
            let labels = categorical_values(series)?;
            result.with_column(string_series(series.name().clone(), labels))?;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    fn sample_df() -> DataFrame {
        df!(
            "pclass" => &[1i64, 3, 2, 3],
            "fare" => &[71.3, 7.9, 13.0, 8.05],
        )
        .unwrap()
    }

    #[test]
    fn test_cast_converts_only_configured_columns() {
        let df = sample_df();
        let caster = CastVariables::new(vec!["pclass".to_string()]);
        let fitted = caster.fit(&df, None).unwrap();
        let result = fitted.transform(&df).unwrap();

        assert_eq!(result.column("pclass").unwrap().dtype(), &DataType::String);
        assert_eq!(result.column("fare").unwrap().dtype(), &DataType::Float64);
        let col = result.column("pclass").unwrap().str().unwrap();
        assert_eq!(col.get(0), Some("1"));
        assert_eq!(col.get(1), Some("3"));
        assert_eq!(result.height(), df.height());
    }

    #[test]
    fn test_fit_is_noop() {
        let caster = CastVariables::new(vec!["pclass".to_string()]);
        let fitted = caster.fit(&sample_df(), None).unwrap();
        assert_eq!(fitted, caster);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let df = sample_df();
        let snapshot = df.clone();
        let caster = CastVariables::new(vec!["pclass".to_string()]);

        let first = caster.transform(&df).unwrap();
        let second = caster.transform(&df).unwrap();

        assert!(df.equals_missing(&snapshot));
        assert_eq!(df.column("pclass").unwrap().dtype(), &DataType::Int64);
        assert!(first.equals_missing(&second));
    }

    #[test]
    fn test_missing_column() {
        let caster = CastVariables::new(vec!["sibsp".to_string()]);
        let err = caster.transform(&sample_df()).unwrap_err();
        match err {
            PipelineError::MissingColumns { stage, columns } => {
                assert_eq!(stage, "cast_variables");
                assert_eq!(columns, vec!["sibsp"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
