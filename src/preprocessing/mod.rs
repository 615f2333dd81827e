//! Feature preprocessing stages
//!
//! Every stage comes in two shapes: a configuration-only value implementing
//! [`Transformer`], and the value produced by fitting it, implementing
//! [`FittedTransformer`]. Fitting never mutates the configuration; it builds
//! the fitted value from training data. The [`Stage`] and [`FittedStage`]
//! enums let a pipeline hold its stages in a plain ordered `Vec`.
//!
//! Stages, in pipeline order:
//! - Median imputation of numeric columns
//! - Casting of discrete numeric columns to categorical
//! - Rare-label grouping
//! - Yeo-Johnson / Box-Cox power transform
//! - Feature dropping
//! - Most-frequent imputation of categorical columns
//! - Target-ordered ordinal encoding
//! - Standard scaling

mod cast;
mod encoder;
mod feature_selection;
mod imputer;
mod pipeline;
mod rare_label;
mod scaler;
mod stage;
pub mod transforms;

pub use cast::CastVariables;
pub use encoder::{FittedOrdinalEncoder, OrdinalEncoder, UNSEEN_CODE};
pub use feature_selection::DropFeatures;
pub use imputer::{
    CategoricalImputer, FittedCategoricalImputer, FittedMeanMedianImputer, MeanMedianImputer,
};
pub use pipeline::{ordered_labels, FittedPipeline, Pipeline};
pub use rare_label::{FittedRareLabelEncoder, RareLabelEncoder, RARE_LABEL};
pub use scaler::{FittedStandardScaler, StandardScaler};
pub use stage::{FittedStage, Stage};
pub use transforms::{FittedPowerTransformer, PowerMethod, PowerTransformer};

use crate::error::{PipelineError, Result};
use polars::prelude::*;

/// A configured stage that has not seen data yet
pub trait Transformer {
    /// The stage together with its learned parameters
    type Fitted: FittedTransformer;

    /// Stage name used in logs and errors
    fn name(&self) -> &'static str;

    /// Learn parameters from training data.
    ///
    /// `y` is the row-aligned supervision signal; only supervised stages use it.
    fn fit(&self, x: &DataFrame, y: Option<&[f64]>) -> Result<Self::Fitted>;
}

/// A stage whose parameters are fixed
pub trait FittedTransformer {
    /// Stage name used in logs and errors
    fn name(&self) -> &'static str;

    /// Apply the stage to a frame, returning a new frame with the same rows
    fn transform(&self, x: &DataFrame) -> Result<DataFrame>;
}

/// Fail with a missing-column error naming every configured column absent from `df`
pub(crate) fn require_columns(df: &DataFrame, stage: &str, columns: &[String]) -> Result<()> {
    let missing: Vec<String> = columns
        .iter()
        .filter(|c| df.column(c.as_str()).is_err())
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::missing_columns(stage, missing))
    }
}

/// Check if dtype is numeric
pub(crate) fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Read a numeric column as `f64`, with nulls and NaN reported as `None`
///
/// A column with no observed values is all `None` whatever its dtype, since
/// CSV inference types an empty column as string or null.
pub(crate) fn numeric_values(series: &Series) -> Result<Vec<Option<f64>>> {
    if series.null_count() == series.len() {
        return Ok(vec![None; series.len()]);
    }
    if !is_numeric_dtype(series.dtype()) {
        return Err(PipelineError::DataError(format!(
            "column '{}' must be numeric, found {}",
            series.name(),
            series.dtype()
        )));
    }

    let casted = series.cast(&DataType::Float64)?;
    Ok(casted
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Format a float label: integral values print without a fractional part
pub(crate) fn format_float_label(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Read any supported column as categorical labels, nulls as `None`
pub(crate) fn categorical_values(series: &Series) -> Result<Vec<Option<String>>> {
    if series.null_count() == series.len() {
        return Ok(vec![None; series.len()]);
    }
    let dtype = series.dtype();

    if matches!(dtype, DataType::String) {
        return Ok(series
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect());
    }

    if is_integer_dtype(dtype) {
        let casted = series.cast(&DataType::Int64)?;
        return Ok(casted
            .i64()?
            .into_iter()
            .map(|v| v.map(|x| x.to_string()))
            .collect());
    }

    match dtype {
        DataType::Float32 | DataType::Float64 => {
            let casted = series.cast(&DataType::Float64)?;
            Ok(casted
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| !x.is_nan()).map(format_float_label))
                .collect())
        }
        DataType::Boolean => Ok(series
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| b.to_string()))
            .collect()),
        other => Err(PipelineError::DataError(format!(
            "column '{}' has unsupported dtype {} for categorical handling",
            series.name(),
            other
        ))),
    }
}

/// Build a string column from optional labels
pub(crate) fn string_series(name: PlSmallStr, values: Vec<Option<String>>) -> Series {
    let ca: StringChunked = values.into_iter().collect();
    ca.with_name(name).into_series()
}

/// Build a float column from optional values
pub(crate) fn float_series(name: PlSmallStr, values: Vec<Option<f64>>) -> Series {
    let ca: Float64Chunked = values.into_iter().collect();
    ca.with_name(name).into_series()
}

/// Series behind a column of `df`
pub(crate) fn column_series<'a>(df: &'a DataFrame, stage: &str, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| PipelineError::missing_columns(stage, vec![name.to_string()]))
}
