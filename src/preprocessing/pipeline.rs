//! Transformation pipeline with a terminal random forest
//!
//! [`Pipeline`] holds configured stages in order. Fitting runs each stage's
//! fit on the output of the previous fitted stage, then trains the forest on
//! the fully transformed frame, and returns a [`FittedPipeline`]: the unit that
//! gets persisted and used for inference.

use super::{
    categorical_values, column_series, is_numeric_dtype, numeric_values, CastVariables,
    CategoricalImputer, DropFeatures, FittedStage, MeanMedianImputer, OrdinalEncoder,
    PowerTransformer, RareLabelEncoder, Stage, StandardScaler,
};
use crate::config::ModelConfig;
use crate::error::{PipelineError, Result};
use crate::training::{argmax, FittedForest, RandomForest};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use tracing::{debug, info};

const ESTIMATOR_NAME: &str = "random_forest";

/// Distinct labels in class order: numeric when every label parses as a
/// number, lexicographic otherwise
pub fn ordered_labels<I>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let distinct: BTreeSet<String> = labels.into_iter().collect();
    let parsed: Option<Vec<(f64, String)>> = distinct
        .iter()
        .map(|l| l.trim().parse::<f64>().ok().map(|v| (v, l.clone())))
        .collect();

    match parsed {
        Some(mut numeric) => {
            numeric.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            numeric.into_iter().map(|(_, l)| l).collect()
        }
        None => distinct.into_iter().collect(),
    }
}

/// Ordered preprocessing stages followed by a random forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    stages: Vec<Stage>,
    estimator: RandomForest,
}

/// Fitted stages, class labels and trained forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    stages: Vec<FittedStage>,
    classes: Vec<String>,
    feature_names: Vec<String>,
    estimator: FittedForest,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>, estimator: RandomForest) -> Self {
        Self { stages, estimator }
    }

    /// Standard stage order built from model settings
    pub fn from_config(config: &ModelConfig) -> Self {
        let categorical = config.categorical_features();

        let stages = vec![
            Stage::MedianImputer(MeanMedianImputer::new(config.num_vars_wf_na.clone())),
            Stage::CastVariables(CastVariables::new(config.discrete_vars.clone())),
            Stage::RareLabel(
                RareLabelEncoder::new(categorical.clone())
                    .with_tol(config.tol)
                    .with_n_categories(config.n_categories),
            ),
            Stage::Power(PowerTransformer::new(
                config.num_vars.clone(),
                config.power_method,
            )),
            Stage::DropFeatures(DropFeatures::new(config.features_to_drop.clone())),
            Stage::CategoricalImputer(CategoricalImputer::new(config.cat_vars_wf_na.clone())),
            Stage::Ordinal(OrdinalEncoder::new(categorical)),
            Stage::Scaler(StandardScaler::new()),
        ];

        let estimator = RandomForest::new(config.n_estimators)
            .with_random_state(config.random_state)
            .with_max_depth(config.max_depth)
            .with_min_samples_split(config.min_samples_split)
            .with_min_samples_leaf(config.min_samples_leaf)
            .with_max_features(config.max_features)
            .with_criterion(config.criterion)
            .with_bootstrap(config.bootstrap);

        Self::new(stages, estimator)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn estimator(&self) -> &RandomForest {
        &self.estimator
    }

    /// Fit every stage in order, then the forest, on training features `x`
    /// and the row-aligned target `y`
    pub fn fit(&self, x: &DataFrame, y: &Series) -> Result<FittedPipeline> {
        let start = Instant::now();

        if y.len() != x.height() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} target values", x.height()),
                actual: format!("{} target values", y.len()),
            });
        }

        let labels: Vec<String> = categorical_values(y)?
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                PipelineError::ValidationError(format!(
                    "target column '{}' contains missing values",
                    y.name()
                ))
            })?;
        let classes = ordered_labels(labels.iter().cloned());
        let class_index: HashMap<&str, usize> = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        let y_idx: Vec<usize> = labels.iter().map(|l| class_index[l.as_str()]).collect();
        let y_signal: Vec<f64> = y_idx.iter().map(|&i| i as f64).collect();

        let mut current = x.clone();
        let mut fitted_stages = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let fitted = stage.fit(&current, Some(y_signal.as_slice()))?;
            current = fitted.transform(&current)?;
            debug!(
                stage = fitted.name(),
                rows = current.height(),
                columns = current.width(),
                "Stage fitted"
            );
            fitted_stages.push(fitted);
        }

        let feature_names: Vec<String> = current
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        let matrix = feature_matrix(&current, &feature_names)?;
        let estimator = self.estimator.fit(&matrix, &y_idx, classes.len())?;

        info!(
            rows = x.height(),
            features = feature_names.len(),
            classes = classes.len(),
            trees = estimator.n_trees(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pipeline fitted"
        );

        Ok(FittedPipeline {
            stages: fitted_stages,
            classes,
            feature_names,
            estimator,
        })
    }
}

/// Dense feature matrix in `names` order; every column must be numeric and complete
fn feature_matrix(df: &DataFrame, names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(names.len());

    for name in names {
        let series = column_series(df, ESTIMATOR_NAME, name)?;
        if !is_numeric_dtype(series.dtype()) {
            return Err(PipelineError::DataError(format!(
                "column '{}' reaches the estimator as {}; it must be numeric",
                name,
                series.dtype()
            )));
        }
        let values = numeric_values(series)?
            .into_iter()
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| {
                PipelineError::DataError(format!(
                    "column '{}' still contains missing values at the estimator",
                    name
                ))
            })?;
        columns.push(values);
    }

    Ok(Array2::from_shape_fn((n_rows, names.len()), |(i, j)| columns[j][i]))
}

impl FittedPipeline {
    /// Push `x` through every fitted stage without the estimator
    pub fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        let mut current = x.clone();
        for stage in &self.stages {
            current = stage.transform(&current)?;
        }
        Ok(current)
    }

    /// Class probabilities per row, columns in [`classes`](Self::classes) order
    pub fn predict_proba(&self, x: &DataFrame) -> Result<Array2<f64>> {
        let transformed = self.transform(x)?;
        let missing: Vec<String> = self
            .feature_names
            .iter()
            .filter(|c| transformed.column(c.as_str()).is_err())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::missing_columns(ESTIMATOR_NAME, missing));
        }

        let matrix = feature_matrix(&transformed, &self.feature_names)?;
        self.estimator.predict_proba(&matrix)
    }

    /// Predicted class label per row
    pub fn predict(&self, x: &DataFrame) -> Result<Vec<String>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| self.classes[argmax(row)].clone())
            .collect())
    }

    /// Class labels in probability-column order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Estimator input columns, in the order learned at fit time
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn stages(&self) -> &[FittedStage] {
        &self.stages
    }

    pub fn estimator(&self) -> &FittedForest {
        &self.estimator
    }

    /// Forest feature importances paired with feature names
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        self.feature_names
            .iter()
            .cloned()
            .zip(self.estimator.feature_importances().iter().copied())
            .collect()
    }
}
