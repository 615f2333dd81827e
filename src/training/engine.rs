//! Training orchestration: split, fit, predict, evaluate

use super::decision_tree::argmax;
use super::metrics::{log_loss, ClassificationReport, ConfusionMatrix, ModelMetrics};
use super::split::{stratified_split, train_test_split, TrainTestSplit};
use crate::config::ModelConfig;
use crate::error::{PipelineError, Result};
use crate::preprocessing::{categorical_values, FittedPipeline, Pipeline};
use ndarray::Array2;
use polars::prelude::*;
use std::time::Instant;
use tracing::info;

/// Everything produced by one training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// The fitted pipeline, ready to persist
    pub pipeline: FittedPipeline,
    /// Ground-truth labels of the validate partition
    pub y_validate: Vec<String>,
    /// Predicted labels for the validate partition, row-aligned with `y_validate`
    pub y_pred: Vec<String>,
    /// Class probabilities for the validate partition
    pub y_proba: Array2<f64>,
    /// Validate row positions in the input frame
    pub validate_indices: Vec<usize>,
}

/// Validation report for a training run
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub report: ClassificationReport,
    pub confusion_matrix: ConfusionMatrix,
    pub log_loss: f64,
}

impl Evaluation {
    /// Summary metrics for model metadata
    pub fn metrics(&self) -> ModelMetrics {
        ModelMetrics {
            accuracy: self.report.accuracy,
            precision: self.report.macro_avg.precision,
            recall: self.report.macro_avg.recall,
            f1_score: self.report.macro_avg.f1_score,
            log_loss: Some(self.log_loss),
            n_samples: self.report.support,
        }
    }
}

impl TrainingOutcome {
    /// Classification report, confusion matrix and log loss on the validate partition
    pub fn evaluate(&self) -> Result<Evaluation> {
        let report = ClassificationReport::compute(&self.y_validate, &self.y_pred)?;
        let confusion_matrix = ConfusionMatrix::compute(&self.y_validate, &self.y_pred)?;
        let log_loss = log_loss(&self.y_validate, &self.y_proba, self.pipeline.classes())?;

        info!(
            accuracy = report.accuracy,
            macro_f1 = report.macro_avg.f1_score,
            log_loss,
            "Validation metrics"
        );

        Ok(Evaluation {
            report,
            confusion_matrix,
            log_loss,
        })
    }
}

/// Drives one training run from model settings
#[derive(Debug, Clone)]
pub struct Trainer {
    config: ModelConfig,
}

impl Trainer {
    /// Create a trainer; settings are validated here
    pub fn new(config: &ModelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Seeded train/validate partition of `data` on the configured target
    pub fn split(&self, data: &DataFrame) -> Result<TrainTestSplit> {
        let cfg = &self.config;
        let split = if cfg.stratify {
            stratified_split(data, &cfg.target, cfg.test_size, cfg.random_state)?
        } else {
            train_test_split(data, &cfg.target, cfg.test_size, cfg.random_state)?
        };

        info!(
            train_rows = split.x_train.height(),
            validate_rows = split.x_validate.height(),
            stratified = cfg.stratify,
            "Data split"
        );
        Ok(split)
    }

    /// Split, fit the pipeline on the train partition and predict the validate partition
    pub fn train(&self, data: &DataFrame) -> Result<TrainingOutcome> {
        let start = Instant::now();
        let split = self.split(data)?;

        let pipeline = Pipeline::from_config(&self.config).fit(&split.x_train, &split.y_train)?;

        let y_proba = pipeline.predict_proba(&split.x_validate)?;
        let y_pred: Vec<String> = y_proba
            .rows()
            .into_iter()
            .map(|row| pipeline.classes()[argmax(row)].clone())
            .collect();
        let y_validate = categorical_values(&split.y_validate)?
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                PipelineError::ValidationError(format!(
                    "target column '{}' contains missing values",
                    self.config.target
                ))
            })?;

        info!(
            n_estimators = self.config.n_estimators,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Training complete"
        );

        Ok(TrainingOutcome {
            pipeline,
            y_validate,
            y_pred,
            y_proba,
            validate_indices: split.validate_indices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    const CONFIG: &str = r#"
train_data: unused.csv
test_data: unused.csv
model_path: unused.bin
test_size: 0.25
random_state: 3
n_estimators: 15
target: label
num_vars: [x]
discrete_vars: []
cat_vars: [color]
num_vars_wf_na: [x]
cat_vars_wf_na: [color]
features_to_drop: []
"#;

    fn data() -> DataFrame {
        let n = 40;
        let x: Vec<Option<f64>> = (0..n)
            .map(|i| if i % 9 == 0 { None } else { Some(i as f64) })
            .collect();
        let color: Vec<Option<&str>> = (0..n)
            .map(|i| match i % 4 {
                0 => Some("red"),
                1 => Some("blue"),
                2 => None,
                _ => Some("green"),
            })
            .collect();
        let label: Vec<&str> = (0..n).map(|i| if i < 20 { "no" } else { "yes" }).collect();
        df!("x" => x, "color" => color, "label" => label).unwrap()
    }

    fn trainer() -> Trainer {
        let settings = Settings::from_yaml_str(CONFIG).unwrap();
        Trainer::new(&settings.model_config).unwrap()
    }

    #[test]
    fn test_train_outputs_are_aligned() {
        let outcome = trainer().train(&data()).unwrap();
        assert_eq!(outcome.y_validate.len(), 10);
        assert_eq!(outcome.y_pred.len(), 10);
        assert_eq!(outcome.y_proba.nrows(), 10);
        assert_eq!(outcome.pipeline.classes(), &["no", "yes"]);
    }

    #[test]
    fn test_predictions_follow_probabilities() {
        let outcome = trainer().train(&data()).unwrap();
        let split = trainer().split(&data()).unwrap();

        assert_eq!(outcome.pipeline.predict(&split.x_validate).unwrap(), outcome.y_pred);
        for (row, predicted) in outcome.y_proba.rows().into_iter().zip(&outcome.y_pred) {
            let best = row.iter().cloned().fold(f64::MIN, f64::max);
            let k = outcome.pipeline.classes().iter().position(|c| c == predicted).unwrap();
            assert_eq!(row[k], best);
        }
    }

    #[test]
    fn test_evaluate() {
        let outcome = trainer().train(&data()).unwrap();
        let evaluation = outcome.evaluate().unwrap();
        assert_eq!(evaluation.report.support, 10);
        assert_eq!(evaluation.confusion_matrix.matrix().sum(), 10);
        assert!(evaluation.log_loss.is_finite());
        assert_eq!(evaluation.metrics().n_samples, 10);
    }

    #[test]
    fn test_missing_target_is_schema_error() {
        let df = data().drop("label").unwrap();
        let err = trainer().train(&df).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedSchema(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut settings = Settings::from_yaml_str(CONFIG).unwrap();
        settings.model_config.n_estimators = 0;
        assert!(Trainer::new(&settings.model_config).is_err());
    }
}
