//! Classification metrics and reports

use crate::error::{PipelineError, Result};
use crate::preprocessing::ordered_labels;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-class precision, recall and F1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Averaged precision, recall and F1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AveragedMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

/// Per-class report with accuracy and macro/weighted averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AveragedMetrics,
    pub weighted_avg: AveragedMetrics,
    pub support: usize,
}

/// Counts of (truth, prediction) pairs; rows are truth, columns prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    labels: Vec<String>,
    matrix: Array2<usize>,
}

/// Summary metrics stored alongside a persisted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub log_loss: Option<f64>,
    pub n_samples: usize,
}

fn check_aligned(y_true: &[String], y_pred: &[String]) -> Result<()> {
    if y_true.is_empty() {
        return Err(PipelineError::ValidationError(
            "cannot evaluate an empty prediction set".to_string(),
        ));
    }
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    Ok(())
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ConfusionMatrix {
    /// Build from aligned truth and prediction labels
    pub fn compute(y_true: &[String], y_pred: &[String]) -> Result<Self> {
        check_aligned(y_true, y_pred)?;

        let labels = ordered_labels(y_true.iter().chain(y_pred.iter()).cloned());
        let position = |label: &str| labels.iter().position(|l| l == label).unwrap_or(0);

        let mut matrix = Array2::<usize>::zeros((labels.len(), labels.len()));
        for (t, p) in y_true.iter().zip(y_pred) {
            matrix[[position(t), position(p)]] += 1;
        }

        Ok(Self { labels, matrix })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn matrix(&self) -> &Array2<usize> {
        &self.matrix
    }

    /// Count for a (truth, prediction) pair
    pub fn get(&self, truth: &str, predicted: &str) -> Option<usize> {
        let i = self.labels.iter().position(|l| l == truth)?;
        let j = self.labels.iter().position(|l| l == predicted)?;
        Some(self.matrix[[i, j]])
    }
}

impl ClassificationReport {
    /// Build from aligned truth and prediction labels
    pub fn compute(y_true: &[String], y_pred: &[String]) -> Result<Self> {
        let confusion = ConfusionMatrix::compute(y_true, y_pred)?;
        let m = &confusion.matrix;
        let total = y_true.len();

        let mut classes = Vec::with_capacity(confusion.labels.len());
        for (k, label) in confusion.labels.iter().enumerate() {
            let tp = m[[k, k]];
            let support = m.row(k).sum();
            let predicted = m.column(k).sum();

            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1_score = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            classes.push(ClassMetrics {
                label: label.clone(),
                precision,
                recall,
                f1_score,
                support,
            });
        }

        let correct: usize = (0..confusion.labels.len()).map(|k| m[[k, k]]).sum();
        let n_classes = classes.len() as f64;

        let macro_avg = AveragedMetrics {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n_classes,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n_classes,
            f1_score: classes.iter().map(|c| c.f1_score).sum::<f64>() / n_classes,
        };

        let weight = |c: &ClassMetrics| c.support as f64 / total as f64;
        let weighted_avg = AveragedMetrics {
            precision: classes.iter().map(|c| c.precision * weight(c)).sum(),
            recall: classes.iter().map(|c| c.recall * weight(c)).sum(),
            f1_score: classes.iter().map(|c| c.f1_score * weight(c)).sum(),
        };

        Ok(Self {
            classes,
            accuracy: ratio(correct, total),
            macro_avg,
            weighted_avg,
            support: total,
        })
    }

    /// Metrics for one class label
    pub fn class(&self, label: &str) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| c.label == label)
    }
}

/// Mean negative log-likelihood of the true class.
///
/// `proba` columns follow `classes`; probabilities are clipped to
/// `[1e-15, 1 - 1e-15]` and a truth label outside `classes` counts as
/// probability zero.
pub fn log_loss(y_true: &[String], proba: &Array2<f64>, classes: &[String]) -> Result<f64> {
    if y_true.is_empty() {
        return Err(PipelineError::ValidationError(
            "cannot evaluate an empty prediction set".to_string(),
        ));
    }
    if proba.nrows() != y_true.len() || proba.ncols() != classes.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} x {}", y_true.len(), classes.len()),
            actual: format!("{} x {}", proba.nrows(), proba.ncols()),
        });
    }

    const EPS: f64 = 1e-15;
    let total: f64 = y_true
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let p = classes
                .iter()
                .position(|c| c == label)
                .map_or(0.0, |j| proba[[i, j]]);
            -p.clamp(EPS, 1.0 - EPS).ln()
        })
        .sum();

    Ok(total / y_true.len() as f64)
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(12);

        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.label, c.precision, c.recall, c.f1_score, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.support
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1_score, self.support
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let max_count = self.matrix.iter().copied().max().unwrap_or(0);
        let width = self
            .labels
            .iter()
            .map(|l| l.len())
            .chain(std::iter::once(max_count.to_string().len()))
            .max()
            .unwrap_or(1);

        write!(f, "{:>width$}", "")?;
        for label in &self.labels {
            write!(f, " {:>width$}", label)?;
        }
        writeln!(f)?;

        for (i, label) in self.labels.iter().enumerate() {
            write!(f, "{:>width$}", label)?;
            for j in 0..self.labels.len() {
                write!(f, " {:>width$}", self.matrix[[i, j]])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
