//! Model training module
//!
//! Provides:
//! - Decision tree and Random Forest classifiers
//! - Seeded train/validate splitting
//! - Classification metrics and reports
//! - The [`Trainer`] that runs split, fit, predict and evaluate

pub mod decision_tree;
mod engine;
pub mod metrics;
pub mod random_forest;
pub mod split;

pub use decision_tree::{Criterion, DecisionTree, FittedTree, TreeNode};
pub use engine::{Evaluation, Trainer, TrainingOutcome};
pub use metrics::{
    log_loss, AveragedMetrics, ClassMetrics, ClassificationReport, ConfusionMatrix, ModelMetrics,
};
pub use random_forest::{FittedForest, MaxFeatures, RandomForest};
pub use split::{stratified_split, train_test_split, TrainTestSplit};

pub(crate) use decision_tree::argmax;
