//! Random Forest classifier

use super::decision_tree::{argmax, Criterion, DecisionTree, FittedTree};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Random Forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split (sqrt by default)
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for bootstrap and feature sampling
    pub random_state: u64,
}

/// Strategy for max features
///
/// Written as `sqrt`, `log2` or `all`, a fraction such as `0.5`, or a count
/// such as `3`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MaxFeaturesRepr", into = "MaxFeaturesRepr")]
pub enum MaxFeatures {
    /// Square root of n_features
    #[default]
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum MaxFeaturesRepr {
    Count(usize),
    Fraction(f64),
    Named(String),
}

impl TryFrom<MaxFeaturesRepr> for MaxFeatures {
    type Error = String;

    fn try_from(repr: MaxFeaturesRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            MaxFeaturesRepr::Count(n) => Ok(MaxFeatures::Fixed(n)),
            MaxFeaturesRepr::Fraction(f) => Ok(MaxFeatures::Fraction(f)),
            MaxFeaturesRepr::Named(name) => match name.as_str() {
                "sqrt" => Ok(MaxFeatures::Sqrt),
                "log2" => Ok(MaxFeatures::Log2),
                "all" => Ok(MaxFeatures::All),
                other => Err(format!(
                    "unknown max_features '{}', expected sqrt, log2, all, a fraction or a count",
                    other
                )),
            },
        }
    }
}

impl From<MaxFeatures> for MaxFeaturesRepr {
    fn from(value: MaxFeatures) -> Self {
        match value {
            MaxFeatures::Sqrt => MaxFeaturesRepr::Named("sqrt".to_string()),
            MaxFeatures::Log2 => MaxFeaturesRepr::Named("log2".to_string()),
            MaxFeatures::All => MaxFeaturesRepr::Named("all".to_string()),
            MaxFeatures::Fraction(f) => MaxFeaturesRepr::Fraction(f),
            MaxFeatures::Fixed(n) => MaxFeaturesRepr::Count(n),
        }
    }
}

impl std::fmt::Display for MaxFeatures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaxFeatures::Sqrt => write!(f, "sqrt"),
            MaxFeatures::Log2 => write!(f, "log2"),
            MaxFeatures::All => write!(f, "all"),
            MaxFeatures::Fraction(v) => write!(f, "{}", v),
            MaxFeatures::Fixed(n) => write!(f, "{}", n),
        }
    }
}

impl MaxFeatures {
    /// Check that a fraction lies in (0, 1] and a count is positive
    pub fn validate(&self) -> Result<()> {
        match *self {
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                Err(PipelineError::InvalidParameter {
                    name: "max_features".to_string(),
                    value: f.to_string(),
                    reason: "fraction must be in (0, 1]".to_string(),
                })
            }
            MaxFeatures::Fixed(0) => Err(PipelineError::InvalidParameter {
                name: "max_features".to_string(),
                value: "0".to_string(),
                reason: "count must be positive".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// A trained forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedForest {
    trees: Vec<FittedTree>,
    n_features: usize,
    n_classes: usize,
    feature_importances: Array1<f64>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    /// Create a new classifier forest
    pub fn new(n_estimators: usize) -> Self {
        Self {
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::default(),
            bootstrap: true,
            criterion: Criterion::Gini,
            random_state: 42,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Enable or disable bootstrap sampling
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }

    /// Fit the forest on `x` with class indices `y` in `0..n_classes`
    pub fn fit(&self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<FittedForest> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if self.n_estimators == 0 {
            return Err(PipelineError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PipelineError::ValidationError(
                "cannot fit a forest on zero samples".to_string(),
            ));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::DataError(
                "feature matrix contains non-finite values".to_string(),
            ));
        }

        let template = DecisionTree {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: Some(self.compute_max_features(n_features)),
            criterion: self.criterion,
        };

        // Seeds drawn up front so each tree's stream is independent of scheduling
        let mut seeder = ChaCha8Rng::seed_from_u64(self.random_state);
        let seeds: Vec<u64> = (0..self.n_estimators).map(|_| seeder.next_u64()).collect();

        let trees: Vec<FittedTree> = seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot: Vec<usize> = sample_indices.iter().map(|&i| y[i]).collect();

                template.fit(&x_boot, &y_boot, n_classes, &mut rng)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            n_trees = trees.len(),
            n_samples,
            n_features,
            "Random forest fitted"
        );

        let feature_importances = Self::compute_feature_importances(&trees, n_features);

        Ok(FittedForest {
            trees,
            n_features,
            n_classes,
            feature_importances,
        })
    }

    fn compute_feature_importances(trees: &[FittedTree], n_features: usize) -> Array1<f64> {
        let mut total_importances = Array1::<f64>::zeros(n_features);
        for tree in trees {
            total_importances += tree.feature_importances();
        }

        total_importances /= trees.len().max(1) as f64;

        let total = total_importances.sum();
        if total > 0.0 {
            total_importances /= total;
        }
        total_importances
    }
}

impl FittedForest {
    /// Mean of the per-tree class distributions, one row per sample
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let per_tree: Vec<Array2<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<Vec<_>>>()?;

        // Summed in tree order so floating point results are reproducible
        let mut proba = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        for p in &per_tree {
            proba += p;
        }
        proba /= self.trees.len() as f64;

        Ok(proba)
    }

    /// Most probable class index per row; ties go to the lower index
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.rows().into_iter().map(argmax).collect())
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &Array1<f64> {
        &self.feature_importances
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}
