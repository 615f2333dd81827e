//! Pipeline settings
//!
//! Settings are read once from a flat YAML file, validated, and then passed by
//! reference into the pipeline builder and the trainer.

use crate::error::{PipelineError, Result};
use crate::preprocessing::PowerMethod;
use crate::training::{Criterion, MaxFeatures};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File locations used by the training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathConfig {
    /// Labeled training data (CSV)
    pub train_data: String,
    /// Unlabeled data scored by `predict`
    pub test_data: String,
    /// Where the fitted pipeline is persisted
    pub model_path: String,
}

/// Model variables and hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Fraction of rows held out for validation
    pub test_size: f64,
    /// Seed shared by the split and the forest
    pub random_state: u64,
    /// Number of trees in the forest
    pub n_estimators: usize,
    /// Target column
    pub target: String,
    /// Numeric variables (power transformed)
    pub num_vars: Vec<String>,
    /// Numerically encoded discrete variables (cast to categorical)
    pub discrete_vars: Vec<String>,
    /// Categorical variables
    pub cat_vars: Vec<String>,
    /// Numeric variables with missing values
    pub num_vars_wf_na: Vec<String>,
    /// Categorical variables with missing values
    pub cat_vars_wf_na: Vec<String>,
    /// Columns removed before encoding
    pub features_to_drop: Vec<String>,

    /// Minimum training frequency for a category to avoid the rare sentinel
    #[serde(default = "default_tol")]
    pub tol: f64,
    /// Minimum distinct categories before rare grouping applies
    #[serde(default = "default_n_categories")]
    pub n_categories: usize,
    /// Variance-stabilizing transform for numeric variables
    #[serde(default)]
    pub power_method: PowerMethod,
    /// Maximum tree depth (unbounded when absent)
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    /// Features considered at each split
    #[serde(default)]
    pub max_features: MaxFeatures,
    /// Split quality measure
    #[serde(default)]
    pub criterion: Criterion,
    /// Draw a bootstrap sample per tree (every row otherwise)
    #[serde(default = "default_bootstrap")]
    pub bootstrap: bool,
    /// Split train/validate per class instead of purely at random
    #[serde(default)]
    pub stratify: bool,
    /// Extra tokens read as missing values when loading CSV data
    #[serde(default)]
    pub na_values: Vec<String>,
}

fn default_tol() -> f64 {
    0.05
}

fn default_n_categories() -> usize {
    5
}

fn default_min_samples_split() -> usize {
    2
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_bootstrap() -> bool {
    true
}

/// Complete validated settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    pub path_config: PathConfig,
    #[serde(flatten)]
    pub model_config: ModelConfig,
}

impl Settings {
    /// Parse and validate settings from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate a YAML settings file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Check value ranges and cross-field constraints
    pub fn validate(&self) -> Result<()> {
        let paths = &self.path_config;
        for (name, value) in [
            ("train_data", &paths.train_data),
            ("test_data", &paths.test_data),
            ("model_path", &paths.model_path),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::ConfigError(format!("{} must not be empty", name)));
            }
        }
        self.model_config.validate()
    }
}

impl ModelConfig {
    /// Check value ranges and cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(PipelineError::ConfigError(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.n_estimators == 0 {
            return Err(PipelineError::ConfigError(
                "n_estimators must be a positive integer".to_string(),
            ));
        }
        if self.target.trim().is_empty() {
            return Err(PipelineError::ConfigError("target must not be empty".to_string()));
        }
        if !(0.0..1.0).contains(&self.tol) {
            return Err(PipelineError::ConfigError(format!(
                "tol must be in [0, 1), got {}",
                self.tol
            )));
        }
        if self.n_categories == 0 {
            return Err(PipelineError::ConfigError(
                "n_categories must be at least 1".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(PipelineError::ConfigError(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(PipelineError::ConfigError(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        self.max_features
            .validate()
            .map_err(|e| PipelineError::ConfigError(e.to_string()))?;

        let feature_lists = [
            ("num_vars", &self.num_vars),
            ("discrete_vars", &self.discrete_vars),
            ("cat_vars", &self.cat_vars),
            ("num_vars_wf_na", &self.num_vars_wf_na),
            ("cat_vars_wf_na", &self.cat_vars_wf_na),
            ("features_to_drop", &self.features_to_drop),
        ];
        for (name, columns) in feature_lists {
            if columns.iter().any(|c| c == &self.target) {
                return Err(PipelineError::ConfigError(format!(
                    "target '{}' must not appear in {}",
                    self.target, name
                )));
            }
        }

        Ok(())
    }

    /// Columns treated as categorical by rare-label grouping and ordinal encoding
    pub fn categorical_features(&self) -> Vec<String> {
        let mut columns = self.cat_vars.clone();
        for c in &self.discrete_vars {
            if !columns.contains(c) {
                columns.push(c.clone());
            }
        }
        columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
train_data: data/train.csv
test_data: data/test.csv
model_path: models/model.bin
test_size: 0.2
random_state: 42
n_estimators: 50
target: survived
num_vars: [age, fare]
discrete_vars: [pclass, sibsp]
cat_vars: [sex, embarked]
num_vars_wf_na: [age]
cat_vars_wf_na: [embarked]
features_to_drop: [name]
"#;

    #[test]
    fn test_parse_sample_config() {
        let settings = Settings::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(settings.path_config.model_path, "models/model.bin");
        assert_eq!(settings.model_config.n_estimators, 50);
        assert_eq!(settings.model_config.tol, 0.05);
        assert_eq!(settings.model_config.n_categories, 5);
        assert_eq!(settings.model_config.power_method, PowerMethod::YeoJohnson);
        assert!(!settings.model_config.stratify);
        assert_eq!(settings.model_config.max_features, MaxFeatures::Sqrt);
        assert_eq!(settings.model_config.criterion, Criterion::Gini);
        assert!(settings.model_config.bootstrap);
    }

    #[test]
    fn test_forest_options() {
        let yaml = format!("{}max_features: log2\ncriterion: entropy\nbootstrap: false\n", SAMPLE);
        let config = Settings::from_yaml_str(&yaml).unwrap().model_config;
        assert_eq!(config.max_features, MaxFeatures::Log2);
        assert_eq!(config.criterion, Criterion::Entropy);
        assert!(!config.bootstrap);

        let yaml = format!("{}max_features: 0.5\n", SAMPLE);
        let config = Settings::from_yaml_str(&yaml).unwrap().model_config;
        assert_eq!(config.max_features, MaxFeatures::Fraction(0.5));

        let yaml = format!("{}max_features: 3\n", SAMPLE);
        let config = Settings::from_yaml_str(&yaml).unwrap().model_config;
        assert_eq!(config.max_features, MaxFeatures::Fixed(3));
    }

    #[test]
    fn test_invalid_forest_options() {
        for extra in [
            "max_features: 1.5\n",
            "max_features: 0\n",
            "max_features: half\n",
            "criterion: variance\n",
        ] {
            let yaml = format!("{}{}", SAMPLE, extra);
            let err = Settings::from_yaml_str(&yaml).unwrap_err();
            assert!(matches!(err, PipelineError::ConfigError(_)), "{}", extra);
        }
    }

    #[test]
    fn test_missing_required_field() {
        let yaml = SAMPLE.replace("n_estimators: 50\n", "");
        let err = Settings::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
    }

    #[test]
    fn test_mistyped_field() {
        let yaml = SAMPLE.replace("random_state: 42", "random_state: forty-two");
        let err = Settings::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
    }

    #[test]
    fn test_test_size_out_of_range() {
        let yaml = SAMPLE.replace("test_size: 0.2", "test_size: 1.5");
        let err = Settings::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("test_size"));
    }

    #[test]
    fn test_target_listed_as_feature() {
        let yaml = SAMPLE.replace("features_to_drop: [name]", "features_to_drop: [name, survived]");
        let err = Settings::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("features_to_drop"));
    }

    #[test]
    fn test_categorical_features_union() {
        let settings = Settings::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(
            settings.model_config.categorical_features(),
            vec!["sex", "embarked", "pclass", "sibsp"]
        );
    }
}
