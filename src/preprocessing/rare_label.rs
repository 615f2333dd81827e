//! Rare-label grouping

use super::{
    categorical_values, column_series, require_columns, string_series, FittedTransformer,
    Transformer,
};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Sentinel category for infrequent and unseen labels
pub const RARE_LABEL: &str = "Rare";

/// Groups infrequent categories under a single sentinel label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RareLabelEncoder {
    variables: Vec<String>,
    /// Minimum training frequency for a category to be kept
    tol: f64,
    /// Grouping only applies once a column has at least this many categories
    n_categories: usize,
}

/// Rare-label encoder with the learned set of frequent categories per column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedRareLabelEncoder {
    frequent: Vec<(String, BTreeSet<String>)>,
}

impl RareLabelEncoder {
    const NAME: &'static str = "rare_label_encoder";

    pub fn new(variables: Vec<String>) -> Self {
        Self {
            variables,
            tol: 0.05,
            n_categories: 5,
        }
    }

    /// Set the frequency tolerance
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set the minimum number of categories
    pub fn with_n_categories(mut self, n_categories: usize) -> Self {
        self.n_categories = n_categories;
        self
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    fn frequent_categories(&self, values: &[Option<String>]) -> BTreeSet<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for val in values.iter().flatten() {
            *counts.entry(val.as_str()).or_insert(0) += 1;
        }
        let total: usize = counts.values().sum();

        if counts.len() < self.n_categories {
            return counts.keys().map(|k| k.to_string()).collect();
        }

        counts
            .into_iter()
            .filter(|(_, count)| *count as f64 / total as f64 >= self.tol)
            .map(|(label, _)| label.to_string())
            .collect()
    }
}

impl Transformer for RareLabelEncoder {
    type Fitted = FittedRareLabelEncoder;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&self, x: &DataFrame, _y: Option<&[f64]>) -> Result<Self::Fitted> {
        if !(0.0..1.0).contains(&self.tol) {
            return Err(PipelineError::InvalidParameter {
                name: "tol".to_string(),
                value: self.tol.to_string(),
                reason: "must be in [0, 1)".to_string(),
            });
        }
        require_columns(x, Self::NAME, &self.variables)?;

        let mut frequent = Vec::with_capacity(self.variables.len());
        for col_name in &self.variables {
            let series = column_series(x, Self::NAME, col_name)?;
            let values = categorical_values(series)?;
            frequent.push((col_name.clone(), self.frequent_categories(&values)));
        }

        Ok(FittedRareLabelEncoder { frequent })
    }
}

impl FittedRareLabelEncoder {
    /// Categories kept as-is for a column
    pub fn frequent_categories(&self, column: &str) -> Option<&BTreeSet<String>> {
        self.frequent
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, set)| set)
    }
}

impl FittedTransformer for FittedRareLabelEncoder {
    fn name(&self) -> &'static str {
        RareLabelEncoder::NAME
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        let columns: Vec<String> = self.frequent.iter().map(|(c, _)| c.clone()).collect();
        require_columns(x, RareLabelEncoder::NAME, &columns)?;

        let mut result = x.clone();
        for (col_name, keep) in &self.frequent {
            let series = column_series(x, RareLabelEncoder::NAME, col_name)?;
            // Nulls stay null for the categorical imputer downstream
            let grouped: Vec<Option<String>> = categorical_values(series)?
                .into_iter()
                .map(|v| {
                    v.map(|label| {
                        if keep.contains(&label) {
                            label
                        } else {
                            RARE_LABEL.to_string()
                        }
                    })
                })
                .collect();
            result.with_column(string_series(series.name().clone(), grouped))?;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skewed_df() -> DataFrame {
        // a: 10, b: 6, c: 2, d: 1, e: 1 (20 rows)
        let mut labels = Vec::new();
        labels.extend(std::iter::repeat("a").take(10));
        labels.extend(std::iter::repeat("b").take(6));
        labels.extend(std::iter::repeat("c").take(2));
        labels.push("d");
        labels.push("e");
        df!("cabin" => labels).unwrap()
    }

    #[test]
    fn test_rare_categories_grouped() {
        let df = skewed_df();
        let encoder = RareLabelEncoder::new(vec!["cabin".to_string()]).with_tol(0.1);
        let fitted = encoder.fit(&df, None).unwrap();

        let keep = fitted.frequent_categories("cabin").unwrap();
        assert!(keep.contains("a") && keep.contains("b") && keep.contains("c"));
        assert!(!keep.contains("d") && !keep.contains("e"));

        let result = fitted.transform(&df).unwrap();
        let col = result.column("cabin").unwrap().str().unwrap();
        assert_eq!(col.get(18), Some(RARE_LABEL));
        assert_eq!(col.get(19), Some(RARE_LABEL));
        assert_eq!(col.get(0), Some("a"));
    }

    #[test]
    fn test_too_few_categories_keeps_all() {
        let df = df!("sex" => &["male", "female", "male", "male", "male", "male", "male", "male", "male", "male", "male", "male", "male", "male", "male", "male", "male", "male", "male", "male", "male"]).unwrap();
        let fitted = RareLabelEncoder::new(vec!["sex".to_string()])
            .with_tol(0.1)
            .fit(&df, None)
            .unwrap();
        let result = fitted.transform(&df).unwrap();
        assert_eq!(result.column("sex").unwrap().str().unwrap().get(1), Some("female"));
    }

    #[test]
    fn test_unseen_category_maps_to_rare() {
        let fitted = RareLabelEncoder::new(vec!["cabin".to_string()])
            .with_tol(0.1)
            .fit(&skewed_df(), None)
            .unwrap();

        let unseen = df!("cabin" => &[Some("a"), Some("zzz"), None]).unwrap();
        let result = fitted.transform(&unseen).unwrap();
        let col = result.column("cabin").unwrap().str().unwrap();
        assert_eq!(col.get(0), Some("a"));
        assert_eq!(col.get(1), Some(RARE_LABEL));
        assert_eq!(col.get(2), None);
    }

    #[test]
    fn test_invalid_tol() {
        let encoder = RareLabelEncoder::new(vec!["cabin".to_string()]).with_tol(1.5);
        assert!(matches!(
            encoder.fit(&skewed_df(), None),
            Err(PipelineError::InvalidParameter { .. })
        ));
    }
}
