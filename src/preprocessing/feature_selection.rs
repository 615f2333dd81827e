//! Structural feature selection

use super::{require_columns, FittedTransformer, Transformer};
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Removes a configured set of columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropFeatures {
    features_to_drop: Vec<String>,
}

impl DropFeatures {
    const NAME: &'static str = "drop_features";

    pub fn new(features_to_drop: Vec<String>) -> Self {
        Self { features_to_drop }
    }

    pub fn features_to_drop(&self) -> &[String] {
        &self.features_to_drop
    }
}

impl Transformer for DropFeatures {
    type Fitted = DropFeatures;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&self, x: &DataFrame, _y: Option<&[f64]>) -> Result<Self::Fitted> {
        require_columns(x, Self::NAME, &self.features_to_drop)?;
        Ok(self.clone())
    }
}

impl FittedTransformer for DropFeatures {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        require_columns(x, Self::NAME, &self.features_to_drop)?;

        let keep: Vec<PlSmallStr> = x
            .get_column_names()
            .into_iter()
            .filter(|name| !self.features_to_drop.iter().any(|d| d.as_str() == name.as_str()))
            .cloned()
            .collect();
        Ok(x.select(keep)?)
    }
}
