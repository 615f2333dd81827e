//! Closed set of pipeline stages

use super::{
    CastVariables, CategoricalImputer, DropFeatures, FittedCategoricalImputer,
    FittedMeanMedianImputer, FittedOrdinalEncoder, FittedPowerTransformer, FittedRareLabelEncoder,
    FittedStandardScaler, FittedTransformer, MeanMedianImputer, OrdinalEncoder, PowerTransformer,
    RareLabelEncoder, StandardScaler, Transformer,
};
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// An unfit pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    MedianImputer(MeanMedianImputer),
    CastVariables(CastVariables),
    RareLabel(RareLabelEncoder),
    Power(PowerTransformer),
    DropFeatures(DropFeatures),
    CategoricalImputer(CategoricalImputer),
    Ordinal(OrdinalEncoder),
    Scaler(StandardScaler),
}

/// A pipeline stage with its learned parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedStage {
    MedianImputer(FittedMeanMedianImputer),
    CastVariables(CastVariables),
    RareLabel(FittedRareLabelEncoder),
    Power(FittedPowerTransformer),
    DropFeatures(DropFeatures),
    CategoricalImputer(FittedCategoricalImputer),
    Ordinal(FittedOrdinalEncoder),
    Scaler(FittedStandardScaler),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::MedianImputer(s) => Transformer::name(s),
            Stage::CastVariables(s) => Transformer::name(s),
            Stage::RareLabel(s) => Transformer::name(s),
            Stage::Power(s) => Transformer::name(s),
            Stage::DropFeatures(s) => Transformer::name(s),
            Stage::CategoricalImputer(s) => Transformer::name(s),
            Stage::Ordinal(s) => Transformer::name(s),
            Stage::Scaler(s) => Transformer::name(s),
        }
    }

    /// Fit the wrapped stage, producing its fitted counterpart
    pub fn fit(&self, x: &DataFrame, y: Option<&[f64]>) -> Result<FittedStage> {
        Ok(match self {
            Stage::MedianImputer(s) => FittedStage::MedianImputer(s.fit(x, y)?),
            Stage::CastVariables(s) => FittedStage::CastVariables(Transformer::fit(s, x, y)?),
            Stage::RareLabel(s) => FittedStage::RareLabel(s.fit(x, y)?),
            Stage::Power(s) => FittedStage::Power(s.fit(x, y)?),
            Stage::DropFeatures(s) => FittedStage::DropFeatures(Transformer::fit(s, x, y)?),
            Stage::CategoricalImputer(s) => FittedStage::CategoricalImputer(s.fit(x, y)?),
            Stage::Ordinal(s) => FittedStage::Ordinal(s.fit(x, y)?),
            Stage::Scaler(s) => FittedStage::Scaler(s.fit(x, y)?),
        })
    }
}

impl FittedStage {
    pub fn name(&self) -> &'static str {
        match self {
            FittedStage::MedianImputer(s) => FittedTransformer::name(s),
            FittedStage::CastVariables(s) => FittedTransformer::name(s),
            FittedStage::RareLabel(s) => FittedTransformer::name(s),
            FittedStage::Power(s) => FittedTransformer::name(s),
            FittedStage::DropFeatures(s) => FittedTransformer::name(s),
            FittedStage::CategoricalImputer(s) => FittedTransformer::name(s),
            FittedStage::Ordinal(s) => FittedTransformer::name(s),
            FittedStage::Scaler(s) => FittedTransformer::name(s),
        }
    }

    pub fn transform(&self, x: &DataFrame) -> Result<DataFrame> {
        match self {
            FittedStage::MedianImputer(s) => s.transform(x),
            FittedStage::CastVariables(s) => s.transform(x),
            FittedStage::RareLabel(s) => s.transform(x),
            FittedStage::Power(s) => s.transform(x),
            FittedStage::DropFeatures(s) => s.transform(x),
            FittedStage::CategoricalImputer(s) => s.transform(x),
            FittedStage::Ordinal(s) => s.transform(x),
            FittedStage::Scaler(s) => s.transform(x),
        }
    }
}
