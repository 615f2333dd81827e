//! Kolosal Pipeline - tabular classification pipeline
//!
//! This crate trains, evaluates and persists a supervised classification
//! pipeline over tabular data:
//! - Eight fitted preprocessing stages (imputation, casting, rare-label
//!   grouping, power transform, feature dropping, ordinal encoding, scaling)
//! - A seeded, parallel Random Forest classifier
//! - A trainer that splits, fits, predicts and evaluates
//! - A model store for the fitted pipeline and its metadata
//!
//! # Modules
//!
//! - [`config`] - YAML settings (paths, variables, hyperparameters)
//! - [`preprocessing`] - Transformation stages and the [`Pipeline`](preprocessing::Pipeline)
//! - [`training`] - Decision trees, Random Forest, splitting, metrics, [`Trainer`](training::Trainer)
//! - [`export`] - Model persistence (bincode, JSON)
//! - [`utils`] - CSV loading and saving
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

pub mod config;

// Core ML modules
pub mod preprocessing;
pub mod training;

// Utilities
pub mod export;
pub mod utils;

// Services
pub mod cli;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PipelineError, Result};

    // Configuration
    pub use crate::config::{ModelConfig, PathConfig, Settings};

    // Preprocessing
    pub use crate::preprocessing::{
        FittedPipeline, FittedStage, FittedTransformer, Pipeline, Stage, Transformer,
    };

    // Training
    pub use crate::training::{
        ClassificationReport, ConfusionMatrix, Evaluation, RandomForest, Trainer,
        TrainingOutcome,
    };

    // Export
    pub use crate::export::{ModelMetadata, ModelStore, PersistedModel, SerializationFormat};

    // Data IO
    pub use crate::utils::{DataLoader, DataSaver};
}
