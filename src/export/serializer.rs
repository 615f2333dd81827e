//! Model serialization utilities

use crate::config::ModelConfig;
use crate::error::{PipelineError, Result};
use crate::preprocessing::FittedPipeline;
use crate::training::ModelMetrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Serialization format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SerializationFormat {
    /// Binary format using bincode (efficient)
    #[default]
    Binary,
    /// JSON format (portable, human-readable)
    Json,
}

impl SerializationFormat {
    /// `.json` files are JSON; everything else is binary
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => SerializationFormat::Json,
            _ => SerializationFormat::Binary,
        }
    }
}

/// Model metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Crate version that produced the artifact
    pub version: String,
    /// Training timestamp (RFC 3339)
    pub trained_at: String,
    /// Target column
    pub target_name: String,
    /// Class labels in probability-column order
    pub classes: Vec<String>,
    /// Estimator input columns
    pub feature_names: Vec<String>,
    /// Model type
    pub model_type: String,
    /// Hyperparameters
    pub hyperparameters: BTreeMap<String, String>,
    /// Validation metrics, when evaluation ran
    pub metrics: Option<ModelMetrics>,
}

impl ModelMetadata {
    /// Metadata for a pipeline trained with `config`
    pub fn for_pipeline(config: &ModelConfig, pipeline: &FittedPipeline) -> Self {
        let mut hyperparameters = BTreeMap::new();
        hyperparameters.insert("n_estimators".to_string(), config.n_estimators.to_string());
        hyperparameters.insert("random_state".to_string(), config.random_state.to_string());
        hyperparameters.insert("test_size".to_string(), config.test_size.to_string());
        hyperparameters.insert(
            "max_depth".to_string(),
            config
                .max_depth
                .map_or_else(|| "none".to_string(), |d| d.to_string()),
        );
        hyperparameters.insert("max_features".to_string(), config.max_features.to_string());
        hyperparameters.insert("criterion".to_string(), config.criterion.to_string());
        hyperparameters.insert("bootstrap".to_string(), config.bootstrap.to_string());

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: chrono::Utc::now().to_rfc3339(),
            target_name: config.target.clone(),
            classes: pipeline.classes().to_vec(),
            feature_names: pipeline.feature_names().to_vec(),
            model_type: "random_forest".to_string(),
            hyperparameters,
            metrics: None,
        }
    }

    /// Attach validation metrics
    pub fn with_metrics(mut self, metrics: ModelMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// The persisted unit: a fitted pipeline and its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedModel {
    /// Magic bytes for format detection
    magic: [u8; 4],
    /// Format version
    format_version: u32,
    pub metadata: ModelMetadata,
    pub pipeline: FittedPipeline,
}

impl PersistedModel {
    const MAGIC: [u8; 4] = [b'K', b'P', b'L', b'M'];
    const VERSION: u32 = 1;

    pub fn new(metadata: ModelMetadata, pipeline: FittedPipeline) -> Self {
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            metadata,
            pipeline,
        }
    }

    fn verify(&self) -> Result<()> {
        if self.magic != Self::MAGIC {
            return Err(PipelineError::SerializationError(
                "not a pipeline model file".to_string(),
            ));
        }
        if self.format_version != Self::VERSION {
            return Err(PipelineError::SerializationError(format!(
                "unsupported model format version {}",
                self.format_version
            )));
        }
        Ok(())
    }
}

/// Reads and writes persisted models at a filesystem path
#[derive(Debug, Clone)]
pub struct ModelStore {
    path: PathBuf,
    format: SerializationFormat,
}

impl ModelStore {
    /// Store at `path`, format chosen from the extension
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = SerializationFormat::from_path(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SerializationFormat {
        self.format
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Write the model; the target file is replaced only after a complete write
    pub fn save(&self, model: &PersistedModel) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        if let Err(e) = self.write_to(&tmp, model) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, &self.path)?;

        info!(
            path = %self.path.display(),
            format = ?self.format,
            "Model saved"
        );
        Ok(())
    }

    fn write_to(&self, path: &Path, model: &PersistedModel) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        match self.format {
            SerializationFormat::Binary => bincode::serialize_into(&mut writer, model)?,
            SerializationFormat::Json => serde_json::to_writer_pretty(&mut writer, model)?,
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a model back
    pub fn load(&self) -> Result<PersistedModel> {
        let file = File::open(&self.path).map_err(|e| {
            PipelineError::SerializationError(format!(
                "cannot open model {}: {}",
                self.path.display(),
                e
            ))
        })?;
        let reader = BufReader::new(file);

        let model: PersistedModel = match self.format {
            SerializationFormat::Binary => bincode::deserialize_from(reader)?,
            SerializationFormat::Json => serde_json::from_reader(reader)?,
        };
        model.verify()?;

        info!(
            path = %self.path.display(),
            trained_at = %model.metadata.trained_at,
            "Model loaded"
        );
        Ok(model)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}
