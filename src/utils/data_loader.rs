//! Data loading utilities

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// CSV loader for labeled and unlabeled datasets
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows scanned to infer column types
    infer_schema_length: usize,
    /// Extra tokens read as missing values
    na_values: Vec<String>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
            na_values: Vec::new(),
        }
    }

    /// Treat these tokens as missing values
    pub fn with_na_values(mut self, na_values: Vec<String>) -> Self {
        self.na_values = na_values;
        self
    }

    /// Set the number of rows used for schema inference
    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows.max(1);
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let start = Instant::now();

        let file = File::open(path).map_err(|e| {
            PipelineError::DataError(format!("cannot open {}: {}", path.display(), e))
        })?;

        let mut parse_opts = CsvParseOptions::default();
        if !self.na_values.is_empty() {
            let tokens: Vec<PlSmallStr> = self.na_values.iter().map(|v| v.as_str().into()).collect();
            parse_opts = parse_opts.with_null_values(Some(NullValues::AllColumns(tokens)));
        }

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()?;

        info!(
            path = %path.display(),
            rows = df.height(),
            columns = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Data loaded"
        );
        Ok(df)
    }
}

/// Data saver
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV, creating parent directories
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;

        CsvWriter::new(&mut file).finish(df)?;
        info!(path = %path.display(), rows = df.height(), "Data saved");
        Ok(())
    }
}
