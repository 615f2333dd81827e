//! Kolosal Pipeline CLI Module
//!
//! Command-line interface for training and scoring the classification pipeline.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::Settings;
use crate::export::{ModelMetadata, ModelStore, PersistedModel};
use crate::training::Trainer;
use crate::utils::{DataLoader, DataSaver};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) -> String {
    format!("{:<16} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn indented(block: &str) {
    for line in block.lines() {
        println!("  {}", line);
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-pipeline")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tabular classification pipeline: train, evaluate, persist and predict")]
#[command(long_about = None)]
pub struct Cli {
    /// Settings file (YAML)
    #[arg(short, long, global = true, default_value = "config.yml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split, fit and evaluate the pipeline, then persist it
    Train,

    /// Score `test_data` with the persisted pipeline
    Predict {
        /// Output predictions file (CSV); printed when absent
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    step_run("Reading settings");
    let settings = Settings::from_file(path)?;
    step_done(&path.display().to_string());
    Ok(settings)
}

fn load_data(settings: &Settings, path: &str) -> anyhow::Result<DataFrame> {
    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new()
        .with_na_values(settings.model_config.na_values.clone())
        .load_csv(path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));
    Ok(df)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(config_path: &Path) -> anyhow::Result<()> {
    section("Train");

    let settings = load_settings(config_path)?;
    let df = load_data(&settings, &settings.path_config.train_data)?;

    let trainer = Trainer::new(&settings.model_config)?;
    step_run(&format!(
        "Training {} with {} trees",
        "random_forest".cyan(),
        settings.model_config.n_estimators
    ));
    let start = Instant::now();
    let outcome = trainer.train(&df)?;
    step_done(&format!("{:?}", start.elapsed()));

    let evaluation = outcome.evaluate()?;

    let metadata = ModelMetadata::for_pipeline(&settings.model_config, &outcome.pipeline)
        .with_metrics(evaluation.metrics());
    let store = ModelStore::new(&settings.path_config.model_path);
    store.save(&PersistedModel::new(metadata, outcome.pipeline))?;
    step_ok(&format!("Model saved to {}", store.path().display()));

    section("Classification report");
    indented(&evaluation.report.to_string());

    section("Confusion matrix");
    indented(&evaluation.confusion_matrix.to_string());

    println!();
    println!("  {}", kv("Accuracy", &format!("{:.4}", evaluation.report.accuracy)));
    println!("  {}", kv("Log loss", &format!("{:.4}", evaluation.log_loss)));
    println!("  {}", kv("Validate rows", &evaluation.report.support.to_string()));
    println!();

    Ok(())
}

pub fn cmd_predict(config_path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    section("Predict");

    let settings = load_settings(config_path)?;

    step_run("Loading model");
    let store = ModelStore::new(&settings.path_config.model_path);
    let model = store.load()?;
    step_done(&format!("trained {}", model.metadata.trained_at));

    let df = load_data(&settings, &settings.path_config.test_data)?;

    step_run("Scoring");
    let start = Instant::now();
    let predictions = model.pipeline.predict(&df)?;
    step_done(&format!("{} rows in {:?}", predictions.len(), start.elapsed()));

    let mut scored = df.clone();
    scored.with_column(Series::new("prediction".into(), predictions))?;

    match output {
        Some(path) => {
            DataSaver::save_csv(&mut scored, path)?;
            step_ok(&format!("Predictions written to {}", path.display()));
        }
        None => {
            section("Predictions");
            println!("{}", scored.select(["prediction"])?);
        }
    }
    println!();

    Ok(())
}
