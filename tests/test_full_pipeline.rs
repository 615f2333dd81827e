//! Integration test: Full pipeline (train, evaluate, persist, reload, predict)

use kolosal_pipeline::config::Settings;
use kolosal_pipeline::error::PipelineError;
use kolosal_pipeline::export::{ModelMetadata, ModelStore, PersistedModel, SerializationFormat};
use kolosal_pipeline::training::Trainer;
use kolosal_pipeline::utils::{DataLoader, DataSaver};
use polars::prelude::*;

const CONFIG: &str = r#"
train_data: data/train.csv
test_data: data/test.csv
model_path: models/model.bin
test_size: 0.2
random_state: 0
n_estimators: 25
target: survived
num_vars: [age, fare]
discrete_vars: [pclass]
cat_vars: [sex, embarked, cabin]
num_vars_wf_na: [age]
cat_vars_wf_na: [embarked, cabin]
features_to_drop: [name]
"#;

fn settings() -> Settings {
    Settings::from_yaml_str(CONFIG).unwrap()
}

fn passengers() -> DataFrame {
    let n = 100;
    let decks = ["A", "B", "C", "D", "E", "F"];

    let pclass: Vec<i64> = (0..n).map(|i| (i % 3) as i64 + 1).collect();
    let sex: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "male" } else { "female" }).collect();
    let age: Vec<Option<f64>> = (0..n)
        .map(|i| if i % 7 == 0 { None } else { Some(2.0 + ((i * 13) % 60) as f64) })
        .collect();
    let fare: Vec<f64> = (0..n)
        .map(|i| 5.0 + ((i * 37) % 90) as f64 / (1.0 + (i % 3) as f64))
        .collect();
    let embarked: Vec<Option<&str>> = (0..n)
        .map(|i| match i % 11 {
            0 => None,
            1 | 4 => Some("C"),
            7 => Some("Q"),
            _ => Some("S"),
        })
        .collect();
    let cabin: Vec<Option<String>> = (0..n)
        .map(|i| match i {
            50 => Some("T".to_string()),
            _ if i % 3 == 0 => None,
            _ => Some(decks[i % decks.len()].to_string()),
        })
        .collect();
    let name: Vec<String> = (0..n).map(|i| format!("passenger_{}", i)).collect();
    let survived: Vec<i64> = (0..n)
        .map(|i| {
            let female = i % 2 == 1;
            let upper = i % 3 != 2;
            i64::from((female && upper) || i % 10 == 0)
        })
        .collect();

    df!(
        "pclass" => pclass,
        "sex" => sex,
        "age" => age,
        "fare" => fare,
        "embarked" => embarked,
        "cabin" => cabin,
        "name" => name,
        "survived" => survived,
    )
    .unwrap()
}

fn features() -> DataFrame {
    passengers().drop("survived").unwrap()
}

#[test]
fn test_train_produces_validation_outputs() {
    let trainer = Trainer::new(&settings().model_config).unwrap();
    let outcome = trainer.train(&passengers()).unwrap();

    assert_eq!(outcome.y_validate.len(), 20);
    assert_eq!(outcome.y_pred.len(), 20);
    assert_eq!(outcome.y_proba.dim(), (20, 2));
    assert_eq!(outcome.pipeline.classes(), &["0", "1"]);
    for row in outcome.y_proba.rows() {
        assert!((row.sum() - 1.0).abs() < 1e-9);
    }

    let features = outcome.pipeline.feature_names();
    assert!(!features.iter().any(|f| f == "name" || f == "survived"));
    assert_eq!(features.len(), 6);
}

#[test]
fn test_training_is_bit_reproducible() {
    let trainer = Trainer::new(&settings().model_config).unwrap();
    let data = passengers();

    let first = trainer.train(&data).unwrap();
    let second = trainer.train(&data).unwrap();

    assert_eq!(first.validate_indices, second.validate_indices);
    assert_eq!(first.y_pred, second.y_pred);
    assert_eq!(first.y_proba, second.y_proba);

    let a = first.evaluate().unwrap();
    let b = second.evaluate().unwrap();
    assert_eq!(a.confusion_matrix, b.confusion_matrix);
    assert_eq!(a.report, b.report);
    assert_eq!(a.log_loss.to_bits(), b.log_loss.to_bits());
}

#[test]
fn test_evaluation_is_consistent() {
    let trainer = Trainer::new(&settings().model_config).unwrap();
    let outcome = trainer.train(&passengers()).unwrap();
    let evaluation = outcome.evaluate().unwrap();

    assert_eq!(evaluation.report.support, 20);
    assert_eq!(evaluation.confusion_matrix.matrix().sum(), 20);
    let diagonal: usize = (0..evaluation.confusion_matrix.labels().len())
        .map(|k| evaluation.confusion_matrix.matrix()[[k, k]])
        .sum();
    assert!((evaluation.report.accuracy - diagonal as f64 / 20.0).abs() < 1e-12);
    assert!(evaluation.log_loss.is_finite() && evaluation.log_loss >= 0.0);

    let metrics = evaluation.metrics();
    assert_eq!(metrics.accuracy, evaluation.report.accuracy);
    assert_eq!(metrics.log_loss, Some(evaluation.log_loss));
}

#[test]
fn test_predict_handles_unseen_and_missing_values() {
    let trainer = Trainer::new(&settings().model_config).unwrap();
    let outcome = trainer.train(&passengers()).unwrap();

    let scoring = df!(
        "pclass" => &[1i64, 3, 4],
        "sex" => &["female", "male", "male"],
        "age" => &[None, Some(30.0), Some(70.0)],
        "fare" => &[80.0, 7.25, 12.0],
        "embarked" => &[Some("S"), None, Some("Z")],
        "cabin" => &[None, Some("B"), Some("X")],
        "name" => &["x", "y", "z"],
    )
    .unwrap();

    let predictions = outcome.pipeline.predict(&scoring).unwrap();
    assert_eq!(predictions.len(), 3);
    assert!(predictions.iter().all(|p| p == "0" || p == "1"));
}

#[test]
fn test_predict_requires_configured_columns() {
    let trainer = Trainer::new(&settings().model_config).unwrap();
    let outcome = trainer.train(&passengers()).unwrap();

    let err = outcome
        .pipeline
        .predict(&features().drop("age").unwrap())
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingColumns { .. }));
}

#[test]
fn test_missing_target_is_rejected() {
    let trainer = Trainer::new(&settings().model_config).unwrap();
    let err = trainer.train(&features()).unwrap_err();
    assert!(matches!(err, PipelineError::UnsupportedSchema(_)));
}

#[test]
fn test_missing_configured_column_is_named() {
    let trainer = Trainer::new(&settings().model_config).unwrap();
    let err = trainer.train(&passengers().drop("cabin").unwrap()).unwrap_err();
    match err {
        PipelineError::MissingColumns { stage, columns } => {
            assert_eq!(stage, "rare_label_encoder");
            assert_eq!(columns, vec!["cabin"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn assert_store_round_trip(file_name: &str, expected_format: SerializationFormat) {
    let settings = settings();
    let trainer = Trainer::new(&settings.model_config).unwrap();
    let outcome = trainer.train(&passengers()).unwrap();
    let evaluation = outcome.evaluate().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(dir.path().join("nested").join(file_name));
    assert_eq!(store.format(), expected_format);

    let expected = outcome.pipeline.predict(&features()).unwrap();
    let expected_proba = outcome.pipeline.predict_proba(&features()).unwrap();

    let metadata = ModelMetadata::for_pipeline(&settings.model_config, &outcome.pipeline)
        .with_metrics(evaluation.metrics());
    store
        .save(&PersistedModel::new(metadata, outcome.pipeline))
        .unwrap();
    assert!(store.exists());

    let loaded = store.load().unwrap();
    assert_eq!(loaded.metadata.target_name, "survived");
    assert_eq!(loaded.metadata.classes, vec!["0", "1"]);
    assert_eq!(loaded.metadata.hyperparameters["n_estimators"], "25");
    assert_eq!(loaded.metadata.hyperparameters["max_features"], "sqrt");
    assert_eq!(loaded.metadata.hyperparameters["criterion"], "gini");
    assert_eq!(loaded.metadata.hyperparameters["bootstrap"], "true");
    assert!(loaded.metadata.metrics.is_some());

    assert_eq!(loaded.pipeline.predict(&features()).unwrap(), expected);
    assert_eq!(loaded.pipeline.predict_proba(&features()).unwrap(), expected_proba);

    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 1, "temporary file left behind: {:?}", leftovers);
}

#[test]
fn test_model_store_binary_round_trip() {
    assert_store_round_trip("model.bin", SerializationFormat::Binary);
}

#[test]
fn test_model_store_json_round_trip() {
    assert_store_round_trip("model.json", SerializationFormat::Json);
}

#[test]
fn test_csv_round_trip_then_train() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train.csv");

    let mut data = passengers();
    DataSaver::save_csv(&mut data, &path).unwrap();
    let loaded = DataLoader::new().load_csv(&path).unwrap();
    assert_eq!(loaded.shape(), (100, 8));

    let trainer = Trainer::new(&settings().model_config).unwrap();
    let outcome = trainer.train(&loaded).unwrap();
    assert_eq!(outcome.y_pred.len(), 20);
}

#[test]
fn test_invalid_settings_are_rejected() {
    let broken = CONFIG.replace("n_estimators: 25", "n_estimators: 0");
    assert!(matches!(
        Settings::from_yaml_str(&broken),
        Err(PipelineError::ConfigError(_))
    ));

    let broken = CONFIG.replace("test_size: 0.2", "test_size: 1.5");
    assert!(matches!(
        Settings::from_yaml_str(&broken),
        Err(PipelineError::ConfigError(_))
    ));
}
