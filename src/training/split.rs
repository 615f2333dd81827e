//! Seeded train/validate partitioning

use crate::error::{PipelineError, Result};
use crate::preprocessing::categorical_values;
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Disjoint train and validate partitions, with features and target separated
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: DataFrame,
    pub x_validate: DataFrame,
    pub y_train: Series,
    pub y_validate: Series,
    /// Row positions in the input frame, in partition order
    pub train_indices: Vec<usize>,
    pub validate_indices: Vec<usize>,
}

fn check_test_size(test_size: f64) -> Result<()> {
    if test_size > 0.0 && test_size < 1.0 {
        Ok(())
    } else {
        Err(PipelineError::InvalidParameter {
            name: "test_size".to_string(),
            value: test_size.to_string(),
            reason: "must be in (0, 1)".to_string(),
        })
    }
}

fn target_series<'a>(data: &'a DataFrame, target: &str) -> Result<&'a Series> {
    data.column(target)
        .map(|c| c.as_materialized_series())
        .map_err(|_| {
            PipelineError::UnsupportedSchema(format!(
                "target column '{}' not found in data",
                target
            ))
        })
}

/// Random partition: a seeded permutation whose first `ceil(test_size * n)`
/// rows form the validate set
pub fn train_test_split(
    data: &DataFrame,
    target: &str,
    test_size: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    target_series(data, target)?;
    check_test_size(test_size)?;

    let n = data.height();
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(PipelineError::ValidationError(format!(
            "test_size {} leaves an empty partition for {} rows",
            test_size, n
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train_indices = indices.split_off(n_test);
    build_split(data, target, train_indices, indices)
}

/// Per-class partition keeping class proportions; each class contributes
/// `round(test_size * class_count)` rows to the validate set
pub fn stratified_split(
    data: &DataFrame,
    target: &str,
    test_size: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    let labels = categorical_values(target_series(data, target)?)?;
    check_test_size(test_size)?;

    let mut by_class: BTreeMap<Option<String>, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.into_iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_indices = Vec::new();
    let mut validate_indices = Vec::new();
    for (_, mut rows) in by_class {
        rows.shuffle(&mut rng);
        let n_test = (test_size * rows.len() as f64).round() as usize;
        let train_part = rows.split_off(n_test);
        validate_indices.extend(rows);
        train_indices.extend(train_part);
    }

    if train_indices.is_empty() || validate_indices.is_empty() {
        return Err(PipelineError::ValidationError(format!(
            "test_size {} leaves an empty partition for {} rows",
            test_size,
            data.height()
        )));
    }

    train_indices.sort_unstable();
    validate_indices.sort_unstable();
    build_split(data, target, train_indices, validate_indices)
}

fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec(
        "idx".into(),
        indices.iter().map(|&i| i as IdxSize).collect(),
    );
    Ok(df.take(&idx)?)
}

fn build_split(
    data: &DataFrame,
    target: &str,
    train_indices: Vec<usize>,
    validate_indices: Vec<usize>,
) -> Result<TrainTestSplit> {
    let features = data.drop(target)?;
    let y = target_series(data, target)?.clone().into_frame();

    Ok(TrainTestSplit {
        x_train: take_rows(&features, &train_indices)?,
        x_validate: take_rows(&features, &validate_indices)?,
        y_train: take_rows(&y, &train_indices)?
            .column(target)?
            .as_materialized_series()
            .clone(),
        y_validate: take_rows(&y, &validate_indices)?
            .column(target)?
            .as_materialized_series()
            .clone(),
        train_indices,
        validate_indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn sample(n: usize) -> DataFrame {
        let ids: Vec<i64> = (0..n as i64).collect();
        let target: Vec<i64> = (0..n as i64).map(|i| i % 2).collect();
        df!("id" => ids, "survived" => target).unwrap()
    }

    #[test]
    fn test_split_sizes_and_disjoint() {
        let split = train_test_split(&sample(100), "survived", 0.2, 42).unwrap();

        assert_eq!(split.x_train.height(), 80);
        assert_eq!(split.x_validate.height(), 20);
        assert_eq!(split.y_train.len(), 80);
        assert_eq!(split.y_validate.len(), 20);
        assert!(split.x_train.column("survived").is_err());

        let train: BTreeSet<usize> = split.train_indices.iter().copied().collect();
        let validate: BTreeSet<usize> = split.validate_indices.iter().copied().collect();
        assert!(train.is_disjoint(&validate));
        assert_eq!(train.union(&validate).count(), 100);
    }

    #[test]
    fn test_rows_stay_aligned() {
        let split = train_test_split(&sample(50), "survived", 0.3, 1).unwrap();
        let ids = split.x_validate.column("id").unwrap().i64().unwrap();
        let y = split.y_validate.i64().unwrap();
        for (id, label) in ids.into_iter().zip(y.into_iter()) {
            assert_eq!(id.unwrap() % 2, label.unwrap());
        }
    }

    #[test]
    fn test_split_is_reproducible() {
        let df = sample(30);
        let a = train_test_split(&df, "survived", 0.2, 7).unwrap();
        let b = train_test_split(&df, "survived", 0.2, 7).unwrap();
        let c = train_test_split(&df, "survived", 0.2, 8).unwrap();
        assert_eq!(a.validate_indices, b.validate_indices);
        assert_ne!(a.validate_indices, c.validate_indices);
    }

    #[test]
    fn test_missing_target() {
        let err = train_test_split(&sample(10), "label", 0.2, 0).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedSchema(_)));
    }

    #[test]
    fn test_empty_partition_rejected() {
        let err = train_test_split(&sample(1), "survived", 0.5, 0).unwrap_err();
        assert!(matches!(err, PipelineError::ValidationError(_)));
    }

    #[test]
    fn test_stratified_keeps_proportions() {
        let split = stratified_split(&sample(100), "survived", 0.2, 3).unwrap();
        assert_eq!(split.validate_indices.len(), 20);
        let positives = split
            .y_validate
            .i64()
            .unwrap()
            .into_no_null_iter()
            .filter(|&v| v == 1)
            .count();
        assert_eq!(positives, 10);
    }
}
