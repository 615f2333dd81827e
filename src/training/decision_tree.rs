//! Decision tree classifier
//!
//! Trees are grown on class indices (`0..n_classes`) and store the class
//! distribution of the training samples in every leaf, so a forest can average
//! probabilities instead of counting votes.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with the class distribution of its samples
    Leaf {
        distribution: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Gini impurity
    #[default]
    Gini,
    /// Shannon entropy
    Entropy,
}

impl std::fmt::Display for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Criterion::Gini => write!(f, "gini"),
            Criterion::Entropy => write!(f, "entropy"),
        }
    }
}

impl Criterion {
    fn impurity(&self, counts: &[usize], total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let n = total as f64;
        match self {
            Criterion::Gini => {
                1.0 - counts
                    .iter()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy => -counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
        }
    }
}

/// Decision tree hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features sampled at each split (all when `None`)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
        }
    }
}

/// A grown tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTree {
    root: TreeNode,
    n_features: usize,
    n_classes: usize,
    feature_importances: Array1<f64>,
}

/// Best split found for one candidate feature
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

struct GrowContext<'a> {
    x: &'a Array2<f64>,
    y: &'a [usize],
    n_classes: usize,
}

impl DecisionTree {
    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set number of features sampled per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Grow a tree on `x` with class indices `y`.
    ///
    /// `rng` drives per-split feature sampling; the same generator state gives
    /// the same tree.
    pub fn fit(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<FittedTree> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PipelineError::ValidationError(
                "cannot grow a tree on zero samples".to_string(),
            ));
        }
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(PipelineError::ValidationError(format!(
                "class index {} out of range for {} classes",
                bad, n_classes
            )));
        }

        let ctx = GrowContext { x, y, n_classes };
        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(&ctx, &indices, 0, rng, &mut importances);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }

        Ok(FittedTree {
            root,
            n_features,
            n_classes,
            feature_importances: Array1::from_vec(importances),
        })
    }

    fn class_counts(ctx: &GrowContext<'_>, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; ctx.n_classes];
        for &i in indices {
            counts[ctx.y[i]] += 1;
        }
        counts
    }

    fn leaf(counts: &[usize], n_samples: usize) -> TreeNode {
        let n = n_samples.max(1) as f64;
        TreeNode::Leaf {
            distribution: counts.iter().map(|&c| c as f64 / n).collect(),
            n_samples,
        }
    }

    fn build_tree(
        &self,
        ctx: &GrowContext<'_>,
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let counts = Self::class_counts(ctx, indices);
        let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure
            || ctx.x.ncols() == 0;

        if should_stop {
            return Self::leaf(&counts, n_samples);
        }

        let parent_impurity = self.criterion.impurity(&counts, n_samples);
        let features = self.sample_features(ctx.x.ncols(), rng);

        let Some(best) = self.find_best_split(ctx, indices, &features, parent_impurity) else {
            return Self::leaf(&counts, n_samples);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| ctx.x[[i, best.feature_idx]] <= best.threshold);

        importances[best.feature_idx] += n_samples as f64 * best.gain;

        let left = Box::new(self.build_tree(ctx, &left_indices, depth + 1, rng, importances));
        let right = Box::new(self.build_tree(ctx, &right_indices, depth + 1, rng, importances));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity: parent_impurity,
        }
    }

    fn sample_features(&self, n_features: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let k = self.max_features.unwrap_or(n_features).clamp(1, n_features);
        if k == n_features {
            return (0..n_features).collect();
        }
        index::sample(rng, n_features, k).into_vec()
    }

    fn find_best_split(
        &self,
        ctx: &GrowContext<'_>,
        indices: &[usize],
        features: &[usize],
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        // Each feature scanned independently; collection keeps sampling order
        let candidates: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature_idx| self.best_split_for_feature(ctx, indices, feature_idx, parent_impurity))
            .collect();

        // First maximum wins
        let mut best: Option<SplitCandidate> = None;
        for candidate in candidates.into_iter().flatten() {
            if best.map_or(true, |b| candidate.gain > b.gain) {
                best = Some(candidate);
            }
        }
        best
    }

    /// Sorted sweep over one feature, moving samples left one at a time
    fn best_split_for_feature(
        &self,
        ctx: &GrowContext<'_>,
        indices: &[usize],
        feature_idx: usize,
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let mut samples: Vec<(f64, usize)> = indices
            .iter()
            .map(|&i| (ctx.x[[i, feature_idx]], ctx.y[i]))
            .collect();
        samples.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let n = samples.len();
        let mut left_counts = vec![0usize; ctx.n_classes];
        let mut right_counts = vec![0usize; ctx.n_classes];
        for &(_, class) in &samples {
            right_counts[class] += 1;
        }

        let mut best: Option<SplitCandidate> = None;
        for i in 0..n.saturating_sub(1) {
            let (value, class) = samples[i];
            left_counts[class] += 1;
            right_counts[class] -= 1;

            let next = samples[i + 1].0;
            if value == next {
                continue;
            }

            let left_n = i + 1;
            let right_n = n - left_n;
            if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                continue;
            }

            let weighted = (left_n as f64 * self.criterion.impurity(&left_counts, left_n)
                + right_n as f64 * self.criterion.impurity(&right_counts, right_n))
                / n as f64;
            let gain = parent_impurity - weighted;

            if gain > 0.0 && best.map_or(true, |b| gain > b.gain) {
                let mid = value + (next - value) / 2.0;
                // Adjacent floats can round the midpoint up to `next`
                let threshold = if mid < next { mid } else { value };
                best = Some(SplitCandidate {
                    feature_idx,
                    threshold,
                    gain,
                });
            }
        }

        best
    }
}

impl FittedTree {
    /// Class probabilities for every row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            let distribution = self.leaf_distribution(&self.root, row);
            for (j, &p) in distribution.iter().enumerate() {
                proba[[i, j]] = p;
            }
        }
        Ok(proba)
    }

    /// Most probable class index for every row; ties go to the lower index
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.rows().into_iter().map(|r| argmax(r)).collect())
    }

    fn leaf_distribution<'a>(&'a self, node: &'a TreeNode, sample: ArrayView1<'_, f64>) -> &'a [f64] {
        match node {
            TreeNode::Leaf { distribution, .. } => distribution,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                if sample[*feature_idx] <= *threshold {
                    self.leaf_distribution(left, sample)
                } else {
                    self.leaf_distribution(right, sample)
                }
            }
        }
    }

    /// Normalized mean decrease in impurity per feature
    pub fn feature_importances(&self) -> &Array1<f64> {
        &self.feature_importances
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        Self::node_depth(&self.root)
    }

    fn node_depth(node: &TreeNode) -> usize {
        match node {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => {
                1 + Self::node_depth(left).max(Self::node_depth(right))
            }
        }
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        Self::count_leaves(&self.root)
    }

    fn count_leaves(node: &TreeNode) -> usize {
        match node {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => {
                Self::count_leaves(left) + Self::count_leaves(right)
            }
        }
    }
}

/// Index of the first maximum
pub(crate) fn argmax(row: ArrayView1<'_, f64>) -> usize {
    let mut best_idx = 0;
    let mut best = f64::NEG_INFINITY;
    for (j, &p) in row.iter().enumerate() {
        if p > best {
            best = p;
            best_idx = j;
        }
    }
    best_idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(0)
    }

    #[test]
    fn test_classifier_simple() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = vec![0, 0, 1, 1];

        let tree = DecisionTree::default().fit(&x, &y, 2, &mut rng()).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_leaf_distribution() {
        let x = array![[1.0], [1.0], [1.0]];
        let y = vec![0, 1, 1];

        // Identical feature values cannot be split
        let tree = DecisionTree::default().fit(&x, &y, 2, &mut rng()).unwrap();
        let proba = tree.predict_proba(&x).unwrap();
        assert!((proba[[0, 0]] - 1.0 / 3.0).abs() < 1e-12);
        assert!((proba[[0, 1]] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(tree.get_n_leaves(), 1);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = vec![0, 1, 0, 1];

        let tree = DecisionTree::default()
            .with_max_depth(1)
            .fit(&x, &y, 2, &mut rng())
            .unwrap();
        assert!(tree.get_depth() <= 2);
    }

    #[test]
    fn test_min_samples_leaf() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = vec![0, 1, 1, 1];

        let tree = DecisionTree::default()
            .with_min_samples_leaf(2)
            .fit(&x, &y, 2, &mut rng())
            .unwrap();
        if let TreeNode::Split { left, right, .. } = tree.root() {
            for child in [left, right] {
                if let TreeNode::Leaf { n_samples, .. } = child.as_ref() {
                    assert!(*n_samples >= 2);
                }
            }
        }
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = vec![0, 0, 1, 1];

        let tree = DecisionTree::default().fit(&x, &y, 2, &mut rng()).unwrap();
        let importances = tree.feature_importances();
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_same_seed_same_tree() {
        let x = array![
            [1.0, 5.0, 0.3],
            [2.0, 3.0, 0.1],
            [3.0, 4.0, 0.9],
            [4.0, 1.0, 0.4],
            [5.0, 2.0, 0.7],
            [6.0, 0.0, 0.2]
        ];
        let y = vec![0, 0, 1, 1, 0, 1];
        let tree = DecisionTree::default().with_max_features(1);

        let a = tree.fit(&x, &y, 2, &mut ChaCha8Rng::seed_from_u64(7)).unwrap();
        let b = tree.fit(&x, &y, 2, &mut ChaCha8Rng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_class_index_out_of_range() {
        let x = array![[1.0], [2.0]];
        let err = DecisionTree::default()
            .fit(&x, &[0, 2], 2, &mut rng())
            .unwrap_err();
        assert!(matches!(err, PipelineError::ValidationError(_)));
    }

    #[test]
    fn test_argmax_first_wins() {
        assert_eq!(argmax(array![0.5, 0.5].view()), 0);
        assert_eq!(argmax(array![0.2, 0.3, 0.3].view()), 1);
    }
}
