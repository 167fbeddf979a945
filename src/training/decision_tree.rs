//! Regression tree implementation

use crate::error::{Result, SelectError};
use super::models::{check_feature_width, check_training_shape};
use super::{Model, ModelType};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
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

/// Regression tree grown by variance reduction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_regressor()
    }
}

/// Best split found for one feature
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

impl DecisionTree {
    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_training_shape(x, y)?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        self.n_features = n_features;

        let mut importances = vec![0.0; n_features];

        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, y, &indices, 0, &mut importances);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let (sum, sq_sum) = sums(y, indices);
        let value = sum / n_samples as f64;
        let impurity = variance(n_samples, sum, sq_sum);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;

        if should_stop {
            return TreeNode::Leaf { value, n_samples };
        }

        let Some(best) = self.find_best_split(x, y, indices, impurity) else {
            return TreeNode::Leaf { value, n_samples };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        if left_indices.len() < self.min_samples_leaf || right_indices.len() < self.min_samples_leaf {
            return TreeNode::Leaf { value, n_samples };
        }

        importances[best.feature_idx] += n_samples as f64 * best.gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    /// Scan every feature in parallel; each sorts its values once and
    /// sweeps thresholds with running sums.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let (total_sum, total_sq) = sums(y, indices);

        (0..x.ncols())
            .into_par_iter()
            .filter_map(|feature_idx| {
                let mut order: Vec<(f64, f64)> = indices
                    .iter()
                    .map(|&i| (x[[i, feature_idx]], y[i]))
                    .collect();
                order.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut left_sum = 0.0;
                let mut left_sq = 0.0;
                let mut best: Option<(f64, f64)> = None;

                for pos in 0..n - 1 {
                    let (xv, yv) = order[pos];
                    left_sum += yv;
                    left_sq += yv * yv;

                    let next_x = order[pos + 1].0;
                    if next_x <= xv {
                        continue;
                    }

                    let left_count = pos + 1;
                    let right_count = n - left_count;
                    if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                        continue;
                    }

                    let left_imp = variance(left_count, left_sum, left_sq);
                    let right_imp = variance(right_count, total_sum - left_sum, total_sq - left_sq);
                    let weighted = (left_count as f64 * left_imp + right_count as f64 * right_imp) / n as f64;
                    let gain = parent_impurity - weighted;

                    if gain > best.map_or(0.0, |(g, _)| g) {
                        best = Some((gain, (xv + next_x) / 2.0));
                    }
                }

                best.map(|(gain, threshold)| SplitCandidate { feature_idx, threshold, gain })
            })
            .collect::<Vec<_>>()
            .into_iter()
            // first feature wins ties so results do not depend on scheduling
            .fold(None, |acc: Option<SplitCandidate>, cand| match acc {
                Some(a) if a.gain >= cand.gain => Some(a),
                _ => Some(cand),
            })
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(SelectError::ModelNotFitted)?;
        check_feature_width(x, self.n_features)?;

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let mut node = root;
                loop {
                    match node {
                        TreeNode::Leaf { value, .. } => break *value,
                        TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                            node = if row[*feature_idx] <= *threshold { &**left } else { &**right };
                        }
                    }
                }
            })
            .collect())
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        self.root.as_ref().map_or(0, node_depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, count_leaves)
    }
}

impl Model for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        DecisionTree::fit(self, x, y)?;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        DecisionTree::predict(self, x)
    }

    fn model_type(&self) -> ModelType {
        ModelType::DecisionTree
    }

    fn params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("max_depth".to_string(), format!("{:?}", self.max_depth));
        params.insert("min_samples_split".to_string(), self.min_samples_split.to_string());
        params.insert("min_samples_leaf".to_string(), self.min_samples_leaf.to_string());
        params
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn sums(y: &Array1<f64>, indices: &[usize]) -> (f64, f64) {
    indices.iter().fold((0.0, 0.0), |(s, sq), &i| (s + y[i], sq + y[i] * y[i]))
}

// Var = E[X²] - E[X]²
fn variance(count: usize, sum: f64, sq_sum: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let n = count as f64;
    (sq_sum / n - (sum / n).powi(2)).max(0.0)
}

fn node_depth(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
    }
}

fn count_leaves(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => count_leaves(left) + count_leaves(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regressor_fits_training_data() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        for (p, a) in predictions.iter().zip(y.iter()) {
            assert!((p - a).abs() < 1e-12);
        }
    }

    #[test]
    fn test_step_function() {
        let x = array![[0.0], [1.0], [2.0], [10.0], [11.0], [12.0]];
        let y = array![5.0, 5.0, 5.0, 20.0, 20.0, 20.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.get_n_leaves(), 2);
        let pred = tree.predict(&array![[3.0], [9.0]]).unwrap();
        assert_eq!(pred, array![5.0, 20.0]);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 3.0, 7.0];

        let mut tree = DecisionTree::new_regressor().with_max_depth(1);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 2);
        assert!(tree.get_n_leaves() <= 2);
    }

    #[test]
    fn test_min_samples_leaf() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        let mut tree = DecisionTree::new_regressor().with_min_samples_leaf(3);
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![4.0, 4.0, 4.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.get_n_leaves(), 1);
        assert_eq!(tree.predict(&array![[100.0]]).unwrap(), array![4.0]);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTree::new_regressor();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(SelectError::ModelNotFitted)));
    }
}
