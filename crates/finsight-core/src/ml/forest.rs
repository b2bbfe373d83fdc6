//! Tree-ensemble models: random-forest regression and isolation forest
//!
//! Both models operate on dense `Vec<f64>` feature rows produced by the
//! predictor/detector feature builders. Training draws from a caller-supplied
//! seeded RNG so repeated runs over the same history produce the same model.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::percentile;
use crate::error::{Error, Result};

/// Euler-Mascheroni constant, for the isolation-forest path normalizer
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Minimum samples at a node before a regression split is attempted
const MIN_SAMPLES_SPLIT: usize = 2;

/// Average path length of an unsuccessful BST search in a tree of `n` nodes
///
/// The c(n) normalizer from Liu et al.'s isolation-forest formulation.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

// ---------------------------------------------------------------------------
// Regression trees
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
enum RegNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single CART regression tree with variance-reduction splits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<RegNode>,
}

impl RegressionTree {
    fn fit(x: &[Vec<f64>], y: &[f64], indices: &[usize], max_depth: usize) -> Self {
        let mut nodes = Vec::new();
        build_reg_node(x, y, indices, 0, max_depth, &mut nodes);
        Self { nodes }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                RegNode::Leaf { value } => return *value,
                RegNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

fn mean_of(y: &[f64], indices: &[usize]) -> f64 {
    indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64
}

/// Best (feature, threshold) split by sum-of-squared-error reduction
fn best_split(x: &[Vec<f64>], y: &[f64], indices: &[usize]) -> Option<(usize, f64)> {
    let n = indices.len();
    let n_features = x[indices[0]].len();

    let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
    let parent_sse = total_sq - total_sum * total_sum / n as f64;

    let mut best: Option<(usize, f64, f64)> = None; // (feature, threshold, sse)

    for feature in 0..n_features {
        let mut sorted: Vec<(f64, f64)> = indices.iter().map(|&i| (x[i][feature], y[i])).collect();
        sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for split_at in 1..n {
            let (v_prev, y_prev) = sorted[split_at - 1];
            left_sum += y_prev;
            left_sq += y_prev * y_prev;

            let v_next = sorted[split_at].0;
            if v_next <= v_prev {
                continue; // no boundary between equal values
            }

            let left_n = split_at as f64;
            let right_n = (n - split_at) as f64;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;

            let sse = (left_sq - left_sum * left_sum / left_n)
                + (right_sq - right_sum * right_sum / right_n);

            if best.map_or(true, |(_, _, b)| sse < b) {
                best = Some((feature, (v_prev + v_next) / 2.0, sse));
            }
        }
    }

    // Require a real improvement over the unsplit node
    best.filter(|(_, _, sse)| *sse < parent_sse - 1e-12)
        .map(|(f, t, _)| (f, t))
}

fn build_reg_node(
    x: &[Vec<f64>],
    y: &[f64],
    indices: &[usize],
    depth: usize,
    max_depth: usize,
    nodes: &mut Vec<RegNode>,
) -> usize {
    let value = mean_of(y, indices);

    if depth >= max_depth || indices.len() < MIN_SAMPLES_SPLIT {
        nodes.push(RegNode::Leaf { value });
        return nodes.len() - 1;
    }

    let Some((feature, threshold)) = best_split(x, y, indices) else {
        nodes.push(RegNode::Leaf { value });
        return nodes.len() - 1;
    };

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| x[i][feature] <= threshold);

    // Reserve this node's slot before recursing so children land after it
    let node_index = nodes.len();
    nodes.push(RegNode::Leaf { value });

    let left = build_reg_node(x, y, &left_idx, depth + 1, max_depth, nodes);
    let right = build_reg_node(x, y, &right_idx, depth + 1, max_depth, nodes);
    nodes[node_index] = RegNode::Split {
        feature,
        threshold,
        left,
        right,
    };
    node_index
}

/// Random-forest regressor: bootstrap-sampled CART trees, averaged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<RegressionTree>,
}

impl RandomForestRegressor {
    /// Fit `n_estimators` trees on bootstrap samples of the rows
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        n_estimators: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> Result<Self> {
        let n = x.len();
        if n == 0 || n != y.len() {
            return Err(Error::Training(format!(
                "regression forest needs matching non-empty x/y, got {}/{}",
                n,
                y.len()
            )));
        }

        let mut trees = Vec::with_capacity(n_estimators);
        for _ in 0..n_estimators {
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            trees.push(RegressionTree::fit(x, y, &sample, max_depth));
        }
        Ok(Self { trees })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64
    }
}

// ---------------------------------------------------------------------------
// Isolation forest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
enum IsoNode {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<IsoNode>,
}

impl IsolationTree {
    fn fit(x: &[Vec<f64>], indices: &[usize], height_limit: usize, rng: &mut StdRng) -> Self {
        let mut nodes = Vec::new();
        build_iso_node(x, indices, 0, height_limit, rng, &mut nodes);
        Self { nodes }
    }

    fn path_length(&self, row: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                IsoNode::Leaf { size } => return depth + average_path_length(*size),
                IsoNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] < *threshold {
                        *left
                    } else {
                        *right
                    };
                    depth += 1.0;
                }
            }
        }
    }
}

fn build_iso_node(
    x: &[Vec<f64>],
    indices: &[usize],
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
    nodes: &mut Vec<IsoNode>,
) -> usize {
    if depth >= height_limit || indices.len() <= 1 {
        nodes.push(IsoNode::Leaf {
            size: indices.len(),
        });
        return nodes.len() - 1;
    }

    // Candidate features must still vary within this node
    let n_features = x[indices[0]].len();
    let splittable: Vec<(usize, f64, f64)> = (0..n_features)
        .filter_map(|f| {
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for &i in indices {
                lo = lo.min(x[i][f]);
                hi = hi.max(x[i][f]);
            }
            (hi > lo).then_some((f, lo, hi))
        })
        .collect();

    if splittable.is_empty() {
        nodes.push(IsoNode::Leaf {
            size: indices.len(),
        });
        return nodes.len() - 1;
    }

    let (feature, lo, hi) = splittable[rng.gen_range(0..splittable.len())];
    let threshold = rng.gen_range(lo..hi);

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| x[i][feature] < threshold);

    let node_index = nodes.len();
    nodes.push(IsoNode::Leaf {
        size: indices.len(),
    });

    let left = build_iso_node(x, &left_idx, depth + 1, height_limit, rng, nodes);
    let right = build_iso_node(x, &right_idx, depth + 1, height_limit, rng, nodes);
    nodes[node_index] = IsoNode::Split {
        feature,
        threshold,
        left,
        right,
    };
    node_index
}

/// Isolation forest for unsupervised outlier detection
///
/// `score_samples` follows the scikit-learn convention: values in (-1, 0],
/// lower meaning more anomalous. The decision threshold is fixed at fit time
/// from the contamination assumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    max_samples: usize,
    /// Score threshold: samples scoring strictly below are anomalous
    offset: f64,
}

impl IsolationForest {
    /// Fit the forest and set the decision threshold so roughly
    /// `contamination` of the training rows fall below it
    pub fn fit(
        x: &[Vec<f64>],
        n_estimators: usize,
        contamination: f64,
        rng: &mut StdRng,
    ) -> Result<Self> {
        let n = x.len();
        if n < 2 {
            return Err(Error::Training(format!(
                "isolation forest needs at least 2 samples, got {}",
                n
            )));
        }

        let max_samples = n.min(256);
        let height_limit = (max_samples as f64).log2().ceil() as usize;

        let mut trees = Vec::with_capacity(n_estimators);
        for _ in 0..n_estimators {
            let sample: Vec<usize> = rand::seq::index::sample(rng, n, max_samples).into_vec();
            trees.push(IsolationTree::fit(x, &sample, height_limit, rng));
        }

        let mut forest = Self {
            trees,
            max_samples,
            offset: 0.0,
        };
        let train_scores: Vec<f64> = x.iter().map(|row| forest.score_sample(row)).collect();
        forest.offset = percentile(&train_scores, contamination);
        Ok(forest)
    }

    /// Anomaly score in (-1, 0]; lower is more anomalous
    pub fn score_sample(&self, row: &[f64]) -> f64 {
        let avg_path: f64 = self
            .trees
            .iter()
            .map(|t| t.path_length(row))
            .sum::<f64>()
            / self.trees.len() as f64;
        let normalizer = average_path_length(self.max_samples);
        -(2.0f64.powf(-avg_path / normalizer))
    }

    /// Binary decision against the contamination threshold
    pub fn is_anomaly(&self, score: f64) -> bool {
        score < self.offset
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }
}
