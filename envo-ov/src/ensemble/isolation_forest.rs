//! Isolation forest
//!
//! Random axis-aligned partitioning: anomalies are isolated in fewer splits,
//! so a short average path length over the forest means "outlier". The
//! decision offset is the contamination percentile of the training scores.

use super::stats::percentile;
use super::{EnsembleError, FeatureRow, ModelVote, OutlierDetector, CONTAMINATION, FEATURES};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::Rng;

pub const DEFAULT_TREES: usize = 100;
pub const DEFAULT_MAX_SAMPLES: usize = 256;

const EULER_GAMMA: f64 = 0.577_215_664_9;

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// One isolation tree stored as a flat arena
#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(rows: &[FeatureRow], sample: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(rows, sample, 0, max_depth, rng);
        tree
    }

    fn grow(
        &mut self,
        rows: &[FeatureRow],
        sample: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: sample.len() });

        if depth >= max_depth || sample.len() <= 1 {
            return id;
        }

        // Only features that still vary within this node can split it
        let mut candidates = Vec::with_capacity(FEATURES);
        for feature in 0..FEATURES {
            let (lo, hi) = column_extent(rows, &sample, feature);
            if hi > lo {
                candidates.push((feature, lo, hi));
            }
        }
        if candidates.is_empty() {
            return id;
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(lo..hi);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            sample.into_iter().partition(|&i| rows[i][feature] < threshold);

        let left = self.grow(rows, left_rows, depth + 1, max_depth, rng);
        let right = self.grow(rows, right_rows, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn path_length(&self, row: &FeatureRow) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(*size),
            }
        }
    }
}

fn column_extent(rows: &[FeatureRow], sample: &[usize], feature: usize) -> (f64, f64) {
    sample.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
        let v = rows[i][feature];
        (lo.min(v), hi.max(v))
    })
}

/// Average path length of an unsuccessful BST search over `n` points
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    max_samples: usize,
    offset: f64,
}

impl IsolationForest {
    pub fn fit(rows: &[FeatureRow], rng: &mut StdRng) -> Result<Self, EnsembleError> {
        Self::fit_with(rows, DEFAULT_TREES, DEFAULT_MAX_SAMPLES, rng)
    }

    pub fn fit_with(
        rows: &[FeatureRow],
        n_trees: usize,
        max_samples: usize,
        rng: &mut StdRng,
    ) -> Result<Self, EnsembleError> {
        if rows.len() < 2 || n_trees == 0 {
            return Err(EnsembleError::Fit(format!(
                "isolation forest needs at least 2 rows and 1 tree (got {} rows)",
                rows.len()
            )));
        }

        let max_samples = max_samples.min(rows.len()).max(2);
        let max_depth = (max_samples as f64).log2().ceil() as usize;

        let trees = (0..n_trees)
            .map(|_| {
                let sample = index::sample(rng, rows.len(), max_samples).into_vec();
                IsolationTree::build(rows, sample, max_depth, rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            max_samples,
            offset: 0.0,
        };
        let training_scores: Vec<f64> = rows.iter().map(|r| forest.score(r)).collect();
        forest.offset = percentile(&training_scores, CONTAMINATION * 100.0);
        Ok(forest)
    }

    /// Negated anomaly score in [-1, 0): lower means more anomalous
    pub fn score(&self, row: &FeatureRow) -> f64 {
        let mean_path =
            self.trees.iter().map(|t| t.path_length(row)).sum::<f64>() / self.trees.len() as f64;
        -(2f64.powf(-mean_path / average_path_length(self.max_samples)))
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }
}

impl OutlierDetector for IsolationForest {
    fn name(&self) -> &'static str {
        "isolation_forest"
    }

    fn predict(&self, row: &FeatureRow) -> ModelVote {
        ModelVote::from_outlier(self.score(row) < self.offset)
    }
}
