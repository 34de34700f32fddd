//! Local outlier factor in novelty mode
//!
//! Fitted once on the training rows; new rows are scored against the stored
//! neighbourhoods. Brute-force neighbour search is fine at the few-thousand
//! row scale the ensemble is sized for.

use super::stats::{euclidean_distance, percentile};
use super::{EnsembleError, FeatureRow, ModelVote, OutlierDetector, CONTAMINATION};

pub const DEFAULT_NEIGHBORS: usize = 20;

/// Keeps reachability from collapsing on duplicate points
const LRD_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct LocalOutlierFactor {
    rows: Vec<FeatureRow>,
    k: usize,
    k_distance: Vec<f64>,
    lrd: Vec<f64>,
    offset: f64,
}

impl LocalOutlierFactor {
    pub fn fit(rows: &[FeatureRow]) -> Result<Self, EnsembleError> {
        Self::fit_with(rows, DEFAULT_NEIGHBORS)
    }

    pub fn fit_with(rows: &[FeatureRow], neighbors: usize) -> Result<Self, EnsembleError> {
        if rows.len() < 2 {
            return Err(EnsembleError::Fit(format!(
                "local outlier factor needs at least 2 rows (got {})",
                rows.len()
            )));
        }
        let k = neighbors.min(rows.len() - 1).max(1);

        let neighborhoods: Vec<Vec<(f64, usize)>> = (0..rows.len())
            .map(|i| nearest(rows, &rows[i], k, Some(i)))
            .collect();
        let k_distance: Vec<f64> = neighborhoods
            .iter()
            .map(|n| n.last().map(|(d, _)| *d).unwrap_or(0.0))
            .collect();

        let lrd: Vec<f64> = neighborhoods
            .iter()
            .map(|n| local_reachability_density(n, &k_distance))
            .collect();

        let training_scores: Vec<f64> = neighborhoods
            .iter()
            .enumerate()
            .map(|(i, n)| -mean_density_ratio(n, &lrd, lrd[i]))
            .collect();

        Ok(Self {
            rows: rows.to_vec(),
            k,
            offset: percentile(&training_scores, CONTAMINATION * 100.0),
            k_distance,
            lrd,
        })
    }

    /// Negated LOF of a new row: around -1 for inliers, much lower for outliers
    pub fn score(&self, row: &FeatureRow) -> f64 {
        let neighborhood = nearest(&self.rows, row, self.k, None);
        let lrd = local_reachability_density(&neighborhood, &self.k_distance);
        -mean_density_ratio(&neighborhood, &self.lrd, lrd)
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }
}

impl OutlierDetector for LocalOutlierFactor {
    fn name(&self) -> &'static str {
        "local_outlier_factor"
    }

    fn predict(&self, row: &FeatureRow) -> ModelVote {
        ModelVote::from_outlier(self.score(row) < self.offset)
    }
}

/// k nearest rows as (distance, index), closest first
fn nearest(rows: &[FeatureRow], target: &FeatureRow, k: usize, exclude: Option<usize>) -> Vec<(f64, usize)> {
    let mut distances: Vec<(f64, usize)> = rows
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != exclude)
        .map(|(i, r)| (euclidean_distance(target, r), i))
        .collect();

    let k = k.min(distances.len());
    if k == 0 {
        return Vec::new();
    }
    let by_distance =
        |a: &(f64, usize), b: &(f64, usize)| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1));
    if k < distances.len() {
        distances.select_nth_unstable_by(k - 1, by_distance);
        distances.truncate(k);
    }
    distances.sort_by(by_distance);
    distances
}

fn local_reachability_density(neighborhood: &[(f64, usize)], k_distance: &[f64]) -> f64 {
    if neighborhood.is_empty() {
        return 0.0;
    }
    let reach_sum: f64 = neighborhood
        .iter()
        .map(|&(d, j)| d.max(k_distance[j]))
        .sum();
    1.0 / (reach_sum / neighborhood.len() as f64 + LRD_EPSILON)
}

fn mean_density_ratio(neighborhood: &[(f64, usize)], lrd: &[f64], own_lrd: f64) -> f64 {
    if neighborhood.is_empty() {
        return 1.0;
    }
    // Distances overflowed to infinity: infinitely far from every neighbour
    if own_lrd == 0.0 {
        return f64::INFINITY;
    }
    neighborhood.iter().map(|&(_, j)| lrd[j] / own_lrd).sum::<f64>() / neighborhood.len() as f64
}
