//! One-class SVM with an RBF kernel
//!
//! Solves the nu-parameterised dual
//!
//! ```text
//! min 0.5 * a'Qa   s.t.  0 <= a_i <= 1,  sum(a) = nu * l
//! ```
//!
//! with SMO using second-order working-set selection. Decision function is
//! `sum(a_i * K(x_i, x)) - rho`; positive means inlier.

use super::stats::squared_distance;
use super::{EnsembleError, FeatureRow, ModelVote, OutlierDetector};
use std::rc::Rc;
use tracing::warn;

pub const DEFAULT_NU: f64 = 0.1;
pub const DEFAULT_GAMMA: f64 = 0.1;

/// Stopping tolerance on the maximal violating pair
const EPS: f64 = 1e-3;
const TAU: f64 = 1e-12;
/// Kernel rows kept in memory during training (~64 MB at 3,000 rows)
const CACHE_BYTES: usize = 64 * 1024 * 1024;

fn rbf(gamma: f64, a: &FeatureRow, b: &FeatureRow) -> f64 {
    (-gamma * squared_distance(a, b)).exp()
}

/// Kernel matrix rows computed on demand
struct KernelRows<'a> {
    rows: &'a [FeatureRow],
    gamma: f64,
    cache: Vec<Option<Rc<[f64]>>>,
    cached: usize,
    capacity: usize,
}

impl<'a> KernelRows<'a> {
    fn new(rows: &'a [FeatureRow], gamma: f64) -> Self {
        let row_bytes = rows.len().max(1) * std::mem::size_of::<f64>();
        Self {
            rows,
            gamma,
            cache: vec![None; rows.len()],
            cached: 0,
            capacity: (CACHE_BYTES / row_bytes).max(2),
        }
    }

    fn row(&mut self, i: usize) -> Rc<[f64]> {
        if let Some(row) = &self.cache[i] {
            return Rc::clone(row);
        }
        let xi = &self.rows[i];
        let row: Rc<[f64]> = self.rows.iter().map(|xj| rbf(self.gamma, xi, xj)).collect();
        if self.cached < self.capacity {
            self.cache[i] = Some(Rc::clone(&row));
            self.cached += 1;
        }
        row
    }
}

#[derive(Debug, Clone)]
pub struct OneClassSvm {
    support: Vec<FeatureRow>,
    coef: Vec<f64>,
    rho: f64,
    gamma: f64,
}

impl OneClassSvm {
    pub fn fit(rows: &[FeatureRow]) -> Result<Self, EnsembleError> {
        Self::fit_with(rows, DEFAULT_NU, DEFAULT_GAMMA)
    }

    pub fn fit_with(rows: &[FeatureRow], nu: f64, gamma: f64) -> Result<Self, EnsembleError> {
        let l = rows.len();
        if l == 0 {
            return Err(EnsembleError::Fit("one-class SVM needs at least 1 row".to_string()));
        }
        if !(nu > 0.0 && nu <= 1.0) || !(gamma > 0.0) {
            return Err(EnsembleError::Fit(format!(
                "invalid one-class SVM parameters nu={} gamma={}",
                nu, gamma
            )));
        }

        // Feasible start: first floor(nu*l) at the upper bound, remainder on the next
        let total = nu * l as f64;
        let full = (total.floor() as usize).min(l);
        let mut alpha = vec![0.0; l];
        for a in alpha.iter_mut().take(full) {
            *a = 1.0;
        }
        if full < l {
            alpha[full] = total - full as f64;
        }

        let mut kernel = KernelRows::new(rows, gamma);
        let mut grad = vec![0.0; l];
        for i in 0..l {
            if alpha[i] > 0.0 {
                let qi = kernel.row(i);
                for (g, q) in grad.iter_mut().zip(qi.iter()) {
                    *g += alpha[i] * q;
                }
            }
        }

        let max_iter = (100 * l).max(10_000);
        let mut iterations = 0;
        while iterations < max_iter {
            let Some((i, j)) = select_working_set(&alpha, &grad, &mut kernel) else {
                break;
            };
            iterations += 1;

            let qi = kernel.row(i);
            let qj = kernel.row(j);

            let old_ai = alpha[i];
            let old_aj = alpha[j];

            let mut quad = qi[i] + qj[j] - 2.0 * qi[j];
            if quad <= 0.0 {
                quad = TAU;
            }
            let delta = (grad[i] - grad[j]) / quad;
            let sum = old_ai + old_aj;
            let mut ai = old_ai - delta;
            let mut aj = old_aj + delta;

            if sum > 1.0 {
                if ai > 1.0 {
                    ai = 1.0;
                    aj = sum - 1.0;
                }
            } else if aj < 0.0 {
                aj = 0.0;
                ai = sum;
            }
            if sum > 1.0 {
                if aj > 1.0 {
                    aj = 1.0;
                    ai = sum - 1.0;
                }
            } else if ai < 0.0 {
                ai = 0.0;
                aj = sum;
            }

            alpha[i] = ai;
            alpha[j] = aj;
            let (di, dj) = (ai - old_ai, aj - old_aj);
            for k in 0..l {
                grad[k] += qi[k] * di + qj[k] * dj;
            }
        }

        if iterations >= max_iter {
            warn!(iterations, "One-class SVM reached iteration limit before converging");
        }

        let rho = calculate_rho(&alpha, &grad);
        let (support, coef): (Vec<FeatureRow>, Vec<f64>) = rows
            .iter()
            .zip(&alpha)
            .filter(|(_, a)| **a > 0.0)
            .map(|(r, a)| (*r, *a))
            .unzip();

        Ok(Self {
            support,
            coef,
            rho,
            gamma,
        })
    }

    pub fn decision_function(&self, row: &FeatureRow) -> f64 {
        self.support
            .iter()
            .zip(&self.coef)
            .map(|(sv, a)| a * rbf(self.gamma, sv, row))
            .sum::<f64>()
            - self.rho
    }

    pub fn support_vectors(&self) -> usize {
        self.support.len()
    }
}

impl OutlierDetector for OneClassSvm {
    fn name(&self) -> &'static str {
        "one_class_svm"
    }

    fn predict(&self, row: &FeatureRow) -> ModelVote {
        ModelVote::from_outlier(self.decision_function(row) <= 0.0)
    }
}

/// Maximal violating pair with second-order gain; `None` once optimal
fn select_working_set(alpha: &[f64], grad: &[f64], kernel: &mut KernelRows<'_>) -> Option<(usize, usize)> {
    let mut gmax = f64::NEG_INFINITY;
    let mut i_sel = None;
    for (t, (&a, &g)) in alpha.iter().zip(grad).enumerate() {
        if a < 1.0 && -g >= gmax {
            gmax = -g;
            i_sel = Some(t);
        }
    }
    let i = i_sel?;
    let qi = kernel.row(i);

    let mut gmax2 = f64::NEG_INFINITY;
    let mut j_sel = None;
    let mut obj_diff_min = f64::INFINITY;
    for (j, (&a, &g)) in alpha.iter().zip(grad).enumerate() {
        if a <= 0.0 {
            continue;
        }
        if g >= gmax2 {
            gmax2 = g;
        }
        let grad_diff = gmax + g;
        if grad_diff > 0.0 {
            // Diagonal of an RBF kernel is 1
            let quad = 2.0 - 2.0 * qi[j];
            let obj_diff = if quad > 0.0 {
                -(grad_diff * grad_diff) / quad
            } else {
                -(grad_diff * grad_diff) / TAU
            };
            if obj_diff <= obj_diff_min {
                obj_diff_min = obj_diff;
                j_sel = Some(j);
            }
        }
    }

    if gmax + gmax2 < EPS {
        return None;
    }
    j_sel.map(|j| (i, j))
}

fn calculate_rho(alpha: &[f64], grad: &[f64]) -> f64 {
    let mut ub = f64::INFINITY;
    let mut lb = f64::NEG_INFINITY;
    let mut free = 0usize;
    let mut free_sum = 0.0;

    for (&a, &g) in alpha.iter().zip(grad) {
        if a >= 1.0 {
            lb = lb.max(g);
        } else if a <= 0.0 {
            ub = ub.min(g);
        } else {
            free += 1;
            free_sum += g;
        }
    }

    if free > 0 {
        free_sum / free as f64
    } else {
        (ub + lb) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn blob(n: usize, seed: u64) -> Vec<FeatureRow> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                [
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                ]
            })
            .collect()
    }

    #[test]
    fn test_center_inlier_far_outlier() {
        let rows = blob(300, 4);
        let svm = OneClassSvm::fit(&rows).unwrap();
        assert_eq!(svm.predict(&[0.0, 0.0, 0.0]), ModelVote::Inlier);
        assert_eq!(svm.predict(&[15.0, 15.0, 15.0]), ModelVote::Outlier);
        assert!(svm.support_vectors() >= 30);
    }

    #[test]
    fn test_alpha_sum_equals_nu_l() {
        let rows = blob(200, 5);
        let svm = OneClassSvm::fit(&rows).unwrap();
        let total: f64 = svm.coef.iter().sum();
        assert!((total - 20.0).abs() < 1e-6);
        assert!(svm.coef.iter().all(|a| *a > 0.0 && *a <= 1.0));
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let rows = blob(20, 6);
        assert!(OneClassSvm::fit_with(&rows, 0.0, 0.1).is_err());
        assert!(OneClassSvm::fit_with(&rows, 0.1, -1.0).is_err());
        assert!(OneClassSvm::fit(&[]).is_err());
    }
}
