//! Zero-mean / unit-variance feature scaler

use super::stats::{mean, population_std};
use super::{EnsembleError, FeatureRow, FEATURES};

#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: [f64; FEATURES],
    scale: [f64; FEATURES],
}

impl StandardScaler {
    /// Fit per-column mean and population standard deviation
    ///
    /// Constant columns get scale 1 so they map to 0 instead of NaN.
    pub fn fit(rows: &[FeatureRow]) -> Result<Self, EnsembleError> {
        if rows.is_empty() {
            return Err(EnsembleError::InsufficientData { rows: 0 });
        }
        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err(EnsembleError::Fit("non-finite value in training matrix".to_string()));
        }

        let mut means = [0.0; FEATURES];
        let mut scales = [1.0; FEATURES];
        for col in 0..FEATURES {
            let column: Vec<f64> = rows.iter().map(|r| r[col]).collect();
            means[col] = mean(&column);
            let std = population_std(&column);
            if std > 0.0 {
                scales[col] = std;
            }
        }

        Ok(Self {
            mean: means,
            scale: scales,
        })
    }

    pub fn transform(&self, row: &FeatureRow) -> FeatureRow {
        let mut out = [0.0; FEATURES];
        for col in 0..FEATURES {
            out[col] = (row[col] - self.mean[col]) / self.scale[col];
        }
        out
    }

    pub fn transform_all(&self, rows: &[FeatureRow]) -> Vec<FeatureRow> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_columns_have_zero_mean_unit_std() {
        let rows = vec![[1.0, 10.0, 5.0], [2.0, 20.0, 5.0], [3.0, 30.0, 5.0], [4.0, 40.0, 5.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        let scaled = scaler.transform_all(&rows);

        for col in 0..2 {
            let column: Vec<f64> = scaled.iter().map(|r| r[col]).collect();
            assert!(mean(&column).abs() < 1e-12);
            assert!((population_std(&column) - 1.0).abs() < 1e-12);
        }
        // Constant column maps to zero
        assert!(scaled.iter().all(|r| r[2] == 0.0));
    }

    #[test]
    fn test_rejects_empty_and_non_finite() {
        assert!(StandardScaler::fit(&[]).is_err());
        assert!(StandardScaler::fit(&[[f64::NAN, 0.0, 0.0]]).is_err());
    }
}
