//! Cold-start training data
//!
//! Before any real observations exist the ensemble is fitted on synthetic
//! rows: uniform baseline samples over the service areas plus Gaussian
//! clusters around known reference readings.

use super::stats::sample_normal;
use super::{EnsembleConfig, FeatureRow};
use envo_common::geo::{BoundingBox, INDIA, USA};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Uniform sampling box for baseline rows
#[derive(Debug, Clone, Copy)]
pub struct BaselineRegion {
    pub area: BoundingBox,
    pub value_min: f64,
    pub value_max: f64,
}

pub const BASELINE_REGIONS: [BaselineRegion; 2] = [
    BaselineRegion {
        area: INDIA,
        value_min: 0.0,
        value_max: 150.0,
    },
    BaselineRegion {
        area: USA,
        value_min: 0.0,
        value_max: 150.0,
    },
];

/// Cluster spread around a reference reading
const VALUE_SIGMA_FRACTION: f64 = 0.1;
const LOCATION_SIGMA_DEG: f64 = 0.5;

/// Known reference reading used to seed a cluster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub value: f64,
    pub lat: f64,
    pub long: f64,
}

/// Read reference points from a JSON array of `{value, lat, long}`
///
/// Missing or malformed files are logged and yield no points.
pub fn load_reference_points(path: &Path) -> Vec<ReferencePoint> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Seed points file unreadable, ignoring");
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<ReferencePoint>>(&content) {
        Ok(points) => {
            info!(path = %path.display(), count = points.len(), "Loaded cold-start seed points");
            points
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Seed points file malformed, ignoring");
            Vec::new()
        }
    }
}

/// Build the synthetic cold-start matrix
pub fn cold_start_matrix(
    config: &EnsembleConfig,
    points: &[ReferencePoint],
    rng: &mut StdRng,
) -> Vec<FeatureRow> {
    let seeded = points.iter().filter(|p| p.value > 0.0).count();
    let mut rows = Vec::with_capacity(
        BASELINE_REGIONS.len() * config.samples_per_region + seeded * config.cluster_size,
    );

    for region in &BASELINE_REGIONS {
        let area = &region.area;
        for _ in 0..config.samples_per_region {
            rows.push([
                rng.gen_range(region.value_min..=region.value_max),
                rng.gen_range(area.lat_min..=area.lat_max),
                rng.gen_range(area.long_min..=area.long_max),
            ]);
        }
    }

    for point in points.iter().filter(|p| p.value > 0.0) {
        let value_sigma = point.value * VALUE_SIGMA_FRACTION;
        for _ in 0..config.cluster_size {
            rows.push([
                sample_normal(rng, point.value, value_sigma),
                sample_normal(rng, point.lat, LOCATION_SIGMA_DEG),
                sample_normal(rng, point.long, LOCATION_SIGMA_DEG),
            ]);
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::io::Write;

    #[test]
    fn test_baseline_rows_stay_inside_regions() {
        let config = EnsembleConfig::default();
        let rows = cold_start_matrix(&config, &[], &mut StdRng::seed_from_u64(42));
        assert_eq!(rows.len(), 2 * config.samples_per_region);

        let (india, usa) = rows.split_at(config.samples_per_region);
        assert!(india.iter().all(|r| INDIA.contains(r[1], r[2]) && (0.0..=150.0).contains(&r[0])));
        assert!(usa.iter().all(|r| USA.contains(r[1], r[2])));
    }

    #[test]
    fn test_clusters_only_for_positive_points() {
        let config = EnsembleConfig {
            samples_per_region: 10,
            cluster_size: 50,
            ..EnsembleConfig::default()
        };
        let points = [
            ReferencePoint { value: 300.0, lat: 28.6, long: 77.2 },
            ReferencePoint { value: 0.0, lat: 19.0, long: 72.8 },
        ];
        let rows = cold_start_matrix(&config, &points, &mut StdRng::seed_from_u64(1));
        assert_eq!(rows.len(), 20 + 50);

        let cluster = &rows[20..];
        let mean_value = cluster.iter().map(|r| r[0]).sum::<f64>() / cluster.len() as f64;
        assert!((mean_value - 300.0).abs() < 20.0);
    }

    #[test]
    fn test_same_seed_same_matrix() {
        let config = EnsembleConfig::default();
        let a = cold_start_matrix(&config, &[], &mut StdRng::seed_from_u64(5));
        let b = cold_start_matrix(&config, &[], &mut StdRng::seed_from_u64(5));
        assert_eq!(a, b);
    }

    #[test]
    fn test_load_reference_points() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"value": 120.0, "lat": 28.6, "long": 77.2}}]"#).unwrap();
        let points = load_reference_points(file.path());
        assert_eq!(points, vec![ReferencePoint { value: 120.0, lat: 28.6, long: 77.2 }]);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "not json").unwrap();
        assert!(load_reference_points(bad.path()).is_empty());
        assert!(load_reference_points(Path::new("/nonexistent/seed.json")).is_empty());
    }
}
