//! Outlier Ensemble
//!
//! Three unsupervised detectors (isolation forest, local outlier factor,
//! one-class SVM) vote on a scaled `[value, latitude, longitude]` row. A row
//! is an outlier when at least [`MAJORITY_VOTES`] of them flag it.
//!
//! # State
//! The fitted scaler and the three models live in one immutable
//! [`FittedEnsemble`] snapshot. Classification clones the current `Arc` and
//! scores without holding any lock. Fits (cold start and retrain) are
//! serialized by a separate mutex and swap the snapshot in one write.

pub mod isolation_forest;
pub mod local_outlier_factor;
pub mod one_class_svm;
pub mod scaler;
pub mod stats;
pub mod training;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

pub use isolation_forest::IsolationForest;
pub use local_outlier_factor::LocalOutlierFactor;
pub use one_class_svm::OneClassSvm;
pub use scaler::StandardScaler;
pub use training::{cold_start_matrix, load_reference_points, ReferencePoint};

pub const FEATURES: usize = 3;

/// `[value, latitude, longitude]`
pub type FeatureRow = [f64; FEATURES];

/// Outlier flags needed for an ensemble-level outlier
pub const MAJORITY_VOTES: usize = 2;

/// Fits on fewer rows are skipped
pub const MIN_TRAINING_ROWS: usize = 10;

/// Expected outlier share used to place each model's decision offset
pub const CONTAMINATION: f64 = 0.1;

#[derive(Debug, Error)]
pub enum EnsembleError {
    #[error("Insufficient training data: {rows} rows")]
    InsufficientData { rows: usize },

    #[error("Model fit failed: {0}")]
    Fit(String),

    #[error("Ensemble state lock poisoned: {0}")]
    Lock(String),

    #[error("Classification task failed: {0}")]
    Task(String),
}

/// One model's opinion of one row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVote {
    Inlier,
    Outlier,
}

impl ModelVote {
    pub fn from_outlier(is_outlier: bool) -> Self {
        if is_outlier {
            ModelVote::Outlier
        } else {
            ModelVote::Inlier
        }
    }

    pub fn is_outlier(&self) -> bool {
        matches!(self, ModelVote::Outlier)
    }
}

/// Fitted anomaly detector over scaled rows
pub trait OutlierDetector: Send + Sync {
    fn name(&self) -> &'static str;

    fn predict(&self, row: &FeatureRow) -> ModelVote;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFlag {
    pub model: String,
    pub outlier: bool,
}

/// Per-model flags and the majority result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleVote {
    pub flags: Vec<ModelFlag>,
    pub outlier_votes: usize,
    pub is_outlier: bool,
}

impl EnsembleVote {
    pub fn tally(detectors: &[&dyn OutlierDetector], row: &FeatureRow) -> Self {
        let flags: Vec<ModelFlag> = detectors
            .iter()
            .map(|d| ModelFlag {
                model: d.name().to_string(),
                outlier: d.predict(row).is_outlier(),
            })
            .collect();
        let outlier_votes = flags.iter().filter(|f| f.outlier).count();
        Self {
            flags,
            outlier_votes,
            is_outlier: outlier_votes >= MAJORITY_VOTES,
        }
    }
}

fn default_seed() -> u64 {
    42
}

fn default_samples_per_region() -> usize {
    1000
}

fn default_cluster_size() -> usize {
    500
}

fn default_warm_start() -> bool {
    true
}

/// `[ensemble]` configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Seed for cold-start sampling and tree construction
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Uniform baseline rows per service area
    #[serde(default = "default_samples_per_region")]
    pub samples_per_region: usize,

    /// Gaussian rows per seed point
    #[serde(default = "default_cluster_size")]
    pub cluster_size: usize,

    /// JSON file of `[{value, lat, long}]` cold-start seed points
    #[serde(default)]
    pub seed_points_file: Option<PathBuf>,

    /// Cold-start in the background at service startup
    #[serde(default = "default_warm_start")]
    pub warm_start: bool,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            samples_per_region: default_samples_per_region(),
            cluster_size: default_cluster_size(),
            seed_points_file: None,
            warm_start: default_warm_start(),
        }
    }
}

/// Scaler and models fitted together from one matrix
pub struct FittedEnsemble {
    scaler: StandardScaler,
    forest: IsolationForest,
    lof: LocalOutlierFactor,
    svm: OneClassSvm,
    training_rows: usize,
    fitted_at: DateTime<Utc>,
}

impl FittedEnsemble {
    pub fn fit(rows: &[FeatureRow], seed: u64) -> Result<Self, EnsembleError> {
        if rows.len() < MIN_TRAINING_ROWS {
            return Err(EnsembleError::InsufficientData { rows: rows.len() });
        }

        let start = Instant::now();
        let scaler = StandardScaler::fit(rows)?;
        let scaled = scaler.transform_all(rows);

        let mut rng = StdRng::seed_from_u64(seed);
        let forest = IsolationForest::fit(&scaled, &mut rng)?;
        let lof = LocalOutlierFactor::fit(&scaled)?;
        let svm = OneClassSvm::fit(&scaled)?;

        info!(
            rows = rows.len(),
            support_vectors = svm.support_vectors(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Outlier ensemble fitted"
        );

        Ok(Self {
            scaler,
            forest,
            lof,
            svm,
            training_rows: rows.len(),
            fitted_at: Utc::now(),
        })
    }

    pub fn classify(&self, row: &FeatureRow) -> EnsembleVote {
        let scaled = self.scaler.transform(row);
        let detectors: [&dyn OutlierDetector; 3] = [&self.forest, &self.lof, &self.svm];
        let vote = EnsembleVote::tally(&detectors, &scaled);
        debug!(
            value = row[0],
            lat = row[1],
            long = row[2],
            outlier_votes = vote.outlier_votes,
            "Ensemble vote"
        );
        vote
    }

    pub fn training_rows(&self) -> usize {
        self.training_rows
    }

    pub fn fitted_at(&self) -> DateTime<Utc> {
        self.fitted_at
    }
}

/// Result of a fit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitOutcome {
    Fitted { rows: usize },
    /// Too few rows; existing state left unchanged
    Skipped { rows: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnsembleState {
    Untrained,
    Trained,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleStatus {
    pub state: EnsembleState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training_rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fitted_at: Option<DateTime<Utc>>,
    pub models: Vec<&'static str>,
    pub majority: usize,
}

struct Shared {
    config: EnsembleConfig,
    seed_points: Vec<ReferencePoint>,
    snapshot: RwLock<Option<Arc<FittedEnsemble>>>,
    fit_lock: Mutex<()>,
}

/// Process-wide ensemble handle
///
/// Cloning is cheap; all clones share one snapshot.
#[derive(Clone)]
pub struct OutlierEnsemble {
    shared: Arc<Shared>,
}

impl OutlierEnsemble {
    pub fn new(config: EnsembleConfig) -> Self {
        let seed_points = config
            .seed_points_file
            .as_deref()
            .map(load_reference_points)
            .unwrap_or_default();
        Self::with_seed_points(config, seed_points)
    }

    pub fn with_seed_points(config: EnsembleConfig, seed_points: Vec<ReferencePoint>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                seed_points,
                snapshot: RwLock::new(None),
                fit_lock: Mutex::new(()),
            }),
        }
    }

    /// Current snapshot, if trained
    pub fn snapshot(&self) -> Result<Option<Arc<FittedEnsemble>>, EnsembleError> {
        let guard = self
            .shared
            .snapshot
            .read()
            .map_err(|e| EnsembleError::Lock(e.to_string()))?;
        Ok(guard.clone())
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.snapshot(), Ok(Some(_)))
    }

    pub fn status(&self) -> EnsembleStatus {
        let snapshot = self.snapshot().ok().flatten();
        EnsembleStatus {
            state: if snapshot.is_some() {
                EnsembleState::Trained
            } else {
                EnsembleState::Untrained
            },
            training_rows: snapshot.as_ref().map(|s| s.training_rows()),
            fitted_at: snapshot.as_ref().map(|s| s.fitted_at()),
            models: vec![
                "isolation_forest",
                "local_outlier_factor",
                "one_class_svm",
            ],
            majority: MAJORITY_VOTES,
        }
    }

    /// Refit scaler and all models from scratch on `rows`
    ///
    /// Fewer than [`MIN_TRAINING_ROWS`] rows is a silent no-op.
    pub fn retrain(&self, rows: &[FeatureRow]) -> Result<FitOutcome, EnsembleError> {
        if rows.len() < MIN_TRAINING_ROWS {
            debug!(rows = rows.len(), "Too few rows to fit, keeping current state");
            return Ok(FitOutcome::Skipped { rows: rows.len() });
        }

        let _fit = self
            .shared
            .fit_lock
            .lock()
            .map_err(|e| EnsembleError::Lock(e.to_string()))?;
        let fitted = FittedEnsemble::fit(rows, self.shared.config.seed)?;
        self.install(fitted)?;
        Ok(FitOutcome::Fitted { rows: rows.len() })
    }

    /// Fit on synthetic data unless another caller already did
    pub fn cold_start(&self) -> Result<Arc<FittedEnsemble>, EnsembleError> {
        let _fit = self
            .shared
            .fit_lock
            .lock()
            .map_err(|e| EnsembleError::Lock(e.to_string()))?;
        if let Some(existing) = self.snapshot()? {
            return Ok(existing);
        }

        let config = &self.shared.config;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let rows = cold_start_matrix(config, &self.shared.seed_points, &mut rng);
        info!(
            rows = rows.len(),
            seed_points = self.shared.seed_points.len(),
            "Cold-starting outlier ensemble on synthetic data"
        );
        let fitted = FittedEnsemble::fit(&rows, config.seed)?;
        self.install(fitted)
    }

    /// Majority vote for one unscaled row, cold-starting first if needed
    pub fn classify(&self, row: &FeatureRow) -> Result<EnsembleVote, EnsembleError> {
        let fitted = match self.snapshot()? {
            Some(fitted) => fitted,
            None => self.cold_start()?,
        };
        Ok(fitted.classify(row))
    }

    fn install(&self, fitted: FittedEnsemble) -> Result<Arc<FittedEnsemble>, EnsembleError> {
        let fitted = Arc::new(fitted);
        let mut guard = self
            .shared
            .snapshot
            .write()
            .map_err(|e| EnsembleError::Lock(e.to_string()))?;
        *guard = Some(Arc::clone(&fitted));
        Ok(fitted)
    }
}

/// Async outlier check used by the decision engine
#[async_trait::async_trait]
pub trait OutlierCheck: Send + Sync {
    async fn check(&self, row: FeatureRow) -> Result<EnsembleVote, EnsembleError>;
}

#[async_trait::async_trait]
impl OutlierCheck for OutlierEnsemble {
    async fn check(&self, row: FeatureRow) -> Result<EnsembleVote, EnsembleError> {
        let ensemble = self.clone();
        tokio::task::spawn_blocking(move || ensemble.classify(&row))
            .await
            .map_err(|e| EnsembleError::Task(e.to_string()))?
    }
}
