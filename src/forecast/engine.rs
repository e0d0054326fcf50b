//! Demand forecasting engine: trains a bagged ensemble of regression trees
//! on hourly site aggregates and produces point forecasts with confidence
//! bounds.
//!
//! The ensemble is bagged in-crate (bootstrap resampling over smartcore
//! trees) because the confidence interval is the inter-tree spread, which
//! needs every tree's individual prediction. The spread is a documented
//! approximation of uncertainty, not a calibrated predictive interval.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, DurationRound, Utc};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use tracing::{info, warn};

use super::features::{
    FeatureBuilder, SiteEncoder, FEATURE_COLUMNS, LOOKBACK_DAYS, UNSEEN_SITE_ENCODING,
};
use super::metrics::RegressionMetrics;
use crate::config::ForecastModelConfig;
use crate::domain::{ForecastPoint, HistoricalSessionRecord};
use crate::error::CoreError;
use crate::store::{ArtifactStore, SessionStore};
use crate::utils::round_to;

/// z-score for the 95% interval.
const CONFIDENCE_Z: f64 = 1.96;

/// Heuristic average energy per session, used to estimate the active-session
/// count from a kWh forecast.
const AVG_KWH_PER_SESSION: f64 = 30.0;

type RegressionTree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Evaluation summary reported after training, all rounded to 4 decimals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub train_r2: f64,
    pub test_r2: f64,
    pub mae: f64,
    pub rmse: f64,
    pub training_rows: usize,
}

/// Everything inference needs, persisted and published as one unit so a
/// model can never run against a stale encoding or column order.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainedArtifact {
    trees: Vec<RegressionTree>,
    site_encoder: SiteEncoder,
    feature_columns: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub report: TrainingReport,
}

pub struct DemandForecastingEngine {
    sessions: Arc<dyn SessionStore>,
    artifacts: Arc<dyn ArtifactStore>,
    cfg: ForecastModelConfig,
    /// Immutable once published; `train` swaps in a fresh Arc so in-flight
    /// `predict` calls keep the model they started with.
    published: RwLock<Option<Arc<TrainedArtifact>>>,
}

impl DemandForecastingEngine {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        artifacts: Arc<dyn ArtifactStore>,
        cfg: ForecastModelConfig,
    ) -> Self {
        Self {
            sessions,
            artifacts,
            cfg,
            published: RwLock::new(None),
        }
    }

    /// Train on a batch of historical records and publish the new model.
    ///
    /// Fails with `InsufficientData` below the usable-record floor; nothing
    /// is published on any failure path.
    pub async fn train(
        &self,
        records: &[HistoricalSessionRecord],
    ) -> Result<TrainingReport, CoreError> {
        let usable: Vec<HistoricalSessionRecord> =
            records.iter().filter(|r| r.is_usable()).cloned().collect();
        if usable.len() < self.cfg.min_training_sessions {
            return Err(CoreError::InsufficientData {
                available: usable.len(),
                required: self.cfg.min_training_sessions,
            });
        }

        let aggregates = FeatureBuilder::aggregate_hourly(&usable);
        if aggregates.len() < 2 {
            return Err(CoreError::InsufficientData {
                available: aggregates.len(),
                required: 2,
            });
        }

        let site_encoder = SiteEncoder::fit(aggregates.iter().map(|a| a.site_id.as_str()));
        let (x, y) = FeatureBuilder::training_matrix(&aggregates, &site_encoder);

        // Reproducible shuffled split.
        let mut rng = StdRng::seed_from_u64(self.cfg.seed);
        let mut indices: Vec<usize> = (0..x.len()).collect();
        indices.shuffle(&mut rng);
        let test_len = ((x.len() as f64 * self.cfg.test_fraction).round() as usize)
            .clamp(1, x.len() - 1);
        let (test_idx, train_idx) = indices.split_at(test_len);

        let x_train: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
        let y_train: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();
        let x_test: Vec<Vec<f64>> = test_idx.iter().map(|&i| x[i].clone()).collect();
        let y_test: Vec<f64> = test_idx.iter().map(|&i| y[i]).collect();

        let trees = self.fit_ensemble(&x_train, &y_train, &mut rng)?;

        let train_matrix = matrix_from_rows(&x_train);
        let (train_pred, _) = ensemble_stats(&trees, &train_matrix, x_train.len())?;
        let test_matrix = matrix_from_rows(&x_test);
        let (test_pred, _) = ensemble_stats(&trees, &test_matrix, x_test.len())?;

        let train_metrics = RegressionMetrics::calculate(&y_train, &train_pred)
            .map_err(anyhow::Error::from)?;
        let test_metrics =
            RegressionMetrics::calculate(&y_test, &test_pred).map_err(anyhow::Error::from)?;

        let report = TrainingReport {
            train_r2: round_to(train_metrics.r2, 4),
            test_r2: round_to(test_metrics.r2, 4),
            mae: round_to(test_metrics.mae, 4),
            rmse: round_to(test_metrics.rmse, 4),
            training_rows: x_train.len(),
        };

        let artifact = TrainedArtifact {
            trees,
            site_encoder,
            feature_columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            trained_at: Utc::now(),
            report: report.clone(),
        };

        let bytes = bincode::serialize(&artifact)
            .map_err(|e| anyhow::anyhow!("failed to serialize model artifact: {e}"))?;
        self.artifacts
            .publish(&self.cfg.artifact_key, bytes)
            .await?;
        *self.published.write() = Some(Arc::new(artifact));

        info!(
            training_rows = report.training_rows,
            train_r2 = report.train_r2,
            test_r2 = report.test_r2,
            mae = report.mae,
            rmse = report.rmse,
            "demand model trained and published"
        );
        Ok(report)
    }

    /// Forecast the next `hours_ahead` hours for a site, upserting each
    /// point under its `(site_id, floor-hour)` key.
    pub async fn predict(
        &self,
        site_id: &str,
        target_time: DateTime<Utc>,
        hours_ahead: usize,
    ) -> Result<Vec<ForecastPoint>, CoreError> {
        if hours_ahead == 0 || hours_ahead > self.cfg.max_horizon_hours {
            return Err(CoreError::Validation(format!(
                "hours_ahead must be in 1..={}, got {hours_ahead}",
                self.cfg.max_horizon_hours
            )));
        }

        let artifact = self.published_artifact().await?;

        let start = target_time
            .duration_trunc(chrono::Duration::hours(1))
            .map_err(|e| CoreError::Validation(format!("target_time not hour-alignable: {e}")))?;
        let lookback_from = start - chrono::Duration::days(LOOKBACK_DAYS);
        let mut history = self
            .sessions
            .completed_sessions(site_id, lookback_from, start)
            .await?;
        if history.is_empty() {
            // Cold site: one synthetic zero row keeps the feature pipeline
            // total instead of special-casing empty history downstream.
            history.push(HistoricalSessionRecord {
                site_id: site_id.to_string(),
                start_time: lookback_from,
                energy_delivered_kwh: Some(0.0),
            });
        }

        let site_encoding = match artifact.site_encoder.encode(site_id) {
            Some(code) => code,
            None => {
                warn!(
                    site_id,
                    "site not in trained encoding; forecasting with the unknown-site sentinel"
                );
                UNSEEN_SITE_ENCODING
            }
        };

        let rows: Vec<Vec<f64>> = (0..hours_ahead)
            .map(|h| {
                let slot = start + chrono::Duration::hours(h as i64);
                FeatureBuilder::inference_row(slot, site_encoding, &history)
            })
            .collect();
        let matrix = matrix_from_rows(&rows);
        let (means, stds) = ensemble_stats(&artifact.trees, &matrix, rows.len())?;

        let mut points = Vec::with_capacity(hours_ahead);
        for (h, (mean, std)) in means.into_iter().zip(stds).enumerate() {
            let point = ForecastPoint {
                site_id: site_id.to_string(),
                time_slot: start + chrono::Duration::hours(h as i64),
                predicted_total_kwh: round_to(mean, 2).max(0.0),
                predicted_active_sessions: ((mean / AVG_KWH_PER_SESSION).round() as u32).max(1),
                confidence_lower: round_to(mean - CONFIDENCE_Z * std, 2).max(0.0),
                confidence_upper: round_to(mean + CONFIDENCE_Z * std, 2),
            };
            self.sessions.upsert_forecast(&point).await?;
            points.push(point);
        }
        Ok(points)
    }

    /// The published model, loading from the artifact store on first use.
    /// Missing, unreachable and undecodable artifacts are all surfaced as
    /// `ModelNotTrained`.
    async fn published_artifact(&self) -> Result<Arc<TrainedArtifact>, CoreError> {
        if let Some(artifact) = self.published.read().clone() {
            return Ok(artifact);
        }
        let bytes = match self.artifacts.load(&self.cfg.artifact_key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Err(CoreError::ModelNotTrained),
            Err(e) => {
                warn!(error = %e, "model artifact store unreachable");
                return Err(CoreError::ModelNotTrained);
            }
        };
        let artifact: TrainedArtifact = match bincode::deserialize(&bytes) {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(error = %e, "stored model artifact undecodable");
                return Err(CoreError::ModelNotTrained);
            }
        };
        let artifact = Arc::new(artifact);
        *self.published.write() = Some(artifact.clone());
        Ok(artifact)
    }

    fn fit_ensemble(
        &self,
        x_train: &[Vec<f64>],
        y_train: &[f64],
        rng: &mut StdRng,
    ) -> Result<Vec<RegressionTree>> {
        let params = DecisionTreeRegressorParameters::default()
            .with_max_depth(self.cfg.max_depth)
            .with_min_samples_split(self.cfg.min_samples_split)
            .with_min_samples_leaf(self.cfg.min_samples_leaf);

        let n = x_train.len();
        let mut trees = Vec::with_capacity(self.cfg.n_trees);
        for _ in 0..self.cfg.n_trees {
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let x_boot: Vec<Vec<f64>> = sample.iter().map(|&i| x_train[i].clone()).collect();
            let y_boot: Vec<f64> = sample.iter().map(|&i| y_train[i]).collect();
            let tree = RegressionTree::fit(
                &matrix_from_rows(&x_boot),
                &y_boot,
                params.clone(),
            )
            .map_err(|e| anyhow::anyhow!("tree training failed: {:?}", e))?;
            trees.push(tree);
        }
        Ok(trees)
    }
}

fn matrix_from_rows(rows: &[Vec<f64>]) -> DenseMatrix<f64> {
    let n_rows = rows.len();
    let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
    let mut flat = Vec::with_capacity(n_rows * n_cols);
    for row in rows {
        flat.extend_from_slice(row);
    }
    DenseMatrix::new(n_rows, n_cols, flat, false)
}

/// Per-row mean and inter-tree standard deviation across the ensemble.
fn ensemble_stats(
    trees: &[RegressionTree],
    x: &DenseMatrix<f64>,
    n_rows: usize,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut per_tree: Vec<Vec<f64>> = Vec::with_capacity(trees.len());
    for tree in trees {
        let predictions = tree
            .predict(x)
            .map_err(|e| anyhow::anyhow!("tree prediction failed: {:?}", e))?;
        per_tree.push(predictions);
    }
    let t = per_tree.len() as f64;
    let mut means = Vec::with_capacity(n_rows);
    let mut stds = Vec::with_capacity(n_rows);
    for row in 0..n_rows {
        let mean = per_tree.iter().map(|p| p[row]).sum::<f64>() / t;
        let variance = per_tree.iter().map(|p| (p[row] - mean).powi(2)).sum::<f64>() / t;
        means.push(mean);
        stds.push(variance.sqrt());
    }
    Ok((means, stds))
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::sim::SyntheticSessionGenerator;
    use crate::store::{InMemoryArtifactStore, InMemorySessionStore};
    use chrono::TimeZone;

    fn fast_config() -> ForecastModelConfig {
        ForecastModelConfig {
            n_trees: 25,
            ..ForecastModelConfig::default()
        }
    }

    fn engine_with_history(
        days: u32,
    ) -> (
        DemandForecastingEngine,
        Arc<InMemorySessionStore>,
        Arc<InMemoryArtifactStore>,
        Vec<HistoricalSessionRecord>,
        DateTime<Utc>,
    ) {
        let end = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();
        let records =
            SyntheticSessionGenerator::new(7).generate(&["site_hq", "site_depot"], days, end);
        let sessions = Arc::new(InMemorySessionStore::with_sessions(records.clone()));
        let artifacts = Arc::new(InMemoryArtifactStore::new());
        let engine = DemandForecastingEngine::new(
            sessions.clone(),
            artifacts.clone(),
            fast_config(),
        );
        (engine, sessions, artifacts, records, end)
    }

    #[tokio::test]
    async fn test_train_reports_finite_metrics() {
        let (engine, _, _, records, _) = engine_with_history(21);
        assert!(records.len() >= 100);
        let report = engine.train(&records).await.unwrap();
        assert!(report.train_r2.is_finite());
        assert!(report.test_r2 <= 1.0);
        assert!(report.mae >= 0.0);
        assert!(report.rmse >= report.mae);
        assert!(report.training_rows > 0);
    }

    #[tokio::test]
    async fn test_train_below_floor_publishes_nothing() {
        let (engine, _, artifacts, records, _) = engine_with_history(2);
        let few: Vec<_> = records.into_iter().take(50).collect();
        let err = engine.train(&few).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientData {
                available: 50,
                required: 100
            }
        ));
        assert!(artifacts
            .load(&fast_config().artifact_key)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_predict_without_model_fails_uniformly() {
        let (engine, _, _, _, end) = engine_with_history(21);
        let err = engine.predict("site_hq", end, 24).await.unwrap_err();
        assert!(matches!(err, CoreError::ModelNotTrained));
    }

    #[tokio::test]
    async fn test_predict_holds_interval_invariants_and_upserts() {
        let (engine, sessions, _, records, end) = engine_with_history(21);
        engine.train(&records).await.unwrap();

        let points = engine.predict("site_hq", end, 24).await.unwrap();
        assert_eq!(points.len(), 24);
        for (h, p) in points.iter().enumerate() {
            assert_eq!(
                p.time_slot,
                end + chrono::Duration::hours(h as i64),
                "slots are hour-aligned and consecutive"
            );
            assert!(p.confidence_lower >= 0.0);
            assert!(p.confidence_lower <= p.predicted_total_kwh);
            assert!(p.predicted_total_kwh <= p.confidence_upper);
            assert!(p.predicted_active_sessions >= 1);
        }
        assert_eq!(sessions.forecast_count(), 24);

        // Recomputation overwrites the same (site, hour) keys.
        engine.predict("site_hq", end, 24).await.unwrap();
        assert_eq!(sessions.forecast_count(), 24);
    }

    #[tokio::test]
    async fn test_predictions_are_reproducible() {
        let (engine, _, _, records, end) = engine_with_history(14);
        engine.train(&records).await.unwrap();
        let first = engine.predict("site_hq", end, 6).await.unwrap();

        let (engine2, _, _, _, _) = engine_with_history(14);
        engine2.train(&records).await.unwrap();
        let second = engine2.predict("site_hq", end, 6).await.unwrap();

        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.predicted_total_kwh, b.predicted_total_kwh);
            assert_eq!(a.confidence_lower, b.confidence_lower);
            assert_eq!(a.confidence_upper, b.confidence_upper);
        }
    }

    #[tokio::test]
    async fn test_unseen_site_degrades_to_sentinel_forecast() {
        let (engine, _, _, records, end) = engine_with_history(14);
        engine.train(&records).await.unwrap();
        let points = engine.predict("site_never_seen", end, 3).await.unwrap();
        assert_eq!(points.len(), 3);
        for p in &points {
            assert!(p.predicted_total_kwh.is_finite());
        }
    }

    #[tokio::test]
    async fn test_artifact_round_trips_through_store() {
        let (engine, sessions, artifacts, records, end) = engine_with_history(14);
        engine.train(&records).await.unwrap();

        // A fresh engine sharing only the stores loads the published model.
        let rebooted =
            DemandForecastingEngine::new(sessions, artifacts, fast_config());
        let points = rebooted.predict("site_hq", end, 4).await.unwrap();
        assert_eq!(points.len(), 4);
    }

    #[tokio::test]
    async fn test_horizon_bounds_are_validated() {
        let (engine, _, _, records, end) = engine_with_history(14);
        engine.train(&records).await.unwrap();
        assert!(matches!(
            engine.predict("site_hq", end, 0).await.unwrap_err(),
            CoreError::Validation(_)
        ));
        assert!(matches!(
            engine.predict("site_hq", end, 49).await.unwrap_err(),
            CoreError::Validation(_)
        ));
        assert!(engine.predict("site_hq", end, 48).await.is_ok());
    }
}
