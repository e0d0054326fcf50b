//! End-to-end forecasting pipeline: synthetic history in, trained model
//! published, hourly forecast rows upserted.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use charge_orchestrator::config::ForecastModelConfig;
use charge_orchestrator::forecast::DemandForecastingEngine;
use charge_orchestrator::sim::SyntheticSessionGenerator;
use charge_orchestrator::store::{InMemoryArtifactStore, InMemorySessionStore, SessionStore};
use charge_orchestrator::CoreError;

const SITES: [&str; 3] = ["site_hq", "site_depot", "site_mall"];

fn history_end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap()
}

fn pipeline(days: u32) -> (DemandForecastingEngine, Arc<InMemorySessionStore>) {
    let records = SyntheticSessionGenerator::new(42).generate(&SITES, days, history_end());
    let sessions = Arc::new(InMemorySessionStore::with_sessions(records));
    let engine = DemandForecastingEngine::new(
        sessions.clone(),
        Arc::new(InMemoryArtifactStore::new()),
        ForecastModelConfig::default(),
    );
    (engine, sessions)
}

#[tokio::test]
async fn full_pipeline_trains_and_forecasts_every_site() {
    let (engine, sessions) = pipeline(30);
    let records = sessions
        .completed_sessions("site_hq", history_end() - chrono::Duration::days(30), history_end())
        .await
        .unwrap();
    assert!(records.len() >= 100, "synthetic history exercises training");

    // Train over all sites' history.
    let mut all = Vec::new();
    for site in SITES {
        all.extend(
            sessions
                .completed_sessions(site, history_end() - chrono::Duration::days(30), history_end())
                .await
                .unwrap(),
        );
    }
    let report = engine.train(&all).await.unwrap();
    assert!(report.train_r2.is_finite() && report.train_r2 <= 1.0);
    assert!(report.test_r2.is_finite() && report.test_r2 <= 1.0);
    assert!(report.mae >= 0.0 && report.rmse >= 0.0);

    let mut total_rows = 0;
    for site in SITES {
        let points = engine.predict(site, history_end(), 48).await.unwrap();
        assert_eq!(points.len(), 48);
        for point in &points {
            assert_eq!(point.site_id, site);
            assert!(point.confidence_lower >= 0.0);
            assert!(point.confidence_lower <= point.predicted_total_kwh);
            assert!(point.predicted_total_kwh <= point.confidence_upper);
            assert!(point.predicted_active_sessions >= 1);
        }
        total_rows += 48;
    }
    assert_eq!(sessions.forecast_count(), total_rows);

    // Recomputation upserts in place: same keys, same row count.
    engine.predict("site_hq", history_end(), 48).await.unwrap();
    assert_eq!(sessions.forecast_count(), total_rows);
}

#[tokio::test]
async fn undertrained_engine_refuses_and_publishes_nothing() {
    let (engine, sessions) = pipeline(30);
    let some = sessions
        .completed_sessions("site_hq", history_end() - chrono::Duration::days(30), history_end())
        .await
        .unwrap();
    let fifty: Vec<_> = some.into_iter().take(50).collect();

    match engine.train(&fifty).await.unwrap_err() {
        CoreError::InsufficientData {
            available,
            required,
        } => {
            assert_eq!(available, 50);
            assert_eq!(required, 100);
        }
        other => panic!("expected InsufficientData, got {other}"),
    }

    // No artifact was published, so prediction still fails uniformly.
    assert!(matches!(
        engine.predict("site_hq", history_end(), 24).await.unwrap_err(),
        CoreError::ModelNotTrained
    ));
}

#[tokio::test]
async fn cold_and_unseen_sites_still_get_forecasts() {
    let (engine, sessions) = pipeline(21);
    let mut all = Vec::new();
    for site in SITES {
        all.extend(
            sessions
                .completed_sessions(site, history_end() - chrono::Duration::days(21), history_end())
                .await
                .unwrap(),
        );
    }
    engine.train(&all).await.unwrap();

    // Never-trained site: degraded but well-defined forecast.
    let points = engine.predict("site_popup", history_end(), 12).await.unwrap();
    assert_eq!(points.len(), 12);
    for point in &points {
        assert!(point.predicted_total_kwh.is_finite());
        assert!(point.confidence_lower <= point.confidence_upper);
    }
}
