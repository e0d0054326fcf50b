//! In-memory store implementations: the configuration-selected simulated
//! collaborators, and the substrate for tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::{ArtifactStore, SessionStore};
use crate::domain::{forecast_row_key, ForecastPoint, HistoricalSessionRecord};

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<Vec<HistoricalSessionRecord>>,
    forecasts: RwLock<BTreeMap<String, ForecastPoint>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload historical sessions, e.g. a synthetic history.
    pub fn with_sessions(records: Vec<HistoricalSessionRecord>) -> Self {
        Self {
            sessions: RwLock::new(records),
            forecasts: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn forecast_count(&self) -> usize {
        self.forecasts.read().len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn completed_sessions(
        &self,
        site_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<HistoricalSessionRecord>> {
        Ok(self
            .sessions
            .read()
            .iter()
            .filter(|r| {
                r.site_id == site_id && r.start_time >= from && r.start_time < to && r.is_usable()
            })
            .cloned()
            .collect())
    }

    async fn append_session(&self, record: HistoricalSessionRecord) -> Result<()> {
        self.sessions.write().push(record);
        Ok(())
    }

    async fn upsert_forecast(&self, point: &ForecastPoint) -> Result<()> {
        self.forecasts
            .write()
            .insert(point.row_key(), point.clone());
        Ok(())
    }

    async fn forecast_at(
        &self,
        site_id: &str,
        time_slot: DateTime<Utc>,
    ) -> Result<Option<ForecastPoint>> {
        let key = forecast_row_key(site_id, time_slot);
        Ok(self.forecasts.read().get(&key).cloned())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().get(key).cloned())
    }

    async fn publish(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.blobs.write().insert(key.to_string(), bytes);
        Ok(())
    }
}
