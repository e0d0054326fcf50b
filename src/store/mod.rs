//! Collaborator store interfaces.
//!
//! Persistence lives outside this crate; the core only needs the reads and
//! writes below. Retry and timeout policy belong to the implementations.

#[cfg(feature = "sim")]
pub mod memory;

#[cfg(feature = "sim")]
pub use memory::{InMemoryArtifactStore, InMemorySessionStore};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ForecastPoint, HistoricalSessionRecord};

/// Historical charging-session store plus the forecast rows derived from it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Completed sessions for a site with metered energy, started inside
    /// `[from, to)`.
    async fn completed_sessions(
        &self,
        site_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<HistoricalSessionRecord>>;

    /// Append a newly completed session record.
    async fn append_session(&self, record: HistoricalSessionRecord) -> Result<()>;

    /// Write a forecast row; identity is `(site_id, floor-hour)`, so
    /// recomputation overwrites rather than duplicates.
    async fn upsert_forecast(&self, point: &ForecastPoint) -> Result<()>;

    /// Stored forecast row for a site at an hour slot, if any.
    async fn forecast_at(
        &self,
        site_id: &str,
        time_slot: DateTime<Utc>,
    ) -> Result<Option<ForecastPoint>>;
}

/// Model artifact store: one logical key, atomically replaced blobs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Publish a new artifact under `key`, replacing any previous one as a
    /// whole; readers never observe a partial write.
    async fn publish(&self, key: &str, bytes: Vec<u8>) -> Result<()>;
}
