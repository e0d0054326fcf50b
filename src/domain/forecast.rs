use chrono::{DateTime, DurationRound, Utc};
use serde::{Deserialize, Serialize};

/// One forecast hour for a site.
///
/// Invariant: `confidence_lower <= predicted_total_kwh <= confidence_upper`
/// and `predicted_active_sessions >= 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub site_id: String,
    /// Hour-aligned slot start.
    pub time_slot: DateTime<Utc>,
    pub predicted_total_kwh: f64,
    pub predicted_active_sessions: u32,
    pub confidence_lower: f64,
    pub confidence_upper: f64,
}

impl ForecastPoint {
    /// Idempotent-upsert identity: recomputing a forecast for the same site
    /// and hour overwrites the previous row instead of duplicating it.
    pub fn row_key(&self) -> String {
        forecast_row_key(&self.site_id, self.time_slot)
    }
}

/// Sortable string key for a forecast row: `{site_id}_{YYYYMMDDHH}`.
pub fn forecast_row_key(site_id: &str, time_slot: DateTime<Utc>) -> String {
    let slot = time_slot
        .duration_trunc(chrono::Duration::hours(1))
        .unwrap_or(time_slot);
    format!("{}_{}", site_id, slot.format("%Y%m%d%H"))
}
