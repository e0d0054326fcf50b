use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// What the driver is optimising for when several plan shapes are possible.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChargePriority {
    #[default]
    Cost,
    Speed,
    Carbon,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverPreferences {
    #[serde(default)]
    pub priority: ChargePriority,
    /// Willing to shift charging for greener energy.
    #[serde(default)]
    pub carbon_conscious: bool,
}

/// Trip the vehicle must be able to complete after charging.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Trip {
    #[validate(range(exclusive_min = 0.0))]
    pub distance_km: f64,
    pub departure_time: DateTime<FixedOffset>,
}

/// Completed-session record as read back from the session store.
///
/// `energy_delivered_kwh` is `None` while a session is still open; training
/// and lookback queries only consume metered (Some) rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalSessionRecord {
    pub site_id: String,
    pub start_time: DateTime<Utc>,
    pub energy_delivered_kwh: Option<f64>,
}

impl HistoricalSessionRecord {
    pub fn is_usable(&self) -> bool {
        matches!(self.energy_delivered_kwh, Some(e) if e.is_finite() && e >= 0.0)
    }
}
