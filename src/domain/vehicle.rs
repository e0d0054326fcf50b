use serde::{Deserialize, Serialize};
use validator::Validate;

/// Coarse battery-health classification driving the charge-power governor.
///
/// Reported by the vehicle (or a fleet battery-passport service); absent or
/// unparseable values fall back to `Unknown`, which gets a conservative
/// middle-of-the-road power ceiling rather than the healthy-pack one.
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    InUse,
    SecondLife,
    EndOfLife,
    #[default]
    Unknown,
}

/// Vehicle snapshot supplied per session-start request.
///
/// Immutable for the duration of a planning call; the core never owns or
/// mutates vehicle state.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Vehicle {
    #[validate(range(exclusive_min = 0.0))]
    pub battery_capacity_kwh: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub consumption_wh_per_km: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub max_charge_power_kw: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub current_soc_percent: f64,
    #[serde(default)]
    pub lifecycle_status: LifecycleStatus,
}

impl Vehicle {
    /// Energy currently stored in the pack, in kWh.
    pub fn current_energy_kwh(&self) -> f64 {
        self.battery_capacity_kwh * self.current_soc_percent / 100.0
    }
}
