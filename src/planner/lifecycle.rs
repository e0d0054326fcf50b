use crate::domain::LifecycleStatus;

/// Maps battery lifecycle classification to the maximum safe charging rate.
///
/// C-rate is kW per kWh of capacity; degraded packs charge slower. `Unknown`
/// gets 1.0C, below the healthy in-service ceiling.
pub struct LifecyclePowerLimiter;

impl LifecyclePowerLimiter {
    pub fn max_c_rate(status: LifecycleStatus) -> f64 {
        match status {
            LifecycleStatus::InUse => 1.5,
            LifecycleStatus::SecondLife => 0.7,
            LifecycleStatus::EndOfLife => 0.3,
            LifecycleStatus::Unknown => 1.0,
        }
    }

    /// Absolute power ceiling for a pack of the given capacity, in kW.
    pub fn limit_kw(status: LifecycleStatus, battery_capacity_kwh: f64) -> f64 {
        Self::max_c_rate(status) * battery_capacity_kwh
    }
}
