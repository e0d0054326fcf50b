use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

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
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum PlanType {
    #[default]
    Standard,
    Fast,
    Economy,
    Green,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IncentiveKind {
    Discount,
    RewardPoints,
    PrioritySlot,
}

/// A nudge offered alongside a plan: percent discount, loyalty points or a
/// reserved slot. `value` is percent for discounts, points for rewards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncentiveOffer {
    pub kind: IncentiveKind,
    pub value: f64,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_slot: Option<DateTime<FixedOffset>>,
}

/// Computed charging plan; immutable output of the planner.
///
/// Infeasibility is part of the plan (`is_feasible` + warning), never an
/// error: the driver still gets the numbers and decides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargingPlan {
    pub needed_trip_energy_kwh: f64,
    pub current_energy_kwh: f64,
    pub extra_energy_needed_kwh: f64,
    pub target_soc_percent: f64,
    pub planned_duration_hours: f64,
    pub planned_finish_time: DateTime<FixedOffset>,
    pub is_feasible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feasibility_warning: Option<String>,
    pub planned_cost_eur: f64,
    pub effective_charge_power_kw: f64,
    pub plan_type: PlanType,
    pub incentive_offers: Vec<IncentiveOffer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_type_serde_tokens() {
        assert_eq!(serde_json::to_string(&PlanType::Green).unwrap(), "\"GREEN\"");
        let parsed: PlanType = serde_json::from_str("\"ECONOMY\"").unwrap();
        assert_eq!(parsed, PlanType::Economy);
        assert_eq!(PlanType::Standard.to_string(), "STANDARD");
    }

    #[test]
    fn test_incentive_kind_serde_tokens() {
        assert_eq!(
            serde_json::to_string(&IncentiveKind::RewardPoints).unwrap(),
            "\"reward_points\""
        );
        let parsed: IncentiveKind = serde_json::from_str("\"priority_slot\"").unwrap();
        assert_eq!(parsed, IncentiveKind::PrioritySlot);
    }
}
