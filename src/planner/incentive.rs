use chrono::{DateTime, FixedOffset, Timelike};

use crate::domain::{ChargePriority, DriverPreferences, IncentiveKind, IncentiveOffer, PlanType};

/// Site load above this fraction of capacity counts as peak demand.
pub const PEAK_DEMAND_RATIO: f64 = 0.8;

/// Local-hour window in which solar generation is assumed available,
/// half-open: 10:00 inclusive to 16:00 exclusive.
pub const SOLAR_WINDOW_HOURS: std::ops::Range<u32> = 10..16;

/// Forecast-derived peak signal for the site the session starts at.
#[derive(Debug, Clone, Copy)]
pub struct DemandSignal {
    pub forecasted_demand_kwh: f64,
    pub site_capacity_kw: f64,
}

impl DemandSignal {
    pub fn is_peak(&self) -> bool {
        self.site_capacity_kw > 0.0
            && self.forecasted_demand_kwh / self.site_capacity_kw > PEAK_DEMAND_RATIO
    }
}

/// Everything the incentive rules may look at, passed explicitly per call.
#[derive(Debug, Clone)]
pub struct IncentiveInput<'a> {
    pub now: DateTime<FixedOffset>,
    pub preferences: &'a DriverPreferences,
    pub charger_max_power_kw: f64,
    pub effective_power_kw: f64,
    pub is_feasible: bool,
    pub duration_hours: f64,
    pub hours_until_departure: f64,
    pub demand: Option<DemandSignal>,
}

impl IncentiveInput<'_> {
    fn is_peak(&self) -> bool {
        self.demand.map(|d| d.is_peak()).unwrap_or(false)
    }
}

/// What a single rule contributes: an optional plan classification and an
/// optional offer. Rules never see each other's outcomes.
#[derive(Debug, Default)]
pub struct RuleOutcome {
    pub plan_type: Option<PlanType>,
    pub offer: Option<IncentiveOffer>,
}

pub struct IncentiveRule {
    pub name: &'static str,
    eval: fn(&IncentiveInput) -> RuleOutcome,
}

/// Rule list in ascending priority. Plan-type assignment is last-wins over
/// this order, so carbon overrides speed overrides cost when several rules
/// fire for the same session. Offers accumulate in list order.
pub const RULES: [IncentiveRule; 4] = [
    IncentiveRule {
        name: "grid_balance_delay",
        eval: grid_balance_delay,
    },
    IncentiveRule {
        name: "off_peak_economy",
        eval: off_peak_economy,
    },
    IncentiveRule {
        name: "fast_charge_intent",
        eval: fast_charge_intent,
    },
    IncentiveRule {
        name: "solar_window_green",
        eval: solar_window_green,
    },
];

/// Peak site and enough slack before departure: offer a 15% discount for
/// starting two hours later. Leaves the plan type untouched.
fn grid_balance_delay(input: &IncentiveInput) -> RuleOutcome {
    if input.is_peak()
        && input.is_feasible
        && input.hours_until_departure > input.duration_hours + 2.0
    {
        return RuleOutcome {
            plan_type: None,
            offer: Some(IncentiveOffer {
                kind: IncentiveKind::Discount,
                value: 15.0,
                reason: "Delay charging by 2 hours to help balance grid load during peak demand"
                    .to_string(),
                time_slot: Some(input.now + chrono::Duration::hours(2)),
            }),
        };
    }
    RuleOutcome::default()
}

fn off_peak_economy(input: &IncentiveInput) -> RuleOutcome {
    if input.preferences.priority == ChargePriority::Cost && !input.is_peak() {
        return RuleOutcome {
            plan_type: Some(PlanType::Economy),
            offer: Some(IncentiveOffer {
                kind: IncentiveKind::Discount,
                value: 10.0,
                reason: "Off-peak charging discount available".to_string(),
                time_slot: None,
            }),
        };
    }
    RuleOutcome::default()
}

/// Flags intent only: the effective power already sits at the three-way
/// minimum and is never raised here.
fn fast_charge_intent(input: &IncentiveInput) -> RuleOutcome {
    if input.preferences.priority == ChargePriority::Speed
        && input.effective_power_kw < input.charger_max_power_kw
    {
        return RuleOutcome {
            plan_type: Some(PlanType::Fast),
            offer: None,
        };
    }
    RuleOutcome::default()
}

fn solar_window_green(input: &IncentiveInput) -> RuleOutcome {
    if input.preferences.carbon_conscious && SOLAR_WINDOW_HOURS.contains(&input.now.hour()) {
        return RuleOutcome {
            plan_type: Some(PlanType::Green),
            offer: Some(IncentiveOffer {
                kind: IncentiveKind::RewardPoints,
                value: 50.0,
                reason: "Charging during solar peak hours (renewable energy available)".to_string(),
                time_slot: None,
            }),
        };
    }
    RuleOutcome::default()
}

/// Stateless rule-set evaluator producing the plan classification and the
/// offer list for a computed plan.
pub struct IncentiveEngine;

impl IncentiveEngine {
    pub fn evaluate(input: &IncentiveInput) -> (PlanType, Vec<IncentiveOffer>) {
        let mut plan_type = None;
        let mut offers = Vec::new();
        for rule in &RULES {
            let outcome = (rule.eval)(input);
            if let Some(t) = outcome.plan_type {
                tracing::debug!(rule = rule.name, plan_type = %t, "incentive rule fired");
                plan_type = Some(t);
            }
            if let Some(offer) = outcome.offer {
                offers.push(offer);
            }
        }
        (plan_type.unwrap_or_default(), offers)
    }
}
