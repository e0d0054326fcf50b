//! Charging-plan calculator.
//!
//! Turns (vehicle, trip, charger, preferences, optional demand signal) into a
//! complete [`ChargingPlan`]. Purely computational: identical inputs at the
//! same instant always yield an identical plan, and infeasibility is a field
//! on the result, never an error.

pub mod incentive;
pub mod lifecycle;
pub mod settlement;

pub use incentive::{DemandSignal, IncentiveEngine, IncentiveInput, PEAK_DEMAND_RATIO};
pub use lifecycle::LifecyclePowerLimiter;
pub use settlement::SessionSettlement;

use chrono::{DateTime, FixedOffset, Local};
use tracing::debug;

use crate::domain::{Charger, ChargingPlan, DriverPreferences, LifecycleStatus, Trip, Vehicle};
use crate::utils::round_to;

/// Fixed multiplier on computed trip energy absorbing estimation error and
/// driving variance.
pub const SAFETY_BUFFER: f64 = 1.2;

/// Charging efficiency applied on top of the power ceiling (heat and
/// conversion losses between the plug and the pack).
pub const EFFICIENCY_FACTOR: f64 = 0.85;

#[derive(Debug, Default)]
pub struct PlanningEngine;

impl PlanningEngine {
    /// Plan with the current wall clock. See [`PlanningEngine::plan_at`].
    #[allow(clippy::too_many_arguments)]
    pub fn plan(
        &self,
        vehicle: &Vehicle,
        trip: &Trip,
        charger: &Charger,
        preferences: &DriverPreferences,
        demand: Option<DemandSignal>,
        lifecycle_override: Option<LifecycleStatus>,
    ) -> ChargingPlan {
        self.plan_at(
            Local::now().fixed_offset(),
            vehicle,
            trip,
            charger,
            preferences,
            demand,
            lifecycle_override,
        )
    }

    /// Compute a charging plan as of `now`.
    ///
    /// The effective power is the three-way minimum of charger hardware,
    /// vehicle hardware and the lifecycle ceiling, scaled by the efficiency
    /// factor: no single party can override a stricter one. Numeric
    /// preconditions (positive capacity/power/tariff/distance, SoC range)
    /// are the caller's contract, enforced via `Validate` before this runs.
    #[allow(clippy::too_many_arguments)]
    pub fn plan_at(
        &self,
        now: DateTime<FixedOffset>,
        vehicle: &Vehicle,
        trip: &Trip,
        charger: &Charger,
        preferences: &DriverPreferences,
        demand: Option<DemandSignal>,
        lifecycle_override: Option<LifecycleStatus>,
    ) -> ChargingPlan {
        let needed_trip_energy =
            trip.distance_km * vehicle.consumption_wh_per_km / 1000.0 * SAFETY_BUFFER;
        let current_energy = vehicle.current_energy_kwh();
        let extra_energy = (needed_trip_energy - current_energy).max(0.0);

        // No forced overcharge: a battery that already covers the trip keeps
        // its current SoC as the target.
        let target_soc = if extra_energy == 0.0 {
            vehicle.current_soc_percent
        } else {
            ((current_energy + extra_energy) / vehicle.battery_capacity_kwh * 100.0).min(100.0)
        };

        let lifecycle = lifecycle_override.unwrap_or(vehicle.lifecycle_status);
        let lifecycle_limit_kw =
            LifecyclePowerLimiter::limit_kw(lifecycle, vehicle.battery_capacity_kwh);
        let effective_power = charger
            .max_power_kw
            .min(vehicle.max_charge_power_kw)
            .min(lifecycle_limit_kw)
            * EFFICIENCY_FACTOR;

        let duration_hours = if effective_power > 0.0 && extra_energy > 0.0 {
            extra_energy / effective_power
        } else {
            0.0
        };

        let finish_time =
            now + chrono::Duration::milliseconds((duration_hours * 3_600_000.0).round() as i64);
        let is_feasible = finish_time <= trip.departure_time;
        let hours_until_departure =
            (trip.departure_time - now).num_milliseconds() as f64 / 3_600_000.0;
        let feasibility_warning = (!is_feasible).then(|| {
            format!(
                "Charging will take {:.2} hours but you only have {:.2} hours before departure. \
                 Short by {:.2} hours. Consider a faster charger or a shorter trip.",
                duration_hours,
                hours_until_departure,
                duration_hours - hours_until_departure,
            )
        });

        let planned_cost = extra_energy * charger.tariff_eur_per_kwh;

        let (plan_type, incentive_offers) = IncentiveEngine::evaluate(&IncentiveInput {
            now,
            preferences,
            charger_max_power_kw: charger.max_power_kw,
            effective_power_kw: effective_power,
            is_feasible,
            duration_hours,
            hours_until_departure,
            demand,
        });

        debug!(
            site_id = %charger.site_id,
            extra_energy_kwh = extra_energy,
            effective_power_kw = effective_power,
            duration_hours,
            is_feasible,
            plan_type = %plan_type,
            "charging plan computed"
        );

        ChargingPlan {
            needed_trip_energy_kwh: needed_trip_energy,
            current_energy_kwh: current_energy,
            extra_energy_needed_kwh: extra_energy,
            target_soc_percent: round_to(target_soc, 2),
            planned_duration_hours: round_to(duration_hours, 3),
            planned_finish_time: finish_time,
            is_feasible,
            feasibility_warning,
            planned_cost_eur: round_to(planned_cost, 2),
            effective_charge_power_kw: round_to(effective_power, 2),
            plan_type,
            incentive_offers,
        }
    }
}
