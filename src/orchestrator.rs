//! Session orchestration: the gate-plan-settle flow around the calculator.
//!
//! Access control is a hard gate; the peak-demand forecast signal is
//! best-effort and its absence or failure never blocks planning.

use std::sync::Arc;

use chrono::{DateTime, DurationRound, FixedOffset, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;
use validator::Validate;

use crate::access::{AccessContext, AccessValidator};
use crate::config::{CollaboratorMode, Config};
use crate::domain::{
    Charger, ChargingPlan, DriverPreferences, HistoricalSessionRecord, IncentiveKind, Trip,
    Vehicle,
};
use crate::error::CoreError;
use crate::planner::{DemandSignal, PlanningEngine, SessionSettlement};
use crate::store::SessionStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub driver_id: String,
    /// Sites the driver may charge at; empty means unrestricted.
    #[serde(default)]
    pub allowed_sites: Vec<String>,
    pub vehicle_id: String,
    pub vehicle: Vehicle,
    pub charger: Charger,
    pub trip: Trip,
    #[serde(default)]
    pub preferences: DriverPreferences,
    /// Total site capacity in kW, when known; enables the peak-demand rule.
    #[serde(default)]
    pub site_capacity_kw: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedSession {
    pub session_id: Uuid,
    pub site_id: String,
    pub started_at: DateTime<FixedOffset>,
    pub plan: ChargingPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub session_id: Uuid,
    pub energy_delivered_kwh: f64,
    pub discount_applied_percent: f64,
    pub actual_cost_eur: f64,
}

pub struct SessionOrchestrator {
    access: Arc<dyn AccessValidator>,
    sessions: Arc<dyn SessionStore>,
    planner: PlanningEngine,
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator").finish_non_exhaustive()
    }
}

impl SessionOrchestrator {
    pub fn new(access: Arc<dyn AccessValidator>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            access,
            sessions,
            planner: PlanningEngine,
        }
    }

    /// Wire the collaborator strategy selected in configuration. `External`
    /// deployments must inject their implementations via [`Self::new`];
    /// substituting the simulated ones transparently is deliberately not
    /// supported.
    pub fn from_config(cfg: &Config) -> Result<Self, CoreError> {
        match cfg.collaborators.mode {
            CollaboratorMode::Simulated => {
                #[cfg(feature = "sim")]
                {
                    Ok(Self::new(
                        Arc::new(crate::access::RuleBasedAccessValidator),
                        Arc::new(crate::store::InMemorySessionStore::new()),
                    ))
                }
                #[cfg(not(feature = "sim"))]
                {
                    Err(CoreError::Validation(
                        "collaborators.mode = simulated requires the `sim` feature".into(),
                    ))
                }
            }
            CollaboratorMode::External => Err(CoreError::Validation(
                "collaborators.mode = external requires injected implementations; \
                 construct the orchestrator with SessionOrchestrator::new"
                    .into(),
            )),
        }
    }

    /// Start a session with the current wall clock.
    pub async fn start_session(
        &self,
        request: &StartSessionRequest,
    ) -> Result<PlannedSession, CoreError> {
        self.start_session_at(Local::now().fixed_offset(), request)
            .await
    }

    /// Validate, gate, then plan a charging session as of `now`.
    pub async fn start_session_at(
        &self,
        now: DateTime<FixedOffset>,
        request: &StartSessionRequest,
    ) -> Result<PlannedSession, CoreError> {
        request.vehicle.validate()?;
        request.charger.validate()?;
        request.trip.validate()?;

        let ctx = AccessContext {
            driver_id: request.driver_id.clone(),
            vehicle_id: request.vehicle_id.clone(),
            charger_id: request.charger.id.clone(),
            site_id: request.charger.site_id.clone(),
            allowed_sites: request.allowed_sites.clone(),
            charger_available: request.charger.available,
            current_soc_percent: request.vehicle.current_soc_percent,
            battery_capacity_kwh: request.vehicle.battery_capacity_kwh,
        };
        ctx.validate()?;

        // Hard gate: an unreachable validator cannot fail open.
        let decision = match self.access.check(&ctx).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "access validator unreachable");
                return Err(CoreError::AccessDenied(format!(
                    "authorization check failed: {e}"
                )));
            }
        };
        if !decision.allowed {
            return Err(CoreError::AccessDenied(decision.reason));
        }

        let demand = self
            .demand_signal(&request.charger.site_id, request.site_capacity_kw, now)
            .await;

        let plan = self.planner.plan_at(
            now,
            &request.vehicle,
            &request.trip,
            &request.charger,
            &request.preferences,
            demand,
            None,
        );

        let session_id = Uuid::new_v4();
        debug!(%session_id, site_id = %request.charger.site_id, "session planned");
        Ok(PlannedSession {
            session_id,
            site_id: request.charger.site_id.clone(),
            started_at: now,
            plan,
        })
    }

    /// Stored forecast for the current hour, as a peak signal. Best-effort:
    /// a missing row, an untrained model upstream or a store failure all
    /// degrade to planning without the peak rule.
    async fn demand_signal(
        &self,
        site_id: &str,
        site_capacity_kw: Option<f64>,
        now: DateTime<FixedOffset>,
    ) -> Option<DemandSignal> {
        let site_capacity_kw = site_capacity_kw?;
        let slot = now
            .with_timezone(&Utc)
            .duration_trunc(chrono::Duration::hours(1))
            .ok()?;
        match self.sessions.forecast_at(site_id, slot).await {
            Ok(Some(point)) => Some(DemandSignal {
                forecasted_demand_kwh: point.predicted_total_kwh,
                site_capacity_kw,
            }),
            Ok(None) => {
                debug!(site_id, "no stored forecast for the current hour");
                None
            }
            Err(e) => {
                warn!(site_id, error = %e, "forecast lookup failed; planning without peak signal");
                None
            }
        }
    }

    /// Close a session against metered delivery. Applies the first discount
    /// captured in the plan's offers, appends the completed record and
    /// returns the settled cost.
    pub async fn complete_session(
        &self,
        session: &PlannedSession,
        energy_delivered_kwh: f64,
    ) -> Result<Settlement, CoreError> {
        if !energy_delivered_kwh.is_finite() || energy_delivered_kwh < 0.0 {
            return Err(CoreError::Validation(
                "energy_delivered_kwh must be a non-negative number".into(),
            ));
        }

        let discount_applied_percent = session
            .plan
            .incentive_offers
            .iter()
            .find(|o| o.kind == IncentiveKind::Discount)
            .map(|o| o.value)
            .unwrap_or(0.0);

        let actual_cost_eur = SessionSettlement::settle(
            session.plan.planned_cost_eur,
            energy_delivered_kwh,
            session.plan.extra_energy_needed_kwh,
            discount_applied_percent,
        );

        self.sessions
            .append_session(HistoricalSessionRecord {
                site_id: session.site_id.clone(),
                start_time: session.started_at.with_timezone(&Utc),
                energy_delivered_kwh: Some(energy_delivered_kwh),
            })
            .await?;

        debug!(
            session_id = %session.session_id,
            actual_cost_eur,
            "session settled"
        );
        Ok(Settlement {
            session_id: session.session_id,
            energy_delivered_kwh,
            discount_applied_percent,
            actual_cost_eur,
        })
    }
}
