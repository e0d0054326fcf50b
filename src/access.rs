//! Identity/authorization gate consulted before any plan is computed.
//!
//! Real credential verification is delegated to an external authority; this
//! crate only defines the seam and a rule-based simulated implementation.
//! The context travels explicitly with every call so no client state ever
//! carries over between unrelated requests.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Everything the gate may inspect for one session-start request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AccessContext {
    #[validate(length(min = 1))]
    pub driver_id: String,
    #[validate(length(min = 1))]
    pub vehicle_id: String,
    #[validate(length(min = 1))]
    pub charger_id: String,
    #[validate(length(min = 1))]
    pub site_id: String,
    /// Sites the driver may charge at; empty means unrestricted.
    pub allowed_sites: Vec<String>,
    pub charger_available: bool,
    pub current_soc_percent: f64,
    pub battery_capacity_kwh: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: String,
}

impl AccessDecision {
    fn deny(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: reason.to_string(),
        }
    }

    fn allow(reason: &str) -> Self {
        Self {
            allowed: true,
            reason: reason.to_string(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccessValidator: Send + Sync {
    async fn check(&self, ctx: &AccessContext) -> Result<AccessDecision>;
}

/// Identifier namespaces the rule-based validator expects.
pub const DRIVER_ID_PREFIX: &str = "driver:";
pub const VEHICLE_ID_PREFIX: &str = "vehicle:";
pub const CHARGER_ID_PREFIX: &str = "charger:";

/// Simulated access control: identifier-format, site-permission and
/// plausibility checks. Selected by configuration; production deployments
/// inject a validator backed by the real credential authority instead.
#[derive(Debug, Default)]
pub struct RuleBasedAccessValidator;

#[async_trait]
impl AccessValidator for RuleBasedAccessValidator {
    async fn check(&self, ctx: &AccessContext) -> Result<AccessDecision> {
        if !ctx.driver_id.starts_with(DRIVER_ID_PREFIX) {
            return Ok(AccessDecision::deny("Invalid driver identifier format"));
        }
        if !ctx.vehicle_id.starts_with(VEHICLE_ID_PREFIX) {
            return Ok(AccessDecision::deny("Invalid vehicle identifier format"));
        }
        if !ctx.charger_id.starts_with(CHARGER_ID_PREFIX) {
            return Ok(AccessDecision::deny("Invalid charger identifier format"));
        }
        if !ctx.allowed_sites.is_empty() && !ctx.allowed_sites.contains(&ctx.site_id) {
            return Ok(AccessDecision::deny(&format!(
                "Driver not authorized to charge at site {}",
                ctx.site_id
            )));
        }
        if !ctx.charger_available {
            return Ok(AccessDecision::deny("Charger is currently unavailable"));
        }
        if !(0.0..=100.0).contains(&ctx.current_soc_percent) {
            return Ok(AccessDecision::deny("Invalid vehicle state of charge"));
        }
        if ctx.battery_capacity_kwh <= 0.0 {
            return Ok(AccessDecision::deny("Invalid battery capacity"));
        }
        Ok(AccessDecision::allow(
            "Access granted - all credentials verified",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> AccessContext {
        AccessContext {
            driver_id: "driver:d001".into(),
            vehicle_id: "vehicle:v001".into(),
            charger_id: "charger:hq_01".into(),
            site_id: "site_hq".into(),
            allowed_sites: vec!["site_hq".into(), "site_depot".into()],
            charger_available: true,
            current_soc_percent: 35.0,
            battery_capacity_kwh: 75.0,
        }
    }

    #[tokio::test]
    async fn test_valid_context_is_allowed() {
        let decision = RuleBasedAccessValidator.check(&ctx()).await.unwrap();
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn test_bad_identifier_namespaces_are_denied() {
        let mutations: [fn(&mut AccessContext); 3] = [
            |c| c.driver_id = "d001".into(),
            |c| c.vehicle_id = "car-1".into(),
            |c| c.charger_id = "plug_9".into(),
        ];
        for mutate in mutations {
            let mut c = ctx();
            mutate(&mut c);
            let decision = RuleBasedAccessValidator.check(&c).await.unwrap();
            assert!(!decision.allowed);
            assert!(decision.reason.contains("identifier format"));
        }
    }

    #[tokio::test]
    async fn test_site_permission_enforced() {
        let mut c = ctx();
        c.site_id = "site_mall".into();
        let decision = RuleBasedAccessValidator.check(&c).await.unwrap();
        assert!(!decision.allowed);
        assert!(decision.reason.contains("site_mall"));
    }

    #[tokio::test]
    async fn test_empty_allow_list_means_unrestricted() {
        let mut c = ctx();
        c.allowed_sites.clear();
        c.site_id = "site_anywhere".into();
        let decision = RuleBasedAccessValidator.check(&c).await.unwrap();
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn test_unavailable_charger_denied() {
        let mut c = ctx();
        c.charger_available = false;
        assert!(!RuleBasedAccessValidator.check(&c).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_implausible_battery_state_denied() {
        let mut c = ctx();
        c.current_soc_percent = 130.0;
        assert!(!RuleBasedAccessValidator.check(&c).await.unwrap().allowed);

        let mut c = ctx();
        c.battery_capacity_kwh = 0.0;
        assert!(!RuleBasedAccessValidator.check(&c).await.unwrap().allowed);
    }
}
