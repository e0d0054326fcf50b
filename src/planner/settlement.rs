use crate::utils::round_to;

/// Reconciles a plan's estimated cost against metered reality at session
/// close, preserving the originally quoted tariff and discount terms.
pub struct SessionSettlement;

impl SessionSettlement {
    /// Pro-rata actual cost: scale the planned cost by delivered/planned
    /// energy, then apply the captured discount. Rounded to cents.
    pub fn settle(
        planned_cost_eur: f64,
        energy_delivered_kwh: f64,
        planned_energy_kwh: f64,
        discount_percent: f64,
    ) -> f64 {
        let mut actual = if planned_energy_kwh > 0.0 {
            planned_cost_eur * (energy_delivered_kwh / planned_energy_kwh)
        } else {
            0.0
        };
        if discount_percent > 0.0 {
            actual *= 1.0 - discount_percent / 100.0;
        }
        round_to(actual, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_exact_delivery_no_discount_is_identity() {
        assert_eq!(SessionSettlement::settle(13.49, 38.55, 38.55, 0.0), 13.49);
    }

    #[test]
    fn test_under_delivery_scales_down() {
        // Half the energy, half the cost.
        assert_eq!(SessionSettlement::settle(20.0, 10.0, 20.0, 0.0), 10.0);
    }

    #[test]
    fn test_discount_applied_after_scaling() {
        assert_eq!(SessionSettlement::settle(20.0, 20.0, 20.0, 15.0), 17.0);
    }

    #[test]
    fn test_zero_planned_energy_settles_to_zero() {
        assert_eq!(SessionSettlement::settle(12.0, 5.0, 0.0, 10.0), 0.0);
    }

    proptest! {
        #[test]
        fn prop_exact_delivery_matches_plan(
            cost in 0.0..10_000.0f64,
            energy in 0.001..1_000.0f64,
        ) {
            let settled = SessionSettlement::settle(cost, energy, energy, 0.0);
            prop_assert!((settled - cost).abs() <= 0.005 + 1e-9);
        }

        #[test]
        fn prop_settlement_never_negative(
            cost in 0.0..10_000.0f64,
            delivered in 0.0..1_000.0f64,
            planned in 0.0..1_000.0f64,
            discount in 0.0..100.0f64,
        ) {
            prop_assert!(SessionSettlement::settle(cost, delivered, planned, discount) >= 0.0);
        }
    }
}
