use serde::{Deserialize, Serialize};
use validator::Validate;

/// Grid-side charger snapshot for a session-start request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Charger {
    #[validate(length(min = 1))]
    pub id: String,
    /// Site the charger belongs to; keys the access gate and the per-site
    /// demand forecast.
    #[validate(length(min = 1))]
    pub site_id: String,
    #[validate(range(exclusive_min = 0.0))]
    pub max_power_kw: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub tariff_eur_per_kwh: f64,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_availability_defaults_true() {
        let c: Charger = serde_json::from_str(
            r#"{"id":"charger:hq_01","site_id":"site_hq","max_power_kw":150,"tariff_eur_per_kwh":0.35}"#,
        )
        .unwrap();
        assert!(c.available);
    }

    #[test]
    fn test_validation_rejects_non_positive_tariff() {
        let c = Charger {
            id: "charger:hq_01".into(),
            site_id: "site_hq".into(),
            max_power_kw: 150.0,
            tariff_eur_per_kwh: 0.0,
            available: true,
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_identifier() {
        let c = Charger {
            id: String::new(),
            site_id: "site_hq".into(),
            max_power_kw: 150.0,
            tariff_eur_per_kwh: 0.35,
            available: true,
        };
        assert!(c.validate().is_err());
    }
}
