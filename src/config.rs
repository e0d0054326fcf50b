use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub collaborators: CollaboratorsConfig,
    pub planner: PlannerConfig,
    pub forecast: ForecastModelConfig,
}

/// Which collaborator implementations the orchestrator is wired against.
///
/// Chosen once per deployment; never substituted mid-call. `External` means
/// the embedding service injects its own validator/store implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorMode {
    Simulated,
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorsConfig {
    pub mode: CollaboratorMode,
}

impl Default for CollaboratorsConfig {
    fn default() -> Self {
        Self {
            mode: CollaboratorMode::Simulated,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// UTC offset of the charging sites, used to stamp "now" when the caller
    /// does not supply an instant. Incentive windows are site-local.
    pub site_utc_offset_hours: i32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            site_utc_offset_hours: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastModelConfig {
    pub n_trees: usize,
    pub max_depth: u16,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Seed for the train/test shuffle and the per-tree bootstrap draws.
    pub seed: u64,
    pub test_fraction: f64,
    /// Training refuses to publish a model below this many usable sessions.
    pub min_training_sessions: usize,
    pub max_horizon_hours: usize,
    /// Logical key the trained artifact is published under.
    pub artifact_key: String,
}

impl Default for ForecastModelConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 15,
            min_samples_split: 5,
            min_samples_leaf: 2,
            seed: 42,
            test_fraction: 0.2,
            min_training_sessions: 100,
            max_horizon_hours: 48,
            artifact_key: "demand-forecast/latest".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("ORCH__").split("__"));
        Ok(figment.extract()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_model_contract() {
        let cfg = Config::default();
        assert_eq!(cfg.forecast.n_trees, 100);
        assert_eq!(cfg.forecast.max_depth, 15);
        assert_eq!(cfg.forecast.min_samples_split, 5);
        assert_eq!(cfg.forecast.min_samples_leaf, 2);
        assert_eq!(cfg.forecast.min_training_sessions, 100);
        assert_eq!(cfg.forecast.max_horizon_hours, 48);
        assert_eq!(cfg.collaborators.mode, CollaboratorMode::Simulated);
    }

    #[test]
    fn test_mode_parses_lowercase() {
        let mode: CollaboratorMode = serde_json::from_str("\"external\"").unwrap();
        assert_eq!(mode, CollaboratorMode::External);
    }
}
