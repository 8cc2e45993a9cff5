//! Engine configuration and reward setup files
//!
//! A setup file carries the engine tuning plus the catalog tables. JSON and
//! YAML are both accepted:
//!
//! ```yaml
//! engine:
//!   tick_interval_ms: 100
//!   spin_duration_ms: 4000
//! rewards:
//!   - id: tech
//!     payload: { type: wheel_prize, category: Tech }
//!     weight: 2.0
//! offers: []
//! ```
//!
//! A setup with no rewards and no offers uses the built-in catalog.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{AdOffer, RewardCatalog, RewardCatalogEntry};
use crate::engine::RewardSessionEngine;
use crate::error::CatalogError;

/// Setup loading failure
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Invalid engine config: {0}")]
    Invalid(String),

    #[error("Unsupported setup format: {0}")]
    UnsupportedFormat(String),
}

/// Engine tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Progress cadence for every session (ms)
    pub tick_interval_ms: u64,
    /// Fixed wheel animation length (ms)
    pub spin_duration_ms: u64,
    /// Whole turns every spin makes at least
    pub min_full_turns: u32,
    /// Upper bound of the random extra turns
    pub max_extra_turns: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            spin_duration_ms: 4000,
            min_full_turns: 5,
            max_extra_turns: 3,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".into()));
        }
        if self.spin_duration_ms == 0 {
            return Err(ConfigError::Invalid("spin_duration_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Everything needed to build an engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewardSetup {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub rewards: Vec<RewardCatalogEntry>,
    #[serde(default)]
    pub offers: Vec<AdOffer>,
}

impl RewardSetup {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Load a setup file, choosing the format by extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let setup = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text)?,
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text)?,
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ));
            }
        };
        log::info!(
            "Loaded reward setup from {} ({} rewards, {} offers)",
            path.display(),
            setup.rewards.len(),
            setup.offers.len()
        );
        Ok(setup)
    }

    /// Validated catalog
    pub fn catalog(&self) -> Result<RewardCatalog, ConfigError> {
        if self.rewards.is_empty() && self.offers.is_empty() {
            return Ok(RewardCatalog::standard());
        }
        Ok(RewardCatalog::new(self.rewards.clone(), self.offers.clone())?)
    }

    /// Validate everything and build an engine on the wall clock
    pub fn build_engine(&self) -> Result<RewardSessionEngine, ConfigError> {
        RewardSessionEngine::new(self.catalog()?, self.engine.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Eligibility, RewardPayload};

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_interval_ms, 100);
        assert_eq!(config.spin_duration_ms, 4000);
        assert_eq!(config.min_full_turns, 5);
        assert_eq!(config.max_extra_turns, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_setup_uses_standard_catalog() {
        let setup = RewardSetup::from_json_str("{}").unwrap();
        assert_eq!(setup.engine, EngineConfig::default());
        assert_eq!(setup.catalog().unwrap().segment_count(), 8);
    }

    #[test]
    fn test_partial_engine_section() {
        let setup = RewardSetup::from_json_str(r#"{"engine": {"spin_duration_ms": 2500}}"#).unwrap();
        assert_eq!(setup.engine.spin_duration_ms, 2500);
        assert_eq!(setup.engine.tick_interval_ms, 100);
    }

    #[test]
    fn test_yaml_setup() {
        let yaml = r#"
engine:
  tick_interval_ms: 50
rewards:
  - id: tech
    payload: { type: wheel_prize, category: Tech, icon: "💻" }
    weight: 3.0
  - id: travel
    payload: { type: wheel_prize, category: Travel }
    eligibility: { rule: min_level, value: 4 }
  - id: spins
    payload: { type: extra_spins, amount: 2 }
offers:
  - id: short-ad
    title: Short Ad
    duration_ms: 5000
    reward_id: spins
"#;
        let setup = RewardSetup::from_yaml_str(yaml).unwrap();
        assert_eq!(setup.engine.tick_interval_ms, 50);
        assert_eq!(setup.rewards[1].eligibility, Eligibility::MinLevel(4));
        assert_eq!(setup.rewards[1].weight, 1.0);
        assert_eq!(setup.rewards[2].payload, RewardPayload::ExtraSpins { amount: 2 });

        let catalog = setup.catalog().unwrap();
        assert_eq!(catalog.segment_count(), 2);
        assert_eq!(catalog.offer("short-ad").unwrap().duration_ms, 5000);
    }

    #[test]
    fn test_invalid_catalog_is_rejected() {
        let json = r#"{
            "rewards": [{"id": "spins", "payload": {"type": "extra_spins", "amount": 1}}],
            "offers": []
        }"#;
        let setup = RewardSetup::from_json_str(json).unwrap();
        assert!(matches!(
            setup.catalog(),
            Err(ConfigError::Catalog(CatalogError::NoWheelPrizes))
        ));
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let setup = RewardSetup::from_json_str(r#"{"engine": {"tick_interval_ms": 0}}"#).unwrap();
        assert!(matches!(setup.build_engine(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            RewardSetup::from_json_str("{ nope"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_load_by_extension() {
        let dir = std::env::temp_dir().join(format!("se-reward-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let json_path = dir.join("setup.json");
        fs::write(&json_path, r#"{"engine": {"min_full_turns": 7}}"#).unwrap();
        assert_eq!(RewardSetup::load(&json_path).unwrap().engine.min_full_turns, 7);

        let yaml_path = dir.join("setup.yml");
        fs::write(&yaml_path, "engine:\n  max_extra_turns: 0\n").unwrap();
        assert_eq!(RewardSetup::load(&yaml_path).unwrap().engine.max_extra_turns, 0);

        let toml_path = dir.join("setup.toml");
        fs::write(&toml_path, "").unwrap();
        assert!(matches!(
            RewardSetup::load(&toml_path),
            Err(ConfigError::UnsupportedFormat(_))
        ));

        assert!(matches!(
            RewardSetup::load(dir.join("missing.json")),
            Err(ConfigError::Io(_))
        ));
        let _ = fs::remove_dir_all(&dir);
    }
}
