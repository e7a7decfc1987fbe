use crate::error::ConfigurationError;
use crate::resolver::RuleSet;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a source array shorter than 96 values fills the remaining slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortSeriesFill {
    #[default]
    Zero,
    CarryForward,
}

/// Pumped-storage plant whose output is split into generation and pumping accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpedStorageConfig {
    pub code: String,
    pub pumping_code: String,
}

impl Default for PumpedStorageConfig {
    fn default() -> Self {
        Self {
            code: "TEHRIPSP".to_string(),
            pumping_code: "TEHRIPSP_P".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Buyer identity of the distribution entity itself (full share).
    pub entity: String,
    /// Buyer identity of the central authority that apportions by entitlement.
    pub apportioning_authority: String,
    /// Counter-parties whose records are never aggregated.
    pub excluded_counterparties: Vec<String>,
    pub pumped_storage: PumpedStorageConfig,
    /// Decimal places each slot contribution is rounded to.
    pub precision: u32,
    pub alert_threshold: f64,
    /// Look-ahead window, in blocks, starting at the current block.
    pub alert_window: usize,
    pub short_series_fill: ShortSeriesFill,
    /// Built-in fallback rule set, `legacy` or `extended`.
    pub rule_set: String,
    /// Replaces the built-in rule set when present.
    pub custom_rules: Option<RuleSet>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entity: "BYPL".to_string(),
            apportioning_authority: "DELHI".to_string(),
            excluded_counterparties: ["BRPL", "TPDDL", "NDMC", "MES"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            pumped_storage: PumpedStorageConfig::default(),
            precision: 2,
            alert_threshold: 3.0,
            alert_window: 12,
            short_series_fill: ShortSeriesFill::Zero,
            rule_set: "extended".to_string(),
            custom_rules: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(text).map_err(|e| ConfigurationError::Config(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// The fallback rule set this configuration activates.
    pub fn active_rule_set(&self) -> Result<RuleSet, ConfigurationError> {
        if let Some(custom) = &self.custom_rules {
            return Ok(custom.clone());
        }
        RuleSet::builtin(&self.rule_set)
    }
}
