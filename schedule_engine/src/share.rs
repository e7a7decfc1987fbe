use crate::config::EngineConfig;
use crate::directory::{normalize_key, PlantDirectory};

/// Buyer-identity rules deciding how much of a schedule line belongs to the entity.
#[derive(Debug, Clone)]
pub struct ShareCalculator {
    entity: String,
    authority: String,
    excluded: Vec<String>,
}

impl ShareCalculator {
    pub fn new(entity: &str, authority: &str, excluded: &[String]) -> Self {
        Self {
            entity: normalize_key(entity),
            authority: normalize_key(authority),
            excluded: excluded
                .iter()
                .map(|e| normalize_key(e))
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            &config.entity,
            &config.apportioning_authority,
            &config.excluded_counterparties,
        )
    }

    /// True when either side of the line is an excluded counter-party.
    pub fn excludes(&self, buyer: &str, seller: &str) -> bool {
        let buyer = normalize_key(buyer);
        let seller = normalize_key(seller);
        self.excluded.iter().any(|e| *e == buyer || *e == seller)
    }

    /// Fraction in `[0, 1]`; zero means the line does not concern the entity.
    pub fn share(&self, buyer: &str, plant_code: &str, directory: &PlantDirectory) -> f64 {
        let buyer = normalize_key(buyer);
        let share = if buyer == self.entity {
            1.0
        } else if buyer == self.authority {
            directory.entitlement_pct(plant_code).unwrap_or(0.0) / 100.0
        } else {
            0.0
        };
        share.clamp(0.0, 1.0)
    }
}
