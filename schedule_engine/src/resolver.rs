use crate::directory::{normalize_key, PlantDirectory};
use crate::error::ConfigurationError;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Optional unit-number requirement on the text following a rule's needle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitMarker {
    Digit,
    DigitOrRoman,
    Exact(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleTarget {
    Fixed { code: String },
    /// `prefix` followed by the unit number found after the needle.
    UnitSuffixed { prefix: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRule {
    pub needle: String,
    #[serde(default)]
    pub unit: Option<UnitMarker>,
    pub target: RuleTarget,
}

impl FallbackRule {
    pub fn fixed(needle: &str, code: &str) -> Self {
        Self {
            needle: needle.to_string(),
            unit: None,
            target: RuleTarget::Fixed {
                code: code.to_string(),
            },
        }
    }

    pub fn with_unit(mut self, unit: UnitMarker) -> Self {
        self.unit = Some(unit);
        self
    }
}

/// Ordered substring rules tried when a seller has no exact registry match.
///
/// Order is significant: the first matching rule wins even when a later
/// rule would also match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub version: String,
    pub rules: Vec<FallbackRule>,
}

impl RuleSet {
    pub fn builtin(name: &str) -> Result<Self, ConfigurationError> {
        match name {
            "legacy" => Ok(Self::legacy()),
            "extended" => Ok(Self::extended()),
            other => Err(ConfigurationError::UnknownRuleSet(other.to_string())),
        }
    }

    /// Aggregator rules only, as first deployed.
    pub fn legacy() -> Self {
        Self {
            version: "legacy".to_string(),
            rules: vec![
                FallbackRule::fixed("ALFANR", "ALFANR_II"),
                FallbackRule::fixed("SECI", "SECI_BYPL"),
            ],
        }
    }

    pub fn extended() -> Self {
        Self {
            version: "extended".to_string(),
            rules: vec![
                // Pumped-storage units all feed the split account.
                FallbackRule::fixed("TEHRIPSP", "TEHRIPSP").with_unit(UnitMarker::DigitOrRoman),
                FallbackRule {
                    needle: "TEHRI".to_string(),
                    unit: Some(UnitMarker::Digit),
                    target: RuleTarget::UnitSuffixed {
                        prefix: "TEHRI_".to_string(),
                    },
                },
                FallbackRule::fixed("ALFANR", "ALFANR_II"),
                FallbackRule::fixed("SECI", "SECI_BYPL"),
                FallbackRule::fixed("NVVN", "NVVN_SOLAR"),
                FallbackRule::fixed("DADRI", "DADRI_STG2").with_unit(UnitMarker::Exact(5)),
                FallbackRule::fixed("KOTESHWAR", "KOTESHWAR"),
                FallbackRule::fixed("TANAKPUR", "TANAKPUR"),
            ],
        }
    }
}

struct CompiledRule {
    needle: String,
    unit: Option<UnitMarker>,
    target: RuleTarget,
}

/// Maps raw seller identifiers to canonical plant codes.
pub struct IdentityResolver {
    version: String,
    rules: Vec<CompiledRule>,
    digits: Regex,
    roman: Regex,
}

impl IdentityResolver {
    pub fn new(rule_set: &RuleSet) -> Result<Self, ConfigurationError> {
        let invalid = |index, message: &str| ConfigurationError::InvalidRule {
            version: rule_set.version.clone(),
            index,
            message: message.to_string(),
        };

        let mut rules = Vec::with_capacity(rule_set.rules.len());
        for (index, rule) in rule_set.rules.iter().enumerate() {
            let needle = normalize_key(&rule.needle);
            if needle.is_empty() {
                return Err(invalid(index, "needle is empty"));
            }
            let code_empty = match &rule.target {
                RuleTarget::Fixed { code } => code.trim().is_empty(),
                RuleTarget::UnitSuffixed { prefix } => prefix.trim().is_empty(),
            };
            if code_empty {
                return Err(invalid(index, "target code is empty"));
            }
            rules.push(CompiledRule {
                needle,
                unit: rule.unit,
                target: rule.target.clone(),
            });
        }

        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| invalid(usize::MAX, &e.to_string()))
        };
        Ok(Self {
            version: rule_set.version.clone(),
            rules,
            digits: compile(r"[0-9]+")?,
            roman: compile(r"(?:UNIT|STAGE|STG|U)?(VIII|VII|VI|IV|V|III|II|I)$")?,
        })
    }

    pub fn rule_set_version(&self) -> &str {
        &self.version
    }

    /// Exact registry match first, then the ordered fallback rules.
    pub fn resolve(&self, raw_seller: &str, directory: &PlantDirectory) -> Option<String> {
        let key = normalize_key(raw_seller);
        if key.is_empty() {
            return None;
        }
        if let Some(code) = directory.code_for(&key) {
            return Some(code.to_string());
        }
        self.rules.iter().find_map(|rule| self.apply(rule, &key))
    }

    fn apply(&self, rule: &CompiledRule, key: &str) -> Option<String> {
        let at = key.find(&rule.needle)?;
        let rest = &key[at + rule.needle.len()..];

        let unit = match rule.unit {
            None => None,
            Some(marker) => Some(self.unit_number(rest, marker)?),
        };

        match &rule.target {
            RuleTarget::Fixed { code } => Some(code.clone()),
            RuleTarget::UnitSuffixed { prefix } => {
                let unit = match unit {
                    Some(n) => n,
                    None => self.unit_number(rest, UnitMarker::DigitOrRoman)?,
                };
                Some(format!("{}{}", prefix, unit))
            }
        }
    }

    fn unit_number(&self, rest: &str, marker: UnitMarker) -> Option<u32> {
        let digit = || {
            self.digits
                .find(rest)
                .and_then(|m| m.as_str().parse::<u32>().ok())
        };
        let roman = || {
            self.roman
                .captures(rest)
                .and_then(|c| c.get(1))
                .and_then(|m| roman_value(m.as_str()))
        };
        match marker {
            UnitMarker::Digit => digit(),
            UnitMarker::DigitOrRoman => digit().or_else(roman),
            UnitMarker::Exact(n) => {
                (rest.contains(&n.to_string()) || roman() == Some(n)).then_some(n)
            }
        }
    }
}

fn roman_value(numeral: &str) -> Option<u32> {
    let value = match numeral {
        "I" => 1,
        "II" => 2,
        "III" => 3,
        "IV" => 4,
        "V" => 5,
        "VI" => 6,
        "VII" => 7,
        "VIII" => 8,
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::PlantDirectoryEntry;

    fn directory() -> PlantDirectory {
        PlantDirectory::from_entries(
            vec![PlantDirectoryEntry {
                raw_key: "Singrauli STPS".to_string(),
                plant_code: "SINGRAULI".to_string(),
                entitlement_pct: 10.0,
            }],
            vec!["SINGRAULI".to_string()],
        )
    }

    fn resolve(rules: RuleSet, raw: &str) -> Option<String> {
        IdentityResolver::new(&rules).unwrap().resolve(raw, &directory())
    }

    #[test]
    fn test_exact_match_after_normalization() {
        assert_eq!(resolve(RuleSet::extended(), "singrauli_stps"), Some("SINGRAULI".into()));
        assert_eq!(resolve(RuleSet::legacy(), " SINGRAULI-STPS "), Some("SINGRAULI".into()));
    }

    #[test]
    fn test_unmatched_is_none() {
        assert_eq!(resolve(RuleSet::extended(), "UNKNOWN_PLANT"), None);
        assert_eq!(resolve(RuleSet::extended(), "   "), None);
    }

    #[test]
    fn test_pumped_storage_units() {
        let rules = RuleSet::extended();
        assert_eq!(resolve(rules.clone(), "TEHRI PSP-3"), Some("TEHRIPSP".into()));
        assert_eq!(resolve(rules.clone(), "TEHRI_PSP_UNIT_III"), Some("TEHRIPSP".into()));
        // No unit marker: the unit-specific rule does not apply and nothing else does.
        assert_eq!(resolve(rules, "TEHRIPSP"), None);
    }

    #[test]
    fn test_hydro_stage_split_by_digit() {
        assert_eq!(resolve(RuleSet::extended(), "TEHRI HPP 2"), Some("TEHRI_2".into()));
        assert_eq!(resolve(RuleSet::extended(), "TEHRI HPP"), None);
    }

    #[test]
    fn test_aggregators() {
        assert_eq!(resolve(RuleSet::extended(), "SECI_WIND_T3"), Some("SECI_BYPL".into()));
        assert_eq!(resolve(RuleSet::extended(), "ALFANAR-II"), None);
        assert_eq!(resolve(RuleSet::extended(), "ALFANR_RE"), Some("ALFANR_II".into()));
        assert_eq!(resolve(RuleSet::extended(), "NVVN-SOLAR-BUNDLE"), Some("NVVN_SOLAR".into()));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // Also contains KOTESHWAR, but the aggregator rule comes first.
        assert_eq!(
            resolve(RuleSet::extended(), "SECI_KOTESHWAR_SOLAR"),
            Some("SECI_BYPL".into())
        );
        // ALFANR precedes SECI.
        assert_eq!(resolve(RuleSet::legacy(), "SECI-ALFANR"), Some("ALFANR_II".into()));
        // The pumped-storage rule shadows the generic TEHRI digit rule.
        assert_eq!(resolve(RuleSet::extended(), "TEHRIPSP4"), Some("TEHRIPSP".into()));
    }

    #[test]
    fn test_thermal_unit_specific_digit() {
        assert_eq!(resolve(RuleSet::extended(), "DADRI TPS U5"), Some("DADRI_STG2".into()));
        assert_eq!(resolve(RuleSet::extended(), "DADRI_TPS_UNIT_V"), Some("DADRI_STG2".into()));
        assert_eq!(resolve(RuleSet::extended(), "DADRI TPS U2"), None);
    }

    #[test]
    fn test_named_plants() {
        assert_eq!(resolve(RuleSet::extended(), "Koteshwar HEP"), Some("KOTESHWAR".into()));
        assert_eq!(resolve(RuleSet::extended(), "TANAKPUR-HEP"), Some("TANAKPUR".into()));
    }

    #[test]
    fn test_rule_sets_diverge() {
        assert_eq!(resolve(RuleSet::legacy(), "TEHRI PSP-3"), None);
        assert_eq!(resolve(RuleSet::extended(), "TEHRI PSP-3"), Some("TEHRIPSP".into()));
    }

    #[test]
    fn test_custom_rule_set_from_json() {
        let rules: RuleSet = serde_json::from_str(
            r#"{
                "version": "site-2024",
                "rules": [
                    {"needle": "chamera", "unit": "digit", "target": {"kind": "unit_suffixed", "prefix": "CHAMERA"}},
                    {"needle": "uri", "unit": {"exact": 2}, "target": {"kind": "fixed", "code": "URI_II"}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(resolve(rules.clone(), "CHAMERA-3 HEP"), Some("CHAMERA3".into()));
        assert_eq!(resolve(rules.clone(), "URI 2 HEP"), Some("URI_II".into()));
        assert_eq!(resolve(rules, "URI 1 HEP"), None);
    }

    #[test]
    fn test_empty_needle_rejected() {
        let rules = RuleSet {
            version: "broken".to_string(),
            rules: vec![FallbackRule::fixed(" _ ", "X")],
        };
        assert!(matches!(
            IdentityResolver::new(&rules),
            Err(ConfigurationError::InvalidRule { index: 0, .. })
        ));
    }
}
