//! Rules configuration, loadable from TOML.

use serde::{Deserialize, Serialize};

fn default_health_cell() -> String {
    "health".to_string()
}

fn default_hit_check() -> String {
    "d20 + skill.attack + weapon.hit >= 10 + target.armor".to_string()
}

fn default_unarmed_damage() -> String {
    "1d3".to_string()
}

fn default_flee_check() -> String {
    "d20 + skill.agility >= 11".to_string()
}

/// Combat tuning shared by every encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Cell that combat damage is consumed from.
    #[serde(default = "default_health_cell")]
    pub health_cell: String,

    /// Condition deciding whether an attack lands.
    #[serde(default = "default_hit_check")]
    pub hit_check: String,

    /// Damage expression when the attacker wields no weapon.
    #[serde(default = "default_unarmed_damage")]
    pub unarmed_damage: String,

    /// Condition deciding whether a flee attempt succeeds.
    #[serde(default = "default_flee_check")]
    pub flee_check: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            health_cell: default_health_cell(),
            hit_check: default_hit_check(),
            unarmed_damage: default_unarmed_damage(),
            flee_check: default_flee_check(),
        }
    }
}

impl RulesConfig {
    /// Parse from a TOML document; missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RulesConfig::from_toml_str(r#"health_cell = "vigor""#).unwrap();
        assert_eq!(config.health_cell, "vigor");
        assert_eq!(config.unarmed_damage, RulesConfig::default().unarmed_damage);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(RulesConfig::from_toml_str("").unwrap(), RulesConfig::default());
    }

    #[test]
    fn test_bad_toml_fails() {
        assert!(RulesConfig::from_toml_str("health_cell = [").is_err());
    }
}
