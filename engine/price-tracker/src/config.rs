//! Configuration tree for the pricing engine

use crate::{Currency, PricingError, Result};
use item_registry::ItemDefinition;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Prefix for environment overrides, e.g. `DRIFT__GLOBAL__DEFAULT__GROWTH_RATE`
pub const ENV_PREFIX: &str = "DRIFT";

/// Complete pricing configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Named item definitions (`$name`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub items: BTreeMap<String, ItemDefinition>,

    /// Server-wide tier
    #[serde(default)]
    pub global: TierConfig,

    /// Template for every shop
    #[serde(default)]
    pub shops: TierConfig,

    /// Template for every player
    #[serde(default)]
    pub players: TierConfig,
}

/// Settings of one tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Reset cadence: minutes or a daily `HH:MM`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset: Option<ResetSetting>,

    /// Template for items without their own group (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<TrackerConfig>,

    /// Explicit groups, first match wins
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupConfig>,
}

/// Reset cadence as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResetSetting {
    /// Interval in minutes
    Interval(u32),
    /// Daily time of day, `HH:MM`
    Daily(String),
}

/// An explicitly configured item group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Item specifier or `$name`
    pub item: String,

    #[serde(flatten)]
    pub tracker: TrackerConfig,
}

/// Rates and caps of one tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Multiplier applied per unit bought
    pub growth_rate: f64,

    /// Divisor applied per unit sold
    pub decay_rate: f64,

    /// Half-life of the discrepancy; 0 disables time decay
    #[serde(default)]
    pub half_life_minutes: f64,

    #[serde(default = "default_devaluation")]
    pub dispersion_devaluation: f64,

    /// Units that may be bought per reset period
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_buy_cap: Option<u32>,

    /// Units that may be sold per reset period
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_sell_cap: Option<u32>,

    /// Money that may be paid out for sales per reset period
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub income_cap: BTreeMap<Currency, Decimal>,

    /// Money that may be spent on purchases per reset period
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub spending_cap: BTreeMap<Currency, Decimal>,
}

fn default_devaluation() -> f64 {
    1.0
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            growth_rate: 1.0,
            decay_rate: 1.0,
            half_life_minutes: 0.0,
            dispersion_devaluation: default_devaluation(),
            item_buy_cap: None,
            item_sell_cap: None,
            income_cap: BTreeMap::new(),
            spending_cap: BTreeMap::new(),
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self, group: &str) -> Result<()> {
        let invalid = |message: String| PricingError::configuration(format!("group '{group}': {message}"));

        for (key, rate) in [("growth_rate", self.growth_rate), ("decay_rate", self.decay_rate)] {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(invalid(format!("{key} must be a positive number, got {rate}")));
            }
        }
        if !self.half_life_minutes.is_finite() || self.half_life_minutes < 0.0 {
            return Err(invalid(format!(
                "half_life_minutes must not be negative, got {}",
                self.half_life_minutes
            )));
        }
        if !(0.0..=1.0).contains(&self.dispersion_devaluation) {
            return Err(invalid(format!(
                "dispersion_devaluation must lie in [0, 1], got {}",
                self.dispersion_devaluation
            )));
        }
        for (currency, cap) in self.income_cap.iter().chain(self.spending_cap.iter()) {
            if cap.is_sign_negative() {
                return Err(invalid(format!("cap for {currency} must not be negative, got {cap}")));
            }
        }
        Ok(())
    }
}

impl PricingConfig {
    /// Load from a TOML file layered with `DRIFT__` environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Parse TOML text without environment overrides
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    const SAMPLE: &str = r#"
[items."$biter"]
filter = "exact"
item = { type = "minecraft:iron_sword", data = { name = "Biter" } }

[global]
reset = "04:00"

[global.default]
growth_rate = 1.02
decay_rate = 1.02
half_life_minutes = 60

[[global.groups]]
item = "minecraft:diamond"
growth_rate = 1.1
decay_rate = 1.05
half_life_minutes = 30
item_buy_cap = 64
spending_cap = { coins = 500 }

[shops]
reset = 1440

[shops.default]
growth_rate = 1.01
decay_rate = 1.01
"#;

    #[test]
    fn test_parse_sample() {
        let config = PricingConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.global.reset, Some(ResetSetting::Daily("04:00".into())));
        assert_eq!(config.shops.reset, Some(ResetSetting::Interval(1440)));
        assert!(config.players.default.is_none());
        assert!(config.items.contains_key("$biter"));

        let diamond = &config.global.groups[0];
        assert_eq!(diamond.item, "minecraft:diamond");
        assert_eq!(diamond.tracker.growth_rate, 1.1);
        assert_eq!(diamond.tracker.item_buy_cap, Some(64));
        assert_eq!(diamond.tracker.spending_cap.get(&Currency::new("coins")), Some(&dec!(500)));
        assert_eq!(diamond.tracker.dispersion_devaluation, 1.0);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = PricingConfig::from_file(file.path()).unwrap();
        assert_eq!(config.global.groups.len(), 1);
    }

    #[test]
    fn test_toml_dump_reloads() {
        let config = PricingConfig::from_toml_str(SAMPLE).unwrap();
        let dumped = config.to_toml_string().unwrap();
        let reloaded = PricingConfig::from_toml_str(&dumped).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_validate_rejects_bad_rates() {
        let mut tracker = TrackerConfig::default();
        assert!(tracker.validate("default").is_ok());

        tracker.decay_rate = 0.0;
        assert!(matches!(tracker.validate("default"), Err(PricingError::Configuration { .. })));

        tracker.decay_rate = 1.0;
        tracker.dispersion_devaluation = 1.5;
        assert!(tracker.validate("default").is_err());

        tracker.dispersion_devaluation = 0.5;
        tracker.spending_cap.insert(Currency::new("coins"), dec!(-1));
        assert!(tracker.validate("default").is_err());
    }

    #[test]
    fn test_malformed_file_is_error() {
        assert!(PricingConfig::from_toml_str("[global.default]\ngrowth_rate = \"fast\"").is_err());
    }
}
