//! Engine configuration with documented constants
//!
//! Every number the turn engine uses outside of the event catalog lives here.
//! The defaults reproduce the reference trace; a TOML file can override any
//! subset of them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::error::{Result, SimError};

/// Lower bound of every percentage-style metric (unrest, power, approval, ...)
pub const METRIC_MIN: f64 = 0.0;

/// Upper bound of every percentage-style metric
pub const METRIC_MAX: f64 = 100.0;

/// Value domains that are configurable per run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bounds {
    /// Treasury may run into debt down to this floor
    pub treasury_floor: f64,
    /// Treasury never accumulates past this ceiling
    pub treasury_ceiling: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            treasury_floor: -1_000.0,
            treasury_ceiling: 10_000.0,
        }
    }
}

/// Per-turn baseline rule constants
///
/// The baseline step is pure arithmetic over the state at the start of the
/// turn. The divisors shape how strongly each pressure feeds into its metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Divisor turning bureaucrat plus merchant power into treasury income
    pub income_divisor: f64,
    /// Food level below which shortages start to bite
    pub food_target: f64,

    /// Divisor turning faction power spread into treasury loss
    pub spread_treasury_divisor: f64,
    /// Divisor turning food shortage into treasury loss
    pub shortage_treasury_divisor: f64,

    /// Divisor turning legitimacy above/below 50 into public support
    pub legitimacy_support_divisor: f64,
    pub spread_support_divisor: f64,
    pub shortage_support_divisor: f64,

    /// Divisor turning public support above/below 50 into stability
    pub support_stability_divisor: f64,
    pub spread_stability_divisor: f64,
    pub shortage_stability_divisor: f64,

    /// Public support below this floor raises unrest
    pub unrest_support_floor: f64,
    pub unrest_support_divisor: f64,
    /// Warlord power above this ceiling raises unrest; outside a full court
    /// the strongest faction stands in for the warlords
    pub unrest_power_ceiling: f64,
    pub unrest_power_divisor: f64,
    /// Food below this floor raises unrest
    pub unrest_food_floor: f64,
    pub unrest_food_divisor: f64,
    /// Stability above this level calms unrest
    pub unrest_stability_ceiling: f64,
    pub unrest_stability_divisor: f64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            income_divisor: 50.0,
            food_target: 50.0,

            spread_treasury_divisor: 60.0,
            shortage_treasury_divisor: 25.0,

            legitimacy_support_divisor: 18.0,
            spread_support_divisor: 55.0,
            shortage_support_divisor: 22.0,

            support_stability_divisor: 20.0,
            spread_stability_divisor: 65.0,
            shortage_stability_divisor: 30.0,

            unrest_support_floor: 45.0,
            unrest_support_divisor: 20.0,
            unrest_power_ceiling: 55.0,
            unrest_power_divisor: 18.0,
            unrest_food_floor: 45.0,
            unrest_food_divisor: 16.0,
            unrest_stability_ceiling: 60.0,
            unrest_stability_divisor: 22.0,
        }
    }
}

/// Drift for realms that lack the court factions the baseline rules read.
///
/// Court realms never use these values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Flat treasury income per turn, in place of faction income
    pub treasury_drift: f64,
    /// Unrest removed every turn
    pub unrest_decay: f64,
    /// Food eaten every turn
    pub food_consumption: f64,
    /// Divisor turning stability above/below 50 into faction approval
    pub stability_approval_divisor: f64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            treasury_drift: 2.0,
            unrest_decay: 0.5,
            food_consumption: 0.25,
            stability_approval_divisor: 40.0,
        }
    }
}

impl BaselineConfig {
    fn divisors(&self) -> [(&'static str, f64); 13] {
        [
            ("income_divisor", self.income_divisor),
            ("spread_treasury_divisor", self.spread_treasury_divisor),
            ("shortage_treasury_divisor", self.shortage_treasury_divisor),
            ("legitimacy_support_divisor", self.legitimacy_support_divisor),
            ("spread_support_divisor", self.spread_support_divisor),
            ("shortage_support_divisor", self.shortage_support_divisor),
            ("support_stability_divisor", self.support_stability_divisor),
            ("spread_stability_divisor", self.spread_stability_divisor),
            ("shortage_stability_divisor", self.shortage_stability_divisor),
            ("unrest_support_divisor", self.unrest_support_divisor),
            ("unrest_power_divisor", self.unrest_power_divisor),
            ("unrest_food_divisor", self.unrest_food_divisor),
            ("unrest_stability_divisor", self.unrest_stability_divisor),
        ]
    }
}

/// Thresholds for the bankruptcy and riot flags on each turn record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionConfig {
    /// Treasury at or below this line counts as bankrupt
    pub bankruptcy_line: f64,
    /// A riot needs public support at or below this...
    pub riot_support_max: f64,
    /// ...stability at or below this...
    pub riot_stability_max: f64,
    /// ...and unrest at or above this
    pub riot_unrest_min: f64,
}

impl Default for ConditionConfig {
    fn default() -> Self {
        Self {
            bankruptcy_line: 0.0,
            riot_support_max: 30.0,
            riot_stability_max: 40.0,
            riot_unrest_min: 60.0,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub bounds: Bounds,
    pub baseline: BaselineConfig,
    pub fallback: FallbackConfig,
    pub conditions: ConditionConfig,
}

impl SimulationConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML; missing keys fall back to defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        tracing::debug!("Loaded engine config from {:?}", path);
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let b = &self.bounds;
        if !b.treasury_floor.is_finite() || !b.treasury_ceiling.is_finite() {
            return Err(SimError::config("treasury bounds must be finite"));
        }
        if b.treasury_floor >= b.treasury_ceiling {
            return Err(SimError::config(format!(
                "treasury_floor ({}) must be < treasury_ceiling ({})",
                b.treasury_floor, b.treasury_ceiling
            )));
        }

        let divisors = self.baseline.divisors().into_iter().chain([(
            "stability_approval_divisor",
            self.fallback.stability_approval_divisor,
        )]);
        for (name, divisor) in divisors {
            if !divisor.is_finite() || divisor <= 0.0 {
                return Err(SimError::config(format!(
                    "{} must be positive, got {}",
                    name, divisor
                )));
            }
        }

        let rates = [
            ("treasury_drift", self.fallback.treasury_drift),
            ("unrest_decay", self.fallback.unrest_decay),
            ("food_consumption", self.fallback.food_consumption),
            ("food_target", self.baseline.food_target),
        ];
        if let Some((name, _)) = rates.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SimError::config(format!("{} must be finite", name)));
        }

        let c = &self.conditions;
        let in_metric_range = |v: f64| (METRIC_MIN..=METRIC_MAX).contains(&v);
        if !c.bankruptcy_line.is_finite()
            || !in_metric_range(c.riot_support_max)
            || !in_metric_range(c.riot_stability_max)
            || !in_metric_range(c.riot_unrest_min)
        {
            return Err(SimError::config(
                "condition thresholds must be finite and riot thresholds within [0, 100]",
            ));
        }

        Ok(())
    }
}
