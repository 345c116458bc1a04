//! SimulationState - the realm being simulated, plus clamping

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::config::{Bounds, METRIC_MAX, METRIC_MIN};
use crate::core::error::{Result, SimError};

/// Clamp `value` into `[lo, hi]`.
///
/// NaN passes through untouched so the engine's invariant check sees it.
pub fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    if value < lo {
        lo
    } else if value > hi {
        hi
    } else {
        value
    }
}

/// Clamp into the shared `[0, 100]` metric range
pub fn clamp_metric(value: f64) -> f64 {
    clamp(value, METRIC_MIN, METRIC_MAX)
}

fn default_metric() -> f64 {
    50.0
}

/// One court faction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactionMetric {
    pub id: String,
    /// 0..=100
    pub power: f64,
    /// 0..=100
    #[serde(default = "default_metric")]
    pub approval: f64,
}

impl FactionMetric {
    pub fn new(id: impl Into<String>, power: f64, approval: f64) -> Self {
        Self {
            id: id.into(),
            power,
            approval,
        }
    }
}

/// Additive changes to the realm-wide fields
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Deltas {
    pub treasury: f64,
    pub unrest: f64,
    pub stability: f64,
    pub legitimacy: f64,
    pub food: f64,
    pub public_support: f64,
}

/// Full state of one simulation run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    #[serde(default)]
    pub turn: u64,
    /// Stable order; used for tie-breaks and serialization
    pub factions: Vec<FactionMetric>,
    /// Clamped to the run's treasury bounds, may go negative
    pub treasury: f64,
    pub unrest: f64,
    #[serde(default = "default_metric")]
    pub stability: f64,
    #[serde(default = "default_metric")]
    pub legitimacy: f64,
    #[serde(default = "default_metric")]
    pub food: f64,
    #[serde(default = "default_metric")]
    pub public_support: f64,
    /// One-shot conditions that already fired
    #[serde(default)]
    pub history_flags: BTreeSet<String>,
}

impl SimulationState {
    /// Build a state and validate it against `bounds`.
    ///
    /// Realm metrics not named here start at 50.
    pub fn new(
        factions: Vec<FactionMetric>,
        treasury: f64,
        unrest: f64,
        bounds: &Bounds,
    ) -> Result<Self> {
        let state = Self {
            turn: 0,
            factions,
            treasury,
            unrest,
            stability: default_metric(),
            legitimacy: default_metric(),
            food: default_metric(),
            public_support: default_metric(),
            history_flags: BTreeSet::new(),
        };
        state.validate(bounds)?;
        Ok(state)
    }

    /// Reject states that cannot start a run
    pub fn validate(&self, bounds: &Bounds) -> Result<()> {
        if self.factions.is_empty() {
            return Err(SimError::config("state must contain at least one faction"));
        }

        let mut seen = AHashSet::with_capacity(self.factions.len());
        for faction in &self.factions {
            if faction.id.is_empty() {
                return Err(SimError::config("faction id must not be empty"));
            }
            if !seen.insert(faction.id.as_str()) {
                return Err(SimError::config(format!(
                    "duplicate faction id '{}'",
                    faction.id
                )));
            }
        }

        if let Some(problem) = self.domain_violation(bounds) {
            return Err(SimError::config(problem));
        }
        Ok(())
    }

    /// Describe the first field outside its domain, if any
    pub fn domain_violation(&self, bounds: &Bounds) -> Option<String> {
        let check = |name: &str, value: f64, lo: f64, hi: f64| -> Option<String> {
            if !value.is_finite() {
                Some(format!("{} is not finite ({})", name, value))
            } else if value < lo || value > hi {
                Some(format!("{} = {} outside [{}, {}]", name, value, lo, hi))
            } else {
                None
            }
        };

        check(
            "treasury",
            self.treasury,
            bounds.treasury_floor,
            bounds.treasury_ceiling,
        )
        .or_else(|| {
            self.metrics()
                .into_iter()
                .find_map(|(name, value)| check(name, value, METRIC_MIN, METRIC_MAX))
        })
        .or_else(|| {
            self.factions.iter().find_map(|f| {
                check(&format!("{}.power", f.id), f.power, METRIC_MIN, METRIC_MAX).or_else(
                    || check(&format!("{}.approval", f.id), f.approval, METRIC_MIN, METRIC_MAX),
                )
            })
        })
    }

    fn metrics(&self) -> [(&'static str, f64); 5] {
        [
            ("unrest", self.unrest),
            ("stability", self.stability),
            ("legitimacy", self.legitimacy),
            ("food", self.food),
            ("public_support", self.public_support),
        ]
    }

    /// Deep copy detached from the live state
    pub fn snapshot(&self) -> SimulationState {
        self.clone()
    }

    /// Apply realm-wide deltas; each touched field is clamped immediately
    pub fn apply_deltas(&mut self, deltas: &Deltas, bounds: &Bounds) {
        self.treasury = clamp(
            self.treasury + deltas.treasury,
            bounds.treasury_floor,
            bounds.treasury_ceiling,
        );
        self.unrest = clamp_metric(self.unrest + deltas.unrest);
        self.stability = clamp_metric(self.stability + deltas.stability);
        self.legitimacy = clamp_metric(self.legitimacy + deltas.legitimacy);
        self.food = clamp_metric(self.food + deltas.food);
        self.public_support = clamp_metric(self.public_support + deltas.public_support);
    }

    /// Shift one faction's power and approval.
    ///
    /// Returns false (and changes nothing) when no faction has this id.
    pub fn apply_faction_delta(&mut self, id: &str, power: f64, approval: f64) -> bool {
        match self.faction_mut(id) {
            Some(faction) => {
                faction.power = clamp_metric(faction.power + power);
                faction.approval = clamp_metric(faction.approval + approval);
                true
            }
            None => false,
        }
    }

    /// Clamp every numeric field into its domain
    pub fn clamp_all(&mut self, bounds: &Bounds) {
        self.treasury = clamp(self.treasury, bounds.treasury_floor, bounds.treasury_ceiling);
        self.unrest = clamp_metric(self.unrest);
        self.stability = clamp_metric(self.stability);
        self.legitimacy = clamp_metric(self.legitimacy);
        self.food = clamp_metric(self.food);
        self.public_support = clamp_metric(self.public_support);
        for faction in &mut self.factions {
            faction.power = clamp_metric(faction.power);
            faction.approval = clamp_metric(faction.approval);
        }
    }

    pub fn faction(&self, id: &str) -> Option<&FactionMetric> {
        self.factions.iter().find(|f| f.id == id)
    }

    pub fn faction_mut(&mut self, id: &str) -> Option<&mut FactionMetric> {
        self.factions.iter_mut().find(|f| f.id == id)
    }

    /// Power of a faction, `None` if the realm has no such faction
    pub fn power_of(&self, id: &str) -> Option<f64> {
        self.faction(id).map(|f| f.power)
    }

    pub fn faction_ids(&self) -> Vec<&str> {
        self.factions.iter().map(|f| f.id.as_str()).collect()
    }

    pub fn max_power(&self) -> f64 {
        self.factions
            .iter()
            .map(|f| f.power)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min_power(&self) -> f64 {
        self.factions
            .iter()
            .map(|f| f.power)
            .fold(f64::INFINITY, f64::min)
    }

    /// Gap between the strongest and weakest faction
    pub fn power_spread(&self) -> f64 {
        if self.factions.is_empty() {
            return 0.0;
        }
        self.max_power() - self.min_power()
    }

    /// Strongest faction; the earliest one wins ties
    pub fn dominant_faction(&self) -> Option<&FactionMetric> {
        self.factions
            .iter()
            .fold(None, |best: Option<&FactionMetric>, f| match best {
                Some(b) if b.power >= f.power => Some(b),
                _ => Some(f),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_factions() -> Vec<FactionMetric> {
        vec![
            FactionMetric::new("A", 50.0, 50.0),
            FactionMetric::new("B", 50.0, 50.0),
        ]
    }

    #[test]
    fn test_clamp_bounds() {
        assert_eq!(clamp(-5.0, 0.0, 100.0), 0.0);
        assert_eq!(clamp(150.0, 0.0, 100.0), 100.0);
        assert_eq!(clamp(42.5, 0.0, 100.0), 42.5);
        assert!(clamp(f64::NAN, 0.0, 100.0).is_nan());
    }

    #[test]
    fn test_empty_factions_rejected() {
        let err = SimulationState::new(vec![], 100.0, 10.0, &Bounds::default()).unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
    }

    #[test]
    fn test_duplicate_faction_rejected() {
        let factions = vec![
            FactionMetric::new("A", 50.0, 50.0),
            FactionMetric::new("A", 40.0, 50.0),
        ];
        let err = SimulationState::new(factions, 100.0, 10.0, &Bounds::default()).unwrap_err();
        assert!(err.to_string().contains("duplicate faction id 'A'"));
    }

    #[test]
    fn test_out_of_range_start_rejected() {
        let err = SimulationState::new(two_factions(), 100.0, 120.0, &Bounds::default())
            .unwrap_err();
        assert!(err.to_string().contains("unrest"));

        let err = SimulationState::new(two_factions(), f64::NAN, 10.0, &Bounds::default())
            .unwrap_err();
        assert!(err.to_string().contains("treasury"));
    }

    #[test]
    fn test_apply_deltas_clamps_each_field() {
        let bounds = Bounds::default();
        let mut state = SimulationState::new(two_factions(), 0.0, 95.0, &bounds).unwrap();
        state.apply_deltas(
            &Deltas {
                treasury: -5_000.0,
                unrest: 20.0,
                food: -80.0,
                ..Default::default()
            },
            &bounds,
        );
        assert_eq!(state.treasury, bounds.treasury_floor);
        assert_eq!(state.unrest, 100.0);
        assert_eq!(state.food, 0.0);
        assert_eq!(state.stability, 50.0);
    }

    #[test]
    fn test_faction_delta_missing_faction_is_noop() {
        let bounds = Bounds::default();
        let mut state = SimulationState::new(two_factions(), 0.0, 10.0, &bounds).unwrap();
        let before = state.snapshot();
        assert!(!state.apply_faction_delta("warlords", 10.0, 10.0));
        assert_eq!(state, before);
        assert!(state.apply_faction_delta("B", 70.0, -60.0));
        assert_eq!(state.power_of("B"), Some(100.0));
        assert_eq!(state.faction("B").map(|f| f.approval), Some(0.0));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let bounds = Bounds::default();
        let mut state = SimulationState::new(two_factions(), 0.0, 10.0, &bounds).unwrap();
        let snap = state.snapshot();
        state.apply_faction_delta("A", 5.0, 0.0);
        state.history_flags.insert("x".into());
        assert_eq!(snap.power_of("A"), Some(50.0));
        assert!(snap.history_flags.is_empty());
    }

    #[test]
    fn test_dominant_faction_prefers_first_on_tie() {
        let bounds = Bounds::default();
        let state = SimulationState::new(two_factions(), 0.0, 10.0, &bounds).unwrap();
        assert_eq!(state.dominant_faction().map(|f| f.id.as_str()), Some("A"));
        assert_eq!(state.power_spread(), 0.0);
    }

    #[test]
    fn test_missing_metrics_default_when_deserialized() {
        let json = r#"{
            "turn": 0,
            "factions": [{"id": "A", "power": 50, "approval": 50}],
            "treasury": 1000,
            "unrest": 10
        }"#;
        let state: SimulationState = serde_json::from_str(json).unwrap();
        assert_eq!(state.stability, 50.0);
        assert_eq!(state.public_support, 50.0);
        assert!(state.history_flags.is_empty());
    }
}
