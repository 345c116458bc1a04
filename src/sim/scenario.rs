//! Starting states: the named court scenarios and caller-supplied TOML states

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::core::config::Bounds;
use crate::core::error::Result;
use crate::sim::catalog::{BUREAUCRATS, CLANS, MERCHANTS, ROYAL, WARLORDS};
use crate::sim::state::{FactionMetric, SimulationState};

/// Named starting conditions for the Joseon court
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    /// A settled court with a healthy granary
    Baseline,
    /// Failed harvest; food and public support start low
    Famine,
    /// Empty coffers and a weakened throne
    Deficit,
    /// Frontier generals overshadow the crown
    Warlord,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Baseline,
        Scenario::Famine,
        Scenario::Deficit,
        Scenario::Warlord,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::Baseline => "baseline",
            Scenario::Famine => "famine",
            Scenario::Deficit => "deficit",
            Scenario::Warlord => "warlord",
        }
    }

    /// The scenario's turn-0 state. Always valid under default bounds.
    pub fn initial_state(self) -> SimulationState {
        let mut state = baseline_state();
        match self {
            Scenario::Baseline => {}
            Scenario::Famine => {
                state.food = 32.0;
                state.public_support = 48.0;
            }
            Scenario::Deficit => {
                state.treasury = 8.0;
                state.legitimacy = 50.0;
            }
            Scenario::Warlord => {
                set_power(&mut state, WARLORDS, 68.0);
                set_power(&mut state, ROYAL, 44.0);
                state.stability = 52.0;
            }
        }
        state
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "unknown scenario '{}' (expected one of: baseline, famine, deficit, warlord)",
                    s
                )
            })
    }
}

fn baseline_state() -> SimulationState {
    let factions = [
        (ROYAL, 58.0),
        (BUREAUCRATS, 52.0),
        (WARLORDS, 41.0),
        (MERCHANTS, 48.0),
        (CLANS, 46.0),
    ]
    .into_iter()
    .map(|(id, power)| FactionMetric::new(id, power, 50.0))
    .collect();

    SimulationState {
        turn: 0,
        factions,
        treasury: 55.0,
        unrest: 24.0,
        stability: 62.0,
        legitimacy: 58.0,
        food: 60.0,
        public_support: 57.0,
        history_flags: BTreeSet::new(),
    }
}

fn set_power(state: &mut SimulationState, id: &str, power: f64) {
    if let Some(faction) = state.faction_mut(id) {
        faction.power = power;
    }
}

/// Parse a custom starting state from TOML and validate it
pub fn state_from_toml_str(content: &str, bounds: &Bounds) -> Result<SimulationState> {
    let state: SimulationState = toml::from_str(content)?;
    state.validate(bounds)?;
    Ok(state)
}

/// Load a custom starting state file
pub fn load_state(path: &Path, bounds: &Bounds) -> Result<SimulationState> {
    let content = fs::read_to_string(path)?;
    tracing::debug!("Loaded starting state from {:?}", path);
    state_from_toml_str(&content, bounds)
}
