//! Event definitions, eligibility and weighted selection

use ahash::AHashSet;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::core::config::Bounds;
use crate::core::error::{Result, SimError};
use crate::sim::catalog;
use crate::sim::state::SimulationState;

/// The per-run random stream. Every draw in a turn comes from the same instance.
pub type SimRng = ChaCha8Rng;

/// History flags with this prefix belong to the engine, not to events
pub const CONDITION_FLAG_PREFIX: &str = "condition:";

/// What an event effect did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventOutcome {
    pub choice: &'static str,
}

/// A fixed catalog entry
#[derive(Clone, Copy)]
pub struct EventDefinition {
    pub id: &'static str,
    pub title: &'static str,
    /// Relative selection weight, > 0
    pub weight: f64,
    /// Never selected again once it has fired in a run
    pub once_only: bool,
    pub choices: &'static [&'static str],
    /// Pure predicate over the state
    pub eligibility: fn(&SimulationState) -> bool,
    pub effect: fn(&mut SimulationState, &mut SimRng, &Bounds) -> EventOutcome,
}

impl std::fmt::Debug for EventDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDefinition")
            .field("id", &self.id)
            .field("weight", &self.weight)
            .field("once_only", &self.once_only)
            .field("choices", &self.choices)
            .finish_non_exhaustive()
    }
}

impl EventDefinition {
    pub fn is_eligible(&self, state: &SimulationState) -> bool {
        if self.once_only && state.history_flags.contains(self.id) {
            return false;
        }
        (self.eligibility)(state)
    }
}

/// Result of one selection round
#[derive(Clone, Copy, Debug)]
pub struct Selection<'a> {
    pub event: Option<&'a EventDefinition>,
    /// The uniform draw in `[0, 1)`; `None` when nothing was eligible
    pub draw: Option<f64>,
}

/// The ordered, validated set of events a run draws from
#[derive(Clone, Debug)]
pub struct Catalog {
    events: Vec<EventDefinition>,
}

impl Catalog {
    pub fn new(events: Vec<EventDefinition>) -> Result<Self> {
        let mut seen = AHashSet::with_capacity(events.len());
        for event in &events {
            if event.id.is_empty() {
                return Err(SimError::config("event id must not be empty"));
            }
            if event.id.starts_with(CONDITION_FLAG_PREFIX) {
                return Err(SimError::config(format!(
                    "event id '{}' uses the reserved '{}' prefix",
                    event.id, CONDITION_FLAG_PREFIX
                )));
            }
            if !seen.insert(event.id) {
                return Err(SimError::config(format!("duplicate event id '{}'", event.id)));
            }
            if !event.weight.is_finite() || event.weight <= 0.0 {
                return Err(SimError::config(format!(
                    "event '{}' has non-positive weight {}",
                    event.id, event.weight
                )));
            }
            if event.choices.is_empty() {
                return Err(SimError::config(format!("event '{}' has no choices", event.id)));
            }
        }
        Ok(Self { events })
    }

    /// The ten court events in their fixed order
    pub fn standard() -> Self {
        Self {
            events: catalog::standard_events().to_vec(),
        }
    }

    pub fn events(&self) -> &[EventDefinition] {
        &self.events
    }

    pub fn get(&self, id: &str) -> Option<&EventDefinition> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn eligible(&self, state: &SimulationState) -> Vec<&EventDefinition> {
        eligible(self, state)
    }
}

/// Events whose predicate holds, minus once-only events that already fired.
/// Catalog order is kept.
pub fn eligible<'a>(catalog: &'a Catalog, state: &SimulationState) -> Vec<&'a EventDefinition> {
    catalog
        .events
        .iter()
        .filter(|e| e.is_eligible(state))
        .collect()
}

/// Weighted pick for a given draw in `[0, 1)`.
///
/// Walks the slice in order and returns the first event whose cumulative
/// weight, normalized by the total, exceeds the draw.
pub fn pick_weighted<'a>(eligible: &[&'a EventDefinition], draw: f64) -> Option<&'a EventDefinition> {
    let total: f64 = eligible.iter().map(|e| e.weight).sum();
    if eligible.is_empty() || total <= 0.0 {
        return None;
    }

    let mut cumulative = 0.0;
    for &event in eligible {
        cumulative += event.weight;
        if cumulative / total > draw {
            return Some(event);
        }
    }
    // Rounding can leave the last ratio a hair under the draw
    eligible.last().copied()
}

/// Select at most one event. Consumes exactly one draw when anything is eligible.
pub fn select<'a, R: Rng + ?Sized>(eligible: &[&'a EventDefinition], rng: &mut R) -> Selection<'a> {
    if eligible.is_empty() {
        return Selection {
            event: None,
            draw: None,
        };
    }
    let draw: f64 = rng.gen();
    Selection {
        event: pick_weighted(eligible, draw),
        draw: Some(draw),
    }
}

/// Run an event's effect on the live stream and mark once-only events
pub fn apply_effect(
    state: &mut SimulationState,
    event: &EventDefinition,
    rng: &mut SimRng,
    bounds: &Bounds,
) -> EventOutcome {
    let outcome = (event.effect)(state, rng, bounds);
    if event.once_only {
        state.history_flags.insert(event.id.to_string());
    }
    outcome
}

/// Uniformly pick one of an event's choices
pub fn choose<R: Rng + ?Sized>(choices: &'static [&'static str], rng: &mut R) -> &'static str {
    choices[rng.gen_range(0..choices.len())]
}
