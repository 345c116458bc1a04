//! The ten court events
//!
//! Each event offers two choices. The effect picks one with a single uniform
//! draw from the run's stream, then applies fixed realm and faction deltas.
//! Faction deltas only touch factions the realm actually has; a realm without
//! warlords simply never sees the frontier lords knocking.

use crate::core::config::Bounds;
use crate::sim::events::{choose, EventDefinition, EventOutcome, SimRng};
use crate::sim::state::{Deltas, SimulationState};

pub const ROYAL: &str = "royal";
pub const BUREAUCRATS: &str = "bureaucrats";
pub const WARLORDS: &str = "warlords";
pub const MERCHANTS: &str = "merchants";
pub const CLANS: &str = "clans";

/// Court factions in their canonical order
pub const COURT_FACTIONS: [&str; 5] = [ROYAL, BUREAUCRATS, WARLORDS, MERCHANTS, CLANS];

const GRANARY_CHOICES: &[&str] = &["audit", "pardon"];
const BORDER_CHOICES: &[&str] = &["reinforce", "delay"];
const REFORM_CHOICES: &[&str] = &["promote", "reject"];
const CHARTER_CHOICES: &[&str] = &["open", "limit"];
const HARVEST_CHOICES: &[&str] = &["release", "tax"];
const GUARD_CHOICES: &[&str] = &["expand", "delay"];
const TAX_CHOICES: &[&str] = &["raise", "ease"];
const PETITION_CHOICES: &[&str] = &["conciliate", "reject"];
const MARKET_CHOICES: &[&str] = &["crackdown", "tolerate"];
const FAMINE_CHOICES: &[&str] = &["mobilize", "delay"];

static STANDARD_EVENTS: [EventDefinition; 10] = [
    EventDefinition {
        id: "granary-crackdown",
        title: "Cracks in the Granary",
        weight: 1.2,
        once_only: true,
        choices: GRANARY_CHOICES,
        eligibility: first_turn,
        effect: granary_crackdown,
    },
    EventDefinition {
        id: "border-lords",
        title: "Walls of the Frontier",
        weight: 1.0,
        once_only: false,
        choices: BORDER_CHOICES,
        eligibility: warlords_strong,
        effect: border_lords,
    },
    EventDefinition {
        id: "bureaucrat-reform",
        title: "Demands for Civil Reform",
        weight: 1.1,
        once_only: true,
        choices: REFORM_CHOICES,
        eligibility: bureaucrats_strong,
        effect: bureaucrat_reform,
    },
    EventDefinition {
        id: "trade-charter",
        title: "The Merchant Charter",
        weight: 1.0,
        once_only: false,
        choices: CHARTER_CHOICES,
        eligibility: merchants_strong,
        effect: trade_charter,
    },
    EventDefinition {
        id: "harvest-appeal",
        title: "Sharing the Harvest",
        weight: 0.9,
        once_only: false,
        choices: HARVEST_CHOICES,
        eligibility: bountiful_harvest,
        effect: harvest_appeal,
    },
    EventDefinition {
        id: "royal-guard",
        title: "Expanding the Royal Guard",
        weight: 1.2,
        once_only: true,
        choices: GUARD_CHOICES,
        eligibility: shaky_legitimacy,
        effect: royal_guard,
    },
    EventDefinition {
        id: "tax-reform",
        title: "Tax Reform",
        weight: 1.1,
        once_only: false,
        choices: TAX_CHOICES,
        eligibility: thin_treasury,
        effect: tax_reform,
    },
    EventDefinition {
        id: "court-petition",
        title: "Petition of the Clans",
        weight: 1.0,
        once_only: false,
        choices: PETITION_CHOICES,
        eligibility: clans_restless,
        effect: court_petition,
    },
    EventDefinition {
        id: "black-market",
        title: "Spread of the Black Market",
        weight: 0.8,
        once_only: false,
        choices: MARKET_CHOICES,
        eligibility: weak_support,
        effect: black_market,
    },
    EventDefinition {
        id: "famine-relief",
        title: "Famine Response",
        weight: 1.3,
        once_only: false,
        choices: FAMINE_CHOICES,
        eligibility: famine,
        effect: famine_relief,
    },
];

pub fn standard_events() -> &'static [EventDefinition] {
    &STANDARD_EVENTS
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

fn power_at_least(state: &SimulationState, faction: &str, threshold: f64) -> bool {
    state.power_of(faction).is_some_and(|p| p >= threshold)
}

/// Eligibility is checked before the turn counter moves, so turn 0 here is
/// the turn recorded as 1
fn first_turn(state: &SimulationState) -> bool {
    state.turn == 0
}

fn warlords_strong(state: &SimulationState) -> bool {
    power_at_least(state, WARLORDS, 50.0)
}

fn bureaucrats_strong(state: &SimulationState) -> bool {
    power_at_least(state, BUREAUCRATS, 55.0)
}

fn merchants_strong(state: &SimulationState) -> bool {
    power_at_least(state, MERCHANTS, 50.0)
}

fn bountiful_harvest(state: &SimulationState) -> bool {
    state.food >= 55.0
}

fn shaky_legitimacy(state: &SimulationState) -> bool {
    state.legitimacy <= 55.0
}

fn thin_treasury(state: &SimulationState) -> bool {
    state.treasury <= 45.0
}

fn clans_restless(state: &SimulationState) -> bool {
    power_at_least(state, CLANS, 52.0) && state.stability < 60.0
}

fn weak_support(state: &SimulationState) -> bool {
    state.public_support < 55.0
}

fn famine(state: &SimulationState) -> bool {
    state.food < 40.0
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// Apply realm deltas, then move each named faction's power and approval together
fn shift(state: &mut SimulationState, bounds: &Bounds, deltas: Deltas, factions: &[(&str, f64)]) {
    state.apply_deltas(&deltas, bounds);
    for &(id, delta) in factions {
        state.apply_faction_delta(id, delta, delta);
    }
}

fn granary_crackdown(state: &mut SimulationState, rng: &mut SimRng, bounds: &Bounds) -> EventOutcome {
    let choice = choose(GRANARY_CHOICES, rng);
    if choice == GRANARY_CHOICES[0] {
        let d = Deltas { treasury: 6.0, stability: 2.0, legitimacy: 1.0, ..Default::default() };
        shift(state, bounds, d, &[(BUREAUCRATS, 4.0), (MERCHANTS, -2.0)]);
    } else {
        let d = Deltas { treasury: -3.0, stability: -2.0, public_support: 2.0, ..Default::default() };
        shift(state, bounds, d, &[(MERCHANTS, 5.0), (BUREAUCRATS, -3.0)]);
    }
    EventOutcome { choice }
}

fn border_lords(state: &mut SimulationState, rng: &mut SimRng, bounds: &Bounds) -> EventOutcome {
    let choice = choose(BORDER_CHOICES, rng);
    if choice == BORDER_CHOICES[0] {
        let d = Deltas { treasury: -4.0, stability: 2.0, food: -2.0, ..Default::default() };
        shift(state, bounds, d, &[(WARLORDS, 3.0), (ROYAL, 2.0)]);
    } else {
        let d = Deltas { stability: -3.0, legitimacy: -2.0, public_support: -1.0, ..Default::default() };
        shift(state, bounds, d, &[(WARLORDS, 4.0), (ROYAL, -3.0)]);
    }
    EventOutcome { choice }
}

fn bureaucrat_reform(state: &mut SimulationState, rng: &mut SimRng, bounds: &Bounds) -> EventOutcome {
    let choice = choose(REFORM_CHOICES, rng);
    if choice == REFORM_CHOICES[0] {
        let d = Deltas { legitimacy: 4.0, public_support: 3.0, ..Default::default() };
        shift(state, bounds, d, &[(BUREAUCRATS, 4.0), (CLANS, -2.0)]);
    } else {
        let d = Deltas { stability: -2.0, legitimacy: -3.0, ..Default::default() };
        shift(state, bounds, d, &[(CLANS, 3.0), (BUREAUCRATS, -2.0)]);
    }
    EventOutcome { choice }
}

fn trade_charter(state: &mut SimulationState, rng: &mut SimRng, bounds: &Bounds) -> EventOutcome {
    let choice = choose(CHARTER_CHOICES, rng);
    if choice == CHARTER_CHOICES[0] {
        let d = Deltas { treasury: 5.0, public_support: 1.0, ..Default::default() };
        shift(state, bounds, d, &[(MERCHANTS, 4.0), (WARLORDS, -1.0)]);
    } else {
        let d = Deltas { treasury: -2.0, stability: 2.0, ..Default::default() };
        shift(state, bounds, d, &[(ROYAL, 2.0), (MERCHANTS, -2.0)]);
    }
    EventOutcome { choice }
}

fn harvest_appeal(state: &mut SimulationState, rng: &mut SimRng, bounds: &Bounds) -> EventOutcome {
    let choice = choose(HARVEST_CHOICES, rng);
    if choice == HARVEST_CHOICES[0] {
        let d = Deltas { food: 8.0, public_support: 3.0, ..Default::default() };
        shift(state, bounds, d, &[(ROYAL, 1.0), (CLANS, -1.0)]);
    } else {
        let d = Deltas { food: -2.0, treasury: 4.0, public_support: -3.0, ..Default::default() };
        shift(state, bounds, d, &[(CLANS, 2.0), (ROYAL, -1.0)]);
    }
    EventOutcome { choice }
}

fn royal_guard(state: &mut SimulationState, rng: &mut SimRng, bounds: &Bounds) -> EventOutcome {
    let choice = choose(GUARD_CHOICES, rng);
    if choice == GUARD_CHOICES[0] {
        let d = Deltas { stability: 3.0, treasury: -4.0, ..Default::default() };
        shift(state, bounds, d, &[(ROYAL, 4.0), (BUREAUCRATS, -1.0)]);
    } else {
        let d = Deltas { stability: -2.0, legitimacy: -1.0, ..Default::default() };
        shift(state, bounds, d, &[(BUREAUCRATS, 2.0), (ROYAL, -2.0)]);
    }
    EventOutcome { choice }
}

fn tax_reform(state: &mut SimulationState, rng: &mut SimRng, bounds: &Bounds) -> EventOutcome {
    let choice = choose(TAX_CHOICES, rng);
    if choice == TAX_CHOICES[0] {
        let d = Deltas { treasury: 6.0, public_support: -4.0, stability: -2.0, ..Default::default() };
        shift(state, bounds, d, &[(BUREAUCRATS, 2.0), (MERCHANTS, -2.0)]);
    } else {
        let d = Deltas { treasury: -3.0, public_support: 3.0, ..Default::default() };
        shift(state, bounds, d, &[(MERCHANTS, 2.0), (BUREAUCRATS, -1.0)]);
    }
    EventOutcome { choice }
}

fn court_petition(state: &mut SimulationState, rng: &mut SimRng, bounds: &Bounds) -> EventOutcome {
    let choice = choose(PETITION_CHOICES, rng);
    if choice == PETITION_CHOICES[0] {
        let d = Deltas { legitimacy: 2.0, stability: 2.0, ..Default::default() };
        shift(state, bounds, d, &[(CLANS, 3.0), (ROYAL, -2.0)]);
    } else {
        let d = Deltas { legitimacy: -2.0, stability: -3.0, ..Default::default() };
        shift(state, bounds, d, &[(ROYAL, 3.0), (CLANS, -3.0)]);
    }
    EventOutcome { choice }
}

fn black_market(state: &mut SimulationState, rng: &mut SimRng, bounds: &Bounds) -> EventOutcome {
    let choice = choose(MARKET_CHOICES, rng);
    if choice == MARKET_CHOICES[0] {
        let d = Deltas { stability: 2.0, public_support: -1.0, ..Default::default() };
        shift(state, bounds, d, &[(BUREAUCRATS, 2.0), (MERCHANTS, -3.0)]);
    } else {
        let d = Deltas { treasury: 3.0, public_support: 1.0, ..Default::default() };
        shift(state, bounds, d, &[(MERCHANTS, 3.0), (BUREAUCRATS, -1.0)]);
    }
    EventOutcome { choice }
}

fn famine_relief(state: &mut SimulationState, rng: &mut SimRng, bounds: &Bounds) -> EventOutcome {
    let choice = choose(FAMINE_CHOICES, rng);
    if choice == FAMINE_CHOICES[0] {
        let d = Deltas { food: 6.0, treasury: -4.0, public_support: 4.0, ..Default::default() };
        shift(state, bounds, d, &[(BUREAUCRATS, 2.0), (ROYAL, 1.0)]);
    } else {
        let d = Deltas { food: -3.0, stability: -4.0, public_support: -4.0, ..Default::default() };
        shift(state, bounds, d, &[(CLANS, 2.0), (ROYAL, -2.0)]);
    }
    EventOutcome { choice }
}
