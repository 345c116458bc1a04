//! Simulation core: state, event catalog, turn engine and run output

pub mod catalog;
pub mod engine;
pub mod events;
pub mod metrics;
pub mod record;
pub mod scenario;
pub mod state;

pub use engine::{
    advance, apply_baseline, create_run, current_state, is_bankrupt, is_court_realm, is_riot, Run,
    RunPhase, BANKRUPT_FLAG, RIOT_FLAG,
};
pub use events::{Catalog, EventDefinition, EventOutcome, Selection, SimRng};
pub use metrics::{sweep, MetricStats, RunSummary, SweepRow, SweepStats};
pub use record::{write_json_lines, TurnLog, TurnRecord};
pub use scenario::{load_state, Scenario};
pub use state::{clamp, Deltas, FactionMetric, SimulationState};
