//! Korean Paradox - deterministic court politics simulation
//!
//! A run owns its state and a seeded ChaCha stream; every call to
//! [`sim::Run::advance`] applies the baseline rules, draws at most one event
//! from the fixed catalog, and hands back an immutable [`sim::TurnRecord`].

pub mod core;
pub mod sim;

pub use crate::core::{Result, SimError, SimulationConfig};
pub use crate::sim::{advance, create_run, current_state, Run, SimulationState, TurnRecord};
