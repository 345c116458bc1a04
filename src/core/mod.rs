pub mod config;
pub mod error;

pub use config::{Bounds, SimulationConfig};
pub use error::{Result, SimError};
