use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    /// Invalid starting state, catalog or engine configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An invariant broke during a turn, or the run is not in a phase that can advance.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl SimError {
    pub fn config(msg: impl Into<String>) -> Self {
        SimError::Configuration(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        SimError::InvalidState(msg.into())
    }

    /// True for errors that end a run (no retry is meaningful).
    pub fn is_fatal(&self) -> bool {
        matches!(self, SimError::InvalidState(_))
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
