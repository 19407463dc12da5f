use fg_types::{SettingsError, SetupError};
use thiserror::Error;

use crate::bridge::BridgeError;

/// Errors that abort an optimization batch or a single run before it produced a result.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Setup failed: {0}")]
    Setup(SetupError),

    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Bridge error: {0}")]
    Bridge(BridgeError),

    #[error("No preset at index {index}")]
    UnknownPresetIndex { index: usize },

    #[error("Solver could not be started ({preset}): {message}")]
    SolverStart { preset: String, message: String },

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Worker thread panicked")]
    WorkerPanicked,
}

impl From<BridgeError> for EngineError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Setup(e) => Self::Setup(e),
            other => Self::Bridge(other),
        }
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
