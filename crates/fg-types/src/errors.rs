use thiserror::Error;

/// Errors from loading optimization settings
#[derive(Error, Debug)]
pub enum FgError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures while discovering variables and objective on the host
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SetupError {
    #[error("Getting variables failed")]
    InputsUnavailable,

    #[error("Getting objective failed")]
    ObjectiveUnavailable,

    #[error("No variables declared for the optimization")]
    NoVariables,

    #[error("Invalid variable {index}: {message}")]
    InvalidVariable { index: usize, message: String },
}

/// Solver start failures. A solver returning one of these never evaluated a candidate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Unknown preset: {preset}")]
    UnknownPreset { preset: String },

    #[error("Missing setting: {key}")]
    MissingSetting { key: String },

    #[error("Invalid setting {key}: {message}")]
    InvalidSetting { key: String, message: String },

    #[error("Malformed expert settings at line {line}: {message}")]
    MalformedExpertSettings { line: usize, message: String },

    #[error("Invalid variables: {message}")]
    InvalidVariables { message: String },

    #[error("Value {value} cannot be represented as a decimal parameter")]
    Conversion { value: f64 },
}

/// Settings validation and loading errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("Number of runs must be at least 1")]
    NoRuns,

    #[error("Limit {name} is enabled but set to zero")]
    ZeroLimit { name: String },
}

/// Result type alias for FrOG operations
pub type FgResult<T> = Result<T, FgError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::FgError::Config(format!($($arg)*))
    };
}
