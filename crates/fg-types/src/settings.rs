//! Configuration surface consumed by the optimization controller.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::{FgResult, SettingsError};
use crate::result::Direction;

/// Settings for one optimization batch (one or more runs).
///
/// Limits are `None` when disabled. Durations are stored in the settings
/// document as seconds (`max_duration`) or milliseconds (intervals).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationSettings {
    pub direction: Direction,

    /// Maximum number of successful evaluations per run.
    pub max_iterations: Option<u64>,

    /// Maximum number of consecutive evaluations without improvement.
    pub max_iterations_no_progress: Option<u64>,

    #[serde(with = "secs_opt")]
    pub max_duration: Option<Duration>,

    /// Number of repeated runs in a batch.
    pub runs: usize,

    /// Append `_<run>` to the log name of every run.
    pub vary_log_name: bool,

    pub preset_index: usize,

    /// Solver-specific text, opaque to the controller.
    pub expert_settings: String,

    pub log_enabled: bool,
    pub log_name: String,

    /// Minimum wall-clock time between two progress publications.
    #[serde(with = "millis")]
    pub update_interval: Duration,

    /// Pause between runs so the host can release per-run resources.
    #[serde(with = "millis")]
    pub pause_between_runs: Duration,
}

impl Default for OptimizationSettings {
    fn default() -> Self {
        Self {
            direction: Direction::Minimize,
            max_iterations: None,
            max_iterations_no_progress: None,
            max_duration: None,
            runs: 1,
            vary_log_name: false,
            preset_index: 0,
            expert_settings: String::new(),
            log_enabled: false,
            log_name: "frog_log".to_string(),
            update_interval: Duration::from_millis(100),
            pause_between_runs: Duration::from_millis(1000),
        }
    }
}

impl OptimizationSettings {
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn maximize(self) -> Self {
        self.with_direction(Direction::Maximize)
    }

    pub fn with_max_iterations(mut self, n: u64) -> Self {
        self.max_iterations = Some(n);
        self
    }

    pub fn with_max_iterations_no_progress(mut self, n: u64) -> Self {
        self.max_iterations_no_progress = Some(n);
        self
    }

    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    pub fn with_runs(mut self, runs: usize) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_vary_log_name(mut self, vary: bool) -> Self {
        self.vary_log_name = vary;
        self
    }

    pub fn with_preset_index(mut self, index: usize) -> Self {
        self.preset_index = index;
        self
    }

    pub fn with_expert_settings(mut self, text: impl Into<String>) -> Self {
        self.expert_settings = text.into();
        self
    }

    pub fn with_log(mut self, name: impl Into<String>) -> Self {
        self.log_enabled = true;
        self.log_name = name.into();
        self
    }

    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    pub fn with_pause_between_runs(mut self, pause: Duration) -> Self {
        self.pause_between_runs = pause;
        self
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.runs == 0 {
            return Err(SettingsError::NoRuns);
        }
        let zero = |name: &str| SettingsError::ZeroLimit {
            name: name.to_string(),
        };
        if self.max_iterations == Some(0) {
            return Err(zero("max_iterations"));
        }
        if self.max_iterations_no_progress == Some(0) {
            return Err(zero("max_iterations_no_progress"));
        }
        if self.max_duration == Some(Duration::ZERO) {
            return Err(zero("max_duration"));
        }
        Ok(())
    }

    /// Parse and validate a JSON settings document. Missing keys take defaults.
    pub fn from_json_str(json: &str) -> FgResult<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> FgResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| crate::config_error!("cannot read settings {}: {}", path.display(), e))?;
        Self::from_json_str(&text)
    }
}

mod secs_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(d)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
