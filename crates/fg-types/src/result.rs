use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::settings::OptimizationSettings;

/// Whether the objective is minimized or maximized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Minimize,
    Maximize,
}

impl Default for Direction {
    fn default() -> Self {
        Self::Minimize
    }
}

impl Direction {
    /// Sentinel meaning "no valid result yet".
    pub fn worst(self) -> f64 {
        match self {
            Self::Minimize => f64::INFINITY,
            Self::Maximize => f64::NEG_INFINITY,
        }
    }

    /// Strict improvement of `candidate` over `incumbent`.
    pub fn is_better(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Minimize => candidate < incumbent,
            Self::Maximize => candidate > incumbent,
        }
    }

    /// Map an objective onto the minimization problem every solver works on.
    pub fn to_minimization(self, value: f64) -> f64 {
        match self {
            Self::Minimize => value,
            Self::Maximize => -value,
        }
    }
}

/// Why a run ended. Assigned once at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultType {
    Unknown,
    UserStopped,
    SolverStopped,
    /// The host reported an invalid objective.
    FrogStopped,
    NoImprovement,
    MaximumEvals,
    MaximumTime,
}

impl Default for ResultType {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Unknown => "Unknown reason",
            Self::UserStopped => "Stopped by user",
            Self::SolverStopped => "Stopped by solver",
            Self::FrogStopped => "Stopped: invalid objective value from host",
            Self::NoImprovement => "No improvement",
            Self::MaximumEvals => "Maximum evaluations reached",
            Self::MaximumTime => "Maximum duration reached",
        };
        f.write_str(text)
    }
}

/// Final outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    value: f64,
    parameters: Vec<Decimal>,
    iterations: u64,
    result_type: ResultType,
}

impl OptimizationResult {
    pub fn new(value: f64, parameters: Vec<Decimal>, iterations: u64, result_type: ResultType) -> Self {
        Self {
            value,
            parameters,
            iterations,
            result_type,
        }
    }

    /// Placeholder used to seed best-of-many comparisons.
    pub fn empty(direction: Direction) -> Self {
        Self::new(direction.worst(), Vec::new(), 0, ResultType::Unknown)
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn parameters(&self) -> &[Decimal] {
        &self.parameters
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn result_type(&self) -> ResultType {
        self.result_type
    }

    /// False for the ±infinity "no valid result" sentinel.
    pub fn has_value(&self) -> bool {
        self.value.is_finite()
    }

    /// Human-readable report of the run, naming the limit that stopped it.
    pub fn summary(&self, settings: &OptimizationSettings) -> String {
        let reason = match self.result_type {
            ResultType::NoImprovement => match settings.max_iterations_no_progress {
                Some(limit) => format!("{} ({} iterations without improvement)", self.result_type, limit),
                None => self.result_type.to_string(),
            },
            ResultType::MaximumEvals => match settings.max_iterations {
                Some(limit) => format!("{} ({})", self.result_type, limit),
                None => self.result_type.to_string(),
            },
            ResultType::MaximumTime => match settings.max_duration {
                Some(limit) => format!("{} ({} s)", self.result_type, limit.as_secs_f64()),
                None => self.result_type.to_string(),
            },
            _ => self.result_type.to_string(),
        };

        let parameters = self
            .parameters
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "{reason}\nBest value: {}\nParameters: {parameters}\nIterations: {}",
            self.value, self.iterations
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    #[test]
    fn direction_comparisons() {
        assert!(Direction::Minimize.is_better(1.0, 2.0));
        assert!(!Direction::Minimize.is_better(2.0, 2.0));
        assert!(Direction::Maximize.is_better(3.0, 2.0));
        assert!(Direction::Maximize.is_better(-1e300, Direction::Maximize.worst()));
        assert_eq!(Direction::Maximize.to_minimization(4.0), -4.0);
        assert_eq!(Direction::Minimize.to_minimization(4.0), 4.0);
    }

    #[test]
    fn empty_result_has_no_value() {
        let result = OptimizationResult::empty(Direction::Maximize);
        assert!(!result.has_value());
        assert_eq!(result.value(), f64::NEG_INFINITY);
        assert_eq!(result.result_type(), ResultType::Unknown);
    }

    #[test]
    fn summary_names_the_limit() {
        let settings = OptimizationSettings::default()
            .with_max_iterations(500)
            .with_max_duration(Duration::from_secs(30));
        let result = OptimizationResult::new(0.25, vec![dec!(3.1), dec!(6.9)], 500, ResultType::MaximumEvals);

        let text = result.summary(&settings);
        assert!(text.starts_with("Maximum evaluations reached (500)"));
        assert!(text.contains("Best value: 0.25"));
        assert!(text.contains("3.1, 6.9"));
        assert!(text.contains("Iterations: 500"));
    }
}
