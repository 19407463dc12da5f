use fg_types::{Direction, OptimizationResult, ResultType};
use rust_decimal::Decimal;
use std::time::{Duration, Instant};

use crate::progress::ProgressThrottle;

/// Mutable bookkeeping for a single run, created fresh by every run.
#[derive(Debug, Clone)]
pub struct RunState {
    pub direction: Direction,
    /// Successful evaluations so far.
    pub iterations: u64,
    pub iterations_since_improvement: u64,
    pub best_value: f64,
    pub best_parameters: Vec<Decimal>,
    /// Best value after each successful evaluation.
    pub best_values: Vec<f64>,
    pub result_type: ResultType,
    pub started: Instant,
    /// Reset after every evaluation; times the host round trip.
    pub loop_started: Instant,
    pub throttle: ProgressThrottle,
}

impl RunState {
    pub fn new(direction: Direction, update_interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            direction,
            iterations: 0,
            iterations_since_improvement: 0,
            best_value: direction.worst(),
            best_parameters: Vec::new(),
            best_values: Vec::new(),
            result_type: ResultType::Unknown,
            started: now,
            loop_started: now,
            throttle: ProgressThrottle::new(update_interval),
        }
    }

    /// Count a successful evaluation and keep the best point.
    /// Returns true when `value` strictly improved on the incumbent.
    pub fn record(&mut self, parameters: &[Decimal], value: f64) -> bool {
        self.iterations += 1;
        self.iterations_since_improvement += 1;

        let improved = self.direction.is_better(value, self.best_value);
        if improved {
            self.best_value = value;
            self.best_parameters = parameters.to_vec();
            self.iterations_since_improvement = 0;
        }
        self.best_values.push(self.best_value);
        improved
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time since the last call, restarting the loop stopwatch.
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let lap = now.duration_since(self.loop_started);
        self.loop_started = now;
        lap
    }

    pub fn to_result(&self) -> OptimizationResult {
        OptimizationResult::new(
            self.best_value,
            self.best_parameters.clone(),
            self.iterations,
            self.result_type,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn record_tracks_best_and_stagnation() {
        let mut state = RunState::new(Direction::Minimize, Duration::ZERO);
        assert!(state.record(&[dec!(1)], 5.0));
        assert!(!state.record(&[dec!(2)], 5.0));
        assert!(!state.record(&[dec!(3)], 7.0));
        assert_eq!(state.iterations_since_improvement, 2);
        assert!(state.record(&[dec!(4)], 1.0));

        assert_eq!(state.iterations, 4);
        assert_eq!(state.iterations_since_improvement, 0);
        assert_eq!(state.best_parameters, vec![dec!(4)]);
        assert_eq!(state.best_values, vec![5.0, 5.0, 5.0, 1.0]);
    }

    #[test]
    fn maximizing_keeps_the_largest() {
        let mut state = RunState::new(Direction::Maximize, Duration::ZERO);
        state.record(&[dec!(1)], -3.0);
        state.record(&[dec!(2)], 2.0);
        state.record(&[dec!(3)], 1.0);

        let result = state.to_result();
        assert_eq!(result.value(), 2.0);
        assert_eq!(result.parameters(), &[dec!(2)]);
        assert_eq!(result.iterations(), 3);
        assert_eq!(result.result_type(), ResultType::Unknown);
    }

    #[test]
    fn fresh_state_has_no_value() {
        let state = RunState::new(Direction::Minimize, Duration::from_millis(100));
        assert!(!state.to_result().has_value());
        assert!(state.best_values.is_empty());
    }
}
