//! Optimization controller: drives runs of a solver against the host model.
//!
//! A batch discovers the host's variables over the bridge, repeats single
//! runs, keeps the best result across runs, and commits it back to the host.
//! Every run owns a fresh [`RunState`]; the solver's evaluation callback is
//! [`Evaluation::evaluate_function`], the only place where the objective is
//! mapped onto the minimization problem the solvers work on.

use chrono::{DateTime, Utc};
use fg_solvers::{SolverRegistry, SolverRequest};
use fg_types::{OptimizationResult, OptimizationSettings, ResultType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bridge::{BridgeClient, BridgeError};
use crate::cancel::CancellationToken;
use crate::error::{EngineError, EngineResult};
use crate::host::HostDescription;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::run_log::{FileRunLog, RunLog, TracingRunLog};
use crate::run_state::RunState;

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Initializing,
    Running,
    Converged,
    StoppedByUser,
    EvaluationFailed,
    SolverFailedToStart,
    Finalizing,
    Done,
}

impl RunPhase {
    /// Terminal phase for a run whose solver returned normally.
    pub fn after_solver(result_type: ResultType) -> Self {
        match result_type {
            ResultType::UserStopped => Self::StoppedByUser,
            ResultType::FrogStopped => Self::EvaluationFailed,
            _ => Self::Converged,
        }
    }
}

fn enter(run: usize, phase: RunPhase) {
    debug!(run, phase = ?phase, "run phase");
}

/// Outcome of [`Controller::run_multiple`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub finished_runs: usize,
    /// Best finite result across runs, already committed to the host.
    pub best: Option<OptimizationResult>,
    pub results: Vec<OptimizationResult>,
    /// Why the batch stopped early, if a solver could not be started.
    pub error: Option<String>,
    /// Text of the terminal notification.
    pub message: String,
}

/// Drives optimization runs on the worker side of the bridge.
pub struct Controller {
    settings: OptimizationSettings,
    registry: SolverRegistry,
    bridge: BridgeClient,
    cancel: CancellationToken,
    progress: ProgressSink,
    host: Option<HostDescription>,
    run: usize,
}

impl Controller {
    pub fn new(settings: OptimizationSettings, registry: SolverRegistry, bridge: BridgeClient) -> Self {
        Self {
            settings,
            registry,
            bridge,
            cancel: CancellationToken::new(),
            progress: ProgressSink::disabled(),
            host: None,
            run: 0,
        }
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &OptimizationSettings {
        &self.settings
    }

    pub fn host(&self) -> Option<&HostDescription> {
        self.host.as_ref()
    }

    /// Validate settings and discover the host's variables and objective.
    pub fn setup(&mut self) -> EngineResult<&HostDescription> {
        self.settings.validate()?;
        let description = self.bridge.describe()?;
        info!(
            "Host {} exposes {} variables",
            description.document_name,
            description.variables.len()
        );
        Ok(self.host.insert(description))
    }

    /// Run up to `run_count` optimizations and commit the overall best to the host.
    ///
    /// Fails only when setup fails, before any evaluation. Every other outcome,
    /// including a solver that cannot start, is reported in the [`BatchReport`].
    pub fn run_multiple(&mut self, run_count: usize) -> EngineResult<BatchReport> {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(batch = %id, runs = run_count, "Starting optimization batch");

        let setup = self.setup().map(|_| ());
        if let Err(e) = setup {
            error!(batch = %id, "Optimization setup failed: {}", e);
            self.progress.publish(ProgressEvent::Finished {
                message: e.to_string(),
                best: None,
            });
            return Err(e);
        }

        let direction = self.settings.direction;
        let mut best = OptimizationResult::empty(direction);
        let mut results = Vec::new();
        let mut error = None;
        let mut finished_runs = 0;
        self.run = 0;

        while finished_runs < run_count {
            if self.cancel.is_cancelled() {
                info!(batch = %id, finished_runs, "Batch cancelled");
                break;
            }

            let result = match self.run_single(self.settings.preset_index) {
                Ok(Some(result)) => result,
                Ok(None) => break,
                Err(e) => {
                    error!(batch = %id, "Run aborted: {}", e);
                    error = Some(e.to_string());
                    break;
                }
            };

            if direction.is_better(result.value(), best.value()) {
                best = result.clone();
            }
            results.push(result);
            finished_runs += 1;

            if finished_runs < run_count && !self.settings.pause_between_runs.is_zero() {
                thread::sleep(self.settings.pause_between_runs);
            }
        }

        let best = if best.has_value() {
            if let Err(e) = self.bridge.commit(best.parameters()) {
                warn!(batch = %id, "Could not commit best parameters to host: {}", e);
            }
            Some(best)
        } else {
            None
        };

        let message = match (&error, &best) {
            (Some(e), _) => e.clone(),
            (None, None) => "No valid result found".to_string(),
            (None, Some(best)) if run_count == 1 => best.summary(&self.settings),
            (None, Some(best)) => format!(
                "Finished {} runs\nOverall best value {}",
                finished_runs,
                best.value()
            ),
        };

        info!(batch = %id, finished_runs, "Optimization batch finished");
        self.progress.publish(ProgressEvent::Finished {
            message: message.clone(),
            best: best.clone(),
        });

        Ok(BatchReport {
            id,
            started_at,
            finished_at: Utc::now(),
            finished_runs,
            best,
            results,
            error,
            message,
        })
    }

    /// Run the solver owning the preset at `preset_index` once.
    ///
    /// `Ok(None)` when the run was cancelled before any successful evaluation.
    /// `Err` when the preset does not exist or the solver could not start.
    pub fn run_single(&mut self, preset_index: usize) -> EngineResult<Option<OptimizationResult>> {
        let host = match self.host.clone() {
            Some(host) => host,
            None => self.setup()?.clone(),
        };

        self.run += 1;
        let run = self.run;
        enter(run, RunPhase::Initializing);

        let Self {
            settings,
            registry,
            bridge,
            cancel,
            progress,
            ..
        } = self;
        let settings: &OptimizationSettings = settings;

        let preset = registry
            .preset_by_index(preset_index)
            .ok_or(EngineError::UnknownPresetIndex { index: preset_index })?;
        let solver = registry
            .solver_by_index(preset_index)
            .ok_or(EngineError::UnknownPresetIndex { index: preset_index })?;

        let mut logs: Vec<Box<dyn RunLog>> = vec![Box::new(TracingRunLog)];
        if settings.log_enabled {
            let path = FileRunLog::path_for(
                &host.document_path,
                &settings.log_name,
                settings.vary_log_name.then_some(run),
            );
            match FileRunLog::create(&path, host.document_name.clone()) {
                Ok(log) => logs.push(Box::new(log)),
                Err(e) => warn!(run, "Could not open run log {}: {}", path.display(), e),
            }
        }
        logs.log_settings(&preset, settings);

        let request = SolverRequest::new(&host.variables, &preset)
            .with_expert_settings(&settings.expert_settings)
            .with_install_folder(&host.component_folder)
            .with_document_path(&host.document_path);

        let mut evaluation = Evaluation {
            run,
            dimension: host.variables.len(),
            settings,
            bridge,
            cancel,
            progress,
            state: RunState::new(settings.direction, settings.update_interval),
            logs,
        };

        info!(run, solver = solver.name(), preset = %preset, "Starting run");
        enter(run, RunPhase::Running);
        let outcome = {
            let mut evaluate = |parameters: &[Decimal]| evaluation.evaluate_function(parameters);
            solver.run_solver(&request, &mut evaluate)
        };
        let Evaluation {
            mut state, mut logs, ..
        } = evaluation;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                enter(run, RunPhase::SolverFailedToStart);
                let mut message = solver.error_message();
                if message.is_empty() {
                    message = e.to_string();
                }
                error!(run, preset = %preset, "Solver could not be started: {}", message);
                return Err(EngineError::SolverStart { preset, message });
            }
        };
        debug!(run, evaluations = outcome.evaluations, "solver returned");

        if cancel.is_cancelled() {
            state.result_type = ResultType::UserStopped;
        } else if matches!(state.result_type, ResultType::Unknown | ResultType::SolverStopped) {
            let message = solver.error_message();
            if !message.is_empty() {
                warn!(run, "Solver stopped: {}", message);
            }
        }
        enter(run, RunPhase::after_solver(state.result_type));

        enter(run, RunPhase::Finalizing);
        progress.publish(ProgressEvent::BestValues {
            run,
            trace: state.best_values.clone(),
        });
        let result = state.to_result();
        logs.log_result(&result, state.elapsed(), settings);
        enter(run, RunPhase::Done);

        if result.result_type() == ResultType::UserStopped && result.iterations() == 0 {
            info!(run, "Run cancelled before any evaluation");
            return Ok(None);
        }

        info!(
            run,
            result_type = ?result.result_type(),
            value = result.value(),
            iterations = result.iterations(),
            "Run finished"
        );
        progress.publish(ProgressEvent::RunFinished {
            run,
            result_type: result.result_type(),
            value: result.value(),
            iterations: result.iterations(),
        });
        Ok(Some(result))
    }

    /// Run [`Controller::run_multiple`] on a dedicated worker thread.
    ///
    /// The host must serve the bridge on its own thread until the worker finishes.
    pub fn spawn(self, run_count: usize) -> EngineResult<WorkerHandle> {
        let cancel = self.cancel.clone();
        let mut controller = self;
        let handle = thread::Builder::new()
            .name("frog-worker".to_string())
            .spawn(move || controller.run_multiple(run_count))?;
        Ok(WorkerHandle { cancel, handle })
    }
}

/// Handle to a batch running on a worker thread.
pub struct WorkerHandle {
    cancel: CancellationToken,
    handle: JoinHandle<EngineResult<BatchReport>>,
}

impl WorkerHandle {
    /// Request a cooperative stop. Takes effect before the next evaluation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> EngineResult<BatchReport> {
        self.handle.join().map_err(|_| EngineError::WorkerPanicked)?
    }
}

/// Evaluation callback context for one run.
struct Evaluation<'a> {
    run: usize,
    dimension: usize,
    settings: &'a OptimizationSettings,
    bridge: &'a mut BridgeClient,
    cancel: &'a CancellationToken,
    progress: &'a ProgressSink,
    state: RunState,
    logs: Vec<Box<dyn RunLog>>,
}

impl Evaluation<'_> {
    /// Evaluate `parameters` on the host and return the objective as the
    /// solver sees it (negated when maximizing). NaN tells the solver to stop.
    fn evaluate_function(&mut self, parameters: &[Decimal]) -> f64 {
        let run = self.run;
        self.logs.log_iteration(self.state.iterations + 1);

        if parameters.is_empty() || parameters.len() != self.dimension {
            warn!(
                run,
                expected = self.dimension,
                received = parameters.len(),
                "Solver passed an invalid parameter vector"
            );
            self.state.result_type = ResultType::SolverStopped;
            return f64::NAN;
        }

        let lap = self.state.lap();
        self.logs.log_parameters(parameters, lap);

        let value = match self.bridge.evaluate(parameters, self.cancel) {
            Ok(value) => value,
            Err(BridgeError::Cancelled) => {
                debug!(run, "evaluation skipped after cancellation");
                return f64::NAN;
            }
            Err(e) => {
                warn!(run, "Host evaluation failed: {}", e);
                self.state.result_type = ResultType::FrogStopped;
                return f64::NAN;
            }
        };

        if value.is_nan() {
            warn!(run, iteration = self.state.iterations + 1, "Host returned an invalid objective value");
            self.state.result_type = ResultType::FrogStopped;
            return f64::NAN;
        }

        let elapsed = self.state.lap();
        self.logs.log_function_value(parameters, value, elapsed);

        self.state.record(parameters, value);
        if self.state.throttle.ready() {
            self.progress.publish(ProgressEvent::BestValues {
                run,
                trace: self.state.best_values.clone(),
            });
        }
        self.logs.log_current_best(
            &self.state.best_parameters,
            self.state.best_value,
            self.state.elapsed(),
            self.state.iterations_since_improvement,
        );
        debug!(
            run,
            iteration = self.state.iterations,
            value,
            best = self.state.best_value,
            "evaluation"
        );

        if let Some(result_type) = self.termination() {
            debug!(run, result_type = ?result_type, "termination limit reached");
            self.state.result_type = result_type;
            return f64::NAN;
        }

        self.settings.direction.to_minimization(value)
    }

    fn termination(&self) -> Option<ResultType> {
        let settings = self.settings;
        let state = &self.state;

        if settings
            .max_iterations_no_progress
            .is_some_and(|limit| state.iterations_since_improvement >= limit)
        {
            return Some(ResultType::NoImprovement);
        }
        if settings.max_iterations.is_some_and(|limit| state.iterations >= limit) {
            return Some(ResultType::MaximumEvals);
        }
        if settings.max_duration.is_some_and(|limit| state.elapsed() >= limit) {
            return Some(ResultType::MaximumTime);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::EvaluationBridge;
    use crate::host::FunctionModel;
    use crossbeam_channel::Receiver;
    use fg_solvers::{Optimum, Solver, SolverOutcome};
    use fg_types::{Preset, SetupError, SolverError, Variable};
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn square() -> Vec<Variable> {
        vec![
            Variable::continuous(dec!(0), dec!(10)),
            Variable::continuous(dec!(0), dec!(10)),
        ]
    }

    fn bowl(x: &[f64]) -> f64 {
        (x[0] - 3.0).powi(2) + (x[1] - 7.0).powi(2)
    }

    fn settings() -> OptimizationSettings {
        OptimizationSettings::default().with_pause_between_runs(Duration::ZERO)
    }

    struct Harness {
        controller: Controller,
        events: Receiver<ProgressEvent>,
        host: thread::JoinHandle<usize>,
    }

    impl Harness {
        fn new(settings: OptimizationSettings, registry: SolverRegistry, mut model: FunctionModel) -> Self {
            let (client, server) = EvaluationBridge::new();
            let (sink, events) = ProgressSink::channel();
            let host = thread::spawn(move || server.serve(&mut model));
            let controller = Controller::new(settings, registry, client).with_progress(sink);
            Self {
                controller,
                events,
                host,
            }
        }

        /// Drop the controller so the host thread stops, and collect the events.
        fn finish(self) -> Vec<ProgressEvent> {
            let Self {
                controller,
                events,
                host,
            } = self;
            drop(controller);
            host.join().unwrap();
            events.try_iter().collect()
        }
    }

    fn traces(events: &[ProgressEvent]) -> Vec<Vec<f64>> {
        events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::BestValues { trace, .. } => Some(trace.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn bowl_converges_within_evaluation_limit() {
        let model = FunctionModel::new(square(), bowl);
        let stats = model.stats();
        let mut harness = Harness::new(settings().with_max_iterations(500), SolverRegistry::with_defaults(), model);

        let report = harness.controller.run_multiple(1).unwrap();
        let best = report.best.clone().unwrap();
        assert_eq!(best.result_type(), ResultType::MaximumEvals);
        assert_eq!(best.iterations(), 500);
        assert!(best.value() < 0.5, "value {}", best.value());
        let x: Vec<f64> = best.parameters().iter().map(fg_types::to_f64).collect();
        assert!((x[0] - 3.0).abs() < 0.75 && (x[1] - 7.0).abs() < 0.75, "{x:?}");
        assert!(report.message.starts_with("Maximum evaluations reached (500)"));

        let events = harness.finish();
        let stats = stats.lock();
        assert_eq!(stats.evaluations, 500);
        assert_eq!(stats.committed.as_deref(), Some(best.parameters()));
        assert!(matches!(events.last(), Some(ProgressEvent::Finished { best: Some(_), .. })));
    }

    #[test]
    fn nan_objective_stops_with_frog_stopped() {
        let model = FunctionModel::new(square(), |_: &[f64]| f64::NAN);
        let stats = model.stats();
        let mut harness = Harness::new(settings(), SolverRegistry::with_defaults(), model);

        let result = harness.controller.run_single(0).unwrap().unwrap();
        assert_eq!(result.result_type(), ResultType::FrogStopped);
        assert_eq!(result.iterations(), 0);
        assert!(!result.has_value());

        harness.finish();
        assert_eq!(stats.lock().evaluations, 1);
    }

    #[test]
    fn constant_objective_stops_without_improvement() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let model = FunctionModel::new(square(), move |_: &[f64]| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                1.0
            } else {
                2.0
            }
        });
        let mut harness = Harness::new(
            settings().with_max_iterations_no_progress(5),
            SolverRegistry::with_defaults(),
            model,
        );

        let result = harness.controller.run_single(0).unwrap().unwrap();
        assert_eq!(result.result_type(), ResultType::NoImprovement);
        assert_eq!(result.iterations(), 6);
        assert_eq!(result.value(), 1.0);

        harness.finish();
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn cancellation_before_first_evaluation_yields_no_result() {
        let model = FunctionModel::new(square(), bowl);
        let stats = model.stats();
        let mut harness = Harness::new(settings(), SolverRegistry::with_defaults(), model);
        harness.controller.setup().unwrap();
        harness.controller.cancellation_token().cancel();

        assert_eq!(harness.controller.run_single(0).unwrap(), None);

        harness.finish();
        assert_eq!(stats.lock().evaluations, 0);
    }

    #[test]
    fn cancelled_batch_reports_no_result_and_commits_nothing() {
        let model = FunctionModel::new(square(), bowl);
        let stats = model.stats();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (client, server) = EvaluationBridge::new();
        let (sink, events) = ProgressSink::channel();
        let mut host_model = model;
        let host = thread::spawn(move || server.serve(&mut host_model));

        let mut controller = Controller::new(settings().with_runs(3), SolverRegistry::with_defaults(), client)
            .with_progress(sink)
            .with_cancellation(cancel);
        let report = controller.run_multiple(3).unwrap();
        drop(controller);
        host.join().unwrap();

        assert_eq!(report.finished_runs, 0);
        assert!(report.best.is_none());
        assert_eq!(report.message, "No valid result found");
        let stats = stats.lock();
        assert_eq!(stats.evaluations, 0);
        assert!(stats.committed.is_none());
        let finished: Vec<_> = events
            .try_iter()
            .filter(|e| matches!(e, ProgressEvent::Finished { .. }))
            .collect();
        assert_eq!(finished.len(), 1);
    }

    #[test]
    fn trace_is_monotone_in_both_directions() {
        let mut harness = Harness::new(
            settings().with_max_iterations(200).with_update_interval(Duration::ZERO),
            SolverRegistry::with_defaults(),
            FunctionModel::new(square(), bowl),
        );
        harness.controller.run_single(0).unwrap().unwrap();
        let events = harness.finish();
        let final_trace = traces(&events).pop().unwrap();
        assert_eq!(final_trace.len(), 200);
        assert!(final_trace.windows(2).all(|w| w[1] <= w[0]));

        let mut harness = Harness::new(
            settings().with_max_iterations(200).maximize(),
            SolverRegistry::with_defaults(),
            FunctionModel::new(square(), bowl),
        );
        let result = harness.controller.run_single(0).unwrap().unwrap();
        let events = harness.finish();
        let final_trace = traces(&events).pop().unwrap();
        assert!(final_trace.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(*final_trace.last().unwrap(), result.value());
    }

    #[test]
    fn throttled_progress_always_ends_with_full_trace() {
        let mut harness = Harness::new(
            settings()
                .with_max_iterations(50)
                .with_update_interval(Duration::from_secs(3600)),
            SolverRegistry::with_defaults(),
            FunctionModel::new(square(), bowl),
        );
        harness.controller.run_single(0).unwrap().unwrap();
        let events = harness.finish();

        let all = traces(&events);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].len(), 50);
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::RunFinished {
                run: 1,
                result_type: ResultType::MaximumEvals,
                iterations: 50,
                ..
            })
        ));
    }

    #[test]
    fn evaluation_limit_bounds_successful_evaluations() {
        for limit in [1, 7, 30] {
            let model = FunctionModel::new(square(), bowl);
            let stats = model.stats();
            let mut harness = Harness::new(
                settings().with_max_iterations(limit),
                SolverRegistry::with_defaults(),
                model,
            );
            let result = harness.controller.run_single(0).unwrap().unwrap();
            assert_eq!(result.result_type(), ResultType::MaximumEvals);
            assert_eq!(result.iterations(), limit);
            harness.finish();
            assert_eq!(stats.lock().evaluations, limit);
        }
    }

    #[test]
    fn solver_finishing_on_its_own_keeps_unknown_reason() {
        let mut harness = Harness::new(
            settings().with_expert_settings("itermax = 4"),
            SolverRegistry::with_defaults(),
            FunctionModel::new(square(), bowl),
        );
        let result = harness.controller.run_single(0).unwrap().unwrap();
        assert_eq!(result.result_type(), ResultType::Unknown);
        assert_eq!(result.iterations(), 5);
        assert!(result.has_value());
        harness.finish();
    }

    #[test]
    fn slow_host_stops_at_duration_limit() {
        let model = FunctionModel::new(square(), |x: &[f64]| {
            thread::sleep(Duration::from_millis(20));
            bowl(x)
        });
        let mut harness = Harness::new(
            settings()
                .with_max_duration(Duration::from_millis(50))
                .with_max_iterations(1_000),
            SolverRegistry::with_defaults(),
            model,
        );
        let result = harness.controller.run_single(0).unwrap().unwrap();
        assert_eq!(result.result_type(), ResultType::MaximumTime);
        assert!(result.iterations() >= 3, "iterations {}", result.iterations());
        assert!(result.iterations() < 1_000);
        harness.finish();
    }

    #[test]
    fn stagnation_is_checked_before_evaluation_limit() {
        let mut harness = Harness::new(
            settings()
                .with_max_iterations(6)
                .with_max_iterations_no_progress(5),
            SolverRegistry::with_defaults(),
            FunctionModel::new(square(), |_: &[f64]| 1.0),
        );
        let result = harness.controller.run_single(0).unwrap().unwrap();
        assert_eq!(result.result_type(), ResultType::NoImprovement);
        assert_eq!(result.iterations(), 6);
        harness.finish();
    }

    #[test]
    fn stored_parameters_reproduce_the_value() {
        let mut harness = Harness::new(
            settings().with_max_iterations(100),
            SolverRegistry::with_defaults(),
            FunctionModel::new(square(), bowl),
        );
        let result = harness.controller.run_single(0).unwrap().unwrap();
        let cancel = CancellationToken::new();
        let again = harness
            .controller
            .bridge
            .evaluate(result.parameters(), &cancel)
            .unwrap();
        assert_eq!(again, result.value());
        harness.finish();
    }

    #[test]
    fn cancelled_evaluation_leaves_counters_untouched() {
        let (mut client, _server) = EvaluationBridge::new();
        let settings = settings();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let progress = ProgressSink::disabled();
        let mut evaluation = Evaluation {
            run: 1,
            dimension: 1,
            settings: &settings,
            bridge: &mut client,
            cancel: &cancel,
            progress: &progress,
            state: RunState::new(settings.direction, settings.update_interval),
            logs: Vec::new(),
        };

        for _ in 0..3 {
            assert!(evaluation.evaluate_function(&[dec!(1)]).is_nan());
        }
        assert_eq!(evaluation.state.iterations, 0);
        assert_eq!(evaluation.state.result_type, ResultType::Unknown);

        assert!(evaluation.evaluate_function(&[]).is_nan());
        assert_eq!(evaluation.state.result_type, ResultType::SolverStopped);
    }

    #[test]
    fn unknown_preset_fails_before_any_evaluation() {
        let model = FunctionModel::new(square(), bowl);
        let stats = model.stats();
        let mut harness = Harness::new(settings(), SolverRegistry::with_defaults(), model);
        assert!(matches!(
            harness.controller.run_single(4),
            Err(EngineError::UnknownPresetIndex { index: 4 })
        ));
        harness.finish();
        assert_eq!(stats.lock().evaluations, 0);
    }

    #[test]
    fn solver_start_failure_is_reported_once() {
        let model = FunctionModel::new(square(), bowl);
        let stats = model.stats();
        let mut harness = Harness::new(
            settings().with_expert_settings("stepsize = fast"),
            SolverRegistry::with_defaults(),
            model,
        );
        let report = harness.controller.run_multiple(2).unwrap();
        assert_eq!(report.finished_runs, 0);
        assert!(report.best.is_none());
        let error = report.error.unwrap();
        assert!(error.contains("Solver could not be started"), "{error}");

        let events = harness.finish();
        assert_eq!(stats.lock().evaluations, 0);
        assert!(matches!(events.as_slice(), [ProgressEvent::Finished { best: None, .. }]));
    }

    #[test]
    fn setup_failure_aborts_before_evaluation() {
        let model = FunctionModel::new(Vec::new(), bowl);
        let stats = model.stats();
        let mut harness = Harness::new(settings(), SolverRegistry::with_defaults(), model);

        let err = harness.controller.run_multiple(1).unwrap_err();
        assert!(matches!(err, EngineError::Setup(SetupError::InputsUnavailable)));
        let events = harness.finish();
        assert_eq!(stats.lock().evaluations, 0);
        assert!(matches!(events.as_slice(), [ProgressEvent::Finished { best: None, .. }]));
    }

    #[test]
    fn invalid_settings_abort_setup() {
        let mut harness = Harness::new(
            settings().with_runs(0),
            SolverRegistry::with_defaults(),
            FunctionModel::new(square(), bowl),
        );
        assert!(matches!(harness.controller.run_multiple(1), Err(EngineError::Settings(_))));
        harness.finish();
    }

    /// Replays a scripted list of best values, one run per entry.
    struct ScriptedSolver {
        presets: Vec<Preset>,
        values: Arc<Mutex<Vec<f64>>>,
    }

    impl Solver for ScriptedSolver {
        fn name(&self) -> &str {
            "Scripted"
        }

        fn run_solver(
            &mut self,
            request: &SolverRequest<'_>,
            evaluate: &mut dyn FnMut(&[Decimal]) -> f64,
        ) -> Result<SolverOutcome, SolverError> {
            let x = self.values.lock().remove(0);
            let parameters = vec![Decimal::try_from(x).map_err(|_| SolverError::Conversion { value: x })?; request.variables.len()];
            let value = evaluate(&parameters);
            Ok(SolverOutcome {
                optimum: Some(Optimum { parameters, value }),
                evaluations: 1,
            })
        }

        fn error_message(&self) -> String {
            String::new()
        }

        fn preset_names(&self) -> Vec<String> {
            self.presets.iter().map(|p| p.name().to_string()).collect()
        }

        fn preset(&self, name: &str) -> Option<&Preset> {
            self.presets.iter().find(|p| p.name() == name)
        }
    }

    #[test]
    fn batch_commits_best_across_runs() {
        let scripted = ScriptedSolver {
            presets: vec![Preset::new("Scripted")],
            values: Arc::new(Mutex::new(vec![4.0, 2.0, 6.0])),
        };
        let registry = SolverRegistry::new().register(Box::new(scripted));
        let vars = vec![Variable::continuous(dec!(0), dec!(10))];
        let model = FunctionModel::new(vars, |x: &[f64]| x[0]);
        let stats = model.stats();
        let mut harness = Harness::new(settings().with_runs(3), registry, model);

        let report = harness.controller.run_multiple(3).unwrap();
        assert_eq!(report.finished_runs, 3);
        assert_eq!(report.results.len(), 3);
        let best = report.best.clone().unwrap();
        assert_eq!(best.value(), 2.0);
        assert_eq!(best.result_type(), ResultType::Unknown);
        assert_eq!(report.message, "Finished 3 runs\nOverall best value 2");

        let events = harness.finish();
        assert_eq!(stats.lock().committed, Some(vec![dec!(2)]));
        let finished_runs = events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::RunFinished { .. }))
            .count();
        assert_eq!(finished_runs, 3);
    }

    #[test]
    fn maximizing_batch_keeps_largest_value() {
        let scripted = ScriptedSolver {
            presets: vec![Preset::new("Scripted")],
            values: Arc::new(Mutex::new(vec![4.0, 9.0, 6.0])),
        };
        let registry = SolverRegistry::new().register(Box::new(scripted));
        let vars = vec![Variable::continuous(dec!(0), dec!(10))];
        let model = FunctionModel::new(vars, |x: &[f64]| x[0]);
        let stats = model.stats();
        let mut harness = Harness::new(settings().maximize(), registry, model);

        let report = harness.controller.run_multiple(3).unwrap();
        assert_eq!(report.best.unwrap().value(), 9.0);
        harness.finish();
        assert_eq!(stats.lock().committed, Some(vec![dec!(9)]));
    }

    #[test]
    fn worker_thread_runs_batch_against_host() {
        let (client, server) = EvaluationBridge::new();
        let mut model = FunctionModel::new(square(), bowl);
        let controller = Controller::new(
            settings().with_max_iterations(20),
            SolverRegistry::with_defaults(),
            client,
        );

        let worker = controller.spawn(1).unwrap();
        let handled = server.serve(&mut model);
        let report = worker.join().unwrap();

        assert_eq!(report.finished_runs, 1);
        // describe + 20 evaluations + commit
        assert_eq!(handled, 22);
    }

    #[test]
    fn file_log_is_written_next_to_document() {
        let dir = tempfile::tempdir().unwrap();
        let model = FunctionModel::new(square(), bowl).with_document_path(dir.path().join("tower.gh"));
        let mut harness = Harness::new(
            settings()
                .with_max_iterations(3)
                .with_log("frog_log")
                .with_vary_log_name(true),
            SolverRegistry::with_defaults(),
            model,
        );
        harness.controller.run_multiple(1).unwrap();
        harness.finish();

        let text = std::fs::read_to_string(dir.path().join("frog_log_1.txt")).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("tower\t")).count(), 3);
    }

    #[test]
    fn terminal_phase_follows_result_type() {
        assert_eq!(RunPhase::after_solver(ResultType::UserStopped), RunPhase::StoppedByUser);
        assert_eq!(RunPhase::after_solver(ResultType::FrogStopped), RunPhase::EvaluationFailed);
        assert_eq!(RunPhase::after_solver(ResultType::MaximumEvals), RunPhase::Converged);
    }
}
