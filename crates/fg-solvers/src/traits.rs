//! The contract every optimization strategy implements.

use fg_types::{Preset, SolverError, Variable};
use rust_decimal::Decimal;
use std::path::Path;

/// Everything a solver needs to start a run.
#[derive(Debug, Clone, Copy)]
pub struct SolverRequest<'a> {
    pub variables: &'a [Variable],
    pub preset: &'a str,
    /// Solver-specific overrides, opaque to the controller.
    pub expert_settings: &'a str,
    pub install_folder: &'a Path,
    pub document_path: &'a Path,
}

impl<'a> SolverRequest<'a> {
    pub fn new(variables: &'a [Variable], preset: &'a str) -> Self {
        Self {
            variables,
            preset,
            expert_settings: "",
            install_folder: Path::new(""),
            document_path: Path::new(""),
        }
    }

    pub fn with_expert_settings(mut self, text: &'a str) -> Self {
        self.expert_settings = text;
        self
    }

    pub fn with_install_folder(mut self, folder: &'a Path) -> Self {
        self.install_folder = folder;
        self
    }

    pub fn with_document_path(mut self, path: &'a Path) -> Self {
        self.document_path = path;
        self
    }
}

/// Best point a solver recorded, in the solver's (minimizing) objective.
#[derive(Debug, Clone, PartialEq)]
pub struct Optimum {
    pub parameters: Vec<Decimal>,
    pub value: f64,
}

/// What a solver reports once its loop has terminated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SolverOutcome {
    /// `None` when the very first evaluation already signalled stop.
    pub optimum: Option<Optimum>,
    /// Number of times `evaluate` was invoked.
    pub evaluations: u64,
}

/// Common trait for all optimization strategies.
///
/// `run_solver` blocks for the whole run. It calls `evaluate` sequentially,
/// any number of times, and must never call it again after it returned NaN.
/// An `Err` means the solver could not start and `evaluate` was not invoked;
/// `Ok` means the run loop terminated, for whatever reason.
pub trait Solver: Send {
    /// Human-readable solver name.
    fn name(&self) -> &str;

    fn run_solver(
        &mut self,
        request: &SolverRequest<'_>,
        evaluate: &mut dyn FnMut(&[Decimal]) -> f64,
    ) -> Result<SolverOutcome, SolverError>;

    /// Explanation of the most recent failure, empty if none.
    fn error_message(&self) -> String;

    /// Preset names in insertion order.
    fn preset_names(&self) -> Vec<String>;

    fn preset(&self, name: &str) -> Option<&Preset>;
}
