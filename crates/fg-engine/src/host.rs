//! The host boundary: the externally owned model that turns a parameter
//! vector into an objective value.

use fg_types::{to_f64, Variable};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Capabilities the optimization core needs from the host.
///
/// Every method runs on the host's own thread, driven by the bridge server.
pub trait HostModel: Send {
    /// Discover the variables. `false` aborts the batch.
    fn set_inputs(&mut self) -> bool;

    /// Discover the objective. `false` aborts the batch.
    fn set_output(&mut self) -> bool;

    fn variables(&self) -> Vec<Variable>;

    /// Push a parameter vector into the model and recompute it.
    fn apply_parameters(&mut self, parameters: &[Decimal]);

    /// Objective of the last recomputation; NaN when the model has no valid output.
    fn objective_value(&self) -> f64;

    /// Leave the model at the final best parameters.
    fn commit(&mut self, parameters: &[Decimal]) {
        self.apply_parameters(parameters);
    }

    fn document_path(&self) -> PathBuf;

    fn document_name(&self) -> String;

    fn component_folder(&self) -> PathBuf;
}

/// Snapshot of the host metadata the controller needs for a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostDescription {
    pub variables: Vec<Variable>,
    pub document_path: PathBuf,
    pub document_name: String,
    pub component_folder: PathBuf,
}

/// Counters shared between a [`FunctionModel`] and whoever created it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostStats {
    pub evaluations: u64,
    pub last_parameters: Option<Vec<Decimal>>,
    pub committed: Option<Vec<Decimal>>,
}

type Objective = Box<dyn Fn(&[f64]) -> f64 + Send>;

/// A host backed by a plain function of the parameter coordinates.
pub struct FunctionModel {
    variables: Vec<Variable>,
    objective: Objective,
    current: Option<Vec<f64>>,
    document_path: PathBuf,
    stats: Arc<Mutex<HostStats>>,
}

impl FunctionModel {
    pub fn new<F>(variables: Vec<Variable>, objective: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + 'static,
    {
        Self {
            variables,
            objective: Box::new(objective),
            current: None,
            document_path: PathBuf::from("function.model"),
            stats: Arc::new(Mutex::new(HostStats::default())),
        }
    }

    pub fn with_document_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.document_path = path.into();
        self
    }

    /// Handle that stays readable after the model moved to the host thread.
    pub fn stats(&self) -> Arc<Mutex<HostStats>> {
        Arc::clone(&self.stats)
    }
}

impl HostModel for FunctionModel {
    fn set_inputs(&mut self) -> bool {
        !self.variables.is_empty()
    }

    fn set_output(&mut self) -> bool {
        true
    }

    fn variables(&self) -> Vec<Variable> {
        self.variables.clone()
    }

    fn apply_parameters(&mut self, parameters: &[Decimal]) {
        self.current = Some(parameters.iter().map(to_f64).collect());
        let mut stats = self.stats.lock();
        stats.evaluations += 1;
        stats.last_parameters = Some(parameters.to_vec());
    }

    fn objective_value(&self) -> f64 {
        match &self.current {
            Some(x) => (self.objective)(x),
            None => f64::NAN,
        }
    }

    fn commit(&mut self, parameters: &[Decimal]) {
        self.current = Some(parameters.iter().map(to_f64).collect());
        self.stats.lock().committed = Some(parameters.to_vec());
    }

    fn document_path(&self) -> PathBuf {
        self.document_path.clone()
    }

    fn document_name(&self) -> String {
        self.document_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn component_folder(&self) -> PathBuf {
        self.document_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default()
    }
}
