//! Lookup of solvers and presets by the flat preset index shown to users.

use crate::hillclimber::Hillclimber;
use crate::traits::Solver;

/// Ordered collection of solvers. Preset indices enumerate the presets of
/// every registered solver in registration order.
pub struct SolverRegistry {
    solvers: Vec<Box<dyn Solver>>,
}

impl SolverRegistry {
    pub fn new() -> Self {
        Self {
            solvers: Vec::new(),
        }
    }

    /// Registry holding every built-in solver.
    pub fn with_defaults() -> Self {
        Self::new().register(Box::new(Hillclimber::new()))
    }

    pub fn register(mut self, solver: Box<dyn Solver>) -> Self {
        self.solvers.push(solver);
        self
    }

    pub fn len(&self) -> usize {
        self.solvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solvers.is_empty()
    }

    /// `(solver index, preset name)` for every preset, in index order.
    fn entries(&self) -> Vec<(usize, String)> {
        self.solvers
            .iter()
            .enumerate()
            .flat_map(|(i, solver)| solver.preset_names().into_iter().map(move |name| (i, name)))
            .collect()
    }

    /// All preset names across solvers, for populating user choices.
    pub fn preset_names(&self) -> Vec<String> {
        self.entries().into_iter().map(|(_, name)| name).collect()
    }

    /// Name of the preset at `preset_index`.
    pub fn preset_by_index(&self, preset_index: usize) -> Option<String> {
        self.entries().into_iter().nth(preset_index).map(|(_, name)| name)
    }

    /// The solver owning the preset at `preset_index`.
    pub fn solver_by_index(&mut self, preset_index: usize) -> Option<&mut dyn Solver> {
        let (solver_index, _) = self.entries().into_iter().nth(preset_index)?;
        let solver: &mut dyn Solver = self.solvers.get_mut(solver_index)?.as_mut();
        Some(solver)
    }
}

impl Default for SolverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
