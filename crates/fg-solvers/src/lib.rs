//! # fg-solvers
//!
//! Solver abstraction for FrOG.
//!
//! Provides the [`Solver`] contract consumed by the optimization controller,
//! the stochastic hill-climbing reference solver, expert-settings parsing and
//! the registry that maps preset indices to solvers.

mod algorithm;
mod expert;
mod hillclimber;
mod registry;
mod traits;

pub use algorithm::{HillclimberAlgorithm, RandomDistributions};
pub use expert::parse_expert_settings;
pub use hillclimber::Hillclimber;
pub use registry::SolverRegistry;
pub use traits::{Optimum, Solver, SolverOutcome, SolverRequest};
