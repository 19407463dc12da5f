//! Stochastic hill-climbing solver with its presets.

use fg_types::{to_decimal, Preset, SolverError, Variable};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::algorithm::HillclimberAlgorithm;
use crate::expert::parse_expert_settings;
use crate::traits::{Optimum, Solver, SolverOutcome, SolverRequest};

/// Validated settings for one hill-climbing run.
#[derive(Debug, Clone, PartialEq)]
struct RunConfig {
    seed: u64,
    stepsize: f64,
    itermax: u64,
}

/// Reference solver: local random-perturbation search.
#[derive(Debug)]
pub struct Hillclimber {
    presets: Vec<Preset>,
    error_message: String,
}

impl Hillclimber {
    pub fn new() -> Self {
        // The controller owns the evaluation budget; itermax is only a soft cap.
        let standard = Preset::new("Hillclimber")
            .with("seed", 1.0)
            .with("stepsize", 0.1)
            .with("itermax", 1000.0);

        Self {
            presets: vec![standard],
            error_message: String::new(),
        }
    }

    fn configure(&self, request: &SolverRequest<'_>) -> Result<RunConfig, SolverError> {
        let preset = self
            .preset(request.preset)
            .ok_or_else(|| SolverError::UnknownPreset {
                preset: request.preset.to_string(),
            })?;

        let overrides = parse_expert_settings(request.expert_settings)?;
        let preset = preset.overridden(overrides.iter().map(|(k, v)| (k.as_str(), *v)))?;

        let seed = preset.require("seed")?;
        let stepsize = preset.require("stepsize")?;
        let itermax = preset.require("itermax")?;

        if !(stepsize > 0.0 && stepsize.is_finite()) {
            return Err(SolverError::InvalidSetting {
                key: "stepsize".into(),
                message: format!("must be positive, got {stepsize}"),
            });
        }
        if !(itermax >= 0.0 && itermax.is_finite()) {
            return Err(SolverError::InvalidSetting {
                key: "itermax".into(),
                message: format!("must be a non-negative count, got {itermax}"),
            });
        }

        Self::check_variables(request.variables)?;

        Ok(RunConfig {
            seed: seed as i64 as u64,
            stepsize,
            itermax: itermax as u64,
        })
    }

    fn check_variables(variables: &[Variable]) -> Result<(), SolverError> {
        if variables.is_empty() {
            return Err(SolverError::InvalidVariables {
                message: "no variables".into(),
            });
        }
        for (index, variable) in variables.iter().enumerate() {
            variable
                .validate(index)
                .map_err(|e| SolverError::InvalidVariables {
                    message: e.to_string(),
                })?;
            if !variable.range().is_finite() {
                return Err(SolverError::InvalidVariables {
                    message: format!("variable {index} has a non-finite range"),
                });
            }
        }
        Ok(())
    }

    /// Coordinates as the decimal vector handed to the host.
    fn to_parameters(variables: &[Variable], x: &[f64]) -> Result<Vec<Decimal>, SolverError> {
        variables
            .iter()
            .zip(x)
            .map(|(variable, &value)| to_decimal(variable.snap(value)))
            .collect()
    }
}

impl Default for Hillclimber {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for Hillclimber {
    fn name(&self) -> &str {
        "Hillclimber"
    }

    fn run_solver(
        &mut self,
        request: &SolverRequest<'_>,
        evaluate: &mut dyn FnMut(&[Decimal]) -> f64,
    ) -> Result<SolverOutcome, SolverError> {
        self.error_message.clear();

        let config = match self.configure(request) {
            Ok(config) => config,
            Err(e) => {
                warn!(preset = request.preset, error = %e, "hill climber could not start");
                self.error_message = e.to_string();
                return Err(e);
            }
        };

        info!(
            preset = request.preset,
            seed = config.seed,
            stepsize = config.stepsize,
            itermax = config.itermax,
            dimensions = request.variables.len(),
            "starting hill climber"
        );

        let variables = request.variables;
        let lower = variables.iter().map(Variable::lower_f64).collect();
        let upper = variables.iter().map(Variable::upper_f64).collect();
        let mut hc = match HillclimberAlgorithm::new(lower, upper, config.stepsize, config.itermax, config.seed) {
            Ok(hc) => hc,
            Err(e) => {
                warn!(error = %e, "hill climber could not start");
                self.error_message = e.to_string();
                return Err(e);
            }
        };

        let mut conversion_error = None;
        hc.solve(|x: &[f64]| match Self::to_parameters(variables, x) {
            Ok(parameters) => evaluate(parameters.as_slice()),
            Err(e) => {
                conversion_error = Some(e);
                f64::NAN
            }
        });

        if let Some(e) = conversion_error {
            warn!(error = %e, "hill climber stopped on an unrepresentable candidate");
            self.error_message = e.to_string();
        }

        let optimum = match (hc.x_optimum(), hc.fx_optimum()) {
            (Some(x), Some(value)) => Self::to_parameters(variables, x)
                .ok()
                .map(|parameters| Optimum { parameters, value }),
            _ => None,
        };

        debug!(
            evaluations = hc.evaluations(),
            best = ?optimum.as_ref().map(|o| o.value),
            "hill climber finished"
        );

        Ok(SolverOutcome {
            optimum,
            evaluations: hc.evaluations(),
        })
    }

    fn error_message(&self) -> String {
        self.error_message.clone()
    }

    fn preset_names(&self) -> Vec<String> {
        self.presets.iter().map(|p| p.name().to_string()).collect()
    }

    fn preset(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name() == name)
    }
}
