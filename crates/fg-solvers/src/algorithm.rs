//! Stochastic hill climbing over a box-bounded continuous domain.
//!
//! Local random-perturbation search (Brownlee, *Clever Algorithms*): start
//! from a uniform random point, propose a Gaussian neighbour clamped into the
//! bounds, and move only when the neighbour is strictly better. Always
//! minimizes.

use fg_types::SolverError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// Seeded uniform and normal sampling.
#[derive(Debug, Clone)]
pub struct RandomDistributions {
    rng: StdRng,
}

impl RandomDistributions {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform draw in `[0, 1)`.
    pub fn next_double(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Normal draw via the Box–Muller transform.
    pub fn next_gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        // u1 in (0, 1] keeps ln finite
        let u1 = 1.0 - self.next_double();
        let u2 = self.next_double();
        let std_normal = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).sin();
        mean + std_dev * std_normal
    }
}

/// Stochastic hill climber state for one solve.
#[derive(Debug, Clone)]
pub struct HillclimberAlgorithm {
    lower: Vec<f64>,
    upper: Vec<f64>,
    stepsize: f64,
    itermax: u64,
    rnd: RandomDistributions,
    x_opt: Option<Vec<f64>>,
    fx_opt: Option<f64>,
    evaluations: u64,
}

impl HillclimberAlgorithm {
    /// `stepsize` is the perturbation standard deviation as a fraction of each
    /// variable's range. `itermax` caps the number of neighbour proposals.
    ///
    /// Bounds must have equal lengths, be finite and satisfy `lower <= upper`.
    pub fn new(
        lower: Vec<f64>,
        upper: Vec<f64>,
        stepsize: f64,
        itermax: u64,
        seed: u64,
    ) -> Result<Self, SolverError> {
        if lower.len() != upper.len() {
            return Err(SolverError::InvalidVariables {
                message: format!("{} lower bounds but {} upper bounds", lower.len(), upper.len()),
            });
        }
        for (i, (lo, hi)) in lower.iter().zip(&upper).enumerate() {
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                return Err(SolverError::InvalidVariables {
                    message: format!("bounds of variable {i} are not an interval: [{lo}, {hi}]"),
                });
            }
        }
        Ok(Self {
            lower,
            upper,
            stepsize,
            itermax,
            rnd: RandomDistributions::new(seed),
            x_opt: None,
            fx_opt: None,
            evaluations: 0,
        })
    }

    /// Minimize `evaluate`. A NaN return stops the search immediately.
    pub fn solve<F>(&mut self, mut evaluate: F)
    where
        F: FnMut(&[f64]) -> f64,
    {
        let n = self.lower.len();
        let mut x = Vec::with_capacity(n);
        let mut stdev = Vec::with_capacity(n);
        for i in 0..n {
            let range = self.upper[i] - self.lower[i];
            x.push(self.rnd.next_double() * range + self.lower[i]);
            stdev.push(self.stepsize * range);
        }

        let mut fx = evaluate(&x);
        self.evaluations += 1;
        if fx.is_nan() {
            return;
        }
        self.record(&x, fx);

        let mut candidate = vec![0.0; n];
        for _ in 0..self.itermax {
            for i in 0..n {
                candidate[i] = self
                    .rnd
                    .next_gaussian(x[i], stdev[i])
                    .clamp(self.lower[i], self.upper[i]);
            }

            let f_candidate = evaluate(&candidate);
            self.evaluations += 1;
            if f_candidate.is_nan() {
                return;
            }

            if f_candidate < fx {
                x.copy_from_slice(&candidate);
                fx = f_candidate;
                self.record(&x, fx);
            }
        }
    }

    fn record(&mut self, x: &[f64], fx: f64) {
        self.x_opt = Some(x.to_vec());
        self.fx_opt = Some(fx);
    }

    /// Variable vector of the last recorded optimum.
    pub fn x_optimum(&self) -> Option<&[f64]> {
        self.x_opt.as_deref()
    }

    /// Cost of the last recorded optimum.
    pub fn fx_optimum(&self) -> Option<f64> {
        self.fx_opt
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }
}
