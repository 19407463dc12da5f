use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{SetupError, SolverError};

/// Ordered parameter values, one per [`Variable`] of the run.
pub type ParameterVector = Vec<Decimal>;

/// One optimization dimension supplied by the host before a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub lower: Decimal,
    pub upper: Decimal,
    pub integer: bool,
}

impl Variable {
    pub fn new(lower: Decimal, upper: Decimal, integer: bool) -> Self {
        Self { lower, upper, integer }
    }

    pub fn continuous(lower: Decimal, upper: Decimal) -> Self {
        Self::new(lower, upper, false)
    }

    pub fn integer(lower: Decimal, upper: Decimal) -> Self {
        Self::new(lower, upper, true)
    }

    pub fn lower_f64(&self) -> f64 {
        self.lower.to_f64().unwrap_or(f64::NAN)
    }

    pub fn upper_f64(&self) -> f64 {
        self.upper.to_f64().unwrap_or(f64::NAN)
    }

    /// Width of the admissible interval.
    pub fn range(&self) -> f64 {
        self.upper_f64() - self.lower_f64()
    }

    pub fn contains(&self, value: &Decimal) -> bool {
        *value >= self.lower && *value <= self.upper
    }

    /// Bounds a snapped value may take: the integers inside `[lower, upper]`
    /// for integer variables, the bounds themselves otherwise.
    fn admissible(&self) -> (Decimal, Decimal) {
        if self.integer {
            (self.lower.ceil(), self.upper.floor())
        } else {
            (self.lower, self.upper)
        }
    }

    /// Clamp a coordinate into bounds, rounding first for integer variables.
    /// An integer variable always snaps to an integer.
    pub fn snap(&self, value: f64) -> f64 {
        let value = if self.integer { value.round() } else { value };
        let (lower, upper) = self.admissible();
        value.clamp(to_f64(&lower), to_f64(&upper))
    }

    pub fn validate(&self, index: usize) -> Result<(), SetupError> {
        if self.lower > self.upper {
            return Err(SetupError::InvalidVariable {
                index,
                message: format!("lower bound {} exceeds upper bound {}", self.lower, self.upper),
            });
        }
        let (lower, upper) = self.admissible();
        if lower > upper {
            return Err(SetupError::InvalidVariable {
                index,
                message: format!("no integer lies within [{}, {}]", self.lower, self.upper),
            });
        }
        Ok(())
    }
}

/// Convert a solver coordinate into a decimal parameter.
pub fn to_decimal(value: f64) -> Result<Decimal, SolverError> {
    Decimal::from_f64(value).ok_or(SolverError::Conversion { value })
}

/// Convert a decimal parameter into a solver coordinate.
pub fn to_f64(value: &Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// True when `parameters` has one in-bounds entry per variable.
pub fn parameters_within_bounds(variables: &[Variable], parameters: &[Decimal]) -> bool {
    variables.len() == parameters.len()
        && variables.iter().zip(parameters).all(|(v, p)| v.contains(p))
}
