use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::SolverError;

/// A named, fixed set of numeric tuning parameters owned by a solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    name: String,
    settings: BTreeMap<String, f64>,
}

impl Preset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &BTreeMap<String, f64> {
        &self.settings
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.settings.get(key).copied()
    }

    pub fn require(&self, key: &str) -> Result<f64, SolverError> {
        self.get(key).ok_or_else(|| SolverError::MissingSetting {
            key: key.to_string(),
        })
    }

    /// Copy of this preset with `overrides` applied. Keys the preset does not
    /// define are rejected.
    pub fn overridden<'a, I>(&self, overrides: I) -> Result<Preset, SolverError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut settings = self.settings.clone();
        for (key, value) in overrides {
            match settings.get_mut(key) {
                Some(slot) => *slot = value,
                None => {
                    return Err(SolverError::InvalidSetting {
                        key: key.to_string(),
                        message: format!("not a setting of preset {}", self.name),
                    })
                }
            }
        }
        Ok(Preset {
            name: self.name.clone(),
            settings,
        })
    }
}
