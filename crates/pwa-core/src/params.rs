//! Fit-parameter store shared by every cached value of a model.
//!
//! Parameters are addressed by [`ParameterId`] handles so that dependency
//! declarations stay store-relative and the store itself can be cloned,
//! checkpointed or swapped independently of the decay tree.

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, PwaError};
use crate::{Complex64, ParameterId};

/// Value held by a fit parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum ParameterValue {
    /// Real valued parameter (masses, widths, radial sizes).
    Real(f64),
    /// Complex valued parameter (free channel amplitudes).
    Complex(Complex64),
}

impl ParameterValue {
    /// Returns the value as a complex number (imaginary part zero for reals).
    pub fn as_complex(&self) -> Complex64 {
        match self {
            ParameterValue::Real(value) => Complex64::new(*value, 0.0),
            ParameterValue::Complex(value) => *value,
        }
    }

    fn same_kind(&self, other: &ParameterValue) -> bool {
        matches!(
            (self, other),
            (ParameterValue::Real(_), ParameterValue::Real(_))
                | (ParameterValue::Complex(_), ParameterValue::Complex(_))
        )
    }

    fn kind_str(&self) -> &'static str {
        match self {
            ParameterValue::Real(_) => "real",
            ParameterValue::Complex(_) => "complex",
        }
    }
}

/// Change-tracking status of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariableStatus {
    /// Immutable for the run; dependents survive pass resets.
    Fixed,
    /// Value changed since the last completed pass.
    Changed,
    /// Value unchanged since the last completed pass.
    Unchanged,
}

/// A single named fit parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    value: ParameterValue,
    fixed: bool,
    changed: bool,
}

impl Parameter {
    /// Name of the parameter.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value.
    pub fn value(&self) -> ParameterValue {
        self.value
    }

    /// Whether the parameter is flagged immutable for the run.
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Current change-tracking status. An explicit change is reported even
    /// for fixed parameters so that their dependents get invalidated.
    pub fn status(&self) -> VariableStatus {
        if self.changed {
            VariableStatus::Changed
        } else if self.fixed {
            VariableStatus::Fixed
        } else {
            VariableStatus::Unchanged
        }
    }
}

/// Ordered store of all fit parameters of a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterStore {
    parameters: Vec<Parameter>,
}

impl ParameterStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered parameters.
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Registers a free (adjustable) parameter.
    pub fn add_free(&mut self, name: impl Into<String>, value: ParameterValue) -> ParameterId {
        self.push(name.into(), value, false)
    }

    /// Registers a parameter that is fixed for the run.
    pub fn add_fixed(&mut self, name: impl Into<String>, value: ParameterValue) -> ParameterId {
        self.push(name.into(), value, true)
    }

    fn push(&mut self, name: String, value: ParameterValue, fixed: bool) -> ParameterId {
        let id = ParameterId::from_raw(self.parameters.len() as u32);
        self.parameters.push(Parameter {
            name,
            value,
            fixed,
            changed: false,
        });
        id
    }

    /// Returns the parameter behind `id`.
    pub fn get(&self, id: ParameterId) -> Result<&Parameter, PwaError> {
        self.parameters
            .get(id.index())
            .ok_or_else(|| unknown_parameter(id))
    }

    fn get_mut(&mut self, id: ParameterId) -> Result<&mut Parameter, PwaError> {
        self.parameters
            .get_mut(id.index())
            .ok_or_else(|| unknown_parameter(id))
    }

    /// Returns the real value of a parameter.
    pub fn real(&self, id: ParameterId) -> Result<f64, PwaError> {
        match self.get(id)?.value {
            ParameterValue::Real(value) => Ok(value),
            ParameterValue::Complex(_) => Err(PwaError::Parameter(
                ErrorInfo::new("wrong-parameter-kind", "parameter is complex, expected real")
                    .with_context("parameter", id.as_raw()),
            )),
        }
    }

    /// Returns the value of a parameter as a complex number.
    pub fn complex(&self, id: ParameterId) -> Result<Complex64, PwaError> {
        Ok(self.get(id)?.value.as_complex())
    }

    /// Sets the value of a parameter, recording the change when it differs.
    pub fn set(&mut self, id: ParameterId, value: ParameterValue) -> Result<(), PwaError> {
        let parameter = self.get_mut(id)?;
        if !parameter.value.same_kind(&value) {
            return Err(PwaError::Parameter(
                ErrorInfo::new("wrong-parameter-kind", "parameter kind cannot change")
                    .with_context("parameter", id.as_raw())
                    .with_context("expected", parameter.value.kind_str())
                    .with_context("found", value.kind_str()),
            ));
        }
        if parameter.value != value {
            parameter.value = value;
            parameter.changed = true;
        }
        Ok(())
    }

    /// Flags a parameter as immutable for the run.
    pub fn fix(&mut self, id: ParameterId) -> Result<(), PwaError> {
        self.get_mut(id)?.fixed = true;
        Ok(())
    }

    /// Makes a parameter adjustable again.
    pub fn release(&mut self, id: ParameterId) -> Result<(), PwaError> {
        self.get_mut(id)?.fixed = false;
        Ok(())
    }

    /// Whether the parameter is fixed. Unknown identifiers report `false`.
    pub fn is_fixed(&self, id: ParameterId) -> bool {
        self.parameters
            .get(id.index())
            .map(|parameter| parameter.fixed)
            .unwrap_or(false)
    }

    /// Identifiers of all parameters changed since the last completed pass.
    pub fn changed(&self) -> Vec<ParameterId> {
        self.iter()
            .filter(|(_, parameter)| parameter.changed)
            .map(|(id, _)| id)
            .collect()
    }

    /// Clears all change flags; called after every partition has been evaluated.
    pub fn mark_unchanged(&mut self) {
        for parameter in &mut self.parameters {
            parameter.changed = false;
        }
    }

    /// Identifiers of all free complex parameters, in registration order.
    pub fn free_complex(&self) -> Vec<ParameterId> {
        self.iter()
            .filter(|(_, parameter)| {
                !parameter.fixed && matches!(parameter.value, ParameterValue::Complex(_))
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Iterates over `(id, parameter)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ParameterId, &Parameter)> + '_ {
        self.parameters
            .iter()
            .enumerate()
            .map(|(index, parameter)| (ParameterId::from_raw(index as u32), parameter))
    }
}

fn unknown_parameter(id: ParameterId) -> PwaError {
    PwaError::Parameter(
        ErrorInfo::new("unknown-parameter", "parameter does not exist")
            .with_context("parameter", id.as_raw()),
    )
}
