//! Fit-facing view of a model: free amplitudes flattened into a real vector.

use pwa_core::errors::{ErrorInfo, PwaError};
use pwa_core::{Complex64, ParameterId, ParameterValue};

use crate::model::Model;

impl Model {
    /// Free complex parameters in registration order.
    pub fn free_amplitudes(&self) -> Vec<ParameterId> {
        self.params().free_complex()
    }

    /// Current free amplitudes as `[re0, im0, re1, im1, ...]`.
    pub fn parameter_vector(&self) -> Result<Vec<f64>, PwaError> {
        let mut x = Vec::new();
        for id in self.free_amplitudes() {
            let value = self.params().complex(id)?;
            x.push(value.re);
            x.push(value.im);
        }
        Ok(x)
    }

    /// Writes `[re0, im0, re1, im1, ...]` back into the free amplitudes.
    pub fn set_parameter_vector(&mut self, x: &[f64]) -> Result<(), PwaError> {
        let free = self.free_amplitudes();
        if x.len() != 2 * free.len() {
            return Err(PwaError::Parameter(
                ErrorInfo::new("wrong-parameter-count", "vector length must be twice the free amplitude count")
                    .with_context("expected", 2 * free.len())
                    .with_context("found", x.len()),
            ));
        }
        for (id, pair) in free.into_iter().zip(x.chunks_exact(2)) {
            self.set_parameter(id, ParameterValue::Complex(Complex64::new(pair[0], pair[1])))?;
        }
        Ok(())
    }

    /// Sum of `ln |A|²` over the dataset at the free amplitudes `x`.
    pub fn log_likelihood(&mut self, x: &[f64]) -> Result<f64, PwaError> {
        self.set_parameter_vector(x)?;
        Ok(self.sum_of_log_intensity()?.total)
    }
}
