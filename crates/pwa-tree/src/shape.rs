//! Resonance lineshapes.

use pwa_cache::{AccessorIndex, CachedValues, Event, ValueKind};
use pwa_combination::Equiv;
use pwa_core::errors::PwaError;
use pwa_core::{AccessorId, CachedValueId, CombinationId, Complex64, ParameterId, ParameterStore, ParameterValue};
use tracing::debug;

use crate::eval::Evaluator;
use crate::kinematics::Kinematics;
use crate::quantum::ShapeSpec;

/// Relativistic Breit-Wigner `1 / (M² - m² - i M Γ)`.
#[derive(Debug, Clone)]
pub struct BreitWigner {
    accessor: AccessorId,
    value: CachedValueId,
    mass: ParameterId,
    width: ParameterId,
}

impl BreitWigner {
    /// Accessor owning the cached lineshape.
    pub fn accessor(&self) -> AccessorId {
        self.accessor
    }

    /// Cached lineshape value.
    pub fn value(&self) -> CachedValueId {
        self.value
    }

    /// Nominal mass parameter.
    pub fn mass(&self) -> ParameterId {
        self.mass
    }

    /// Width parameter.
    pub fn width(&self) -> ParameterId {
        self.width
    }
}

/// Lineshape of a decaying particle.
#[derive(Debug, Clone)]
pub enum MassShape {
    /// Constant one; owns no storage.
    Flat,
    /// Cached relativistic Breit-Wigner.
    BreitWigner(BreitWigner),
}

impl MassShape {
    pub(crate) fn register(
        index: &mut AccessorIndex,
        values: &mut CachedValues,
        params: &mut ParameterStore,
        kinematics: &Kinematics,
        name: &str,
        spec: &ShapeSpec,
        mass: ParameterId,
    ) -> Result<Self, PwaError> {
        match spec {
            ShapeSpec::Flat => Ok(MassShape::Flat),
            ShapeSpec::BreitWigner { width } => {
                let accessor = index.register(format!("breit-wigner {name}"), Equiv::OrderlessContent)?;
                let value = values.add(index, accessor, "T", ValueKind::Complex)?;
                let width = params.add_fixed(format!("{name}.width"), ParameterValue::Real(*width));
                values.depend_on_value(value, kinematics.mass_squared_value())?;
                values.depend_on_parameter(value, mass)?;
                values.depend_on_parameter(value, width)?;
                Ok(MassShape::BreitWigner(BreitWigner {
                    accessor,
                    value,
                    mass,
                    width,
                }))
            }
        }
    }

    /// Accessor owning the lineshape, if it caches anything.
    pub fn accessor(&self) -> Option<AccessorId> {
        match self {
            MassShape::Flat => None,
            MassShape::BreitWigner(bw) => Some(bw.accessor),
        }
    }

    /// Cached lineshape value, if any.
    pub fn value(&self) -> Option<CachedValueId> {
        match self {
            MassShape::Flat => None,
            MassShape::BreitWigner(bw) => Some(bw.value),
        }
    }

    /// Lineshape for `combination`.
    pub fn amplitude(
        &self,
        ev: &Evaluator<'_>,
        event: &mut Event,
        combination: CombinationId,
    ) -> Result<Complex64, PwaError> {
        match self {
            MassShape::Flat => Ok(Complex64::new(1.0, 0.0)),
            MassShape::BreitWigner(bw) => ev.cached(bw.value, combination, event, |event| {
                let m = ev.params().real(bw.mass)?;
                let w = ev.params().real(bw.width)?;
                let m2 = ev.kinematics().mass_squared(ev, event, combination)?;
                let t = Complex64::new(1.0, 0.0) / Complex64::new(m * m - m2, -m * w);
                debug!(m2, re = t.re, im = t.im, "breit-wigner recomputed");
                Ok(t)
            }),
        }
    }
}
