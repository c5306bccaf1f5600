//! Blatt-Weisskopf barrier factors.

use pwa_cache::{AccessorIndex, CachedValues, Event, ValueKind};
use pwa_combination::Equiv;
use pwa_core::errors::{ErrorInfo, PwaError};
use pwa_core::{AccessorId, CachedValueId, CombinationId, ParameterId};
use tracing::debug;

use crate::eval::Evaluator;
use crate::kinematics::{breakup_momentum_squared, two_daughters, Kinematics};

/// Highest orbital angular momentum with a closed-form barrier function.
pub const MAX_BARRIER_ORDER: u32 = 2;

/// Squared Blatt-Weisskopf barrier function `F²(l, z)` with `z = R² q²`.
pub fn f2(l: u32, z: f64) -> Result<f64, PwaError> {
    match l {
        0 => Ok(1.0),
        1 => Ok(1.0 + z),
        2 => Ok(9.0 + 3.0 * z + z * z),
        _ => Err(PwaError::Construction(
            ErrorInfo::new(
                "unsupported-barrier-order",
                "barrier factors have no closed form above L = 2",
            )
            .with_context("l", l)
            .with_context("max", MAX_BARRIER_ORDER),
        )),
    }
}

/// Barrier factor of one decay channel: `F(q_nominal) / F(q_measured)`.
///
/// Both halves are cached separately. The nominal half uses the parent's
/// nominal mass with the daughters' measured masses; the measured half uses
/// the event's breakup momentum. A negative measured `q²` (below threshold)
/// yields NaN.
#[derive(Debug, Clone)]
pub struct BarrierFactor {
    accessor: AccessorId,
    l: u32,
    parent_mass: ParameterId,
    radial_size: ParameterId,
    nominal: CachedValueId,
    measured: CachedValueId,
}

impl BarrierFactor {
    pub(crate) fn register(
        index: &mut AccessorIndex,
        values: &mut CachedValues,
        kinematics: &Kinematics,
        label: &str,
        l: u32,
        parent_mass: ParameterId,
        radial_size: ParameterId,
    ) -> Result<Self, PwaError> {
        f2(l, 0.0)?;
        let accessor = index.register(format!("barrier {label}"), Equiv::DownByOrderlessContent)?;
        let nominal = values.add(index, accessor, "F(q nominal)", ValueKind::Real)?;
        let measured = values.add(index, accessor, "F(q measured)", ValueKind::Real)?;
        values.depend_on_value(nominal, kinematics.mass_squared_value())?;
        values.depend_on_parameter(nominal, parent_mass)?;
        values.depend_on_parameter(nominal, radial_size)?;
        values.depend_on_value(measured, kinematics.breakup_squared_value())?;
        values.depend_on_parameter(measured, radial_size)?;
        Ok(Self {
            accessor,
            l,
            parent_mass,
            radial_size,
            nominal,
            measured,
        })
    }

    /// Accessor owning both halves.
    pub fn accessor(&self) -> AccessorId {
        self.accessor
    }

    /// Orbital angular momentum.
    pub fn l(&self) -> u32 {
        self.l
    }

    /// Cached nominal half.
    pub fn nominal_value(&self) -> CachedValueId {
        self.nominal
    }

    /// Cached measured half.
    pub fn measured_value(&self) -> CachedValueId {
        self.measured
    }

    /// Barrier factor for a two-daughter `combination`.
    pub fn amplitude(
        &self,
        ev: &Evaluator<'_>,
        event: &mut Event,
        combination: CombinationId,
    ) -> Result<f64, PwaError> {
        let kinematics = ev.kinematics();
        let radius = ev.params().real(self.radial_size)?;

        let nominal = ev.cached_real(self.nominal, combination, event, |event| {
            let record = ev.registry().get(combination)?;
            let [a, b] = two_daughters(record.daughters(), combination)?;
            let m_r = ev.params().real(self.parent_mass)?;
            let m_a = kinematics.mass(ev, event, a)?;
            let m_b = kinematics.mass(ev, event, b)?;
            let q2 = breakup_momentum_squared(m_r * m_r, m_a, m_b);
            let f = f2(self.l, radius * radius * q2)?.sqrt();
            debug!(l = self.l, q2, f, "nominal barrier half recomputed");
            Ok(f)
        })?;

        let measured = ev.cached_real(self.measured, combination, event, |event| {
            let q2 = kinematics.breakup_momentum_squared(ev, event, combination)?;
            if q2 < 0.0 {
                return Ok(f64::NAN);
            }
            let f = f2(self.l, radius * radius * q2)?.sqrt();
            debug!(l = self.l, q2, f, "measured barrier half recomputed");
            Ok(f)
        })?;

        Ok(nominal / measured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_forms() {
        assert_eq!(f2(0, 4.0).unwrap(), 1.0);
        assert_eq!(f2(1, 4.0).unwrap(), 5.0);
        assert_eq!(f2(2, 4.0).unwrap(), 37.0);
    }

    #[test]
    fn higher_orders_are_unsupported() {
        let err = f2(3, 1.0).unwrap_err();
        assert!(matches!(err, PwaError::Construction(_)));
        assert_eq!(err.code(), "unsupported-barrier-order");
    }
}
