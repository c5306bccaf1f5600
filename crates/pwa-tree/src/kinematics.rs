//! Four-vector helpers and the cached kinematic accessors every decay tree carries.

use nalgebra::Vector3;
use pwa_cache::{AccessorIndex, CachedValues, Event, ValueKind};
use pwa_combination::Equiv;
use pwa_core::errors::PwaError;
use pwa_core::{AccessorId, CachedValueId, CombinationId, FourMomentum};

use crate::eval::Evaluator;

/// Minkowski product with metric `(+, -, -, -)`.
pub fn minkowski_dot(a: &FourMomentum, b: &FourMomentum) -> f64 {
    a[0] * b[0] - a[1] * b[1] - a[2] * b[2] - a[3] * b[3]
}

/// Sum of the momenta of the final-state constituents at `indices`.
pub fn combined_momentum(event: &Event, indices: &[usize]) -> Result<FourMomentum, PwaError> {
    let mut total = FourMomentum::zeros();
    for index in indices {
        total += event.momentum(*index)?;
    }
    Ok(total)
}

/// Squared breakup momentum of a two-body decay of invariant mass squared `m2_r`.
pub fn breakup_momentum_squared(m2_r: f64, m_a: f64, m_b: f64) -> f64 {
    if m_a == m_b {
        return m2_r / 4.0 - m_a * m_a;
    }
    (m2_r - (m_a + m_b).powi(2)) * (m2_r - (m_a - m_b).powi(2)) / m2_r / 4.0
}

/// Lorentz boost of `p` by velocity `beta`.
pub fn boost(p: &FourMomentum, beta: &Vector3<f64>) -> FourMomentum {
    let b2 = beta.norm_squared();
    if b2 == 0.0 {
        return *p;
    }
    let gamma = 1.0 / (1.0 - b2).sqrt();
    let spatial = Vector3::new(p[1], p[2], p[3]);
    let bp = beta.dot(&spatial);
    let factor = (gamma - 1.0) * bp / b2 + gamma * p[0];
    let boosted = spatial + beta * factor;
    FourMomentum::new(gamma * (p[0] + bp), boosted[0], boosted[1], boosted[2])
}

/// Measured invariant mass squared and breakup momentum squared.
///
/// The mass accessor groups combinations by orderless content, the breakup
/// accessor by the orderless content of each daughter. Neither depends on a
/// parameter, so their values persist across passes until an event's
/// momenta change.
#[derive(Debug, Clone)]
pub struct Kinematics {
    mass_accessor: AccessorId,
    mass_squared: CachedValueId,
    breakup_accessor: AccessorId,
    breakup_squared: CachedValueId,
}

impl Kinematics {
    pub(crate) fn register(index: &mut AccessorIndex, values: &mut CachedValues) -> Result<Self, PwaError> {
        let mass_accessor = index.register("measured masses", Equiv::OrderlessContent)?;
        let mass_squared = values.add(index, mass_accessor, "m2", ValueKind::Real)?;
        let breakup_accessor = index.register("measured breakup momenta", Equiv::DownByOrderlessContent)?;
        let breakup_squared = values.add(index, breakup_accessor, "q2", ValueKind::Real)?;
        values.depend_on_value(breakup_squared, mass_squared)?;
        Ok(Self {
            mass_accessor,
            mass_squared,
            breakup_accessor,
            breakup_squared,
        })
    }

    /// Accessor caching invariant masses.
    pub fn mass_accessor(&self) -> AccessorId {
        self.mass_accessor
    }

    /// Cached invariant mass squared value.
    pub fn mass_squared_value(&self) -> CachedValueId {
        self.mass_squared
    }

    /// Accessor caching breakup momenta.
    pub fn breakup_accessor(&self) -> AccessorId {
        self.breakup_accessor
    }

    /// Cached breakup momentum squared value.
    pub fn breakup_squared_value(&self) -> CachedValueId {
        self.breakup_squared
    }

    /// Invariant mass squared of `combination` in `event`.
    pub fn mass_squared(
        &self,
        ev: &Evaluator<'_>,
        event: &mut Event,
        combination: CombinationId,
    ) -> Result<f64, PwaError> {
        ev.cached_real(self.mass_squared, combination, event, |event| {
            let indices = ev.registry().get(combination)?.indices();
            let p = combined_momentum(event, indices)?;
            Ok(minkowski_dot(&p, &p))
        })
    }

    /// Invariant mass of `combination`, clamping rounding noise below zero.
    pub fn mass(&self, ev: &Evaluator<'_>, event: &mut Event, combination: CombinationId) -> Result<f64, PwaError> {
        Ok(self.mass_squared(ev, event, combination)?.max(0.0).sqrt())
    }

    /// Breakup momentum squared of a two-daughter `combination`.
    pub fn breakup_momentum_squared(
        &self,
        ev: &Evaluator<'_>,
        event: &mut Event,
        combination: CombinationId,
    ) -> Result<f64, PwaError> {
        ev.cached_real(self.breakup_squared, combination, event, |event| {
            let record = ev.registry().get(combination)?;
            let [a, b] = two_daughters(record.daughters(), combination)?;
            let m2_r = self.mass_squared(ev, event, combination)?;
            let m_a = self.mass(ev, event, a)?;
            let m_b = self.mass(ev, event, b)?;
            Ok(breakup_momentum_squared(m2_r, m_a, m_b))
        })
    }
}

pub(crate) fn two_daughters(
    daughters: &[CombinationId],
    combination: CombinationId,
) -> Result<[CombinationId; 2], PwaError> {
    match daughters {
        [a, b] => Ok([*a, *b]),
        _ => Err(PwaError::Protocol(
            pwa_core::ErrorInfo::new("not-two-body", "combination does not have exactly two daughters")
                .with_context("combination", combination.as_raw())
                .with_context("daughters", daughters.len()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakup_momentum_matches_equal_mass_shortcut() {
        let general = breakup_momentum_squared(1.0, 0.1396, 0.13960001);
        let shortcut = breakup_momentum_squared(1.0, 0.1396, 0.1396);
        assert!((general - shortcut).abs() < 1e-6);
        assert!(breakup_momentum_squared(0.01, 0.1396, 0.1396) < 0.0);
    }

    #[test]
    fn boost_preserves_invariant_mass() {
        let p = FourMomentum::new(1.2, 0.3, -0.4, 0.5);
        let boosted = boost(&p, &Vector3::new(0.2, 0.1, -0.6));
        assert!((minkowski_dot(&p, &p) - minkowski_dot(&boosted, &boosted)).abs() < 1e-12);
        let rest = FourMomentum::new(0.5, 0.0, 0.0, 0.0);
        let moving = boost(&rest, &Vector3::new(0.0, 0.0, 0.6));
        assert!((moving[3] - 0.5 * 0.6 / 0.8).abs() < 1e-12);
    }
}
