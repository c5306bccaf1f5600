//! Spin coupling in the Zemach tensor formalism for spin-zero final states.

use pwa_cache::{AccessorIndex, CachedValues, Event, ValueKind};
use pwa_combination::Equiv;
use pwa_core::errors::PwaError;
use pwa_core::{AccessorId, CachedValueId, CombinationId, FourMomentum};

use crate::eval::Evaluator;
use crate::kinematics::{combined_momentum, minkowski_dot, two_daughters};

/// Legendre polynomial `P_l(x)` by upward recurrence.
pub fn legendre(l: u32, x: f64) -> f64 {
    match l {
        0 => 1.0,
        1 => x,
        _ => {
            let (mut previous, mut current) = (1.0, x);
            for n in 1..l {
                let n = f64::from(n);
                let next = ((2.0 * n + 1.0) * x * current - n * previous) / (n + 1.0);
                previous = current;
                current = next;
            }
            current
        }
    }
}

/// Zemach factor `(|pa| |pc|)^l P_l(cos θ)` evaluated in the rest frame of
/// `pa + pb`, where θ is the angle between daughter `a` and the spectator `c`.
///
/// Only Lorentz invariants are used, so no explicit boost is needed.
pub fn zemach_factor(l: u32, pa: &FourMomentum, pb: &FourMomentum, pc: &FourMomentum) -> f64 {
    if l == 0 {
        return 1.0;
    }
    let r = pa + pb;
    let m2_r = minkowski_dot(&r, &r);
    if m2_r <= 0.0 {
        return f64::NAN;
    }
    let m_r = m2_r.sqrt();
    let e_a = minkowski_dot(pa, &r) / m_r;
    let e_c = minkowski_dot(pc, &r) / m_r;
    let p2_a = e_a * e_a - minkowski_dot(pa, pa);
    let p2_c = e_c * e_c - minkowski_dot(pc, pc);
    let magnitude = (p2_a.max(0.0) * p2_c.max(0.0)).sqrt();
    if magnitude == 0.0 {
        return 0.0;
    }
    let cos_theta = ((e_a * e_c - minkowski_dot(pa, pc)) / magnitude).clamp(-1.0, 1.0);
    magnitude.powi(l as i32) * legendre(l, cos_theta)
}

/// Cached spin factor for one orbital angular momentum, shared by every
/// channel with that `L`.
///
/// Combinations are grouped up and down since the spectator comes from the
/// parent combination. The factor is one for combinations without a parent.
#[derive(Debug, Clone)]
pub struct SpinCoupling {
    accessor: AccessorId,
    l: u32,
    value: CachedValueId,
}

impl SpinCoupling {
    pub(crate) fn register(index: &mut AccessorIndex, values: &mut CachedValues, l: u32) -> Result<Self, PwaError> {
        let accessor = index.register(format!("spin coupling L = {l}"), Equiv::UpAndDown)?;
        let value = values.add(index, accessor, "zemach", ValueKind::Real)?;
        Ok(Self { accessor, l, value })
    }

    /// Accessor owning the cached factor.
    pub fn accessor(&self) -> AccessorId {
        self.accessor
    }

    /// Orbital angular momentum.
    pub fn l(&self) -> u32 {
        self.l
    }

    /// Cached factor.
    pub fn value(&self) -> CachedValueId {
        self.value
    }

    /// Spin factor for a two-daughter `combination`.
    pub fn amplitude(
        &self,
        ev: &Evaluator<'_>,
        event: &mut Event,
        combination: CombinationId,
    ) -> Result<f64, PwaError> {
        ev.cached_real(self.value, combination, event, |event| {
            let registry = ev.registry();
            let record = registry.get(combination)?;
            if self.l == 0 || record.parent().is_none() {
                return Ok(1.0);
            }
            let [a, b] = two_daughters(record.daughters(), combination)?;
            let spectator: Vec<usize> = registry
                .siblings(combination)?
                .iter()
                .map(|sibling| registry.get(*sibling).map(|s| s.indices().to_vec()))
                .collect::<Result<Vec<_>, _>>()?
                .concat();
            let pa = combined_momentum(event, registry.get(a)?.indices())?;
            let pb = combined_momentum(event, registry.get(b)?.indices())?;
            let pc = combined_momentum(event, &spectator)?;
            Ok(zemach_factor(self.l, &pa, &pb, &pc))
        })
    }
}
