//! Deterministic three-body phase-space events.

use nalgebra::Vector3;
use pwa_core::errors::{ErrorInfo, PwaError};
use pwa_core::{FourMomentum, RngHandle};
use pwa_tree::kinematics::{boost, breakup_momentum_squared};
use rand::Rng;

// Accept-reject draws per event before giving up.
const MAX_ATTEMPTS: usize = 10_000;

/// Generator of three-body decays at rest, uniform in phase space.
///
/// Event `i` is drawn from substream `i` of the master seed, so a sample
/// does not depend on how many events are generated at once or in which
/// order.
#[derive(Debug, Clone)]
pub struct PhaseSpaceGenerator {
    parent_mass: f64,
    masses: [f64; 3],
    seed: u64,
    max_weight: f64,
}

impl PhaseSpaceGenerator {
    /// Creates a generator for `parent -> m0 m1 m2`.
    pub fn new(parent_mass: f64, masses: [f64; 3], seed: u64) -> Result<Self, PwaError> {
        let sum: f64 = masses.iter().sum();
        if masses.iter().any(|m| *m < 0.0) || sum >= parent_mass {
            return Err(PwaError::Data(
                ErrorInfo::new("forbidden-decay", "final-state masses leave no phase space")
                    .with_context("parent", parent_mass)
                    .with_context("sum", sum),
            ));
        }
        let [m0, m1, m2] = masses;
        // p shrinks and q grows with m01, so their extremes bound the weight
        let p_max = momentum(parent_mass * parent_mass, m0 + m1, m2);
        let q_max = momentum((parent_mass - m2).powi(2), m0, m1);
        Ok(Self {
            parent_mass,
            masses,
            seed,
            max_weight: p_max * q_max,
        })
    }

    /// Momenta of event `index`, in the order of the masses.
    pub fn event(&self, index: u64) -> Result<Vec<FourMomentum>, PwaError> {
        let mut rng = RngHandle::substream(self.seed, index);
        let [m0, m1, m2] = self.masses;
        let low = m0 + m1;
        let high = self.parent_mass - m2;
        for _ in 0..MAX_ATTEMPTS {
            let m01 = low + (high - low) * rng.gen::<f64>();
            let p = momentum(self.parent_mass * self.parent_mass, m01, m2);
            let q = momentum(m01 * m01, m0, m1);
            if rng.gen::<f64>() * self.max_weight > p * q {
                continue;
            }
            let direction = random_direction(&mut rng);
            let p01 = direction * p;
            let e01 = (m01 * m01 + p * p).sqrt();
            let spectator = on_shell(m2, -p01);

            let axis = random_direction(&mut rng);
            let in_rest_frame = [on_shell(m0, axis * q), on_shell(m1, -axis * q)];
            let beta = p01 / e01;
            return Ok(vec![
                boost(&in_rest_frame[0], &beta),
                boost(&in_rest_frame[1], &beta),
                spectator,
            ]);
        }
        Err(PwaError::Data(
            ErrorInfo::new("generation-exhausted", "accept-reject sampling did not converge")
                .with_context("event", index)
                .with_context("attempts", MAX_ATTEMPTS),
        ))
    }

    /// Events `0..count`.
    pub fn generate(&self, count: usize) -> Result<Vec<Vec<FourMomentum>>, PwaError> {
        (0..count as u64).map(|index| self.event(index)).collect()
    }
}

fn momentum(m2: f64, m_a: f64, m_b: f64) -> f64 {
    breakup_momentum_squared(m2, m_a, m_b).max(0.0).sqrt()
}

fn random_direction(rng: &mut RngHandle) -> Vector3<f64> {
    let cos_theta: f64 = 2.0 * rng.gen::<f64>() - 1.0;
    let phi = 2.0 * std::f64::consts::PI * rng.gen::<f64>();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    Vector3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

fn on_shell(mass: f64, p: Vector3<f64>) -> FourMomentum {
    FourMomentum::new((mass * mass + p.norm_squared()).sqrt(), p[0], p[1], p[2])
}
