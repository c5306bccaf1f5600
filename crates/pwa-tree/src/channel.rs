//! Two-body decay channels.

use pwa_cache::Event;
use pwa_core::errors::PwaError;
use pwa_core::{AccessorId, CachedValueId, CombinationId, Complex64, ParameterId};
use tracing::debug;

use crate::barrier::BarrierFactor;
use crate::eval::Evaluator;
use crate::ids::ParticleId;

/// A decay of a parent particle into an ordered pair of daughters.
#[derive(Debug, Clone)]
pub struct DecayChannel {
    pub(crate) label: String,
    pub(crate) parent: ParticleId,
    pub(crate) daughters: Vec<ParticleId>,
    pub(crate) l: u32,
    pub(crate) two_s: u32,
    pub(crate) barrier: BarrierFactor,
    pub(crate) spin: usize,
    pub(crate) accessor: AccessorId,
    pub(crate) value: CachedValueId,
    pub(crate) free_amplitude: ParameterId,
    pub(crate) prototypes: Vec<CombinationId>,
}

impl DecayChannel {
    /// Human readable `parent -> a b (L = l)` label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Decaying parent.
    pub fn parent(&self) -> ParticleId {
        self.parent
    }

    /// Ordered daughters.
    pub fn daughters(&self) -> &[ParticleId] {
        &self.daughters
    }

    /// Orbital angular momentum.
    pub fn l(&self) -> u32 {
        self.l
    }

    /// Doubled total spin of the daughters.
    pub fn two_s(&self) -> u32 {
        self.two_s
    }

    /// Barrier factor.
    pub fn barrier(&self) -> &BarrierFactor {
        &self.barrier
    }

    /// Position of the shared spin coupling inside the tree.
    pub fn spin_coupling(&self) -> usize {
        self.spin
    }

    /// Accessor caching the channel amplitude.
    pub fn accessor(&self) -> AccessorId {
        self.accessor
    }

    /// Cached channel amplitude (without the free amplitude).
    pub fn value(&self) -> CachedValueId {
        self.value
    }

    /// Free complex amplitude parameter.
    pub fn free_amplitude(&self) -> ParameterId {
        self.free_amplitude
    }

    /// Parentless combinations produced by this channel.
    pub fn prototypes(&self) -> &[CombinationId] {
        &self.prototypes
    }

    /// Barrier factor times spin factor times every daughter amplitude.
    ///
    /// Daughters are skipped entirely when barrier times spin is zero.
    pub fn amplitude(
        &self,
        ev: &Evaluator<'_>,
        event: &mut Event,
        combination: CombinationId,
    ) -> Result<Complex64, PwaError> {
        ev.cached(self.value, combination, event, |event| {
            let barrier = self.barrier.amplitude(ev, event, combination)?;
            let spin = ev
                .tree()
                .spin_coupling(self.spin)?
                .amplitude(ev, event, combination)?;
            let mut amplitude = Complex64::new(barrier * spin, 0.0);
            if amplitude == Complex64::new(0.0, 0.0) {
                return Ok(amplitude);
            }
            let daughters = ev.registry().get(combination)?.daughters();
            for (particle, daughter) in self.daughters.iter().zip(daughters) {
                amplitude *= ev.particle_amplitude(event, *particle, *daughter)?;
            }
            debug!(channel = %self.label, re = amplitude.re, im = amplitude.im, "channel recomputed");
            Ok(amplitude)
        })
    }
}
