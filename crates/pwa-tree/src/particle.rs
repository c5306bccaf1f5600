//! Final-state and decaying particles.

use pwa_cache::Event;
use pwa_core::errors::PwaError;
use pwa_core::{AccessorId, CachedValueId, CombinationId, Complex64, ParameterId};

use crate::eval::Evaluator;
use crate::ids::ChannelId;
use crate::quantum::QuantumNumbers;
use crate::shape::MassShape;

/// Storage and children of a decaying particle.
#[derive(Debug, Clone)]
pub struct Decaying {
    pub(crate) radial_size: ParameterId,
    pub(crate) shape: MassShape,
    pub(crate) accessor: AccessorId,
    pub(crate) value: CachedValueId,
    pub(crate) channels: Vec<ChannelId>,
}

impl Decaying {
    /// Radial size parameter used by barrier factors of its channels.
    pub fn radial_size(&self) -> ParameterId {
        self.radial_size
    }

    /// Lineshape.
    pub fn shape(&self) -> &MassShape {
        &self.shape
    }

    /// Accessor caching the particle amplitude.
    pub fn accessor(&self) -> AccessorId {
        self.accessor
    }

    /// Cached particle amplitude.
    pub fn value(&self) -> CachedValueId {
        self.value
    }

    /// Decay channels in registration order.
    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }
}

/// What kind of node a particle is.
#[derive(Debug, Clone)]
pub enum ParticleKind {
    /// Final-state constituent occupying the listed input positions.
    FinalState {
        /// Input positions; more than one for identical particles.
        positions: Vec<usize>,
    },
    /// Particle decaying through one or more channels.
    Decaying(Decaying),
}

/// A node of the decay tree.
#[derive(Debug, Clone)]
pub struct Particle {
    pub(crate) name: String,
    pub(crate) quantum: QuantumNumbers,
    pub(crate) mass: ParameterId,
    pub(crate) kind: ParticleKind,
    pub(crate) prototypes: Vec<CombinationId>,
}

impl Particle {
    /// Name of the particle.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spin and charge.
    pub fn quantum(&self) -> QuantumNumbers {
        self.quantum
    }

    /// Nominal mass parameter.
    pub fn mass(&self) -> ParameterId {
        self.mass
    }

    /// Kind of the particle.
    pub fn kind(&self) -> &ParticleKind {
        &self.kind
    }

    /// Decaying part, if any.
    pub fn decaying(&self) -> Option<&Decaying> {
        match &self.kind {
            ParticleKind::Decaying(decaying) => Some(decaying),
            ParticleKind::FinalState { .. } => None,
        }
    }

    /// Parentless combinations this particle can be produced as.
    pub fn prototypes(&self) -> &[CombinationId] {
        &self.prototypes
    }

    /// Amplitude for `combination`: one for final-state particles, otherwise
    /// the lineshape times the sum over every channel holding a slot for the
    /// combination, each weighted by its free amplitude.
    pub fn amplitude(
        &self,
        ev: &Evaluator<'_>,
        event: &mut Event,
        combination: CombinationId,
    ) -> Result<Complex64, PwaError> {
        let decaying = match &self.kind {
            ParticleKind::FinalState { .. } => return Ok(Complex64::new(1.0, 0.0)),
            ParticleKind::Decaying(decaying) => decaying,
        };
        ev.cached(decaying.value, combination, event, |event| {
            let tree = ev.tree();
            let mut sum = Complex64::new(0.0, 0.0);
            for channel_id in &decaying.channels {
                let channel = tree.channel(*channel_id)?;
                if !tree.accessors().has_slot(channel.accessor(), combination) {
                    continue;
                }
                let free = ev.params().complex(channel.free_amplitude())?;
                sum += ev.channel_amplitude(event, *channel_id, combination)? * free;
            }
            if sum == Complex64::new(0.0, 0.0) {
                return Ok(sum);
            }
            Ok(decaying.shape.amplitude(ev, event, combination)? * sum)
        })
    }
}
