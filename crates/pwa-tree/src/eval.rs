//! Per-partition evaluation context of a frozen decay tree.

use pwa_cache::{Event, StatusTable};
use pwa_combination::CombinationRegistry;
use pwa_core::errors::PwaError;
use pwa_core::{CachedValueId, CombinationId, Complex64, ParameterStore};

use crate::ids::{ChannelId, ParticleId};
use crate::kinematics::Kinematics;
use crate::tree::DecayTree;

/// Shared, read-only view used while evaluating the events of one partition.
///
/// The tree and parameters are shared between all partitions; the status
/// table belongs to exactly one partition. Event buffers are the only state
/// written during evaluation.
#[derive(Clone, Copy)]
pub struct Evaluator<'a> {
    tree: &'a DecayTree,
    params: &'a ParameterStore,
    status: &'a StatusTable,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator. The tree must be frozen.
    pub fn new(tree: &'a DecayTree, params: &'a ParameterStore, status: &'a StatusTable) -> Self {
        Self {
            tree,
            params,
            status,
        }
    }

    /// Decay tree under evaluation.
    pub fn tree(&self) -> &'a DecayTree {
        self.tree
    }

    /// Current fit parameters.
    pub fn params(&self) -> &'a ParameterStore {
        self.params
    }

    /// Combination registry of the tree.
    pub fn registry(&self) -> &'a CombinationRegistry {
        self.tree.registry()
    }

    /// Kinematic accessors of the tree.
    pub fn kinematics(&self) -> &'a Kinematics {
        self.tree.kinematics()
    }

    /// Memoized complex value; see [`StatusTable::get_or_compute`].
    pub fn cached<F>(
        &self,
        value: CachedValueId,
        combination: CombinationId,
        event: &mut Event,
        compute: F,
    ) -> Result<Complex64, PwaError>
    where
        F: FnOnce(&mut Event) -> Result<Complex64, PwaError>,
    {
        self.status.get_or_compute(
            self.tree.accessors(),
            self.tree.values(),
            value,
            combination,
            event,
            compute,
        )
    }

    /// Memoized real value.
    pub fn cached_real<F>(
        &self,
        value: CachedValueId,
        combination: CombinationId,
        event: &mut Event,
        compute: F,
    ) -> Result<f64, PwaError>
    where
        F: FnOnce(&mut Event) -> Result<f64, PwaError>,
    {
        self.status.get_or_compute_real(
            self.tree.accessors(),
            self.tree.values(),
            value,
            combination,
            event,
            compute,
        )
    }

    /// Amplitude of `particle` for `combination`.
    pub fn particle_amplitude(
        &self,
        event: &mut Event,
        particle: ParticleId,
        combination: CombinationId,
    ) -> Result<Complex64, PwaError> {
        self.tree.particle(particle)?.amplitude(self, event, combination)
    }

    /// Amplitude of `channel` for `combination`, without its free amplitude.
    pub fn channel_amplitude(
        &self,
        event: &mut Event,
        channel: ChannelId,
        combination: CombinationId,
    ) -> Result<Complex64, PwaError> {
        self.tree.channel(channel)?.amplitude(self, event, combination)
    }

    /// Total amplitude of an event: the initial-state amplitude summed over
    /// every top-level combination.
    ///
    /// With spin-zero final states the spin-projection sum has a single term.
    pub fn amplitude(&self, event: &mut Event) -> Result<Complex64, PwaError> {
        let isp = self.tree.initial_state()?;
        let mut total = Complex64::new(0.0, 0.0);
        for combination in self.tree.top_level_combinations() {
            total += self.particle_amplitude(event, isp, *combination)?;
        }
        Ok(total)
    }

    /// `ln |A|^2` of an event; not finite for kinematically forbidden events.
    pub fn log_intensity(&self, event: &mut Event) -> Result<f64, PwaError> {
        Ok(self.amplitude(event)?.norm_sqr().ln())
    }
}
