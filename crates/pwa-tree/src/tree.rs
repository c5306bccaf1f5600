//! Decay-tree arena: construction, validation, traversal and freezing.

use std::collections::{BTreeMap, BTreeSet};

use pwa_cache::{AccessorIndex, CachedValues, StorageLayout, ValueKind};
use pwa_combination::{CombinationRegistry, Equiv};
use pwa_core::errors::{ErrorInfo, PwaError};
use pwa_core::{
    protocol_error, AccessorId, CombinationId, Complex64, ParameterStore, ParameterValue,
};
use tracing::info;

use crate::barrier::{f2, BarrierFactor};
use crate::channel::DecayChannel;
use crate::ids::{ChannelId, ParticleId};
use crate::kinematics::Kinematics;
use crate::particle::{Decaying, Particle, ParticleKind};
use crate::quantum::{coupled_spin, triangle, ChannelSpec, ParticleSpec};
use crate::shape::MassShape;
use crate::spin::SpinCoupling;

/// Node of the decay tree reached during a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Node {
    /// A particle.
    Particle(ParticleId),
    /// A decay channel.
    Channel(ChannelId),
}

/// A node together with the parent-linked combination it is reached with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Visit {
    /// Reached node.
    pub node: Node,
    /// Combination the node is evaluated for.
    pub combination: CombinationId,
}

/// Owner of every node of a decay topology and of the storage bookkeeping
/// they share.
///
/// Nodes live in arenas addressed by [`ParticleId`] and [`ChannelId`];
/// ownership runs top-down through channel and daughter lists and the only
/// upward links are the parent identifiers stored in channels and
/// combinations. The tree is built bottom-up (final state first), then
/// frozen once from the initial-state particle.
#[derive(Debug, Clone)]
pub struct DecayTree {
    registry: CombinationRegistry,
    accessors: AccessorIndex,
    values: CachedValues,
    kinematics: Kinematics,
    particles: Vec<Particle>,
    channels: Vec<DecayChannel>,
    spins: Vec<SpinCoupling>,
    spin_by_l: BTreeMap<u32, usize>,
    final_state: Vec<ParticleId>,
    initial_state: Option<ParticleId>,
    top_level: Vec<CombinationId>,
    layout: Option<StorageLayout>,
}

impl DecayTree {
    /// Creates an empty tree carrying the kinematic accessors.
    pub fn new() -> Result<Self, PwaError> {
        let mut accessors = AccessorIndex::new();
        let mut values = CachedValues::new();
        let kinematics = Kinematics::register(&mut accessors, &mut values)?;
        Ok(Self {
            registry: CombinationRegistry::new(),
            accessors,
            values,
            kinematics,
            particles: Vec::new(),
            channels: Vec::new(),
            spins: Vec::new(),
            spin_by_l: BTreeMap::new(),
            final_state: Vec::new(),
            initial_state: None,
            top_level: Vec::new(),
            layout: None,
        })
    }

    /// Declares the ordered final state. Entries sharing a name are the same
    /// (identical) particle occupying several positions.
    ///
    /// Returns the particle at every position.
    pub fn set_final_state(
        &mut self,
        params: &mut ParameterStore,
        specs: &[ParticleSpec],
    ) -> Result<Vec<ParticleId>, PwaError> {
        self.ensure_mutable()?;
        if !self.final_state.is_empty() {
            return Err(PwaError::Construction(ErrorInfo::new(
                "final-state-already-set",
                "the final state can only be declared once",
            )));
        }
        if specs.is_empty() {
            return Err(PwaError::Construction(ErrorInfo::new(
                "empty-final-state",
                "the final state needs at least one particle",
            )));
        }
        let mut first_by_name: BTreeMap<&str, &ParticleSpec> = BTreeMap::new();
        for spec in specs {
            if self.find_particle(&spec.name).is_some() {
                return Err(duplicate_particle(&spec.name));
            }
            let first = first_by_name.entry(spec.name.as_str()).or_insert(spec);
            if first.quantum != spec.quantum || first.mass != spec.mass {
                return Err(PwaError::Construction(
                    ErrorInfo::new(
                        "inconsistent-final-state",
                        "identically named final-state particles differ",
                    )
                    .with_context("name", &spec.name),
                ));
            }
        }

        let mut assigned = Vec::with_capacity(specs.len());
        let mut by_name: BTreeMap<String, ParticleId> = BTreeMap::new();
        for (position, spec) in specs.iter().enumerate() {
            let id = match by_name.get(&spec.name) {
                Some(id) => *id,
                None => {
                    let id = ParticleId::from_raw(self.particles.len() as u32);
                    let mass = params.add_fixed(format!("{}.mass", spec.name), ParameterValue::Real(spec.mass));
                    self.particles.push(Particle {
                        name: spec.name.clone(),
                        quantum: spec.quantum,
                        mass,
                        kind: ParticleKind::FinalState {
                            positions: Vec::new(),
                        },
                        prototypes: Vec::new(),
                    });
                    by_name.insert(spec.name.clone(), id);
                    id
                }
            };
            let leaf = self.registry.final_state(position);
            let particle = &mut self.particles[id.index()];
            if let ParticleKind::FinalState { positions } = &mut particle.kind {
                positions.push(position);
            }
            particle.prototypes.push(leaf);
            self.accessors
                .add_symmetrization_slot(&self.registry, self.kinematics.mass_accessor(), leaf)?;
            assigned.push(id);
        }
        self.final_state = assigned.clone();
        Ok(assigned)
    }

    /// Adds a decaying particle (resonance or initial state) without channels.
    pub fn add_decaying(&mut self, params: &mut ParameterStore, spec: &ParticleSpec) -> Result<ParticleId, PwaError> {
        self.ensure_mutable()?;
        if self.find_particle(&spec.name).is_some() {
            return Err(duplicate_particle(&spec.name));
        }
        let mass = params.add_fixed(format!("{}.mass", spec.name), ParameterValue::Real(spec.mass));
        let radial_size = params.add_fixed(
            format!("{}.radial_size", spec.name),
            ParameterValue::Real(spec.radial_size),
        );
        let shape = MassShape::register(
            &mut self.accessors,
            &mut self.values,
            params,
            &self.kinematics,
            &spec.name,
            &spec.shape,
            mass,
        )?;
        let accessor = self.accessors.register(spec.name.clone(), Equiv::UpAndDown)?;
        let value = self
            .values
            .add(&mut self.accessors, accessor, "amplitude", ValueKind::Complex)?;
        if let Some(shape_value) = shape.value() {
            self.values.depend_on_value(value, shape_value)?;
        }
        let id = ParticleId::from_raw(self.particles.len() as u32);
        self.particles.push(Particle {
            name: spec.name.clone(),
            quantum: spec.quantum,
            mass,
            kind: ParticleKind::Decaying(Decaying {
                radial_size,
                shape,
                accessor,
                value,
                channels: Vec::new(),
            }),
            prototypes: Vec::new(),
        });
        Ok(id)
    }

    /// Adds a two-body decay channel of `parent`.
    ///
    /// Every check runs before anything is registered, so a rejected channel
    /// leaves the tree, the combination registry and the accessor index
    /// untouched.
    pub fn add_channel(
        &mut self,
        params: &mut ParameterStore,
        parent: ParticleId,
        daughters: &[ParticleId],
        spec: &ChannelSpec,
    ) -> Result<ChannelId, PwaError> {
        self.ensure_mutable()?;
        let validated = self.validate_channel(params, parent, daughters, spec)?;

        let mut prototypes = Vec::with_capacity(validated.pairs.len());
        for (a, b) in &validated.pairs {
            prototypes.push(self.registry.intern(None, &[*a, *b])?);
        }

        let parent_particle = self.particle(parent)?;
        let parent_mass = parent_particle.mass;
        let (parent_accessor, parent_value, parent_radius, parent_shape) = match &parent_particle.kind {
            ParticleKind::Decaying(decaying) => (
                decaying.accessor,
                decaying.value,
                decaying.radial_size,
                decaying.shape.accessor(),
            ),
            ParticleKind::FinalState { .. } => return Err(not_decaying(&parent_particle.name)),
        };
        let daughter_values: Vec<_> = daughters
            .iter()
            .filter_map(|d| self.particles[d.index()].decaying().map(|decaying| decaying.value))
            .collect();

        let accessor = self
            .accessors
            .register(format!("channel {}", validated.label), Equiv::UpAndDown)?;
        let value = self
            .values
            .add(&mut self.accessors, accessor, "amplitude", ValueKind::Complex)?;
        let barrier = BarrierFactor::register(
            &mut self.accessors,
            &mut self.values,
            &self.kinematics,
            &validated.label,
            spec.l,
            parent_mass,
            parent_radius,
        )?;
        let spin = self.spin_coupling_for(spec.l)?;
        let free_amplitude = {
            let amplitude = ParameterValue::Complex(Complex64::new(spec.amplitude[0], spec.amplitude[1]));
            let name = format!("{}.amplitude", validated.label);
            if spec.fixed {
                params.add_fixed(name, amplitude)
            } else {
                params.add_free(name, amplitude)
            }
        };

        self.values.depend_on_value(value, barrier.nominal_value())?;
        self.values.depend_on_value(value, barrier.measured_value())?;
        self.values.depend_on_value(value, self.spins[spin].value())?;
        for daughter_value in daughter_values {
            self.values.depend_on_value(value, daughter_value)?;
        }
        self.values.depend_on_value(parent_value, value)?;
        self.values.depend_on_parameter(parent_value, free_amplitude)?;

        let mut requests: Vec<AccessorId> = vec![
            accessor,
            barrier.accessor(),
            self.spins[spin].accessor(),
            self.kinematics.breakup_accessor(),
            self.kinematics.mass_accessor(),
            parent_accessor,
        ];
        requests.extend(parent_shape);
        for prototype in &prototypes {
            for target in &requests {
                self.accessors
                    .add_symmetrization_slot(&self.registry, *target, *prototype)?;
            }
        }

        let id = ChannelId::from_raw(self.channels.len() as u32);
        self.channels.push(DecayChannel {
            label: validated.label,
            parent,
            daughters: daughters.to_vec(),
            l: spec.l,
            two_s: validated.two_s,
            barrier,
            spin,
            accessor,
            value,
            free_amplitude,
            prototypes: prototypes.clone(),
        });
        let parent_particle = &mut self.particles[parent.index()];
        for prototype in prototypes {
            if !parent_particle.prototypes.contains(&prototype) {
                parent_particle.prototypes.push(prototype);
            }
        }
        if let ParticleKind::Decaying(decaying) = &mut parent_particle.kind {
            decaying.channels.push(id);
        }
        Ok(id)
    }

    fn validate_channel(
        &self,
        params: &ParameterStore,
        parent: ParticleId,
        daughters: &[ParticleId],
        spec: &ChannelSpec,
    ) -> Result<ValidatedChannel, PwaError> {
        let parent_particle = self.particle(parent)?;
        if parent_particle.decaying().is_none() {
            return Err(not_decaying(&parent_particle.name));
        }
        if daughters.len() != 2 {
            return Err(PwaError::Construction(
                ErrorInfo::new(
                    "unsupported-daughter-count",
                    "only two-body decay channels are supported",
                )
                .with_context("parent", &parent_particle.name)
                .with_context("daughters", daughters.len()),
            ));
        }
        let a = self.particle(daughters[0])?;
        let b = self.particle(daughters[1])?;
        let label = format!(
            "{} -> {} {} (L = {})",
            parent_particle.name, a.name, b.name, spec.l
        );

        let charge = a.quantum.charge + b.quantum.charge;
        if parent_particle.quantum.charge != charge {
            return Err(PwaError::Construction(
                ErrorInfo::new("charge-not-conserved", "daughter charges do not add up to the parent charge")
                    .with_context("channel", &label)
                    .with_context("parent", parent_particle.quantum.charge)
                    .with_context("daughters", charge),
            ));
        }

        let two_j = parent_particle.quantum.two_j;
        let (two_j1, two_j2) = (a.quantum.two_j, b.quantum.two_j);
        let two_s = match spec.two_s {
            Some(two_s) if triangle(two_j1, two_j2, two_s) && triangle(two_j, 2 * spec.l, two_s) => Some(two_s),
            Some(_) => None,
            None => coupled_spin(two_j, spec.l, two_j1, two_j2),
        };
        let two_s = two_s.ok_or_else(|| {
            PwaError::Construction(
                ErrorInfo::new(
                    "spin-not-conserved",
                    "daughter spins and orbital angular momentum cannot couple to the parent spin",
                )
                .with_context("channel", &label)
                .with_context("two_j", two_j)
                .with_context("two_j1", two_j1)
                .with_context("two_j2", two_j2)
                .with_context("l", spec.l),
            )
        })?;

        let parent_mass = params.real(parent_particle.mass)?;
        let daughter_mass = params.real(a.mass)? + params.real(b.mass)?;
        if daughter_mass > parent_mass {
            return Err(PwaError::Construction(
                ErrorInfo::new("mass-not-conserved", "daughter masses exceed the parent mass")
                    .with_context("channel", &label)
                    .with_context("parent", parent_mass)
                    .with_context("daughters", daughter_mass),
            ));
        }

        f2(spec.l, 0.0).map_err(|err| err.with_context("channel", &label))?;

        for daughter in [a, b] {
            if daughter.prototypes.is_empty() {
                return Err(PwaError::Construction(
                    ErrorInfo::new(
                        "undecayed-daughter",
                        "daughter has no decay channel or final-state position yet",
                    )
                    .with_context("channel", &label)
                    .with_context("daughter", &daughter.name)
                    .with_hint("build the tree bottom-up"),
                ));
            }
        }

        let identical = daughters[0] == daughters[1];
        let mut pairs: Vec<(CombinationId, CombinationId)> = Vec::new();
        for pa in &a.prototypes {
            for pb in &b.prototypes {
                if self.registry.shares_indices(*pa, *pb)? {
                    continue;
                }
                if identical && pairs.contains(&(*pb, *pa)) {
                    continue;
                }
                pairs.push((*pa, *pb));
            }
        }
        if pairs.is_empty() {
            return Err(PwaError::Construction(
                ErrorInfo::new(
                    "no-valid-combination",
                    "daughters cannot be combined without sharing final-state particles",
                )
                .with_context("channel", &label),
            ));
        }
        Ok(ValidatedChannel {
            label,
            two_s,
            pairs,
        })
    }

    fn spin_coupling_for(&mut self, l: u32) -> Result<usize, PwaError> {
        if let Some(existing) = self.spin_by_l.get(&l) {
            return Ok(*existing);
        }
        let coupling = SpinCoupling::register(&mut self.accessors, &mut self.values, l)?;
        self.spins.push(coupling);
        self.spin_by_l.insert(l, self.spins.len() - 1);
        Ok(self.spins.len() - 1)
    }

    /// Freezes the tree below `initial_state`.
    ///
    /// Rebuilds every symmetrization slot from the parent-linked combinations
    /// actually reachable from the initial state, then freezes the accessor
    /// index and the value dependencies. Accessors that are never reached get
    /// no storage.
    pub fn freeze(&mut self, initial_state: ParticleId) -> Result<StorageLayout, PwaError> {
        self.ensure_mutable()?;
        let particle = self.particle(initial_state)?;
        if particle.decaying().is_none() {
            return Err(not_decaying(&particle.name));
        }
        let everything: BTreeSet<usize> = (0..self.final_state.len()).collect();
        let mut top_level = Vec::new();
        for prototype in &particle.prototypes {
            if self.registry.get(*prototype)?.content() == everything {
                top_level.push(*prototype);
            }
        }
        if top_level.is_empty() {
            return Err(PwaError::Construction(
                ErrorInfo::new(
                    "no-initial-state-combination",
                    "initial state does not decay into the full final state",
                )
                .with_context("initial_state", &particle.name)
                .with_context("final_state", self.final_state.len()),
            ));
        }

        let visits = self.walk(initial_state, &top_level)?;
        let requests = self.slot_requests(&visits)?;
        self.accessors.clear_slots()?;
        for (accessor, combination) in requests {
            self.accessors
                .add_symmetrization_slot(&self.registry, accessor, combination)?;
        }
        let layout = self.accessors.freeze_and_index(&self.registry)?;
        self.values.freeze()?;
        info!(
            initial_state = %self.particles[initial_state.index()].name,
            top_level = top_level.len(),
            visits = visits.len(),
            combinations = self.registry.len(),
            "decay tree frozen"
        );
        self.initial_state = Some(initial_state);
        self.top_level = top_level;
        self.layout = Some(layout.clone());
        Ok(layout)
    }

    /// Every node reachable from the frozen initial state, post-order.
    pub fn reachable(&self) -> Result<Vec<Visit>, PwaError> {
        let isp = self.initial_state()?;
        self.walk(isp, &self.top_level)
    }

    fn walk(&self, isp: ParticleId, top_level: &[CombinationId]) -> Result<Vec<Visit>, PwaError> {
        let mut visits = Vec::new();
        let mut seen = BTreeSet::new();
        for combination in top_level {
            self.visit_particle(isp, *combination, &mut seen, &mut visits)?;
        }
        Ok(visits)
    }

    fn visit_particle(
        &self,
        particle: ParticleId,
        combination: CombinationId,
        seen: &mut BTreeSet<Visit>,
        out: &mut Vec<Visit>,
    ) -> Result<(), PwaError> {
        let visit = Visit {
            node: Node::Particle(particle),
            combination,
        };
        if seen.contains(&visit) {
            return Ok(());
        }
        if let Some(decaying) = self.particle(particle)?.decaying() {
            let shape = self.registry.get(combination)?.shape();
            for channel_id in &decaying.channels {
                let channel = self.channel(*channel_id)?;
                let mut handles = false;
                for prototype in &channel.prototypes {
                    if self.registry.get(*prototype)?.shape() == shape {
                        handles = true;
                        break;
                    }
                }
                if handles {
                    self.visit_channel(*channel_id, combination, seen, out)?;
                }
            }
        }
        seen.insert(visit);
        out.push(visit);
        Ok(())
    }

    fn visit_channel(
        &self,
        channel_id: ChannelId,
        combination: CombinationId,
        seen: &mut BTreeSet<Visit>,
        out: &mut Vec<Visit>,
    ) -> Result<(), PwaError> {
        let visit = Visit {
            node: Node::Channel(channel_id),
            combination,
        };
        if seen.contains(&visit) {
            return Ok(());
        }
        let channel = self.channel(channel_id)?;
        let daughters = self.registry.get(combination)?.daughters();
        for (particle, daughter) in channel.daughters.iter().zip(daughters) {
            self.visit_particle(*particle, *daughter, seen, out)?;
        }
        seen.insert(visit);
        out.push(visit);
        Ok(())
    }

    fn slot_requests(&self, visits: &[Visit]) -> Result<Vec<(AccessorId, CombinationId)>, PwaError> {
        let mut requests = Vec::new();
        for visit in visits {
            let combination = visit.combination;
            requests.push((self.kinematics.mass_accessor(), combination));
            match visit.node {
                Node::Particle(id) => {
                    if let Some(decaying) = self.particle(id)?.decaying() {
                        requests.push((decaying.accessor, combination));
                        if let Some(shape) = decaying.shape.accessor() {
                            requests.push((shape, combination));
                        }
                    }
                }
                Node::Channel(id) => {
                    let channel = self.channel(id)?;
                    requests.push((channel.accessor, combination));
                    requests.push((channel.barrier.accessor(), combination));
                    requests.push((self.spin_coupling(channel.spin)?.accessor(), combination));
                    requests.push((self.kinematics.breakup_accessor(), combination));
                }
            }
        }
        Ok(requests)
    }

    /// Nominal kinematic range `[(m_a + m_b)², (M - Σ others)²]` of the
    /// invariant mass squared of two final-state positions.
    pub fn mass_range(&self, params: &ParameterStore, positions: [usize; 2]) -> Result<(f64, f64), PwaError> {
        let isp = self.initial_state()?;
        let mass_at = |position: usize| -> Result<f64, PwaError> {
            let particle = self.final_state.get(position).ok_or_else(|| {
                PwaError::Data(
                    ErrorInfo::new("unknown-position", "final state has no such position")
                        .with_context("position", position),
                )
            })?;
            params.real(self.particle(*particle)?.mass)
        };
        let pair = mass_at(positions[0])? + mass_at(positions[1])?;
        let mut others = 0.0;
        for position in 0..self.final_state.len() {
            if !positions.contains(&position) {
                others += mass_at(position)?;
            }
        }
        let parent = params.real(self.particle(isp)?.mass)?;
        Ok((pair * pair, (parent - others).powi(2)))
    }

    /// Combination registry.
    pub fn registry(&self) -> &CombinationRegistry {
        &self.registry
    }

    /// Accessor index.
    pub fn accessors(&self) -> &AccessorIndex {
        &self.accessors
    }

    /// Cached value registry.
    pub fn values(&self) -> &CachedValues {
        &self.values
    }

    /// Kinematic accessors.
    pub fn kinematics(&self) -> &Kinematics {
        &self.kinematics
    }

    /// Particle behind `id`.
    pub fn particle(&self, id: ParticleId) -> Result<&Particle, PwaError> {
        self.particles.get(id.index()).ok_or_else(|| {
            PwaError::Construction(
                ErrorInfo::new("unknown-particle", "particle does not exist")
                    .with_context("particle", id.as_raw()),
            )
        })
    }

    /// Channel behind `id`.
    pub fn channel(&self, id: ChannelId) -> Result<&DecayChannel, PwaError> {
        self.channels.get(id.index()).ok_or_else(|| {
            PwaError::Construction(
                ErrorInfo::new("unknown-channel", "channel does not exist")
                    .with_context("channel", id.as_raw()),
            )
        })
    }

    /// Shared spin coupling at `position`.
    pub fn spin_coupling(&self, position: usize) -> Result<&SpinCoupling, PwaError> {
        self.spins.get(position).ok_or_else(|| {
            PwaError::Construction(
                ErrorInfo::new("unknown-spin-coupling", "spin coupling does not exist")
                    .with_context("position", position),
            )
        })
    }

    /// All particles in registration order.
    pub fn particles(&self) -> impl Iterator<Item = (ParticleId, &Particle)> + '_ {
        self.particles
            .iter()
            .enumerate()
            .map(|(index, particle)| (ParticleId::from_raw(index as u32), particle))
    }

    /// All channels in registration order.
    pub fn channels(&self) -> impl Iterator<Item = (ChannelId, &DecayChannel)> + '_ {
        self.channels
            .iter()
            .enumerate()
            .map(|(index, channel)| (ChannelId::from_raw(index as u32), channel))
    }

    /// Looks a particle up by name.
    pub fn find_particle(&self, name: &str) -> Option<ParticleId> {
        self.particles()
            .find(|(_, particle)| particle.name == name)
            .map(|(id, _)| id)
    }

    /// Particle at every final-state position.
    pub fn final_state(&self) -> &[ParticleId] {
        &self.final_state
    }

    /// Initial-state particle of a frozen tree.
    pub fn initial_state(&self) -> Result<ParticleId, PwaError> {
        self.initial_state
            .ok_or_else(|| protocol_error("not-frozen", "decay tree has not been frozen yet"))
    }

    /// Combinations of the initial state covering the whole final state.
    pub fn top_level_combinations(&self) -> &[CombinationId] {
        &self.top_level
    }

    /// Storage layout of a frozen tree.
    pub fn layout(&self) -> Result<&StorageLayout, PwaError> {
        self.layout
            .as_ref()
            .ok_or_else(|| protocol_error("not-frozen", "decay tree has not been frozen yet"))
    }

    /// Whether [`DecayTree::freeze`] has run.
    pub fn is_frozen(&self) -> bool {
        self.layout.is_some()
    }

    fn ensure_mutable(&self) -> Result<(), PwaError> {
        if self.layout.is_some() {
            return Err(protocol_error(
                "already-frozen",
                "decay tree is frozen and cannot be modified",
            ));
        }
        Ok(())
    }
}

struct ValidatedChannel {
    label: String,
    two_s: u32,
    pairs: Vec<(CombinationId, CombinationId)>,
}

fn duplicate_particle(name: &str) -> PwaError {
    PwaError::Construction(
        ErrorInfo::new("duplicate-particle", "a particle with this name already exists")
            .with_context("name", name),
    )
}

fn not_decaying(name: &str) -> PwaError {
    PwaError::Construction(
        ErrorInfo::new("not-decaying", "particle has no decay channels to own")
            .with_context("particle", name),
    )
}
