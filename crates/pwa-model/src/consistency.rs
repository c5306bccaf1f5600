//! Read-only consistency checks over a prepared model.

use pwa_core::ParameterStore;
use pwa_tree::quantum::triangle;
use pwa_tree::{DecayTree, MassShape, Node, ParticleKind, MAX_BARRIER_ORDER};
use serde::{Deserialize, Serialize};

use crate::model::Model;

/// One problem found by a consistency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Stable machine readable code.
    pub code: String,
    /// Object the violation is about.
    pub subject: String,
    /// Human readable explanation.
    pub message: String,
}

impl Violation {
    fn new(code: &str, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            subject: subject.into(),
            message: message.into(),
        }
    }
}

/// Every violation found in one check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// Violations in discovery order.
    pub violations: Vec<Violation>,
}

impl ConsistencyReport {
    /// Whether no violation was found.
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }

    /// Whether a violation with `code` was found.
    pub fn has(&self, code: &str) -> bool {
        self.violations.iter().any(|violation| violation.code == code)
    }

    fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }
}

impl Model {
    /// Checks the tree, the accessor slots, the dataset and the partitions.
    ///
    /// Never mutates cache state and never fails: lookup errors are reported
    /// as violations.
    pub fn consistency_check(&self) -> ConsistencyReport {
        let mut report = ConsistencyReport::default();
        check_particles(self.tree(), self.params(), &mut report);
        check_channels(self.tree(), self.params(), &mut report);
        check_slots(self.tree(), &mut report);
        check_data(self, &mut report);
        report
    }
}

fn check_particles(tree: &DecayTree, params: &ParameterStore, report: &mut ConsistencyReport) {
    for (_, particle) in tree.particles() {
        let name = particle.name();
        match params.real(particle.mass()) {
            Ok(mass) if mass > 0.0 => {}
            Ok(_) => report.push(Violation::new("non-positive-mass", name, "nominal mass must be positive")),
            Err(err) => report.push(Violation::new(err.code(), name, err.to_string())),
        }
        let ParticleKind::Decaying(decaying) = particle.kind() else {
            continue;
        };
        if decaying.channels().is_empty() {
            report.push(Violation::new("no-channels", name, "decaying particle has no decay channel"));
        }
        match params.real(decaying.radial_size()) {
            Ok(radius) if radius > 0.0 => {}
            Ok(_) => report.push(Violation::new(
                "non-positive-radial-size",
                name,
                "radial size must be positive",
            )),
            Err(err) => report.push(Violation::new(err.code(), name, err.to_string())),
        }
        if let MassShape::BreitWigner(bw) = decaying.shape() {
            match params.real(bw.width()) {
                Ok(width) if width > 0.0 => {}
                Ok(_) => report.push(Violation::new("non-positive-width", name, "Breit-Wigner width must be positive")),
                Err(err) => report.push(Violation::new(err.code(), name, err.to_string())),
            }
        }
    }
}

fn check_channels(tree: &DecayTree, params: &ParameterStore, report: &mut ConsistencyReport) {
    for (_, channel) in tree.channels() {
        let label = channel.label();
        let (parent, daughters) = match (
            tree.particle(channel.parent()),
            channel
                .daughters()
                .iter()
                .map(|d| tree.particle(*d))
                .collect::<Result<Vec<_>, _>>(),
        ) {
            (Ok(parent), Ok(daughters)) => (parent, daughters),
            (Err(err), _) | (_, Err(err)) => {
                report.push(Violation::new(err.code(), label, err.to_string()));
                continue;
            }
        };
        if daughters.len() != 2 {
            report.push(Violation::new("unsupported-daughter-count", label, "channel must have two daughters"));
            continue;
        }
        let charge: i32 = daughters.iter().map(|d| d.quantum().charge).sum();
        if charge != parent.quantum().charge {
            report.push(Violation::new("charge-not-conserved", label, "daughter charges do not add up"));
        }
        let two_s = channel.two_s();
        if !triangle(daughters[0].quantum().two_j, daughters[1].quantum().two_j, two_s)
            || !triangle(parent.quantum().two_j, 2 * channel.l(), two_s)
        {
            report.push(Violation::new("spin-not-conserved", label, "angular momenta do not couple"));
        }
        if channel.l() > MAX_BARRIER_ORDER {
            report.push(Violation::new(
                "unsupported-barrier-order",
                label,
                "no barrier factor for this orbital angular momentum",
            ));
        }
        let masses = daughters
            .iter()
            .map(|d| params.real(d.mass()))
            .collect::<Result<Vec<_>, _>>()
            .and_then(|masses| Ok((params.real(parent.mass())?, masses.iter().sum::<f64>())));
        match masses {
            Ok((parent_mass, daughter_mass)) if daughter_mass <= parent_mass => {}
            Ok(_) => report.push(Violation::new("mass-not-conserved", label, "daughter masses exceed the parent mass")),
            Err(err) => report.push(Violation::new(err.code(), label, err.to_string())),
        }
    }
}

fn check_slots(tree: &DecayTree, report: &mut ConsistencyReport) {
    if tree.top_level_combinations().is_empty() {
        report.push(Violation::new(
            "no-initial-state-combination",
            "initial state",
            "no combination covers the whole final state",
        ));
    }
    let visits = match tree.reachable() {
        Ok(visits) => visits,
        Err(err) => {
            report.push(Violation::new(err.code(), "decay tree", err.to_string()));
            return;
        }
    };
    let accessors = tree.accessors();
    let registry = tree.registry();
    for visit in visits {
        let mut required = vec![tree.kinematics().mass_accessor()];
        match visit.node {
            Node::Particle(id) => {
                if let Some(decaying) = tree.particle(id).ok().and_then(|p| p.decaying()) {
                    required.push(decaying.accessor());
                    required.extend(decaying.shape().accessor());
                }
            }
            Node::Channel(id) => {
                if let Ok(channel) = tree.channel(id) {
                    required.push(channel.accessor());
                    required.push(channel.barrier().accessor());
                    required.push(tree.kinematics().breakup_accessor());
                    if let Ok(spin) = tree.spin_coupling(channel.spin_coupling()) {
                        required.push(spin.accessor());
                    }
                }
            }
        }
        for accessor in required {
            if !accessors.has_slot(accessor, visit.combination) {
                report.push(Violation::new(
                    "missing-slot",
                    accessors.label(accessor).unwrap_or("?"),
                    format!("no slot for {}", registry.describe(visit.combination)),
                ));
            } else if accessors.try_storage_index(accessor).is_none() {
                report.push(Violation::new(
                    "missing-storage",
                    accessors.label(accessor).unwrap_or("?"),
                    "accessor holds slots but owns no storage",
                ));
            }
        }
    }
}

fn check_data(model: &Model, report: &mut ConsistencyReport) {
    let data = model.data();
    for (position, event) in data.events().enumerate() {
        if !event.is_allocated() {
            report.push(Violation::new(
                "unallocated-event",
                format!("event {position}"),
                "event storage was never allocated",
            ));
        }
        if event.momenta().len() != data.final_state_size() {
            report.push(Violation::new(
                "wrong-momentum-count",
                format!("event {position}"),
                "momentum count does not match the final state",
            ));
        }
    }
    let partitions = model.partitions();
    if partitions.is_empty() {
        return;
    }
    for position in 0..data.len() {
        let owners = partitions.iter().filter(|p| p.contains(position)).count();
        if owners != 1 {
            report.push(Violation::new(
                "stale-partitions",
                format!("event {position}"),
                format!("event is covered by {owners} partitions"),
            ));
        }
    }
    let covered: usize = partitions.iter().map(|p| p.len()).sum();
    if covered != data.len() {
        report.push(Violation::new(
            "stale-partitions",
            "partitions",
            format!("partitions cover {covered} positions for {} events", data.len()),
        ));
    }
}
