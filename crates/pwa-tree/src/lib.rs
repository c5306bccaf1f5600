#![deny(missing_docs)]
#![doc = "Decay-tree composition: kinematics, barrier factors, spin couplings, lineshapes, channels and particles evaluated through the lazy cache."]

pub mod barrier;
mod channel;
mod eval;
mod ids;
pub mod kinematics;
mod particle;
pub mod quantum;
mod shape;
pub mod spin;
mod tree;

pub use barrier::{f2, BarrierFactor, MAX_BARRIER_ORDER};
pub use channel::DecayChannel;
pub use eval::Evaluator;
pub use ids::{ChannelId, ParticleId};
pub use kinematics::Kinematics;
pub use particle::{Decaying, Particle, ParticleKind};
pub use quantum::{ChannelSpec, ParticleSpec, QuantumNumbers, ShapeSpec};
pub use shape::{BreitWigner, MassShape};
pub use spin::SpinCoupling;
pub use tree::{DecayTree, Node, Visit};
