#![allow(dead_code)]

use pwa_core::{FourMomentum, ParameterStore, PwaError};
use pwa_model::{EvalConfig, Model, PhaseSpaceGenerator};
use pwa_tree::{ChannelSpec, DecayTree, ParticleId, ParticleSpec, QuantumNumbers};

pub const PION: f64 = 0.13957;
pub const D_MASS: f64 = 1.86966;

pub struct Handles {
    pub rho: ParticleId,
    pub f0: Option<ParticleId>,
}

/// D+ -> rho0 pi+ (and optionally f0 pi+), rho0/f0 -> pi+ pi-, final state
/// `pi+ pi- pi+`.
pub fn build(rho_mass: f64, with_f0: bool, config: EvalConfig) -> Result<(Model, Handles), PwaError> {
    let mut params = ParameterStore::new();
    let mut tree = DecayTree::new()?;
    let pi_plus = ParticleSpec::new("pi+", QuantumNumbers::new(0, 1), PION);
    let pi_minus = ParticleSpec::new("pi-", QuantumNumbers::new(0, -1), PION);
    let fs = tree.set_final_state(&mut params, &[pi_plus.clone(), pi_minus, pi_plus])?;

    let rho = tree.add_decaying(
        &mut params,
        &ParticleSpec::new("rho0", QuantumNumbers::new(2, 0), rho_mass).with_breit_wigner(0.149),
    )?;
    tree.add_channel(&mut params, rho, &[fs[0], fs[1]], &ChannelSpec::new(1))?;
    let d = tree.add_decaying(&mut params, &ParticleSpec::new("D+", QuantumNumbers::new(0, 1), D_MASS))?;
    tree.add_channel(&mut params, d, &[rho, fs[0]], &ChannelSpec::new(1).fixed())?;

    let f0 = if with_f0 {
        let f0 = tree.add_decaying(
            &mut params,
            &ParticleSpec::new("f0", QuantumNumbers::new(0, 0), 0.98).with_breit_wigner(0.07),
        )?;
        tree.add_channel(&mut params, f0, &[fs[0], fs[1]], &ChannelSpec::new(0).fixed())?;
        tree.add_channel(&mut params, d, &[f0, fs[0]], &ChannelSpec::new(0).with_amplitude(0.4, -0.3))?;
        Some(f0)
    } else {
        None
    };

    let model = Model::prepare(tree, params, d, config)?;
    Ok((model, Handles { rho, f0 }))
}

pub fn events(count: usize, seed: u64) -> Vec<Vec<FourMomentum>> {
    PhaseSpaceGenerator::new(D_MASS, [PION, PION, PION], seed)
        .and_then(|generator| generator.generate(count))
        .unwrap()
}

pub fn filled(count: usize, config: EvalConfig) -> Result<Model, PwaError> {
    let (mut model, _) = build(0.775, true, config)?;
    for momenta in events(count, 42) {
        model.add_event(momenta)?;
    }
    model.create_partitions()?;
    Ok(model)
}
