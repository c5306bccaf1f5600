mod common;

use pwa_core::{Complex64, ParameterStore, PwaError};
use pwa_model::{EvalConfig, Model, PhaseSpaceGenerator};
use pwa_tree::{ChannelSpec, DecayTree, ParticleSpec, QuantumNumbers};

use common::{D_MASS, PION};

const KAON: f64 = 0.493677;

fn final_state_particle(position: usize) -> ParticleSpec {
    match position {
        0 => ParticleSpec::new("pi+", QuantumNumbers::new(0, 1), PION),
        1 => ParticleSpec::new("K-", QuantumNumbers::new(0, -1), KAON),
        _ => ParticleSpec::new("K+", QuantumNumbers::new(0, 1), KAON),
    }
}

/// D+ -> piK_J K+ with piK_J -> pi+ K- for J = 0, 1, 2. `order[i]` names the
/// particle at final-state position `i` (0 = pi+, 1 = K-, 2 = K+).
fn pik_model(order: [usize; 3]) -> Result<Model, PwaError> {
    let mut params = ParameterStore::new();
    let mut tree = DecayTree::new()?;
    let specs: Vec<ParticleSpec> = order.iter().map(|p| final_state_particle(*p)).collect();
    let fs = tree.set_final_state(&mut params, &specs)?;
    let position = |particle: usize| order.iter().position(|p| *p == particle).unwrap_or(0);
    let (pi_plus, k_minus, k_plus) = (fs[position(0)], fs[position(1)], fs[position(2)]);

    let d = tree.add_decaying(&mut params, &ParticleSpec::new("D+", QuantumNumbers::new(0, 1), D_MASS))?;
    for (l, mass, amplitude) in [(0u32, 0.75, 0.5), (1, 1.0, 1.0), (2, 1.25, 30.0)] {
        let resonance = tree.add_decaying(
            &mut params,
            &ParticleSpec::new(format!("piK{l}"), QuantumNumbers::new(2 * l, 0), mass).with_breit_wigner(0.025),
        )?;
        tree.add_channel(&mut params, resonance, &[pi_plus, k_minus], &ChannelSpec::new(l).fixed())?;
        tree.add_channel(
            &mut params,
            d,
            &[resonance, k_plus],
            &ChannelSpec::new(l).with_amplitude(amplitude, 0.0),
        )?;
    }
    Model::prepare(tree, params, d, EvalConfig::default())
}

const ORDERS: [[usize; 3]; 6] = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

#[test]
fn amplitude_does_not_depend_on_final_state_order() -> Result<(), PwaError> {
    let generator = PhaseSpaceGenerator::new(D_MASS, [PION, KAON, KAON], 17)?;
    let samples = generator.generate(20)?;

    let mut models = Vec::with_capacity(ORDERS.len());
    for order in ORDERS {
        let mut model = pik_model(order)?;
        for momenta in &samples {
            model.add_event(order.iter().map(|p| momenta[*p]).collect())?;
        }
        models.push(model);
    }

    for event in 0..samples.len() {
        let reference = models[0].amplitude(event)?;
        let scale = reference.norm_sqr().sqrt();
        assert!(scale > 0.0 && scale.is_finite());
        for (model, order) in models.iter_mut().zip(ORDERS).skip(1) {
            let amplitude: Complex64 = model.amplitude(event)?;
            assert!(
                (amplitude - reference).norm_sqr().sqrt() <= 1e-9 * scale,
                "order {order:?}, event {event}: {amplitude} vs {reference}"
            );
        }
    }
    Ok(())
}

#[test]
fn mass_range_follows_the_particles_not_their_positions() -> Result<(), PwaError> {
    let reference = pik_model(ORDERS[0])?.mass_range([0, 1])?;
    for order in ORDERS {
        let model = pik_model(order)?;
        let pi_plus = order.iter().position(|p| *p == 0).unwrap();
        let k_minus = order.iter().position(|p| *p == 1).unwrap();
        let (low, high) = model.mass_range([pi_plus, k_minus])?;
        assert!((low - reference.0).abs() < 1e-12);
        assert!((high - reference.1).abs() < 1e-12);
    }
    Ok(())
}
