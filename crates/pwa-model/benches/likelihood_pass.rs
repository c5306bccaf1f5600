use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pwa_core::ParameterStore;
use pwa_data::PartitionStrategy;
use pwa_model::{EvalConfig, Model, PhaseSpaceGenerator};
use pwa_tree::{ChannelSpec, DecayTree, ParticleSpec, QuantumNumbers};

const PION: f64 = 0.13957;
const D_MASS: f64 = 1.86966;

fn sample_model(events: usize, config: EvalConfig) -> Model {
    let mut params = ParameterStore::new();
    let mut tree = DecayTree::new().unwrap();
    let pi_plus = ParticleSpec::new("pi+", QuantumNumbers::new(0, 1), PION);
    let pi_minus = ParticleSpec::new("pi-", QuantumNumbers::new(0, -1), PION);
    let fs = tree
        .set_final_state(&mut params, &[pi_plus.clone(), pi_minus, pi_plus])
        .unwrap();
    let d = tree
        .add_decaying(&mut params, &ParticleSpec::new("D+", QuantumNumbers::new(0, 1), D_MASS))
        .unwrap();
    for (name, two_j, mass, width, l) in [("rho0", 2, 0.775, 0.149, 1), ("f0", 0, 0.98, 0.07, 0), ("f2", 4, 1.275, 0.185, 2)] {
        let resonance = tree
            .add_decaying(
                &mut params,
                &ParticleSpec::new(name, QuantumNumbers::new(two_j, 0), mass).with_breit_wigner(width),
            )
            .unwrap();
        tree.add_channel(&mut params, resonance, &[fs[0], fs[1]], &ChannelSpec::new(l).fixed())
            .unwrap();
        tree.add_channel(&mut params, d, &[resonance, fs[0]], &ChannelSpec::new(l))
            .unwrap();
    }
    let mut model = Model::prepare(tree, params, d, config).unwrap();
    let generator = PhaseSpaceGenerator::new(D_MASS, [PION, PION, PION], 2024).unwrap();
    for momenta in generator.generate(events).unwrap() {
        model.add_event(momenta).unwrap();
    }
    model.create_partitions().unwrap();
    model
}

fn bench_pass(c: &mut Criterion) {
    let config = EvalConfig {
        partitioning: PartitionStrategy::Weave { count: 4 },
        concurrency: 4,
        ..EvalConfig::default()
    };
    let mut model = sample_model(2_000, config);
    let x = model.parameter_vector().unwrap();
    let shifted: Vec<f64> = x.iter().map(|v| v * 1.1).collect();

    c.bench_function("likelihood_pass_cached", |b| {
        b.iter(|| black_box(model.sum_of_log_intensity().unwrap().total));
    });

    let mut toggle = false;
    c.bench_function("likelihood_pass_after_parameter_change", |b| {
        b.iter(|| {
            toggle = !toggle;
            let point = if toggle { &shifted } else { &x };
            black_box(model.log_likelihood(point).unwrap())
        });
    });
}

criterion_group!(benches, bench_pass);
criterion_main!(benches);
