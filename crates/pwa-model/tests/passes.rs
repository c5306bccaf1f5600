mod common;

use proptest::prelude::*;
use pwa_core::{Complex64, FourMomentum, ParameterValue, PwaError};
use pwa_data::PartitionStrategy;
use pwa_model::EvalConfig;

use common::{build, events, filled};

fn config(partitioning: PartitionStrategy, concurrency: usize) -> EvalConfig {
    EvalConfig {
        partitioning,
        concurrency,
        ..EvalConfig::default()
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(1.0)
}

#[test]
fn partition_sums_add_up_to_the_pass_total() -> Result<(), PwaError> {
    let mut model = filled(37, config(PartitionStrategy::Block { count: 4 }, 2))?;
    let summary = model.sum_of_log_intensity()?;
    assert_eq!(summary.partitions.len(), 4);
    assert_eq!(summary.partitions.iter().map(|p| p.events).sum::<usize>(), 37);
    assert_eq!(summary.excluded, 0);
    assert!(summary.total.is_finite());

    let mut separate = 0.0;
    for partition in 0..model.partitions().len() {
        separate += model.sum_over_partition(partition)?.sum;
    }
    assert!(close(separate, summary.total));
    Ok(())
}

#[test]
fn repeated_passes_reuse_the_cache_consistently() -> Result<(), PwaError> {
    let mut model = filled(25, config(PartitionStrategy::Weave { count: 3 }, 3))?;
    let first = model.sum_of_log_intensity()?;
    let second = model.sum_of_log_intensity()?;
    assert_eq!(first.total.to_bits(), second.total.to_bits());
    Ok(())
}

#[test]
fn scaling_every_free_amplitude_shifts_the_likelihood() -> Result<(), PwaError> {
    let mut model = filled(30, EvalConfig::default())?;
    let x = model.parameter_vector()?;
    assert_eq!(x.len(), 4);
    let base = model.log_likelihood(&x)?;

    // the rho and f0 branches enter through one free amplitude each, so
    // doubling both doubles |A|
    let doubled: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
    let scaled = model.log_likelihood(&doubled)?;
    assert!(close(scaled, base + 30.0 * 4.0f64.ln()));

    let restored = model.log_likelihood(&x)?;
    assert!(close(restored, base));
    Ok(())
}

#[test]
fn changing_a_fixed_mass_matches_a_fresh_model() -> Result<(), PwaError> {
    let (mut shifted, handles) = build(0.775, false, EvalConfig::default())?;
    let (mut fresh, _) = build(0.80, false, EvalConfig::default())?;
    for momenta in events(20, 9) {
        shifted.add_event(momenta.clone())?;
        fresh.add_event(momenta)?;
    }
    shifted.create_partitions()?;
    fresh.create_partitions()?;

    let before = shifted.sum_of_log_intensity()?.total;
    let mass = shifted.tree().particle(handles.rho)?.mass();
    shifted.set_parameter(mass, ParameterValue::Real(0.80))?;
    let after = shifted.sum_of_log_intensity()?.total;
    let expected = fresh.sum_of_log_intensity()?.total;
    assert!(!close(before, after));
    assert!(close(after, expected));
    Ok(())
}

#[test]
fn single_event_amplitude_tracks_parameter_changes() -> Result<(), PwaError> {
    let (mut model, _) = build(0.775, false, EvalConfig::default())?;
    model.add_event(events(1, 3).remove(0))?;
    let before = model.amplitude(0)?;
    let free = model.free_amplitudes();
    assert_eq!(free.len(), 1);
    model.set_parameter(free[0], ParameterValue::Complex(Complex64::new(0.0, 3.0)))?;
    let after = model.amplitude(0)?;
    let expected = before * Complex64::new(0.0, 3.0);
    assert!((after - expected).norm_sqr().sqrt() <= 1e-12 * after.norm_sqr().sqrt());
    Ok(())
}

#[test]
fn exchanging_identical_pions_leaves_the_intensity_unchanged() -> Result<(), PwaError> {
    let (mut model, _) = build(0.775, true, EvalConfig::default())?;
    for momenta in events(10, 5) {
        let swapped = vec![momenta[2], momenta[1], momenta[0]];
        let a = model.add_event(momenta)?;
        let b = model.add_event(swapped)?;
        let (la, lb) = (model.log_intensity(a)?, model.log_intensity(b)?);
        assert!(close(la, lb));
    }
    Ok(())
}

#[test]
fn non_finite_events_are_excluded() -> Result<(), PwaError> {
    let (mut model, _) = build(0.775, false, EvalConfig::default())?;
    for momenta in events(5, 1) {
        model.add_event(momenta)?;
    }
    model.add_event(vec![FourMomentum::zeros(); 3])?;
    model.create_partitions()?;
    let summary = model.sum_of_log_intensity()?;
    assert_eq!(summary.excluded, 1);
    assert!(summary.total.is_finite());

    let (mut strict, _) = build(
        0.775,
        false,
        EvalConfig {
            exclude_non_finite: false,
            ..EvalConfig::default()
        },
    )?;
    strict.add_event(vec![FourMomentum::zeros(); 3])?;
    strict.create_partitions()?;
    assert!(!strict.sum_of_log_intensity()?.total.is_finite());
    Ok(())
}

#[test]
fn new_momenta_replace_cached_values() -> Result<(), PwaError> {
    let (mut model, _) = build(0.775, false, EvalConfig::default())?;
    let sample = events(2, 17);
    model.add_event(sample[0].clone())?;
    let first = model.log_intensity(0)?;
    model.set_event_momenta(0, sample[1].clone())?;
    let replaced = model.log_intensity(0)?;

    let (mut reference, _) = build(0.775, false, EvalConfig::default())?;
    reference.add_event(sample[1].clone())?;
    assert!(close(replaced, reference.log_intensity(0)?));
    assert!(!close(first, replaced));

    let err = model.set_event_momenta(0, sample[1][..2].to_vec()).unwrap_err();
    assert_eq!(err.code(), "wrong-momentum-count");
    Ok(())
}

#[test]
fn passes_require_fresh_partitions() -> Result<(), PwaError> {
    let (mut model, _) = build(0.775, false, EvalConfig::default())?;
    model.add_event(events(1, 2).remove(0))?;
    let err = model.sum_of_log_intensity().unwrap_err();
    assert!(matches!(err, PwaError::Protocol(ref info) if info.code == "no-partitions"));

    model.create_partitions()?;
    model.add_event(events(2, 2).remove(1))?;
    let err = model.sum_of_log_intensity().unwrap_err();
    assert!(matches!(err, PwaError::Data(ref info) if info.code == "uncovered-event"));
    Ok(())
}

#[test]
fn parameter_vector_length_is_checked() -> Result<(), PwaError> {
    let mut model = filled(3, EvalConfig::default())?;
    let err = model.log_likelihood(&[1.0, 0.0, 1.0]).unwrap_err();
    assert!(matches!(err, PwaError::Parameter(ref info) if info.code == "wrong-parameter-count"));
    Ok(())
}

#[test]
fn mass_range_spans_the_dalitz_edge() -> Result<(), PwaError> {
    let (model, _) = build(0.775, false, EvalConfig::default())?;
    let (low, high) = model.mass_range([0, 1])?;
    assert!(close(low, (2.0 * common::PION).powi(2)));
    assert!(close(high, (common::D_MASS - common::PION).powi(2)));
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn every_partitioning_gives_the_same_total(
        count in 1usize..9,
        size in 1usize..12,
        workers in 1usize..4,
    ) {
        let reference = filled(23, EvalConfig::default())
            .and_then(|mut model| model.sum_of_log_intensity())
            .unwrap()
            .total;
        for strategy in [
            PartitionStrategy::Block { count },
            PartitionStrategy::Weave { count },
            PartitionStrategy::BlockBySize { size },
        ] {
            let total = filled(23, config(strategy, workers))
                .and_then(|mut model| model.sum_of_log_intensity())
                .unwrap()
                .total;
            prop_assert!(close(total, reference));
        }
    }
}
