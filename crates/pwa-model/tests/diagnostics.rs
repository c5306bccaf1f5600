mod common;

use pwa_core::{ParameterValue, PwaError};
use pwa_model::{EvalConfig, ModelDump};
use pwa_tree::MassShape;

use common::{build, events, filled};

#[test]
fn prepared_model_is_consistent() -> Result<(), PwaError> {
    let model = filled(12, EvalConfig::default())?;
    let report = model.consistency_check();
    assert!(report.is_consistent(), "{:?}", report.violations);
    Ok(())
}

#[test]
fn consistency_check_reports_without_mutating() -> Result<(), PwaError> {
    let (mut model, handles) = build(0.775, false, EvalConfig::default())?;
    for momenta in events(4, 8) {
        model.add_event(momenta)?;
    }
    model.create_partitions()?;
    let before = model.sum_of_log_intensity()?.total;

    let width = match model.tree().particle(handles.rho)?.decaying().map(|d| d.shape()) {
        Some(MassShape::BreitWigner(bw)) => bw.width(),
        _ => panic!("rho has a Breit-Wigner shape"),
    };
    model.set_parameter(width, ParameterValue::Real(-0.1))?;
    model.add_event(events(5, 8).remove(4))?;

    let report = model.consistency_check();
    assert!(!report.is_consistent());
    assert!(report.has("non-positive-width"));
    assert!(report.has("stale-partitions"));

    model.set_parameter(width, ParameterValue::Real(0.149))?;
    model.create_partitions()?;
    assert!(model.consistency_check().is_consistent());
    let after = model.sum_of_log_intensity()?.total;
    // one more event than before, but the first four are unchanged
    let extra = model.log_intensity(4)?;
    assert!((after - extra - before).abs() <= 1e-9 * before.abs().max(1.0));
    Ok(())
}

#[test]
fn dump_fingerprint_tracks_topology() -> Result<(), PwaError> {
    let (a, _) = build(0.775, true, EvalConfig::default())?;
    let (b, _) = build(0.775, true, EvalConfig::default())?;
    let (c, _) = build(0.775, false, EvalConfig::default())?;

    let dump_a = a.dump()?;
    assert_eq!(dump_a.fingerprint, b.dump()?.fingerprint);
    assert_ne!(dump_a.fingerprint, c.dump()?.fingerprint);
    assert_eq!(dump_a.fingerprint.len(), 64);

    let json = dump_a.to_json()?;
    let parsed: ModelDump = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.fingerprint, dump_a.fingerprint);
    assert_eq!(parsed.accessors, dump_a.accessors);
    assert_eq!(parsed.layout, dump_a.layout);
    assert!(dump_a.accessors.iter().any(|acc| acc.label == "measured masses" && acc.storage.is_some()));
    assert!(dump_a.parameters.iter().any(|p| p.name == "rho0.mass" && p.fixed));
    Ok(())
}

#[test]
fn model_requires_a_valid_config() {
    let config = EvalConfig {
        concurrency: 0,
        ..EvalConfig::default()
    };
    let err = build(0.775, false, config).err().unwrap();
    assert!(matches!(err, PwaError::Config(ref info) if info.code == "invalid-config"));
}
