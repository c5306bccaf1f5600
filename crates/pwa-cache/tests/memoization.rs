use pwa_cache::{AccessorIndex, CachedValues, CalculationStatus, Event, StatusTable, ValueKind};
use pwa_combination::{CombinationRegistry, Equiv};
use pwa_core::{
    AccessorId, CachedValueId, CombinationId, Complex64, FourMomentum, ParameterId,
    ParameterStore, ParameterValue, PwaError,
};

struct Fixture {
    registry: CombinationRegistry,
    index: AccessorIndex,
    values: CachedValues,
    params: ParameterStore,
    pair: CombinationId,
    width: ParameterId,
    mass: ParameterId,
    width_value: CachedValueId,
    mass_value: CachedValueId,
}

fn fixture() -> Fixture {
    let mut registry = CombinationRegistry::new();
    let a = registry.final_state(0);
    let b = registry.final_state(1);
    let pair = registry.intern(None, &[a, b]).unwrap();

    let mut params = ParameterStore::new();
    let width = params.add_free("width", ParameterValue::Real(0.15));
    let mass = params.add_fixed("mass", ParameterValue::Real(0.775));

    let mut index = AccessorIndex::new();
    let shape: AccessorId = index.register("shape", Equiv::OrderlessContent).unwrap();
    let mut values = CachedValues::new();
    let mass_value = values.add(&mut index, shape, "nominal", ValueKind::Real).unwrap();
    let width_value = values.add(&mut index, shape, "lineshape", ValueKind::Complex).unwrap();
    values.depend_on_parameter(mass_value, mass).unwrap();
    values.depend_on_value(width_value, mass_value).unwrap();
    values.depend_on_parameter(width_value, width).unwrap();

    index.add_symmetrization_slot(&registry, shape, pair).unwrap();
    index.freeze_and_index(&registry).unwrap();
    values.freeze().unwrap();

    Fixture {
        registry,
        index,
        values,
        params,
        pair,
        width,
        mass,
        width_value,
        mass_value,
    }
}

fn event(fixture: &Fixture) -> Event {
    let mut event = Event::new(vec![
        FourMomentum::new(0.5, 0.0, 0.0, 0.3),
        FourMomentum::new(0.5, 0.0, 0.0, -0.3),
    ]);
    event.allocate(&fixture.index.layout().unwrap());
    event
}

fn width_of(fixture: &Fixture, table: &StatusTable, event: &mut Event, calls: &mut usize) -> Complex64 {
    let width = fixture.params.real(fixture.width).unwrap();
    table
        .get_or_compute(
            &fixture.index,
            &fixture.values,
            fixture.width_value,
            fixture.pair,
            event,
            |_| {
                *calls += 1;
                Ok(Complex64::new(width, 1.0))
            },
        )
        .unwrap()
}

#[test]
fn second_query_is_served_from_cache() {
    let fixture = fixture();
    let table = StatusTable::new(&fixture.index, &fixture.values).unwrap();
    let mut event = event(&fixture);
    let mut calls = 0;

    let status = table
        .status(&fixture.index, &fixture.values, fixture.width_value, fixture.pair, &event)
        .unwrap();
    assert_eq!(status, CalculationStatus::Uncalculated);

    let first = width_of(&fixture, &table, &mut event, &mut calls);
    let second = width_of(&fixture, &table, &mut event, &mut calls);
    assert_eq!(calls, 1);
    assert_eq!(first.re.to_bits(), second.re.to_bits());
    assert_eq!(first.im.to_bits(), second.im.to_bits());

    let status = table
        .status(&fixture.index, &fixture.values, fixture.width_value, fixture.pair, &event)
        .unwrap();
    assert_eq!(status, CalculationStatus::Calculated);
}

#[test]
fn changed_parameter_forces_recomputation() {
    let mut fixture = fixture();
    let mut table = StatusTable::new(&fixture.index, &fixture.values).unwrap();
    let mut event = event(&fixture);
    let mut calls = 0;
    width_of(&fixture, &table, &mut event, &mut calls);

    fixture.params.set(fixture.width, ParameterValue::Real(0.2)).unwrap();
    table.invalidate_changed(&fixture.values, &fixture.params).unwrap();
    table.reset_for_partition_pass(&fixture.values, &fixture.params).unwrap();
    let value = width_of(&fixture, &table, &mut event, &mut calls);
    assert_eq!(calls, 2);
    assert_eq!(value.re, 0.2);
}

#[test]
fn values_of_fixed_parameters_survive_pass_resets() {
    let mut fixture = fixture();
    let mut table = StatusTable::new(&fixture.index, &fixture.values).unwrap();
    let mut event = event(&fixture);
    let mut calls = 0;
    let nominal = |table: &StatusTable, event: &mut Event, calls: &mut usize| {
        table
            .get_or_compute_real(
                &fixture.index,
                &fixture.values,
                fixture.mass_value,
                fixture.pair,
                event,
                |_| {
                    *calls += 1;
                    Ok(0.775)
                },
            )
            .unwrap()
    };
    nominal(&table, &mut event, &mut calls);
    let reset = table.reset_for_partition_pass(&fixture.values, &fixture.params).unwrap();
    assert_eq!(reset, 1);
    nominal(&table, &mut event, &mut calls);
    assert_eq!(calls, 1);

    // an explicit change of a fixed parameter still invalidates its dependents
    fixture.params.set(fixture.mass, ParameterValue::Real(0.78)).unwrap();
    let invalidated = table.invalidate_changed(&fixture.values, &fixture.params).unwrap();
    assert_eq!(invalidated, 2);
    let mut calls_after = 0;
    table
        .get_or_compute_real(
            &fixture.index,
            &fixture.values,
            fixture.mass_value,
            fixture.pair,
            &mut event,
            |_| {
                calls_after += 1;
                Ok(0.78)
            },
        )
        .unwrap();
    assert_eq!(calls_after, 1);
}

#[test]
fn new_events_and_new_momenta_start_uncalculated() {
    let fixture = fixture();
    let table = StatusTable::new(&fixture.index, &fixture.values).unwrap();
    let mut first = event(&fixture);
    let mut calls = 0;
    width_of(&fixture, &table, &mut first, &mut calls);

    let mut second = event(&fixture);
    width_of(&fixture, &table, &mut second, &mut calls);
    assert_eq!(calls, 2);

    let momenta = first.momenta().to_vec();
    first.set_momenta(momenta).unwrap();
    width_of(&fixture, &table, &mut first, &mut calls);
    assert_eq!(calls, 3);

    let err = first.set_momenta(Vec::new()).unwrap_err();
    assert!(matches!(err, PwaError::Data(info) if info.code == "wrong-momentum-count"));
}

#[test]
fn partitions_do_not_observe_each_other() {
    let fixture = fixture();
    let left = StatusTable::new(&fixture.index, &fixture.values).unwrap();
    let right = StatusTable::new(&fixture.index, &fixture.values).unwrap();
    let mut event = event(&fixture);
    let mut calls = 0;
    width_of(&fixture, &left, &mut event, &mut calls);
    width_of(&fixture, &right, &mut event, &mut calls);
    assert_eq!(calls, 2);
}

#[test]
fn unregistered_combination_is_a_protocol_error() {
    let fixture = fixture();
    let table = StatusTable::new(&fixture.index, &fixture.values).unwrap();
    let mut event = event(&fixture);
    let leaf = fixture.registry.find_final_state(None, 0).unwrap();
    let result = table.get_or_compute(
        &fixture.index,
        &fixture.values,
        fixture.width_value,
        leaf,
        &mut event,
        |_| Ok(Complex64::new(1.0, 0.0)),
    );
    assert!(matches!(
        result,
        Err(PwaError::Protocol(info)) if info.code == "no-symmetrization-slot"
    ));
}

#[test]
fn unallocated_event_is_rejected() {
    let fixture = fixture();
    let table = StatusTable::new(&fixture.index, &fixture.values).unwrap();
    let mut event = Event::new(vec![FourMomentum::new(1.0, 0.0, 0.0, 0.0); 2]);
    let result = table.get_or_compute(
        &fixture.index,
        &fixture.values,
        fixture.width_value,
        fixture.pair,
        &mut event,
        |_| Ok(Complex64::new(1.0, 0.0)),
    );
    assert_eq!(result.unwrap_err().code(), "storage-not-allocated");
}
