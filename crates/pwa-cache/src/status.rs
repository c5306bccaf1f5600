//! Per-partition calculation status and the memoization protocol.

use std::sync::atomic::{AtomicU64, Ordering};

use pwa_core::errors::PwaError;
use pwa_core::{CachedValueId, CombinationId, Complex64, ParameterStore};
use serde::{Deserialize, Serialize};

use crate::accessor::AccessorIndex;
use crate::event::{Cell, Event};
use crate::value::CachedValues;

// Generations are unique process wide, so a stamp written under one table can
// never be mistaken for a live generation of another.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn fresh_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Calculation status of a cached value for one event and slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalculationStatus {
    /// Must be (re)computed before use.
    Uncalculated,
    /// Stored value is current.
    Calculated,
}

/// Calculation-status table of one data partition.
///
/// The table holds the live generation of every `(cached value, slot)`
/// pair. A cell in an event is `Calculated` exactly when its stamp equals
/// the live generation; invalidating a pair is a generation bump, which makes
/// every stored cell of every event in the partition stale at once.
#[derive(Debug, Clone)]
pub struct StatusTable {
    generations: Vec<Vec<u64>>,
}

impl StatusTable {
    /// Creates a table for a frozen accessor index and value registry.
    pub fn new(index: &AccessorIndex, values: &CachedValues) -> Result<Self, PwaError> {
        index.layout()?;
        let mut generations = Vec::with_capacity(values.len());
        for value in values.ids() {
            let owner = values.owner(value)?;
            let slots = index.slot_count(owner)?;
            generations.push((0..slots).map(|_| fresh_generation()).collect());
        }
        Ok(Self { generations })
    }

    /// Status of `value` for `combination` in `event`.
    pub fn status(
        &self,
        index: &AccessorIndex,
        values: &CachedValues,
        value: CachedValueId,
        combination: CombinationId,
        event: &Event,
    ) -> Result<CalculationStatus, PwaError> {
        let target = self.locate(index, values, value, combination)?;
        let cell = event.cell(target.storage, target.slot, target.offset)?;
        Ok(if cell.stamp == target.generation {
            CalculationStatus::Calculated
        } else {
            CalculationStatus::Uncalculated
        })
    }

    /// Returns the stored value when it is current, otherwise runs `compute`,
    /// stores its result and marks it calculated.
    ///
    /// `compute` receives the event so it can recursively query other values.
    pub fn get_or_compute<F>(
        &self,
        index: &AccessorIndex,
        values: &CachedValues,
        value: CachedValueId,
        combination: CombinationId,
        event: &mut Event,
        compute: F,
    ) -> Result<Complex64, PwaError>
    where
        F: FnOnce(&mut Event) -> Result<Complex64, PwaError>,
    {
        let target = self.locate(index, values, value, combination)?;
        let cell = event.cell(target.storage, target.slot, target.offset)?;
        if cell.stamp == target.generation {
            return Ok(cell.value);
        }
        let computed = compute(event)?;
        event.store(
            target.storage,
            target.slot,
            target.offset,
            Cell {
                value: computed,
                stamp: target.generation,
            },
        )?;
        Ok(computed)
    }

    /// Real valued convenience wrapper around [`StatusTable::get_or_compute`].
    pub fn get_or_compute_real<F>(
        &self,
        index: &AccessorIndex,
        values: &CachedValues,
        value: CachedValueId,
        combination: CombinationId,
        event: &mut Event,
        compute: F,
    ) -> Result<f64, PwaError>
    where
        F: FnOnce(&mut Event) -> Result<f64, PwaError>,
    {
        self.get_or_compute(index, values, value, combination, event, |event| {
            compute(event).map(|real| Complex64::new(real, 0.0))
        })
        .map(|stored| stored.re)
    }

    /// Invalidates every value that depends on a non-fixed parameter.
    ///
    /// Values depending only on fixed parameters and event data survive.
    /// Returns the number of invalidated values.
    pub fn reset_for_partition_pass(
        &mut self,
        values: &CachedValues,
        params: &ParameterStore,
    ) -> Result<usize, PwaError> {
        let mut reset = 0;
        for value in values.ids() {
            if values.is_volatile(value, params)? {
                self.invalidate(value);
                reset += 1;
            }
        }
        Ok(reset)
    }

    /// Invalidates every value depending on a parameter flagged as changed.
    pub fn invalidate_changed(
        &mut self,
        values: &CachedValues,
        params: &ParameterStore,
    ) -> Result<usize, PwaError> {
        let mut reset = 0;
        for parameter in params.changed() {
            for value in values.dependents_of(parameter)? {
                self.invalidate(*value);
                reset += 1;
            }
        }
        Ok(reset)
    }

    /// Invalidates all slots of `value`.
    pub fn invalidate(&mut self, value: CachedValueId) {
        if let Some(slots) = self.generations.get_mut(value.index()) {
            for generation in slots.iter_mut() {
                *generation = fresh_generation();
            }
        }
    }

    /// Live generation of `(value, slot)`.
    pub fn generation(&self, value: CachedValueId, slot: usize) -> Option<u64> {
        self.generations.get(value.index())?.get(slot).copied()
    }

    fn locate(
        &self,
        index: &AccessorIndex,
        values: &CachedValues,
        value: CachedValueId,
        combination: CombinationId,
    ) -> Result<Target, PwaError> {
        let owner = values.owner(value)?;
        let slot = index
            .symmetrization_slot(owner, combination)
            .map_err(|err| err.with_context("value", values.name(value).unwrap_or("?")))?;
        let storage = index.storage_index(owner)?;
        let offset = values.offset(value)?;
        let generation = self
            .generation(value, slot)
            .ok_or_else(|| {
                pwa_core::protocol_error(
                    "stale-status-table",
                    "status table was created for a different accessor index",
                )
            })?;
        Ok(Target {
            storage,
            slot,
            offset,
            generation,
        })
    }
}

struct Target {
    storage: usize,
    slot: usize,
    offset: usize,
    generation: u64,
}
