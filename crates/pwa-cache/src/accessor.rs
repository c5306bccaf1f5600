//! Accessor index: dense storage indices and per-accessor symmetrization slots.

use std::collections::BTreeMap;

use pwa_combination::{CombinationRegistry, Equiv};
use pwa_core::errors::{ErrorInfo, PwaError};
use pwa_core::{protocol_error, AccessorId, CombinationId};
use tracing::info;

use crate::layout::{StorageBlock, StorageLayout};

#[derive(Debug, Clone)]
struct AccessorRecord {
    label: String,
    equiv: Equiv,
    cells: usize,
    // one representative combination per slot, in allocation order
    slots: Vec<CombinationId>,
    storage_index: Option<usize>,
    lookup: BTreeMap<CombinationId, usize>,
}

/// Registry of every node that owns per-event storage.
///
/// Slots are added while the decay tree grows. [`AccessorIndex::freeze_and_index`]
/// is one-way: afterwards the slot mappings are immutable, every accessor
/// holding at least one slot owns a dense storage index, and slot lookups are
/// answered from a table precomputed over the whole combination registry.
#[derive(Debug, Clone, Default)]
pub struct AccessorIndex {
    records: Vec<AccessorRecord>,
    frozen: bool,
}

impl AccessorIndex {
    /// Creates an empty, unfrozen index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered accessors, indexed or not.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no accessor was registered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether [`AccessorIndex::freeze_and_index`] has run.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Iterates over all registered accessors.
    pub fn ids(&self) -> impl Iterator<Item = AccessorId> + '_ {
        (0..self.records.len()).map(|index| AccessorId::from_raw(index as u32))
    }

    /// Registers a new accessor using `equiv` to group combinations into slots.
    pub fn register(&mut self, label: impl Into<String>, equiv: Equiv) -> Result<AccessorId, PwaError> {
        self.ensure_mutable()?;
        let id = AccessorId::from_raw(self.records.len() as u32);
        self.records.push(AccessorRecord {
            label: label.into(),
            equiv,
            cells: 0,
            slots: Vec::new(),
            storage_index: None,
            lookup: BTreeMap::new(),
        });
        Ok(id)
    }

    /// Reserves one more value cell per slot on `accessor` and returns its offset.
    pub fn add_cell(&mut self, accessor: AccessorId) -> Result<usize, PwaError> {
        self.ensure_mutable()?;
        let record = self.record_mut(accessor)?;
        record.cells += 1;
        Ok(record.cells - 1)
    }

    /// Returns the slot of `combination`, allocating a new one unless an
    /// equivalent combination already owns a slot.
    pub fn add_symmetrization_slot(
        &mut self,
        registry: &CombinationRegistry,
        accessor: AccessorId,
        combination: CombinationId,
    ) -> Result<usize, PwaError> {
        self.ensure_mutable()?;
        registry.get(combination)?;
        if let Some(slot) = self.find_slot(registry, accessor, combination) {
            return Ok(slot);
        }
        let record = self.record_mut(accessor)?;
        record.slots.push(combination);
        Ok(record.slots.len() - 1)
    }

    /// Drops every slot of every accessor so they can be rebuilt.
    pub fn clear_slots(&mut self) -> Result<(), PwaError> {
        self.ensure_mutable()?;
        for record in &mut self.records {
            record.slots.clear();
        }
        Ok(())
    }

    /// Looks up the slot of `combination` by scanning the representatives.
    ///
    /// Works before and after freezing; the frozen fast path is
    /// [`AccessorIndex::symmetrization_slot`].
    pub fn find_slot(
        &self,
        registry: &CombinationRegistry,
        accessor: AccessorId,
        combination: CombinationId,
    ) -> Option<usize> {
        let record = self.records.get(accessor.index())?;
        record
            .slots
            .iter()
            .position(|representative| record.equiv.equivalent(registry, *representative, combination))
    }

    /// Freezes the index, assigns dense storage indices and precomputes slot lookups.
    pub fn freeze_and_index(&mut self, registry: &CombinationRegistry) -> Result<StorageLayout, PwaError> {
        if self.frozen {
            return Err(PwaError::Protocol(
                ErrorInfo::new("already-frozen", "accessor index was already frozen")
                    .with_hint("freeze_and_index must be called exactly once"),
            ));
        }
        let mut next = 0usize;
        for record in &mut self.records {
            if record.slots.is_empty() {
                continue;
            }
            record.storage_index = Some(next);
            next += 1;
            for id in registry.ids() {
                if let Some(slot) = record
                    .slots
                    .iter()
                    .position(|representative| record.equiv.equivalent(registry, *representative, id))
                {
                    record.lookup.insert(id, slot);
                }
            }
        }
        self.frozen = true;
        let layout = self.layout()?;
        info!(
            accessors = self.records.len(),
            indexed = layout.blocks().len(),
            cells = layout.total_cells(),
            "accessor index frozen"
        );
        Ok(layout)
    }

    /// Storage layout of the frozen index.
    pub fn layout(&self) -> Result<StorageLayout, PwaError> {
        self.ensure_frozen()?;
        let mut blocks = Vec::new();
        for (index, record) in self.records.iter().enumerate() {
            if record.storage_index.is_some() {
                blocks.push(StorageBlock {
                    accessor: AccessorId::from_raw(index as u32),
                    label: record.label.clone(),
                    slots: record.slots.len(),
                    cells: record.cells,
                });
            }
        }
        Ok(StorageLayout::new(blocks))
    }

    /// Slot of `combination` on a frozen accessor.
    pub fn symmetrization_slot(
        &self,
        accessor: AccessorId,
        combination: CombinationId,
    ) -> Result<usize, PwaError> {
        self.ensure_frozen()?;
        self.record(accessor)?
            .lookup
            .get(&combination)
            .copied()
            .ok_or_else(|| {
                PwaError::Protocol(
                    ErrorInfo::new(
                        "no-symmetrization-slot",
                        "no equivalent combination was registered on the accessor",
                    )
                    .with_context("accessor", self.label(accessor).unwrap_or("?"))
                    .with_context("combination", combination.as_raw()),
                )
            })
    }

    /// Whether a frozen accessor holds a slot for `combination`.
    pub fn has_slot(&self, accessor: AccessorId, combination: CombinationId) -> bool {
        self.records
            .get(accessor.index())
            .map(|record| record.lookup.contains_key(&combination))
            .unwrap_or(false)
    }

    /// Dense storage index of an accessor.
    pub fn storage_index(&self, accessor: AccessorId) -> Result<usize, PwaError> {
        self.ensure_frozen()?;
        self.record(accessor)?.storage_index.ok_or_else(|| {
            PwaError::Protocol(
                ErrorInfo::new("not-indexed", "accessor holds no slot and owns no storage")
                    .with_context("accessor", accessor.as_raw()),
            )
        })
    }

    /// Optional storage index; `None` for accessors that were never reached.
    pub fn try_storage_index(&self, accessor: AccessorId) -> Option<usize> {
        self.records.get(accessor.index()).and_then(|record| record.storage_index)
    }

    /// Label given at registration.
    pub fn label(&self, accessor: AccessorId) -> Result<&str, PwaError> {
        Ok(&self.record(accessor)?.label)
    }

    /// Equivalence relation of an accessor.
    pub fn equiv(&self, accessor: AccessorId) -> Result<Equiv, PwaError> {
        Ok(self.record(accessor)?.equiv)
    }

    /// Representative combinations, one per slot.
    pub fn slots(&self, accessor: AccessorId) -> Result<&[CombinationId], PwaError> {
        Ok(&self.record(accessor)?.slots)
    }

    /// Number of slots of an accessor.
    pub fn slot_count(&self, accessor: AccessorId) -> Result<usize, PwaError> {
        Ok(self.record(accessor)?.slots.len())
    }

    /// Number of value cells per slot.
    pub fn cell_count(&self, accessor: AccessorId) -> Result<usize, PwaError> {
        Ok(self.record(accessor)?.cells)
    }

    fn record(&self, accessor: AccessorId) -> Result<&AccessorRecord, PwaError> {
        self.records
            .get(accessor.index())
            .ok_or_else(|| unknown_accessor(accessor))
    }

    fn record_mut(&mut self, accessor: AccessorId) -> Result<&mut AccessorRecord, PwaError> {
        self.records
            .get_mut(accessor.index())
            .ok_or_else(|| unknown_accessor(accessor))
    }

    fn ensure_mutable(&self) -> Result<(), PwaError> {
        if self.frozen {
            return Err(protocol_error(
                "already-frozen",
                "accessor index is frozen and cannot be modified",
            ));
        }
        Ok(())
    }

    fn ensure_frozen(&self) -> Result<(), PwaError> {
        if !self.frozen {
            return Err(PwaError::Protocol(
                ErrorInfo::new("not-frozen", "accessor index has not been frozen yet")
                    .with_hint("call freeze_and_index after the decay tree is built"),
            ));
        }
        Ok(())
    }
}

fn unknown_accessor(accessor: AccessorId) -> PwaError {
    PwaError::Protocol(
        ErrorInfo::new("unknown-accessor", "accessor does not exist")
            .with_context("accessor", accessor.as_raw()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_shared_between_equivalent_combinations() {
        let mut registry = CombinationRegistry::new();
        let a = registry.final_state(0);
        let b = registry.final_state(1);
        let ab = registry.intern(None, &[a, b]).unwrap();
        let ba = registry.intern(None, &[b, a]).unwrap();

        let mut index = AccessorIndex::new();
        let mass = index.register("mass", Equiv::OrderlessContent).unwrap();
        let channel = index.register("channel", Equiv::UpAndDown).unwrap();
        assert_eq!(index.add_symmetrization_slot(&registry, mass, ab).unwrap(), 0);
        assert_eq!(index.add_symmetrization_slot(&registry, mass, ba).unwrap(), 0);
        assert_eq!(index.add_symmetrization_slot(&registry, channel, ab).unwrap(), 0);
        assert_eq!(index.add_symmetrization_slot(&registry, channel, ba).unwrap(), 1);
        assert_eq!(index.find_slot(&registry, mass, a), None);
    }

    #[test]
    fn unreached_accessors_get_no_storage() {
        let mut registry = CombinationRegistry::new();
        let a = registry.final_state(0);
        let mut index = AccessorIndex::new();
        let unused = index.register("unused", Equiv::Identity).unwrap();
        let used = index.register("used", Equiv::Identity).unwrap();
        index.add_cell(used).unwrap();
        index.add_symmetrization_slot(&registry, used, a).unwrap();
        let layout = index.freeze_and_index(&registry).unwrap();
        assert_eq!(layout.blocks().len(), 1);
        assert_eq!(index.storage_index(used).unwrap(), 0);
        assert_eq!(index.storage_index(unused).unwrap_err().code(), "not-indexed");
    }

    #[test]
    fn frozen_index_rejects_mutation_and_second_freeze() {
        let registry = CombinationRegistry::new();
        let mut index = AccessorIndex::new();
        assert_eq!(index.layout().unwrap_err().code(), "not-frozen");
        index.freeze_and_index(&registry).unwrap();
        assert_eq!(
            index.freeze_and_index(&registry).unwrap_err().code(),
            "already-frozen"
        );
        assert_eq!(
            index.register("late", Equiv::Identity).unwrap_err().code(),
            "already-frozen"
        );
    }
}
