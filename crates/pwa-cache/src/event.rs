//! Per-event kinematic input and value buffers.

use pwa_core::errors::{ErrorInfo, PwaError};
use pwa_core::{Complex64, FourMomentum};

use crate::layout::StorageLayout;

/// One stored value with the generation it was computed under.
///
/// A stamp of zero never matches a live generation, so freshly allocated
/// or cleared cells always read as uncalculated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    /// Stored value.
    pub value: Complex64,
    /// Generation under which the value was written.
    pub stamp: u64,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            value: Complex64::new(0.0, 0.0),
            stamp: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Block {
    cells_per_slot: usize,
    cells: Vec<Cell>,
}

/// A recorded event: final-state four-momenta plus one value buffer per
/// (storage index, symmetrization slot).
#[derive(Debug, Clone)]
pub struct Event {
    momenta: Vec<FourMomentum>,
    blocks: Vec<Block>,
    allocated: bool,
}

impl Event {
    /// Creates an event without storage; see [`Event::allocate`].
    pub fn new(momenta: Vec<FourMomentum>) -> Self {
        Self {
            momenta,
            blocks: Vec::new(),
            allocated: false,
        }
    }

    /// Final-state four-momenta in final-state order.
    pub fn momenta(&self) -> &[FourMomentum] {
        &self.momenta
    }

    /// Four-momentum of the final-state constituent at `index`.
    pub fn momentum(&self, index: usize) -> Result<&FourMomentum, PwaError> {
        self.momenta.get(index).ok_or_else(|| {
            PwaError::Data(
                ErrorInfo::new("missing-momentum", "event has no momentum at index")
                    .with_context("index", index)
                    .with_context("momenta", self.momenta.len()),
            )
        })
    }

    /// Replaces the final-state momenta and invalidates every cached value.
    pub fn set_momenta(&mut self, momenta: Vec<FourMomentum>) -> Result<(), PwaError> {
        if momenta.len() != self.momenta.len() {
            return Err(PwaError::Data(
                ErrorInfo::new("wrong-momentum-count", "momentum count does not match the final state")
                    .with_context("expected", self.momenta.len())
                    .with_context("found", momenta.len()),
            ));
        }
        self.momenta = momenta;
        self.clear_stamps();
        Ok(())
    }

    /// Sizes the value buffers from a frozen layout. Existing values are discarded.
    pub fn allocate(&mut self, layout: &StorageLayout) {
        self.blocks = layout
            .blocks()
            .iter()
            .map(|block| Block {
                cells_per_slot: block.cells,
                cells: vec![Cell::default(); block.len()],
            })
            .collect();
        self.allocated = true;
    }

    /// Whether [`Event::allocate`] has run.
    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    /// Marks every cell as uncalculated.
    fn clear_stamps(&mut self) {
        for block in &mut self.blocks {
            for cell in &mut block.cells {
                cell.stamp = 0;
            }
        }
    }

    /// Reads the cell at `(storage, slot, offset)`.
    pub fn cell(&self, storage: usize, slot: usize, offset: usize) -> Result<Cell, PwaError> {
        let (block, position) = self.position(storage, slot, offset)?;
        Ok(self.blocks[block].cells[position])
    }

    /// Writes the cell at `(storage, slot, offset)`.
    pub fn store(&mut self, storage: usize, slot: usize, offset: usize, cell: Cell) -> Result<(), PwaError> {
        let (block, position) = self.position(storage, slot, offset)?;
        self.blocks[block].cells[position] = cell;
        Ok(())
    }

    fn position(&self, storage: usize, slot: usize, offset: usize) -> Result<(usize, usize), PwaError> {
        if !self.allocated {
            return Err(PwaError::Protocol(
                ErrorInfo::new("storage-not-allocated", "event storage has not been allocated")
                    .with_hint("allocate events from the frozen storage layout"),
            ));
        }
        let out_of_range = || {
            PwaError::Protocol(
                ErrorInfo::new("cell-out-of-range", "cell position exceeds event storage")
                    .with_context("storage", storage)
                    .with_context("slot", slot)
                    .with_context("offset", offset),
            )
        };
        let block = self.blocks.get(storage).ok_or_else(out_of_range)?;
        if offset >= block.cells_per_slot {
            return Err(out_of_range());
        }
        let position = slot * block.cells_per_slot + offset;
        if position >= block.cells.len() {
            return Err(out_of_range());
        }
        Ok((storage, position))
    }
}
