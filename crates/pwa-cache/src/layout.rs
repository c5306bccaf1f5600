use std::fmt::Write as _;

use pwa_core::AccessorId;
use serde::{Deserialize, Serialize};

/// Storage owned by one indexed accessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageBlock {
    /// Accessor owning the block.
    pub accessor: AccessorId,
    /// Label of the accessor.
    pub label: String,
    /// Number of symmetrization slots.
    pub slots: usize,
    /// Number of value cells per slot.
    pub cells: usize,
}

impl StorageBlock {
    /// Cells held per event by this block.
    pub fn len(&self) -> usize {
        self.slots * self.cells
    }

    /// Whether the block holds no cell.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-event storage layout, indexed by dense storage index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLayout {
    blocks: Vec<StorageBlock>,
}

impl StorageLayout {
    pub(crate) fn new(blocks: Vec<StorageBlock>) -> Self {
        Self { blocks }
    }

    /// Blocks ordered by storage index.
    pub fn blocks(&self) -> &[StorageBlock] {
        &self.blocks
    }

    /// Total number of cells allocated per event.
    pub fn total_cells(&self) -> usize {
        self.blocks.iter().map(StorageBlock::len).sum()
    }

    /// One line per block: `[index] label: slots x cells`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (index, block) in self.blocks.iter().enumerate() {
            let _ = writeln!(
                out,
                "[{index}] {}: {} slots x {} cells",
                block.label, block.slots, block.cells
            );
        }
        let _ = write!(out, "total cells per event: {}", self.total_cells());
        out
    }
}
