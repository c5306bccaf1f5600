//! Disjoint and interleaved views over a dataset.

use pwa_core::errors::{ErrorInfo, PwaError};
use serde::{Deserialize, Serialize};
use tracing::info;

/// How a dataset is split into partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PartitionStrategy {
    /// `count` contiguous blocks of ⌈N/count⌉ events.
    Block {
        /// Requested number of blocks.
        count: usize,
    },
    /// `count` strided partitions; partition `i` takes `i, i + count, ...`.
    Weave {
        /// Number of partitions.
        count: usize,
    },
    /// Contiguous blocks of at most `size` events.
    BlockBySize {
        /// Maximum number of events per block.
        size: usize,
    },
}

impl Default for PartitionStrategy {
    fn default() -> Self {
        PartitionStrategy::Block { count: 1 }
    }
}

/// Positions of the events covered by a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PartitionSpan {
    /// Events `start..end`.
    Contiguous {
        /// First event position.
        start: usize,
        /// One past the last event position.
        end: usize,
    },
    /// Events `offset, offset + stride, ...` below `total`.
    Strided {
        /// First event position.
        offset: usize,
        /// Distance between consecutive positions.
        stride: usize,
        /// Dataset size.
        total: usize,
    },
}

/// A view over part of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPartition {
    index: usize,
    span: PartitionSpan,
}

impl DataPartition {
    /// Splits `total` events into `count` contiguous blocks of ⌈total/count⌉.
    ///
    /// `count` degrades to `total` when larger. Fewer blocks are returned when
    /// the block size exhausts the data early; no block is ever empty.
    pub fn blocks(total: usize, count: usize) -> Result<Vec<DataPartition>, PwaError> {
        ensure_nonzero(count, "count")?;
        let count = count.min(total);
        if count == 0 {
            return Ok(Vec::new());
        }
        let size = (total + count - 1) / count;
        let partitions = contiguous(total, size);
        log_created("block", total, count, partitions.len());
        Ok(partitions)
    }

    /// Splits `total` events into blocks of at most `size` events.
    pub fn blocks_by_size(total: usize, size: usize) -> Result<Vec<DataPartition>, PwaError> {
        ensure_nonzero(size, "size")?;
        let partitions = contiguous(total, size);
        log_created("block-by-size", total, size, partitions.len());
        Ok(partitions)
    }

    /// Creates `count` interleaved partitions; `count` degrades to `total` when larger.
    pub fn weave(total: usize, count: usize) -> Result<Vec<DataPartition>, PwaError> {
        ensure_nonzero(count, "count")?;
        let stride = count.min(total);
        let partitions: Vec<DataPartition> = (0..stride)
            .map(|offset| DataPartition {
                index: offset,
                span: PartitionSpan::Strided {
                    offset,
                    stride,
                    total,
                },
            })
            .collect();
        log_created("weave", total, count, partitions.len());
        Ok(partitions)
    }

    /// Applies a configured strategy.
    pub fn from_strategy(strategy: PartitionStrategy, total: usize) -> Result<Vec<DataPartition>, PwaError> {
        match strategy {
            PartitionStrategy::Block { count } => Self::blocks(total, count),
            PartitionStrategy::Weave { count } => Self::weave(total, count),
            PartitionStrategy::BlockBySize { size } => Self::blocks_by_size(total, size),
        }
    }

    /// Position of this partition in the partition set.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Covered event positions.
    pub fn span(&self) -> PartitionSpan {
        self.span
    }

    /// Number of covered events.
    pub fn len(&self) -> usize {
        match self.span {
            PartitionSpan::Contiguous { start, end } => end - start,
            PartitionSpan::Strided {
                offset,
                stride,
                total,
            } => {
                if offset >= total {
                    0
                } else {
                    (total - offset + stride - 1) / stride
                }
            }
        }
    }

    /// Whether the partition covers no event.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the event at `position` belongs to this partition.
    pub fn contains(&self, position: usize) -> bool {
        match self.span {
            PartitionSpan::Contiguous { start, end } => (start..end).contains(&position),
            PartitionSpan::Strided {
                offset,
                stride,
                total,
            } => position < total && position >= offset && (position - offset) % stride == 0,
        }
    }

    /// Iterates over the covered event positions in increasing order.
    pub fn positions(&self) -> Box<dyn Iterator<Item = usize> + Send> {
        match self.span {
            PartitionSpan::Contiguous { start, end } => Box::new(start..end),
            PartitionSpan::Strided {
                offset,
                stride,
                total,
            } => Box::new((offset..total).step_by(stride)),
        }
    }
}

fn contiguous(total: usize, size: usize) -> Vec<DataPartition> {
    (0..total)
        .step_by(size)
        .enumerate()
        .map(|(index, start)| DataPartition {
            index,
            span: PartitionSpan::Contiguous {
                start,
                end: (start + size).min(total),
            },
        })
        .collect()
}

fn ensure_nonzero(value: usize, name: &str) -> Result<(), PwaError> {
    if value == 0 {
        return Err(PwaError::Data(
            ErrorInfo::new("zero-partitions", "partition count and size must be positive")
                .with_context(name, value),
        ));
    }
    Ok(())
}

fn log_created(strategy: &str, total: usize, requested: usize, created: usize) {
    info!(strategy, events = total, requested, created, "data partitions created");
}
