#![deny(missing_docs)]
#![doc = "Event datasets and the partitioning schemes used for independent concurrent evaluation."]

mod dataset;
mod partition;

pub use dataset::DataSet;
pub use partition::{DataPartition, PartitionSpan, PartitionStrategy};
