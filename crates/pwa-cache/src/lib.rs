#![deny(missing_docs)]
#![doc = "Lazy-evaluation cache of the PWA engine: accessor index, cached values, per-event storage and per-partition calculation status."]

pub mod accessor;
pub mod event;
mod layout;
pub mod status;
pub mod value;

pub use accessor::AccessorIndex;
pub use event::{Cell, Event};
pub use layout::{StorageBlock, StorageLayout};
pub use status::{CalculationStatus, StatusTable};
pub use value::{CachedValues, ValueKind};
