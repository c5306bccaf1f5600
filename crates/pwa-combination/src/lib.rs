#![deny(missing_docs)]
#![doc = "Interning registry of final-state groupings and the equivalence relations used to share storage slots between them."]

mod equiv;
mod hash;
mod ids;
mod registry;

pub use equiv::{Equiv, EquivFn};
pub use hash::canonical_hash;
pub use registry::{Combination, CombinationRegistry, Shape};
