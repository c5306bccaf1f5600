#![deny(missing_docs)]
#![doc = "Core identifiers, error types and fit parameters shared by the PWA amplitude engine crates."]

use serde::{Deserialize, Serialize};

pub mod errors;
pub mod params;
pub mod rng;

pub use errors::{construction_error, data_error, protocol_error, ErrorInfo, PwaError};
pub use params::{Parameter, ParameterStore, ParameterValue, VariableStatus};
pub use rng::{derive_substream_seed, RngHandle};

/// Double precision complex number used for all amplitudes.
pub type Complex64 = nalgebra::Complex<f64>;

/// Four-momentum `(E, px, py, pz)` of a final-state constituent.
pub type FourMomentum = nalgebra::Vector4<f64>;

/// Identifier of a combination interned in a combination registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CombinationId(u32);

impl CombinationId {
    /// Creates a new identifier from its raw integer representation.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u32 {
        self.0
    }

    /// Returns the identifier as an arena index.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Identifier of a data accessor (a node owning per-event storage).
///
/// This is the registration identifier, not the dense storage index, which
/// is only assigned when the accessor index is frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccessorId(u32);

impl AccessorId {
    /// Creates a new identifier from its raw integer representation.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u32 {
        self.0
    }

    /// Returns the identifier as an arena index.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Identifier of a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CachedValueId(u32);

impl CachedValueId {
    /// Creates a new identifier from its raw integer representation.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u32 {
        self.0
    }

    /// Returns the identifier as an arena index.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Identifier of a fit parameter inside a [`ParameterStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParameterId(u32);

impl ParameterId {
    /// Creates a new identifier from its raw integer representation.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u32 {
        self.0
    }

    /// Returns the identifier as a store index.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}
