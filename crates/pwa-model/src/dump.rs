//! Diagnostics dump of a prepared model.

use pwa_combination::canonical_hash;
use pwa_core::errors::{ErrorInfo, PwaError};
use pwa_core::ParameterValue;
use pwa_tree::DecayTree;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::Model;

/// Storage summary of one accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessorSummary {
    /// Label given at registration.
    pub label: String,
    /// Equivalence relation name.
    pub equiv: String,
    /// Representative combinations, one per slot.
    pub slots: Vec<String>,
    /// Value cells per slot.
    pub cells: usize,
    /// Dense storage index, absent for accessors never reached.
    pub storage: Option<usize>,
}

/// Snapshot of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    /// Parameter name.
    pub name: String,
    /// Current value.
    pub value: ParameterValue,
    /// Whether the parameter is fixed.
    pub fixed: bool,
}

/// Human and machine readable description of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDump {
    /// SHA-256 fingerprint of the combinations and accessors.
    pub fingerprint: String,
    /// Interned combinations.
    pub combinations: usize,
    /// Every registered accessor.
    pub accessors: Vec<AccessorSummary>,
    /// Per-event storage layout.
    pub layout: String,
    /// Every parameter.
    pub parameters: Vec<ParameterSummary>,
    /// Number of events.
    pub events: usize,
    /// Number of partitions.
    pub partitions: usize,
}

impl ModelDump {
    /// Pretty JSON rendering.
    pub fn to_json(&self) -> Result<String, PwaError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| PwaError::Config(ErrorInfo::new("dump-serialize", err.to_string())))
    }
}

/// Fingerprint of the topology: the canonical combination hash chained with
/// every accessor's label, equivalence and slot representatives.
pub fn fingerprint(tree: &DecayTree) -> Result<String, PwaError> {
    let registry = tree.registry();
    let accessors = tree.accessors();
    let mut hasher = Sha256::new();
    hasher.update(canonical_hash(registry).as_bytes());
    for accessor in accessors.ids() {
        let label = accessors.label(accessor)?;
        hasher.update((label.len() as u64).to_le_bytes());
        hasher.update(label.as_bytes());
        hasher.update(accessors.equiv(accessor)?.label().as_bytes());
        let mut slots: Vec<String> = accessors
            .slots(accessor)?
            .iter()
            .map(|slot| registry.describe(*slot))
            .collect();
        slots.sort();
        hasher.update((slots.len() as u64).to_le_bytes());
        for slot in slots {
            hasher.update(slot.as_bytes());
            hasher.update([0u8]);
        }
    }
    Ok(format!("{:x}", hasher.finalize()))
}

impl Model {
    /// Collects the diagnostics dump.
    pub fn dump(&self) -> Result<ModelDump, PwaError> {
        let tree = self.tree();
        let accessors = tree.accessors();
        let registry = tree.registry();
        let mut summaries = Vec::with_capacity(accessors.len());
        for accessor in accessors.ids() {
            summaries.push(AccessorSummary {
                label: accessors.label(accessor)?.to_string(),
                equiv: accessors.equiv(accessor)?.label().to_string(),
                slots: accessors
                    .slots(accessor)?
                    .iter()
                    .map(|slot| registry.describe(*slot))
                    .collect(),
                cells: accessors.cell_count(accessor)?,
                storage: accessors.try_storage_index(accessor),
            });
        }
        let parameters = self
            .params()
            .iter()
            .map(|(_, parameter)| ParameterSummary {
                name: parameter.name().to_string(),
                value: parameter.value(),
                fixed: parameter.is_fixed(),
            })
            .collect();
        Ok(ModelDump {
            fingerprint: fingerprint(tree)?,
            combinations: registry.len(),
            accessors: summaries,
            layout: self.layout()?.describe(),
            parameters,
            events: self.data().len(),
            partitions: self.partitions().len(),
        })
    }
}
