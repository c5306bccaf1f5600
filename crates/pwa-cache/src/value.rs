//! Cached value registry and its static dependency closure.

use std::collections::{BTreeMap, BTreeSet};

use pwa_core::errors::{ErrorInfo, PwaError};
use pwa_core::{protocol_error, AccessorId, CachedValueId, ParameterId, ParameterStore};
use serde::{Deserialize, Serialize};

use crate::accessor::AccessorIndex;

/// Numeric kind of a cached value. Real values are stored with a zero imaginary part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    /// Real valued quantity.
    Real,
    /// Complex valued quantity.
    Complex,
}

#[derive(Debug, Clone)]
struct ValueRecord {
    name: String,
    owner: AccessorId,
    offset: usize,
    kind: ValueKind,
    upstream: BTreeSet<CachedValueId>,
    parameters: BTreeSet<ParameterId>,
}

#[derive(Debug, Clone, Default)]
struct Closure {
    parameters_of: Vec<BTreeSet<ParameterId>>,
    dependents: BTreeMap<ParameterId, Vec<CachedValueId>>,
}

/// All cached values of a decay tree with their declared dependencies.
///
/// Dependencies are static edges declared at construction time. Freezing
/// computes, for every parameter, the full list of values that depend on it
/// directly or through other values, so invalidation is a lookup.
#[derive(Debug, Clone, Default)]
pub struct CachedValues {
    records: Vec<ValueRecord>,
    closure: Option<Closure>,
}

impl CachedValues {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached values.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no value was registered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over all value identifiers.
    pub fn ids(&self) -> impl Iterator<Item = CachedValueId> + '_ {
        (0..self.records.len()).map(|index| CachedValueId::from_raw(index as u32))
    }

    /// Registers a value owned by `owner`, reserving its cell on the accessor.
    pub fn add(
        &mut self,
        index: &mut AccessorIndex,
        owner: AccessorId,
        name: impl Into<String>,
        kind: ValueKind,
    ) -> Result<CachedValueId, PwaError> {
        self.ensure_mutable()?;
        let offset = index.add_cell(owner)?;
        let id = CachedValueId::from_raw(self.records.len() as u32);
        self.records.push(ValueRecord {
            name: name.into(),
            owner,
            offset,
            kind,
            upstream: BTreeSet::new(),
            parameters: BTreeSet::new(),
        });
        Ok(id)
    }

    /// Declares that `value` is computed from `upstream`.
    pub fn depend_on_value(&mut self, value: CachedValueId, upstream: CachedValueId) -> Result<(), PwaError> {
        self.ensure_mutable()?;
        self.record(upstream)?;
        if value == upstream {
            return Err(PwaError::Protocol(
                ErrorInfo::new("dependency-cycle", "a cached value cannot depend on itself")
                    .with_context("value", value.as_raw()),
            ));
        }
        self.record_mut(value)?.upstream.insert(upstream);
        Ok(())
    }

    /// Declares that `value` is computed from the fit parameter `parameter`.
    pub fn depend_on_parameter(&mut self, value: CachedValueId, parameter: ParameterId) -> Result<(), PwaError> {
        self.ensure_mutable()?;
        self.record_mut(value)?.parameters.insert(parameter);
        Ok(())
    }

    /// Computes the transitive parameter closure and freezes the dependency graph.
    pub fn freeze(&mut self) -> Result<(), PwaError> {
        self.ensure_mutable()?;
        let mut parameters_of: Vec<Option<BTreeSet<ParameterId>>> = vec![None; self.records.len()];
        for start in 0..self.records.len() {
            self.resolve(start, &mut parameters_of, &mut BTreeSet::new())?;
        }
        let parameters_of: Vec<BTreeSet<ParameterId>> =
            parameters_of.into_iter().map(Option::unwrap_or_default).collect();
        let mut dependents: BTreeMap<ParameterId, Vec<CachedValueId>> = BTreeMap::new();
        for (index, parameters) in parameters_of.iter().enumerate() {
            for parameter in parameters {
                dependents
                    .entry(*parameter)
                    .or_default()
                    .push(CachedValueId::from_raw(index as u32));
            }
        }
        self.closure = Some(Closure {
            parameters_of,
            dependents,
        });
        Ok(())
    }

    fn resolve(
        &self,
        index: usize,
        memo: &mut Vec<Option<BTreeSet<ParameterId>>>,
        visiting: &mut BTreeSet<usize>,
    ) -> Result<BTreeSet<ParameterId>, PwaError> {
        if let Some(done) = &memo[index] {
            return Ok(done.clone());
        }
        if !visiting.insert(index) {
            return Err(PwaError::Protocol(
                ErrorInfo::new("dependency-cycle", "cached value dependencies form a cycle")
                    .with_context("value", &self.records[index].name),
            ));
        }
        let record = &self.records[index];
        let mut parameters = record.parameters.clone();
        for upstream in &record.upstream {
            parameters.extend(self.resolve(upstream.index(), memo, visiting)?);
        }
        visiting.remove(&index);
        memo[index] = Some(parameters.clone());
        Ok(parameters)
    }

    /// Whether [`CachedValues::freeze`] has run.
    pub fn is_frozen(&self) -> bool {
        self.closure.is_some()
    }

    /// Every parameter `value` depends on, directly or transitively.
    pub fn parameters_of(&self, value: CachedValueId) -> Result<&BTreeSet<ParameterId>, PwaError> {
        self.frozen_closure()?
            .parameters_of
            .get(value.index())
            .ok_or_else(|| unknown_value(value))
    }

    /// Every value depending on `parameter`, directly or transitively.
    pub fn dependents_of(&self, parameter: ParameterId) -> Result<&[CachedValueId], PwaError> {
        Ok(self
            .frozen_closure()?
            .dependents
            .get(&parameter)
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    /// Whether `value` must be recomputed on every pass, i.e. whether it
    /// depends on at least one parameter that is not fixed.
    pub fn is_volatile(&self, value: CachedValueId, params: &ParameterStore) -> Result<bool, PwaError> {
        Ok(self
            .parameters_of(value)?
            .iter()
            .any(|parameter| !params.is_fixed(*parameter)))
    }

    /// Name given at registration.
    pub fn name(&self, value: CachedValueId) -> Result<&str, PwaError> {
        Ok(&self.record(value)?.name)
    }

    /// Accessor owning the value.
    pub fn owner(&self, value: CachedValueId) -> Result<AccessorId, PwaError> {
        Ok(self.record(value)?.owner)
    }

    /// Cell offset of the value inside its owner's slot.
    pub fn offset(&self, value: CachedValueId) -> Result<usize, PwaError> {
        Ok(self.record(value)?.offset)
    }

    /// Numeric kind of the value.
    pub fn kind(&self, value: CachedValueId) -> Result<ValueKind, PwaError> {
        Ok(self.record(value)?.kind)
    }

    /// Directly declared upstream values.
    pub fn upstream(&self, value: CachedValueId) -> Result<&BTreeSet<CachedValueId>, PwaError> {
        Ok(&self.record(value)?.upstream)
    }

    fn record(&self, value: CachedValueId) -> Result<&ValueRecord, PwaError> {
        self.records.get(value.index()).ok_or_else(|| unknown_value(value))
    }

    fn record_mut(&mut self, value: CachedValueId) -> Result<&mut ValueRecord, PwaError> {
        self.records
            .get_mut(value.index())
            .ok_or_else(|| unknown_value(value))
    }

    fn frozen_closure(&self) -> Result<&Closure, PwaError> {
        self.closure
            .as_ref()
            .ok_or_else(|| protocol_error("not-frozen", "cached value dependencies are not frozen"))
    }

    fn ensure_mutable(&self) -> Result<(), PwaError> {
        if self.closure.is_some() {
            return Err(protocol_error(
                "already-frozen",
                "cached value dependencies are frozen",
            ));
        }
        Ok(())
    }
}

fn unknown_value(value: CachedValueId) -> PwaError {
    PwaError::Protocol(
        ErrorInfo::new("unknown-cached-value", "cached value does not exist")
            .with_context("value", value.as_raw()),
    )
}

#[cfg(test)]
mod tests {
    use pwa_combination::Equiv;
    use pwa_core::ParameterValue;

    use super::*;

    #[test]
    fn closure_follows_value_edges() {
        let mut index = AccessorIndex::new();
        let owner = index.register("node", Equiv::Identity).unwrap();
        let mut params = ParameterStore::new();
        let mass = params.add_fixed("mass", ParameterValue::Real(1.0));
        let coupling = params.add_free("coupling", ParameterValue::Real(0.5));

        let mut values = CachedValues::new();
        let lower = values.add(&mut index, owner, "lower", ValueKind::Real).unwrap();
        let upper = values.add(&mut index, owner, "upper", ValueKind::Complex).unwrap();
        let data_only = values.add(&mut index, owner, "data", ValueKind::Real).unwrap();
        values.depend_on_parameter(lower, mass).unwrap();
        values.depend_on_value(upper, lower).unwrap();
        values.depend_on_parameter(upper, coupling).unwrap();
        values.freeze().unwrap();

        assert_eq!(values.offset(upper).unwrap(), 1);
        assert_eq!(values.dependents_of(mass).unwrap(), &[lower, upper]);
        assert_eq!(values.dependents_of(coupling).unwrap(), &[upper]);
        assert!(!values.is_volatile(lower, &params).unwrap());
        assert!(values.is_volatile(upper, &params).unwrap());
        assert!(!values.is_volatile(data_only, &params).unwrap());
    }

    #[test]
    fn self_dependency_is_rejected() {
        let mut index = AccessorIndex::new();
        let owner = index.register("node", Equiv::Identity).unwrap();
        let mut values = CachedValues::new();
        let value = values.add(&mut index, owner, "v", ValueKind::Real).unwrap();
        assert_eq!(
            values.depend_on_value(value, value).unwrap_err().code(),
            "dependency-cycle"
        );
    }
}
