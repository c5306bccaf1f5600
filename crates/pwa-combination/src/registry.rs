use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use pwa_core::errors::{ErrorInfo, PwaError};
use pwa_core::CombinationId;

use crate::ids::{combination_index, make_combination};

/// Ordered structural signature of a combination: final-state positions at
/// the leaves, daughter order preserved.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Shape {
    /// A single final-state constituent at the given input position.
    Leaf(usize),
    /// A composite made of the listed daughter shapes, in order.
    Node(Vec<Shape>),
}

impl Shape {
    fn collect_indices(&self, out: &mut Vec<usize>) {
        match self {
            Shape::Leaf(index) => out.push(*index),
            Shape::Node(daughters) => {
                for daughter in daughters {
                    daughter.collect_indices(out);
                }
            }
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            Shape::Leaf(index) => {
                let _ = write!(out, "{index}");
            }
            Shape::Node(daughters) => {
                out.push('(');
                for (idx, daughter) in daughters.iter().enumerate() {
                    if idx > 0 {
                        out.push_str(", ");
                    }
                    daughter.render(out);
                }
                out.push(')');
            }
        }
    }
}

/// Immutable combination record stored in the registry arena.
#[derive(Debug, Clone)]
pub struct Combination {
    indices: Vec<usize>,
    parent: Option<CombinationId>,
    daughters: Vec<CombinationId>,
    shape: Shape,
}

impl Combination {
    /// Final-state positions covered by this combination, in structural order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Non-owning link to the combination this one is a daughter of.
    pub fn parent(&self) -> Option<CombinationId> {
        self.parent
    }

    /// Ordered daughters; every daughter's parent is this combination.
    pub fn daughters(&self) -> &[CombinationId] {
        &self.daughters
    }

    /// Whether this is a single final-state constituent.
    pub fn is_final_state(&self) -> bool {
        self.daughters.is_empty()
    }

    /// Structural signature of this combination.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Sorted set of final-state positions.
    pub fn content(&self) -> BTreeSet<usize> {
        self.indices.iter().copied().collect()
    }
}

type InternKey = (Option<CombinationId>, Shape);

/// Interning arena of combinations.
///
/// Requests with the same parent and the same ordered structure return the
/// same identifier. A composite's daughters are always re-interned with the
/// composite as their parent, so walking `daughters()` from any combination
/// yields parent-linked nodes while the prototypes passed to
/// [`CombinationRegistry::intern`] stay parentless.
#[derive(Debug, Clone, Default)]
pub struct CombinationRegistry {
    records: Vec<Combination>,
    lookup: BTreeMap<InternKey, CombinationId>,
}

impl CombinationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of interned combinations.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no combination has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over all interned identifiers in creation order.
    pub fn ids(&self) -> impl Iterator<Item = CombinationId> + '_ {
        (0..self.records.len()).map(make_combination)
    }

    /// Returns the record behind `id`.
    pub fn get(&self, id: CombinationId) -> Result<&Combination, PwaError> {
        self.records
            .get(combination_index(id))
            .ok_or_else(|| unknown_combination(id))
    }

    /// Interns the parentless combination of the final-state constituent at `index`.
    pub fn final_state(&mut self, index: usize) -> CombinationId {
        self.intern_shape(None, &Shape::Leaf(index))
    }

    /// Interns the composite made of `daughters` below `parent`.
    ///
    /// Daughters must already be registered (trees are built bottom-up) and
    /// must not share final-state positions.
    pub fn intern(
        &mut self,
        parent: Option<CombinationId>,
        daughters: &[CombinationId],
    ) -> Result<CombinationId, PwaError> {
        let shape = self.composite_shape(parent, daughters)?;
        Ok(self.intern_shape(parent, &shape))
    }

    /// Looks up a composite without creating it.
    pub fn find(
        &self,
        parent: Option<CombinationId>,
        daughters: &[CombinationId],
    ) -> Option<CombinationId> {
        let shape = self.composite_shape(parent, daughters).ok()?;
        self.lookup.get(&(parent, shape)).copied()
    }

    /// Looks up a final-state leaf without creating it.
    pub fn find_final_state(&self, parent: Option<CombinationId>, index: usize) -> Option<CombinationId> {
        self.lookup.get(&(parent, Shape::Leaf(index))).copied()
    }

    /// Whether two combinations have at least one final-state position in common.
    pub fn shares_indices(&self, a: CombinationId, b: CombinationId) -> Result<bool, PwaError> {
        let a = self.get(a)?;
        let b = self.get(b)?;
        Ok(a.indices.iter().any(|index| b.indices.contains(index)))
    }

    /// Daughters of this combination's parent other than itself.
    pub fn siblings(&self, id: CombinationId) -> Result<Vec<CombinationId>, PwaError> {
        let Some(parent) = self.get(id)?.parent else {
            return Ok(Vec::new());
        };
        Ok(self
            .get(parent)?
            .daughters
            .iter()
            .copied()
            .filter(|daughter| *daughter != id)
            .collect())
    }

    /// Human readable rendering such as `((0, 1), 2)`, with the parent chain
    /// appended as `<- ...` when present.
    pub fn describe(&self, id: CombinationId) -> String {
        let Ok(record) = self.get(id) else {
            return format!("<unknown {}>", id.as_raw());
        };
        let mut out = String::new();
        record.shape.render(&mut out);
        if let Some(parent) = record.parent {
            out.push_str(" <- ");
            out.push_str(&self.describe(parent));
        }
        out
    }

    fn composite_shape(
        &self,
        parent: Option<CombinationId>,
        daughters: &[CombinationId],
    ) -> Result<Shape, PwaError> {
        if let Some(parent) = parent {
            self.get(parent)?;
        }
        if daughters.len() < 2 {
            return Err(PwaError::Combination(
                ErrorInfo::new(
                    "too-few-daughters",
                    "composite combinations need at least two daughters",
                )
                .with_context("daughters", daughters.len())
                .with_hint("use final_state for single constituents"),
            ));
        }
        let mut seen = BTreeSet::new();
        let mut shapes = Vec::with_capacity(daughters.len());
        for daughter in daughters {
            let record = self.get(*daughter)?;
            for index in &record.indices {
                if !seen.insert(*index) {
                    return Err(PwaError::Combination(
                        ErrorInfo::new(
                            "overlapping-daughters",
                            "daughters share a final-state constituent",
                        )
                        .with_context("index", index)
                        .with_context("daughter", daughter.as_raw()),
                    ));
                }
            }
            shapes.push(record.shape.clone());
        }
        Ok(Shape::Node(shapes))
    }

    fn intern_shape(&mut self, parent: Option<CombinationId>, shape: &Shape) -> CombinationId {
        if let Some(existing) = self.lookup.get(&(parent, shape.clone())) {
            return *existing;
        }
        let id = make_combination(self.records.len());
        let mut indices = Vec::new();
        shape.collect_indices(&mut indices);
        self.records.push(Combination {
            indices,
            parent,
            daughters: Vec::new(),
            shape: shape.clone(),
        });
        self.lookup.insert((parent, shape.clone()), id);
        if let Shape::Node(children) = shape {
            let daughters: Vec<CombinationId> = children
                .iter()
                .map(|child| self.intern_shape(Some(id), child))
                .collect();
            self.records[combination_index(id)].daughters = daughters;
        }
        id
    }
}

fn unknown_combination(id: CombinationId) -> PwaError {
    PwaError::Combination(
        ErrorInfo::new("unknown-combination", "combination does not exist")
            .with_context("combination", id.as_raw()),
    )
}
