use pwa_core::CombinationId;

use crate::registry::CombinationRegistry;

/// Signature of a caller supplied equivalence predicate.
pub type EquivFn = fn(&CombinationRegistry, CombinationId, CombinationId) -> bool;

/// Equivalence relation deciding which combinations share a symmetrization slot.
#[derive(Clone, Copy)]
pub enum Equiv {
    /// Only the very same interned combination.
    Identity,
    /// Same set of final-state positions regardless of order and structure.
    OrderlessContent,
    /// Same ordered structure below the combination; parents are ignored.
    Down,
    /// Same number of daughters with pairwise equal orderless content; parents are ignored.
    DownByOrderlessContent,
    /// Same ordered structure below the combination and an equivalent parent chain.
    UpAndDown,
    /// Caller supplied predicate.
    Custom(EquivFn),
}

impl Equiv {
    /// Evaluates the relation for two registered combinations.
    ///
    /// Identifiers unknown to the registry are never equivalent to anything
    /// but themselves.
    pub fn equivalent(&self, registry: &CombinationRegistry, a: CombinationId, b: CombinationId) -> bool {
        if a == b {
            return true;
        }
        let (Ok(lhs), Ok(rhs)) = (registry.get(a), registry.get(b)) else {
            return false;
        };
        match self {
            Equiv::Identity => false,
            Equiv::OrderlessContent => lhs.content() == rhs.content(),
            Equiv::Down => lhs.shape() == rhs.shape(),
            Equiv::DownByOrderlessContent => {
                if lhs.daughters().len() != rhs.daughters().len() {
                    return false;
                }
                if lhs.is_final_state() {
                    return lhs.indices() == rhs.indices();
                }
                lhs.daughters()
                    .iter()
                    .zip(rhs.daughters())
                    .all(|(da, db)| Equiv::OrderlessContent.equivalent(registry, *da, *db))
            }
            Equiv::UpAndDown => {
                if lhs.shape() != rhs.shape() {
                    return false;
                }
                match (lhs.parent(), rhs.parent()) {
                    (None, None) => true,
                    (Some(pa), Some(pb)) => Equiv::UpAndDown.equivalent(registry, pa, pb),
                    _ => false,
                }
            }
            Equiv::Custom(predicate) => predicate(registry, a, b),
        }
    }

    /// Stable label used in diagnostics and fingerprints.
    pub fn label(&self) -> &'static str {
        match self {
            Equiv::Identity => "identity",
            Equiv::OrderlessContent => "orderless-content",
            Equiv::Down => "down",
            Equiv::DownByOrderlessContent => "down-by-orderless-content",
            Equiv::UpAndDown => "up-and-down",
            Equiv::Custom(_) => "custom",
        }
    }
}

impl std::fmt::Debug for Equiv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
