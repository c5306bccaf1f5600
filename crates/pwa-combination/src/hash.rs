use sha2::{Digest, Sha256};

use crate::registry::{CombinationRegistry, Shape};

/// Computes the canonical structural hash of every combination in the registry.
///
/// The hash only depends on the set of `(parent shape chain, shape)` pairs,
/// not on the order in which combinations were interned.
pub fn canonical_hash(registry: &CombinationRegistry) -> String {
    let mut signatures: Vec<Vec<u64>> = Vec::with_capacity(registry.len());
    for id in registry.ids() {
        let mut signature = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Ok(record) = registry.get(current) else {
                break;
            };
            encode_shape(record.shape(), &mut signature);
            signature.push(u64::MAX);
            cursor = record.parent();
        }
        signatures.push(signature);
    }
    signatures.sort();

    let mut hasher = Sha256::new();
    hasher.update((signatures.len() as u64).to_le_bytes());
    for signature in signatures {
        hasher.update((signature.len() as u64).to_le_bytes());
        for value in signature {
            hasher.update(value.to_le_bytes());
        }
    }
    format!("{:x}", hasher.finalize())
}

// Leaves encode as their index, nodes as an open/close marker pair.
fn encode_shape(shape: &Shape, out: &mut Vec<u64>) {
    match shape {
        Shape::Leaf(index) => out.push(*index as u64),
        Shape::Node(daughters) => {
            out.push(u64::MAX - 1);
            out.push(daughters.len() as u64);
            for daughter in daughters {
                encode_shape(daughter, out);
            }
            out.push(u64::MAX - 2);
        }
    }
}
