use std::collections::BTreeSet;

use pwa_combination::{canonical_hash, CombinationRegistry, Equiv};
use pwa_core::{CombinationId, PwaError};
use proptest::prelude::*;

fn check_parent_links(registry: &CombinationRegistry) {
    for id in registry.ids() {
        let record = registry.get(id).unwrap();
        let mut covered = BTreeSet::new();
        for daughter in record.daughters() {
            let child = registry.get(*daughter).unwrap();
            assert_eq!(child.parent(), Some(id));
            for index in child.indices() {
                assert!(covered.insert(*index), "daughters overlap in {}", registry.describe(id));
            }
        }
        if !record.is_final_state() {
            assert_eq!(covered, record.content());
        }
    }
}

// Builds a left-nested chain ((0, 1), 2), ... following `order`.
fn chain(registry: &mut CombinationRegistry, order: &[usize]) -> CombinationId {
    let mut current = registry.final_state(order[0]);
    for index in &order[1..] {
        let leaf = registry.final_state(*index);
        current = registry.intern(None, &[current, leaf]).unwrap();
    }
    current
}

#[test]
fn unknown_parent_is_rejected() {
    let mut registry = CombinationRegistry::new();
    let a = registry.final_state(0);
    let b = registry.final_state(1);
    let result = registry.intern(Some(CombinationId::from_raw(42)), &[a, b]);
    assert!(matches!(
        result,
        Err(PwaError::Combination(info)) if info.code == "unknown-combination"
    ));
}

#[test]
fn explicit_parent_is_recorded() {
    let mut registry = CombinationRegistry::new();
    let order = [0, 1, 2];
    let top = chain(&mut registry, &order);
    let a = registry.final_state(0);
    let b = registry.final_state(1);
    let linked = registry.intern(Some(top), &[a, b]).unwrap();
    assert_eq!(registry.get(linked).unwrap().parent(), Some(top));
    assert_eq!(registry.get(top).unwrap().daughters()[0], linked);
}

proptest! {
    #[test]
    fn interning_is_idempotent_and_parent_linked(order in Just(vec![0usize, 1, 2, 3, 4]).prop_shuffle()) {
        let mut registry = CombinationRegistry::new();
        let first = chain(&mut registry, &order);
        let size = registry.len();
        let second = chain(&mut registry, &order);
        prop_assert_eq!(first, second);
        prop_assert_eq!(registry.len(), size);
        check_parent_links(&registry);
    }

    #[test]
    fn permuted_chains_share_content_only(order in Just(vec![0usize, 1, 2, 3]).prop_shuffle()) {
        let mut registry = CombinationRegistry::new();
        let reference = chain(&mut registry, &[0, 1, 2, 3]);
        let permuted = chain(&mut registry, &order);
        prop_assert!(Equiv::OrderlessContent.equivalent(&registry, reference, permuted));
        prop_assert_eq!(
            Equiv::Down.equivalent(&registry, reference, permuted),
            order == vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn hash_is_stable_under_rebuild(order in Just(vec![0usize, 1, 2, 3]).prop_shuffle()) {
        let mut first = CombinationRegistry::new();
        chain(&mut first, &order);
        let mut second = CombinationRegistry::new();
        chain(&mut second, &order);
        prop_assert_eq!(canonical_hash(&first), canonical_hash(&second));
    }
}
