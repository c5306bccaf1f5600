use pwa_core::CombinationId;

/// Converts a [`CombinationId`] into its index within the registry arena.
pub(crate) fn combination_index(id: CombinationId) -> usize {
    id.as_raw() as usize
}

/// Creates a [`CombinationId`] from an arena index.
pub(crate) fn make_combination(index: usize) -> CombinationId {
    CombinationId::from_raw(index as u32)
}
