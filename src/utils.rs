//! Small helpers shared across the crate.
use ahash::{AHashMap, AHashSet};
use fixedbitset::FixedBitSet;

/// A bit set over the 256 possible byte values.
pub(crate) type ByteSet = FixedBitSet;

pub(crate) fn byte_set() -> ByteSet {
    FixedBitSet::with_capacity(u8::MAX as usize + 1)
}

/// Classifies a dense DFA state after a transition.
///
/// A state rejects when it is dead or quit. It accepts when the input consumed
/// so far is a full match; dense DFAs delay match signaling by one transition,
/// so the end-of-input successor is what must be tested.
macro_rules! dispatch_by_dfa_state_status {
    ($dfa_state:ident, $dfa:ident,
     accept=>$accept:block,
     reject=>$reject:block,
     in_progress=>$in_progress:block) => {
        if $dfa.is_special_state($dfa_state)
            && ($dfa.is_dead_state($dfa_state) || $dfa.is_quit_state($dfa_state))
        {
            $reject
        } else if $dfa.is_match_state($dfa.next_eoi_state($dfa_state)) {
            $accept
        } else {
            $in_progress
        }
    };
}
pub(crate) use dispatch_by_dfa_state_status;

pub(crate) fn get_display_form_from_bitset(bitset: &FixedBitSet) -> Vec<usize> {
    bitset.ones().collect()
}

pub(crate) fn get_deterministic_display_form_from_hash_set<T, U: Ord>(
    set: &AHashSet<T>,
    process: impl FnMut(&T) -> U,
) -> Vec<U> {
    let mut a: Vec<U> = set.iter().map(process).collect();
    a.sort();
    a
}

pub(crate) fn get_deterministic_display_form_from_hash_map<K, V, U: Ord + Clone, Y>(
    map: &AHashMap<K, V>,
    process: impl FnMut((&K, &V)) -> (U, Y),
) -> Vec<(U, Y)> {
    let mut a: Vec<(U, Y)> = map.iter().map(process).collect();
    a.sort_by_cached_key(|(k, _)| k.clone());
    a
}
