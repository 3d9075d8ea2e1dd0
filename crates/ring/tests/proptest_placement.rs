//! Property-based invariants for ring placement over arbitrary node sets
//! and keys.

use proptest::collection::{hash_set, vec};
use proptest::prelude::*;
use ring_placement::Ring;

fn node_ids() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

proptest! {
    /// `get_node` always names one of the nodes that was added.
    #[test]
    fn get_node_always_returns_an_added_node(
        ids in hash_set(node_ids(), 1..8),
        key in vec(any::<u8>(), 0..64),
    ) {
        let mut ring = Ring::new(32);
        for id in &ids {
            ring.add_node(id.clone());
        }

        let owner = ring.get_node(&key).unwrap();
        prop_assert!(ids.iter().any(|id| id == owner));
    }

    /// `get_nodes` never returns more entries than distinct nodes on the
    /// ring, and never repeats a node id.
    #[test]
    fn get_nodes_is_bounded_and_distinct(
        ids in hash_set(node_ids(), 1..8),
        key in vec(any::<u8>(), 0..64),
        max in 1usize..16,
    ) {
        let mut ring = Ring::new(32);
        for id in &ids {
            ring.add_node(id.clone());
        }

        let result = ring.get_nodes(&key, max).unwrap();
        prop_assert!(result.len() <= max);
        prop_assert!(result.len() <= ids.len());

        let mut sorted = result.clone();
        sorted.sort_unstable();
        sorted.dedup();
        prop_assert_eq!(sorted.len(), result.len());
    }

    /// Removing every added node returns the ring to the empty state.
    #[test]
    fn removing_all_nodes_empties_the_ring(
        ids in hash_set(node_ids(), 1..8),
    ) {
        let mut ring = Ring::new(32);
        for id in &ids {
            ring.add_node(id.clone());
        }
        for id in &ids {
            ring.remove_node(id);
        }
        prop_assert_eq!(ring.node_count(), 0);
        prop_assert!(ring.get_node(b"any-key").is_err());
    }
}
