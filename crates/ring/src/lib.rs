#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `ring-placement` maps block keys to the physical storage nodes that
//! should hold replicas of them, using consistent hashing with virtual
//! nodes so that adding or removing a node remaps only the keys that
//! land on that node's own ring positions.
//!
//! # Design
//!
//! [`Ring`] keeps a sorted `Vec` of [`RingEntry`] rather than the
//! circular linked list a systems-language original might reach for; a
//! binary search finds the first entry at or after a key's hash, and
//! wrap-around at the end of the ring is a modular index instead of a
//! pointer chase.
//!
//! # Invariants
//!
//! - Entries are kept sorted by hash at all times.
//! - [`Ring::remove_node`] removes all `V` virtual entries a node owns.
//! - [`Ring::get_nodes`] returns distinct physical node ids only, in
//!   ring-walk order, up to `min(max, node_count)`.
//!
//! # Examples
//!
//! ```
//! use ring_placement::Ring;
//!
//! let mut ring = Ring::new(150);
//! ring.add_node("node-a");
//! ring.add_node("node-b");
//! let owner = ring.get_node(b"some-key").unwrap();
//! assert!(owner == "node-a" || owner == "node-b");
//! ```

mod murmur3;

use wire::DistfsError;

/// One position a physical node contributes to the ring.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RingEntry {
    hash: u32,
    node_id: String,
}

/// A consistent-hash ring of virtual node positions.
///
/// Not `Send + Sync` on its own; callers share one ring guarded by a
/// single mutex around both reads and writes, matching the rest of the
/// storage node's locking policy for cluster-wide shared state.
#[derive(Debug, Clone)]
pub struct Ring {
    entries: Vec<RingEntry>,
    virtual_nodes: u32,
}

impl Ring {
    /// Default number of virtual entries each physical node contributes.
    pub const DEFAULT_VIRTUAL_NODES: u32 = 150;

    /// Creates an empty ring with `virtual_nodes` positions per node.
    #[must_use]
    pub fn new(virtual_nodes: u32) -> Self {
        Self {
            entries: Vec::new(),
            virtual_nodes,
        }
    }

    /// Number of distinct physical nodes currently in the ring.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.distinct_node_ids().len()
    }

    fn distinct_node_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.iter().map(|e| e.node_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Inserts `virtual_nodes` ring positions for `node_id`. Calling this
    /// again for a node already present leaves the ring unchanged.
    pub fn add_node(&mut self, node_id: impl Into<String>) {
        let node_id = node_id.into();
        if self.entries.iter().any(|e| e.node_id == node_id) {
            tracing::warn!(node_id, "add_node called for a node already on the ring");
            return;
        }

        for i in 0..self.virtual_nodes {
            let key = format!("{node_id}:{i}");
            let hash = murmur3::murmur3_32(key.as_bytes(), 0);
            let idx = self.entries.partition_point(|e| e.hash < hash);
            self.entries.insert(
                idx,
                RingEntry {
                    hash,
                    node_id: node_id.clone(),
                },
            );
        }
    }

    /// Removes every virtual entry belonging to `node_id`.
    pub fn remove_node(&mut self, node_id: &str) {
        self.entries.retain(|e| e.node_id != node_id);
    }

    /// Returns the physical node id owning `key_bytes`: the node at the
    /// first ring entry whose hash is `>=` the key's hash, wrapping to
    /// the first entry if none qualifies.
    ///
    /// # Errors
    ///
    /// Returns [`DistfsError::NotFound`] if the ring has no entries.
    pub fn get_node(&self, key_bytes: &[u8]) -> Result<&str, DistfsError> {
        if self.entries.is_empty() {
            return Err(DistfsError::NotFound("ring has no nodes".to_owned()));
        }
        let hash = murmur3::murmur3_32(key_bytes, 0);
        let idx = self.entries.partition_point(|e| e.hash < hash);
        let idx = if idx == self.entries.len() { 0 } else { idx };
        Ok(self.entries[idx].node_id.as_str())
    }

    /// Returns up to `max` distinct physical node ids, walking the ring
    /// forward from `key_bytes`'s position.
    ///
    /// # Errors
    ///
    /// Returns [`DistfsError::NotFound`] if the ring has no entries.
    pub fn get_nodes(&self, key_bytes: &[u8], max: usize) -> Result<Vec<&str>, DistfsError> {
        if self.entries.is_empty() {
            return Err(DistfsError::NotFound("ring has no nodes".to_owned()));
        }
        let hash = murmur3::murmur3_32(key_bytes, 0);
        let start = self.entries.partition_point(|e| e.hash < hash);
        let start = if start == self.entries.len() { 0 } else { start };

        let mut result: Vec<&str> = Vec::new();
        for i in 0..self.entries.len() {
            if result.len() >= max {
                break;
            }
            let entry = &self.entries[(start + i) % self.entries.len()];
            if !result.contains(&entry.node_id.as_str()) {
                result.push(entry.node_id.as_str());
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_returns_not_found() {
        let ring = Ring::new(150);
        assert!(matches!(
            ring.get_node(b"key"),
            Err(DistfsError::NotFound(_))
        ));
    }

    #[test]
    fn single_node_owns_every_key() {
        let mut ring = Ring::new(150);
        ring.add_node("node-a");
        assert_eq!(ring.get_node(b"anything").unwrap(), "node-a");
        assert_eq!(ring.get_node(b"something-else").unwrap(), "node-a");
    }

    #[test]
    fn get_nodes_returns_min_of_max_and_node_count() {
        let mut ring = Ring::new(150);
        ring.add_node("a");
        ring.add_node("b");
        ring.add_node("c");

        let nodes = ring.get_nodes(b"key", 10).unwrap();
        assert_eq!(nodes.len(), 3);

        let nodes = ring.get_nodes(b"key", 2).unwrap();
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn get_nodes_returns_distinct_ids() {
        let mut ring = Ring::new(150);
        ring.add_node("a");
        ring.add_node("b");
        ring.add_node("c");

        let nodes = ring.get_nodes(b"some-block-key", 3).unwrap();
        let mut sorted = nodes.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), nodes.len());
    }

    #[test]
    fn removing_a_node_preserves_relative_order_of_the_rest() {
        let mut ring = Ring::new(150);
        ring.add_node("a");
        ring.add_node("b");
        ring.add_node("c");

        let before = ring.get_nodes(b"fixed-key", 3).unwrap();
        let removed = before[0];
        ring.remove_node(removed);

        let after = ring.get_nodes(b"fixed-key", 2).unwrap();
        let expected: Vec<&str> = before.into_iter().filter(|n| *n != removed).collect();
        assert_eq!(after, expected);
    }

    #[test]
    fn removing_the_only_node_yields_an_empty_ring() {
        let mut ring = Ring::new(150);
        ring.add_node("solo");
        ring.remove_node("solo");

        assert_eq!(ring.node_count(), 0);
        assert!(matches!(
            ring.get_node(b"key"),
            Err(DistfsError::NotFound(_))
        ));
    }

    #[test]
    fn adding_the_same_node_twice_leaves_the_ring_unchanged() {
        let mut ring = Ring::new(150);
        ring.add_node("a");
        let before = ring.entries.clone();
        ring.add_node("a");
        assert_eq!(ring.entries, before);
    }

    #[test]
    fn entries_stay_sorted_by_hash() {
        let mut ring = Ring::new(150);
        ring.add_node("a");
        ring.add_node("b");
        ring.add_node("c");
        let hashes: Vec<u32> = ring.entries.iter().map(|e| e.hash).collect();
        let mut sorted = hashes.clone();
        sorted.sort_unstable();
        assert_eq!(hashes, sorted);
    }
}
