// SPDX-License-Identifier: Apache-2.0
//! The bundle container: an owning aggregate for one hash DAG.
//!
//! A bundle owns its node array, the pre-compaction target-hash arena, the
//! post-compaction extra-edge table, the 256-entry fanout table, and the
//! set of hashes referenced but never defined. At most one of the
//! target-hash arena and the extra-edge table is populated at a time.
//!
//! Bundles are created empty and carry no backing allocation until data
//! arrives. The transformation stages (`sort`, `dedup`, `fill_fanout`,
//! `compact`, `enumerate`) each restore the container invariants at their
//! boundary; [`Bundle::organize`](crate::Bundle::organize) runs them all.

use crate::error::BundleError;
use crate::node::NodeRecord;
use crate::target::{Target, Targets, INDEX_LIMIT};

/// Number of entries in the fanout table, one per first-byte value.
pub const FANOUT_LEN: usize = 256;

/// A self-contained hash DAG.
///
/// `hash_len` is fixed at construction; `0` marks a hashless bundle, a
/// transient form used when only topology matters (edge inversion
/// scratch graphs). Hashless bundles cannot be searched or filed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub(crate) hash_len: u16,
    pub(crate) nodes: Vec<NodeRecord>,
    pub(crate) nodes_fanout: [u32; FANOUT_LEN],
    /// Target hashes referenced by indirect ranges, populated only before
    /// compaction. One slot per referenced hash, in reference order.
    pub(crate) target_hashes: Vec<Box<[u8]>>,
    /// Target node indices for nodes with more than two edges, populated
    /// only after compaction.
    pub(crate) extra_edges: Vec<u32>,
    /// Hashes referenced as targets but never defined, sorted and unique.
    pub(crate) unknown_hashes: Vec<Box<[u8]>>,
}

impl Bundle {
    /// Creates an empty bundle for hashes of `hash_len` bytes.
    #[must_use]
    pub fn new(hash_len: u16) -> Self {
        Self {
            hash_len,
            nodes: Vec::new(),
            nodes_fanout: [0; FANOUT_LEN],
            target_hashes: Vec::new(),
            extra_edges: Vec::new(),
            unknown_hashes: Vec::new(),
        }
    }

    /// Reassembles an organized bundle from its parts, as decoded from a
    /// stored bundle image.
    ///
    /// The parts must describe an organized bundle: sorted unique nodes,
    /// a consistent fanout, compacted targets, assigned enumeration
    /// fields, and a sorted unknown set whose hashes resolve to unknown
    /// nodes.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::InvalidFormat`] naming the first violated
    /// invariant, or [`BundleError::Invalid`] when a size bound is
    /// exceeded.
    pub fn from_parts(
        hash_len: u16,
        nodes: Vec<NodeRecord>,
        nodes_fanout: [u32; FANOUT_LEN],
        extra_edges: Vec<u32>,
        unknown_hashes: Vec<Box<[u8]>>,
    ) -> Result<Self, BundleError> {
        if hash_len == 0 {
            return Err(BundleError::invalid_format(
                "stored bundles are never hashless",
            ));
        }
        if nodes.len() as u64 >= u64::from(INDEX_LIMIT)
            || extra_edges.len() as u64 >= u64::from(INDEX_LIMIT)
        {
            return Err(BundleError::Invalid {
                reason: "node or edge count limit exceeded",
            });
        }
        let expected = hash_len as usize;
        if nodes.iter().any(|node| node.hash.len() != expected)
            || unknown_hashes.iter().any(|hash| hash.len() != expected)
        {
            return Err(BundleError::invalid_format("hash of unexpected length"));
        }
        let bundle = Self {
            hash_len,
            nodes,
            nodes_fanout,
            target_hashes: Vec::new(),
            extra_edges,
            unknown_hashes,
        };
        bundle.check_organized()?;
        Ok(bundle)
    }

    /// Hash length in bytes; `0` for a hashless bundle.
    #[must_use]
    pub fn hash_len(&self) -> u16 {
        self.hash_len
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the bundle has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the node at `index` when it exists.
    #[must_use]
    pub fn node(&self, index: u32) -> Option<&NodeRecord> {
        self.nodes.get(index as usize)
    }

    /// All nodes, in storage order.
    #[must_use]
    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }

    /// The fanout table.
    #[must_use]
    pub fn fanout(&self) -> &[u32; FANOUT_LEN] {
        &self.nodes_fanout
    }

    /// The extra-edge table (node indices), populated after compaction.
    #[must_use]
    pub fn extra_edges(&self) -> &[u32] {
        &self.extra_edges
    }

    /// Hashes referenced as targets but never defined, sorted and unique.
    #[must_use]
    pub fn unknown_hashes(&self) -> &[Box<[u8]>] {
        &self.unknown_hashes
    }

    /// Number of slots in the pre-compaction target-hash arena.
    #[must_use]
    pub fn target_hash_count(&self) -> usize {
        self.target_hashes.len()
    }

    /// Target pair of the node at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[must_use]
    pub fn targets(&self, index: u32) -> Targets {
        self.nodes[index as usize].targets
    }

    /// Number of outgoing edges of the node at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[must_use]
    pub fn target_count(&self, index: u32) -> u32 {
        self.nodes[index as usize].targets.count()
    }

    /// Node index of the `slot`-th target of the node at `index`.
    ///
    /// Valid only after compaction, when every target is either a direct
    /// node index or an indirect position in the extra-edge table.
    ///
    /// # Panics
    ///
    /// Panics if `index` or `slot` is out of bounds, or if the node still
    /// carries pre-compaction hash targets.
    #[must_use]
    pub fn target_node_idx(&self, index: u32, slot: u32) -> u32 {
        let targets = self.nodes[index as usize].targets;
        assert!(slot < targets.count(), "target slot out of range");
        match (slot, targets.first, targets.last) {
            (_, Target::Indirect(first), _) => {
                assert!(
                    self.target_hashes.is_empty(),
                    "target node indices are unavailable before compaction"
                );
                self.extra_edges[(first + slot) as usize]
            }
            (0, Target::Direct(node_idx), _) | (1, _, Target::Direct(node_idx)) => node_idx,
            _ => unreachable!("slot bound already checked against the target count"),
        }
    }

    /// Hash of the `slot`-th target of the node at `index`.
    ///
    /// Before compaction indirect slots resolve through the target-hash
    /// arena; afterwards every slot resolves through the referenced node's
    /// record.
    ///
    /// # Panics
    ///
    /// Panics if `index` or `slot` is out of bounds.
    #[must_use]
    pub fn target_node_hash(&self, index: u32, slot: u32) -> &[u8] {
        let targets = self.nodes[index as usize].targets;
        if let Some((first, last)) = targets.indirect_range() {
            assert!(first + slot <= last, "target slot out of range");
            let position = (first + slot) as usize;
            if self.target_hashes.is_empty() {
                &self.nodes[self.extra_edges[position] as usize].hash
            } else {
                &self.target_hashes[position]
            }
        } else {
            &self.nodes[self.target_node_idx(index, slot) as usize].hash
        }
    }

    /// Looks up a node by hash.
    ///
    /// Uses a fanout-bucketed binary search when the fanout table is
    /// filled, a full binary search over the sorted node array otherwise.
    /// Returns `None` on a miss, on a hashless bundle, and when `hash` has
    /// the wrong length. Results are meaningful only once the bundle is
    /// sorted.
    #[must_use]
    pub fn find_node_idx(&self, hash: &[u8]) -> Option<u32> {
        if self.nodes.is_empty() || self.hash_len == 0 || hash.len() != self.hash_len as usize {
            return None;
        }
        let (low, high) = if self.fanout_filled() {
            let bucket = hash[0] as usize;
            let low = if bucket == 0 {
                0
            } else {
                self.nodes_fanout[bucket - 1] as usize
            };
            (low, self.nodes_fanout[bucket] as usize)
        } else {
            (0, self.nodes.len())
        };
        self.nodes[low..high]
            .binary_search_by(|node| node.hash.as_ref().cmp(hash))
            .ok()
            .map(|position| (low + position) as u32)
    }

    /// Returns `true` once [`fill_fanout`](Bundle::fill_fanout) has run on
    /// the current node array.
    #[must_use]
    pub fn fanout_filled(&self) -> bool {
        !self.nodes.is_empty() && self.nodes_fanout[FANOUT_LEN - 1] as usize == self.nodes.len()
    }

    /// Fills the fanout table over the sorted node array.
    ///
    /// `nodes_fanout[b]` becomes the number of nodes whose first hash byte
    /// is at most `b`. A single pass walks a byte cursor alongside the
    /// nodes.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Invalid`] on a hashless bundle or when the
    /// nodes are not sorted.
    pub fn fill_fanout(&mut self) -> Result<(), BundleError> {
        if self.hash_len == 0 {
            return Err(BundleError::Invalid {
                reason: "hashless bundles have no fanout",
            });
        }
        if !self.is_sorted() {
            return Err(BundleError::Invalid {
                reason: "fanout requires sorted nodes",
            });
        }
        let mut byte = 0usize;
        for (index, node) in self.nodes.iter().enumerate() {
            let first = node.hash[0] as usize;
            while byte < first {
                self.nodes_fanout[byte] = index as u32;
                byte += 1;
            }
        }
        for entry in &mut self.nodes_fanout[byte..] {
            *entry = self.nodes.len() as u32;
        }
        Ok(())
    }

    /// Returns `true` if nodes are in non-decreasing hash order.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.nodes
            .windows(2)
            .all(|pair| pair[0].hash <= pair[1].hash)
    }

    /// Returns `true` if nodes are in strictly increasing hash order,
    /// the state sort and dedup leave behind.
    #[must_use]
    pub fn is_sorted_and_deduped(&self) -> bool {
        self.nodes
            .windows(2)
            .all(|pair| pair[0].hash < pair[1].hash)
    }

    /// Trims every backing allocation to its exact size.
    pub fn deflate(&mut self) {
        self.nodes.shrink_to_fit();
        self.target_hashes.shrink_to_fit();
        self.extra_edges.shrink_to_fit();
        self.unknown_hashes.shrink_to_fit();
    }

    /// Checks the invariants an organized bundle must satisfy: sorted
    /// unique nodes, a filled fanout, compacted targets with in-bounds
    /// references, assigned enumeration fields, and a consistent
    /// unknown-hash set.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::InvalidFormat`] naming the first violated
    /// invariant.
    pub fn check_organized(&self) -> Result<(), BundleError> {
        if !self.target_hashes.is_empty() {
            return Err(BundleError::invalid_format(
                "organized bundle still carries target hashes",
            ));
        }
        if self.is_empty() {
            if !self.extra_edges.is_empty() || !self.unknown_hashes.is_empty() {
                return Err(BundleError::invalid_format(
                    "empty bundle carries auxiliary data",
                ));
            }
            return Ok(());
        }
        if !self.is_sorted_and_deduped() {
            return Err(BundleError::invalid_format(
                "nodes are not sorted and unique",
            ));
        }
        if !self.fanout_filled() || !self.fanout_consistent() {
            return Err(BundleError::invalid_format("fanout table is inconsistent"));
        }
        if self.unknown_hashes.len() >= self.nodes.len() {
            return Err(BundleError::invalid_format(
                "bundle consists solely of unknown nodes",
            ));
        }
        let node_count = self.nodes.len() as u32;
        let extra_count = self.extra_edges.len() as u32;
        for (index, node) in self.nodes.iter().enumerate() {
            self.check_compacted_targets(index, node, node_count, extra_count)?;
            if node.generation == 0 || node.component == 0 {
                return Err(BundleError::invalid_format(format!(
                    "node {index} has unassigned enumeration fields"
                )));
            }
        }
        if let Some(edge) = self.extra_edges.iter().find(|&&edge| edge >= node_count) {
            return Err(BundleError::invalid_format(format!(
                "extra edge references node {edge} out of {node_count}"
            )));
        }
        for pair in self.unknown_hashes.windows(2) {
            if pair[0] >= pair[1] {
                return Err(BundleError::invalid_format(
                    "unknown hashes are not sorted and unique",
                ));
            }
        }
        for hash in &self.unknown_hashes {
            let found = self
                .find_node_idx(hash)
                .is_some_and(|idx| !self.nodes[idx as usize].is_known());
            if !found {
                return Err(BundleError::invalid_format(format!(
                    "unknown hash {} has no matching unknown node",
                    hex::encode(hash)
                )));
            }
        }
        Ok(())
    }

    fn fanout_consistent(&self) -> bool {
        let monotonic = self
            .nodes_fanout
            .windows(2)
            .all(|pair| pair[0] <= pair[1]);
        monotonic && self.nodes_fanout[FANOUT_LEN - 1] as usize == self.nodes.len()
    }

    fn check_compacted_targets(
        &self,
        index: usize,
        node: &NodeRecord,
        node_count: u32,
        extra_count: u32,
    ) -> Result<(), BundleError> {
        let bad = |reason: &str| {
            Err(BundleError::invalid_format(format!(
                "node {index}: {reason}"
            )))
        };
        match (node.targets.first, node.targets.last) {
            (Target::Unknown, Target::Unknown) | (Target::Absent, Target::Absent) => Ok(()),
            (Target::Direct(a), Target::Absent) if a < node_count => Ok(()),
            (Target::Direct(a), Target::Direct(b)) if a < node_count && b < node_count => Ok(()),
            (Target::Indirect(first), Target::Indirect(last)) => {
                if first > last {
                    bad("inverted extra-edge range")
                } else if last >= extra_count {
                    bad("extra-edge range out of bounds")
                } else {
                    Ok(())
                }
            }
            _ => bad("illegal target pair"),
        }
    }

    /// Appends a node, enforcing the bundle size bound.
    pub(crate) fn push_node(&mut self, node: NodeRecord) -> Result<(), BundleError> {
        if self.nodes.len() as u64 >= u64::from(INDEX_LIMIT) {
            return Err(BundleError::Invalid {
                reason: "node count limit exceeded",
            });
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Appends a target hash to the arena, enforcing the size bound.
    pub(crate) fn push_target_hash(&mut self, hash: Box<[u8]>) -> Result<u32, BundleError> {
        if self.target_hashes.len() as u64 >= u64::from(INDEX_LIMIT) {
            return Err(BundleError::Invalid {
                reason: "target hash count limit exceeded",
            });
        }
        let position = self.target_hashes.len() as u32;
        self.target_hashes.push(hash);
        Ok(position)
    }

    /// Returns `true` if `hash` is recorded as referenced-but-undefined.
    #[must_use]
    pub fn unknown_contains(&self, hash: &[u8]) -> bool {
        self.unknown_hashes
            .binary_search_by(|candidate| candidate.as_ref().cmp(hash))
            .is_ok()
    }
}
