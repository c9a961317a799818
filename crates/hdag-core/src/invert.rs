// SPDX-License-Identifier: Apache-2.0
//! Edge inversion: building the reverse-edge bundle.
//!
//! Inversion runs in linear passes over a compacted bundle. The first
//! pass counts each node's inverted out-degree (its in-degree in the
//! source), using the scratch `generation` field of the output records.
//! The second pass turns counts into extra-edge ranges for nodes with
//! more than two edges. The third re-traverses the source edges and
//! writes each reversed edge into its destination slot, counting the
//! scratch field back down to zero.

use crate::bundle::Bundle;
use crate::error::BundleError;
use crate::node::NodeRecord;
use crate::target::{Target, Targets};

impl Bundle {
    /// Produces a bundle with the same node set and reversed edges.
    ///
    /// The node array keeps its order, so the output of a sorted, deduped
    /// source is itself sorted and deduped, and it is compacted by
    /// construction. With `hashless` set the output carries no hashes at
    /// all, a cheap scratch form for purely topological work such as the
    /// connected-component walk.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Invalid`] when the bundle still carries
    /// pre-compaction hash targets.
    pub fn invert(&self, hashless: bool) -> Result<Bundle, BundleError> {
        if !self.target_hashes.is_empty() {
            return Err(BundleError::Invalid {
                reason: "inversion requires a compacted bundle",
            });
        }
        let node_count = self.nodes.len();
        let mut inverted = Bundle::new(if hashless { 0 } else { self.hash_len });

        // Pass 1: allocate records and count inverted out-degrees.
        inverted.nodes = self
            .nodes
            .iter()
            .map(|node| {
                let hash: Box<[u8]> = if hashless {
                    Box::default()
                } else {
                    node.hash.clone()
                };
                NodeRecord::new(hash, Targets::ABSENT)
            })
            .collect();
        for index in 0..node_count as u32 {
            for slot in 0..self.target_count(index) {
                let target = self.target_node_idx(index, slot) as usize;
                inverted.nodes[target].generation += 1;
            }
        }

        // Pass 2: carve extra-edge ranges for nodes with three or more
        // edges; one- and two-edge nodes fill their inline slots later.
        let mut offset = 0u32;
        for node in &mut inverted.nodes {
            let count = node.generation;
            if count > 2 {
                node.targets = Targets::indirect(offset, offset + count - 1);
                offset += count;
            }
        }
        inverted.extra_edges = vec![0u32; offset as usize];

        // Pass 3: emit each reversed edge into its destination slot. The
        // scratch count tracks the remaining free slots of each node.
        for index in 0..node_count as u32 {
            for slot in 0..self.target_count(index) {
                let target = self.target_node_idx(index, slot) as usize;
                let record = &mut inverted.nodes[target];
                if let Some((first, last)) = record.targets.indirect_range() {
                    let filled = (last - first + 1) - record.generation;
                    inverted.extra_edges[(first + filled) as usize] = index;
                } else if record.targets.first.is_absent() {
                    record.targets.first = Target::direct(index);
                } else {
                    record.targets.last = Target::direct(index);
                }
                record.generation -= 1;
            }
        }

        if !hashless {
            inverted.nodes_fanout = self.nodes_fanout;
        }
        Ok(inverted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::source::{SourceNode, VecSource};

    fn node(hash: u8, targets: &[u8]) -> SourceNode {
        SourceNode {
            hash: Box::from([hash].as_slice()),
            targets: targets
                .iter()
                .map(|&byte| Box::from([byte].as_slice()))
                .collect(),
        }
    }

    fn organized(nodes: Vec<SourceNode>) -> Bundle {
        let mut source = VecSource::new(1, nodes);
        let mut bundle = Bundle::ingest(&mut source).unwrap();
        bundle.organize().unwrap();
        bundle
    }

    #[test]
    fn path_reverses() {
        // 02 -> 01 -> 00 becomes 00 -> 01 -> 02.
        let bundle = organized(vec![node(2, &[1]), node(1, &[0])]);
        let inverted = bundle.invert(false).unwrap();
        assert_eq!(inverted.len(), 3);
        let zero = inverted.find_node_idx(&[0]).unwrap();
        let one = inverted.find_node_idx(&[1]).unwrap();
        let two = inverted.find_node_idx(&[2]).unwrap();
        assert_eq!(inverted.targets(zero), Targets::one(one));
        assert_eq!(inverted.targets(one), Targets::one(two));
        assert!(inverted.targets(two).is_absent());
    }

    #[test]
    fn fan_in_becomes_fan_out() {
        // 00, 01, 02 each point at 03; inverted, 03 points at all three.
        let bundle = organized(vec![
            node(0, &[3]),
            node(1, &[3]),
            node(2, &[3]),
        ]);
        let inverted = bundle.invert(false).unwrap();
        let three = inverted.find_node_idx(&[3]).unwrap();
        assert_eq!(inverted.target_count(three), 3);
        assert!(inverted.targets(three).is_indirect());
        let mut targets: Vec<u8> = (0..3)
            .map(|slot| inverted.target_node_hash(three, slot)[0])
            .collect();
        targets.sort_unstable();
        assert_eq!(targets, vec![0, 1, 2]);
        for hash in [[0u8], [1u8], [2u8]] {
            let index = inverted.find_node_idx(&hash).unwrap();
            assert!(inverted.targets(index).is_absent());
        }
    }

    #[test]
    fn scratch_counters_return_to_zero() {
        let bundle = organized(vec![node(0, &[1, 2, 3]), node(1, &[2])]);
        let inverted = bundle.invert(true).unwrap();
        assert!(inverted.nodes().iter().all(|n| n.generation == 0));
        assert!(inverted.nodes().iter().all(|n| n.component == 0));
    }

    #[test]
    fn hashless_output_has_no_hashes() {
        let bundle = organized(vec![node(0, &[1])]);
        let inverted = bundle.invert(true).unwrap();
        assert_eq!(inverted.hash_len(), 0);
        assert!(inverted.nodes().iter().all(|n| n.hash.is_empty()));
    }

    #[test]
    fn involution_restores_topology() {
        let bundle = organized(vec![node(0, &[1, 2, 3]), node(1, &[3]), node(2, &[3])]);
        let twice = bundle.invert(false).unwrap().invert(false).unwrap();
        assert_eq!(twice.len(), bundle.len());
        for index in 0..bundle.len() as u32 {
            let mut original: Vec<u32> = (0..bundle.target_count(index))
                .map(|slot| bundle.target_node_idx(index, slot))
                .collect();
            let mut roundtrip: Vec<u32> = (0..twice.target_count(index))
                .map(|slot| twice.target_node_idx(index, slot))
                .collect();
            original.sort_unstable();
            roundtrip.sort_unstable();
            assert_eq!(original, roundtrip);
        }
    }
}
