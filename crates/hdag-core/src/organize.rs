// SPDX-License-Identifier: Apache-2.0
//! Sorting, deduplication, and the organize pipeline.
//!
//! Sorting orders nodes lexicographically by hash and each node's slice of
//! the target-hash arena ascending. Dedup then collapses duplicate edges
//! within a node and duplicate nodes across the array, verifying that
//! nodes sharing a hash agree on their known target sets. Organize runs
//! the whole pipeline: sort, dedup, fanout, compact, enumerate, deflate.

use crate::bundle::Bundle;
use crate::error::BundleError;
use crate::target::Targets;

impl Bundle {
    /// Sorts nodes by hash and each indirect node's target-hash slice.
    ///
    /// Node order does not disturb the arena, so indirect ranges stay
    /// valid. Sorting is forbidden once targets reference node or
    /// extra-edge indices: reordering would leave them stale.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Invalid`] when index targets are live.
    pub fn sort(&mut self) -> Result<(), BundleError> {
        self.ensure_hash_targets("cannot sort once targets reference indices")?;
        let Self {
            nodes,
            target_hashes,
            ..
        } = self;
        for node in nodes.iter_mut() {
            if let Some((first, last)) = node.targets.indirect_range() {
                target_hashes[first as usize..=last as usize].sort_unstable();
            }
        }
        nodes.sort_unstable_by(|a, b| a.hash.cmp(&b.hash));
        Ok(())
    }

    /// Collapses duplicate edges, then duplicate nodes.
    ///
    /// Edge dedup shrinks each indirect node's arena slice in place,
    /// dropping runs of equal adjacent hashes. Node dedup keeps one
    /// representative per run of equal hashes: the first node with known
    /// targets if any exists, otherwise the run's first node, whose hash
    /// is recorded as referenced-but-undefined. Known nodes within a run
    /// must agree on their target sets.
    ///
    /// Edge dedup runs first so that per-node slices are canonical before
    /// cross-node equality is tested.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Invalid`] when the bundle is unsorted or
    /// index targets are live, and [`BundleError::NodeConflict`] when two
    /// known nodes share a hash but differ in content.
    pub fn dedup(&mut self) -> Result<(), BundleError> {
        self.ensure_hash_targets("cannot dedup once targets reference indices")?;
        if !self.is_sorted() {
            return Err(BundleError::Invalid {
                reason: "dedup requires sorted nodes",
            });
        }
        self.dedup_edges();
        self.dedup_nodes()
    }

    /// Runs the full pipeline: sort, dedup, fanout fill, compact,
    /// enumerate, deflate.
    ///
    /// # Errors
    ///
    /// Propagates the first stage failure; the bundle is then in the
    /// failed stage's intermediate state and should be discarded.
    pub fn organize(&mut self) -> Result<(), BundleError> {
        self.organize_with_context(&[])
    }

    /// Runs the full pipeline, validating known nodes against read-only
    /// context bundles between dedup and compaction.
    ///
    /// A known node whose hash is also known to a context bundle must
    /// carry the same target set there; a mismatch fails the whole
    /// organization. Context bundles are consulted, never modified.
    ///
    /// # Errors
    ///
    /// As [`organize`](Bundle::organize), plus
    /// [`BundleError::NodeConflict`] on disagreement with a context
    /// bundle.
    pub fn organize_with_context(&mut self, context: &[&Bundle]) -> Result<(), BundleError> {
        self.sort()?;
        self.dedup()?;
        self.check_context(context)?;
        self.fill_fanout()?;
        self.compact()?;
        self.enumerate()?;
        self.deflate();
        Ok(())
    }

    /// Compares the target sets of `self.nodes[index]` and
    /// `other.nodes[other_index]` hash-wise.
    ///
    /// Both nodes' target lists must already be in their canonical sorted
    /// order, which holds for deduped and for organized bundles.
    pub(crate) fn targets_match(&self, index: u32, other: &Bundle, other_index: u32) -> bool {
        let count = self.target_count(index);
        if count != other.target_count(other_index) {
            return false;
        }
        (0..count).all(|slot| {
            self.target_node_hash(index, slot) == other.target_node_hash(other_index, slot)
        })
    }

    fn ensure_hash_targets(&self, reason: &'static str) -> Result<(), BundleError> {
        let index_targets_live = !self.extra_edges.is_empty()
            || (self.target_hashes.is_empty()
                && self
                    .nodes
                    .iter()
                    .any(|node| node.targets.first.is_direct() || node.targets.first.is_indirect()));
        if index_targets_live {
            return Err(BundleError::Invalid { reason });
        }
        Ok(())
    }

    fn dedup_edges(&mut self) {
        let Self {
            nodes,
            target_hashes,
            ..
        } = self;
        for node in nodes.iter_mut() {
            let Some((first, last)) = node.targets.indirect_range() else {
                continue;
            };
            let (first, last) = (first as usize, last as usize);
            let mut write = first;
            for read in (first + 1)..=last {
                if target_hashes[read] != target_hashes[write] {
                    write += 1;
                    target_hashes.swap(write, read);
                }
            }
            node.targets = Targets::indirect(first as u32, write as u32);
        }
    }

    fn dedup_nodes(&mut self) -> Result<(), BundleError> {
        self.unknown_hashes.clear();
        let node_count = self.nodes.len();
        let mut out = 0usize;
        let mut run_start = 0usize;
        while run_start < node_count {
            let mut run_end = run_start + 1;
            while run_end < node_count && self.nodes[run_end].hash == self.nodes[run_start].hash {
                run_end += 1;
            }
            let mut kept: Option<usize> = None;
            for index in run_start..run_end {
                if !self.nodes[index].is_known() {
                    continue;
                }
                match kept {
                    None => kept = Some(index),
                    Some(previous) => {
                        if !self.targets_match(previous as u32, self, index as u32) {
                            return Err(BundleError::NodeConflict {
                                hash: self.nodes[index].hash.clone(),
                            });
                        }
                    }
                }
            }
            if kept.is_none() {
                // Runs arrive in ascending hash order, so the unknown set
                // ends up sorted and unique without a separate pass.
                self.unknown_hashes
                    .push(self.nodes[run_start].hash.clone());
            }
            self.nodes.swap(out, kept.unwrap_or(run_start));
            out += 1;
            run_start = run_end;
        }
        self.nodes.truncate(out);
        Ok(())
    }

    fn check_context(&self, context: &[&Bundle]) -> Result<(), BundleError> {
        if context.is_empty() {
            return Ok(());
        }
        for index in 0..self.nodes.len() as u32 {
            if !self.nodes[index as usize].is_known() {
                continue;
            }
            let hash = &self.nodes[index as usize].hash;
            for other in context {
                let Some(other_index) = other.find_node_idx(hash) else {
                    continue;
                };
                let other_known = other
                    .node(other_index)
                    .is_some_and(crate::node::NodeRecord::is_known);
                if other_known && !self.targets_match(index, other, other_index) {
                    return Err(BundleError::NodeConflict { hash: hash.clone() });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
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

    fn ingest(nodes: Vec<SourceNode>) -> Bundle {
        let mut source = VecSource::new(1, nodes);
        Bundle::ingest(&mut source).unwrap()
    }

    #[test]
    fn sort_orders_nodes_and_target_slices() {
        let mut bundle = ingest(vec![node(9, &[7, 3, 5]), node(1, &[])]);
        bundle.sort().unwrap();
        assert!(bundle.is_sorted());
        let owner = bundle.find_node_idx(&[9]).unwrap();
        assert_eq!(bundle.target_node_hash(owner, 0), &[3]);
        assert_eq!(bundle.target_node_hash(owner, 1), &[5]);
        assert_eq!(bundle.target_node_hash(owner, 2), &[7]);
    }

    #[test]
    fn duplicate_edges_collapse() {
        // One record listing 02 02 03 03 03 04 keeps each target once.
        let mut bundle = ingest(vec![node(1, &[2, 2, 3, 3, 3, 4])]);
        bundle.sort().unwrap();
        bundle.dedup().unwrap();
        let owner = bundle.find_node_idx(&[1]).unwrap();
        assert_eq!(bundle.target_count(owner), 3);
        assert_eq!(bundle.target_node_hash(owner, 0), &[2]);
        assert_eq!(bundle.target_node_hash(owner, 1), &[3]);
        assert_eq!(bundle.target_node_hash(owner, 2), &[4]);
    }

    #[test]
    fn known_node_wins_over_synthetic_placeholder() {
        // 02 appears as a target of 01 and as a source of its own.
        let mut bundle = ingest(vec![node(1, &[2]), node(2, &[3])]);
        bundle.sort().unwrap();
        bundle.dedup().unwrap();
        assert_eq!(bundle.len(), 3);
        let two = bundle.find_node_idx(&[2]).unwrap();
        assert!(bundle.nodes()[two as usize].is_known());
        assert_eq!(bundle.target_count(two), 1);
        // 03 was only ever a target.
        assert_eq!(bundle.unknown_hashes().len(), 1);
        assert!(bundle.unknown_contains(&[3]));
    }

    #[test]
    fn agreeing_duplicate_records_collapse() {
        let mut bundle = ingest(vec![node(1, &[2, 3]), node(1, &[3, 2])]);
        bundle.sort().unwrap();
        bundle.dedup().unwrap();
        let one = bundle.find_node_idx(&[1]).unwrap();
        assert_eq!(bundle.target_count(one), 2);
    }

    #[test]
    fn conflicting_duplicate_records_fail() {
        let mut bundle = ingest(vec![node(1, &[2]), node(1, &[3])]);
        bundle.sort().unwrap();
        let err = bundle.dedup().unwrap_err();
        match err {
            BundleError::NodeConflict { hash } => assert_eq!(hash.as_ref(), &[1]),
            other => panic!("expected NodeConflict, got {other}"),
        }
    }

    #[test]
    fn dedup_is_idempotent() {
        let mut bundle = ingest(vec![node(1, &[2, 2, 3]), node(2, &[3]), node(1, &[2, 3])]);
        bundle.sort().unwrap();
        bundle.dedup().unwrap();
        let once = bundle.clone();
        bundle.dedup().unwrap();
        assert_eq!(bundle, once);
    }

    #[test]
    fn sort_rejects_compacted_bundles() {
        let mut bundle = ingest(vec![node(1, &[2])]);
        bundle.organize().unwrap();
        assert!(matches!(bundle.sort(), Err(BundleError::Invalid { .. })));
    }

    #[test]
    fn context_conflict_fails_organization() {
        let mut existing = ingest(vec![node(1, &[2])]);
        existing.organize().unwrap();

        let mut incoming = ingest(vec![node(1, &[3])]);
        let err = incoming.organize_with_context(&[&existing]).unwrap_err();
        assert!(matches!(err, BundleError::NodeConflict { .. }));
    }

    #[test]
    fn context_agreement_passes() {
        let mut existing = ingest(vec![node(1, &[2])]);
        existing.organize().unwrap();

        let mut incoming = ingest(vec![node(1, &[2]), node(4, &[])]);
        incoming.organize_with_context(&[&existing]).unwrap();
        assert_eq!(incoming.len(), 3);
    }
}
