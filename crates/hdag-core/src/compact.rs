// SPDX-License-Identifier: Apache-2.0
//! Compaction: resolving target hashes into node indices.
//!
//! After sort and dedup every target hash has exactly one matching node,
//! so hash references can be replaced by index references. Nodes with one
//! or two edges store the indices inline; larger edge sets spill into a
//! contiguous block of the extra-edge table. The target-hash arena is
//! dropped afterwards.

use crate::bundle::Bundle;
use crate::error::BundleError;
use crate::target::Targets;

impl Bundle {
    /// Replaces every target-hash reference with a node-index reference.
    ///
    /// Requires a sorted, deduped bundle with a filled fanout and an empty
    /// extra-edge table. Every target hash must resolve to a node; a miss
    /// means the synthetic-placeholder invariant of ingest was broken.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Invalid`] on a violated precondition or an
    /// unresolvable target hash.
    pub fn compact(&mut self) -> Result<(), BundleError> {
        if !self.extra_edges.is_empty() {
            return Err(BundleError::Invalid {
                reason: "bundle is already compacted",
            });
        }
        if !self.is_sorted_and_deduped() {
            return Err(BundleError::Invalid {
                reason: "compaction requires a sorted, deduped bundle",
            });
        }
        if self.target_hashes.is_empty() {
            // Nothing references the arena; the bundle is trivially compact.
            return Ok(());
        }

        let mut extra_edges: Vec<u32> = Vec::new();
        let mut updates: Vec<(usize, Targets)> = Vec::new();
        for index in 0..self.nodes.len() {
            let Some((first, last)) = self.nodes[index].targets.indirect_range() else {
                continue;
            };
            let count = last - first + 1;
            let resolve = |slot: u32| -> Result<u32, BundleError> {
                let hash = &self.target_hashes[(first + slot) as usize];
                self.find_node_idx(hash).ok_or(BundleError::Invalid {
                    reason: "target hash has no matching node",
                })
            };
            let targets = match count {
                1 => Targets::one(resolve(0)?),
                2 => Targets::two(resolve(0)?, resolve(1)?),
                _ => {
                    let start = extra_edges.len() as u32;
                    for slot in 0..count {
                        extra_edges.push(resolve(slot)?);
                    }
                    Targets::indirect(start, start + count - 1)
                }
            };
            updates.push((index, targets));
        }
        for (index, targets) in updates {
            self.nodes[index].targets = targets;
        }
        self.target_hashes = Vec::new();
        self.extra_edges = extra_edges;
        Ok(())
    }
}
