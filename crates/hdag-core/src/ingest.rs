// SPDX-License-Identifier: Apache-2.0
//! Building an unsorted bundle from a node source.

use crate::bundle::Bundle;
use crate::error::BundleError;
use crate::node::NodeRecord;
use crate::source::NodeSource;
use crate::target::Targets;

impl Bundle {
    /// Drains `source` into a fresh, unsorted bundle.
    ///
    /// Every target hash is appended to the target-hash arena and also
    /// mirrored as a synthetic node with an unknown target set, so every
    /// hash mentioned anywhere is a node record from the start. The later
    /// sort and dedup collapse the duplicates, preferring nodes whose
    /// targets are known over the synthetic placeholders. A source node
    /// with targets receives an indirect range over its arena slice; one
    /// without receives the no-edges pair.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Invalid`] for a zero hash length or when a
    /// size bound is hit, [`BundleError::InvalidFormat`] when the source
    /// produces a hash of the wrong length, and propagates source errors.
    /// On error the partially built bundle is discarded.
    pub fn ingest(source: &mut dyn NodeSource) -> Result<Self, BundleError> {
        let hash_len = source.hash_len();
        if hash_len == 0 {
            return Err(BundleError::Invalid {
                reason: "cannot ingest into a hashless bundle",
            });
        }
        let mut bundle = Bundle::new(hash_len);
        while let Some(node) = source.next()? {
            check_len(&node.hash, hash_len)?;
            let first = bundle.target_hash_count() as u32;
            for target in &node.targets {
                check_len(target, hash_len)?;
                bundle.push_target_hash(target.clone())?;
                bundle.push_node(NodeRecord::new(target.clone(), Targets::UNKNOWN))?;
            }
            let targets = if node.targets.is_empty() {
                Targets::ABSENT
            } else {
                Targets::indirect(first, bundle.target_hash_count() as u32 - 1)
            };
            bundle.push_node(NodeRecord::new(node.hash, targets))?;
        }
        Ok(bundle)
    }
}

fn check_len(hash: &[u8], hash_len: u16) -> Result<(), BundleError> {
    if hash.len() == hash_len as usize {
        Ok(())
    } else {
        Err(BundleError::invalid_format(format!(
            "hash {} is {} bytes, expected {hash_len}",
            hex::encode(hash),
            hash.len(),
        )))
    }
}
