// SPDX-License-Identifier: Apache-2.0
//! Node records.

use crate::target::Targets;

/// One node of a bundle: its hash, its target pair, and the two
/// enumeration results.
///
/// The hash length is fixed per bundle and owned by the containing
/// [`Bundle`](crate::Bundle); a record in a hashless bundle carries an
/// empty hash. `component` and `generation` are zero until the
/// enumeration stage assigns them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    /// Node hash, `hash_len` bytes.
    pub hash: Box<[u8]>,
    /// Outgoing-edge references.
    pub targets: Targets,
    /// Connected-component id, `0` = unassigned.
    pub component: u32,
    /// Longest-path-to-a-sink length, `0` = unassigned.
    pub generation: u32,
}

impl NodeRecord {
    /// Builds a record with unassigned enumeration fields.
    #[must_use]
    pub fn new(hash: Box<[u8]>, targets: Targets) -> Self {
        Self {
            hash,
            targets,
            component: 0,
            generation: 0,
        }
    }

    /// Returns `true` if the node's target set is defined.
    #[must_use]
    pub fn is_known(&self) -> bool {
        !self.targets.is_unknown()
    }
}
