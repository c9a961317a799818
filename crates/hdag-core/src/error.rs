// SPDX-License-Identifier: Apache-2.0
//! Error type shared by the bundle pipeline.

use std::io;

use thiserror::Error;

/// Errors surfaced by bundle construction and transformation.
///
/// `NodeConflict` and `GraphCycle` are terminal for the organization that
/// raised them: the bundle being produced is discarded and the operation is
/// never retried internally.
#[derive(Debug, Error)]
pub enum BundleError {
    /// Allocation or I/O resource failure while feeding the pipeline.
    #[error("resource failure: {0}")]
    Resource(#[from] io::Error),

    /// Malformed input (text records, node sources, on-disk images).
    #[error("invalid format: {reason}")]
    InvalidFormat {
        /// Human-readable description of the malformation.
        reason: String,
    },

    /// Two nodes share a hash but disagree on their known target sets.
    #[error("conflicting target sets for node {}", hex::encode(.hash))]
    NodeConflict {
        /// Hash of the node whose content conflicted.
        hash: Box<[u8]>,
    },

    /// A directed cycle was found while enumerating generations.
    #[error("cycle through node {}", hex::encode(.hash))]
    GraphCycle {
        /// Hash of a node on the offending cycle.
        hash: Box<[u8]>,
    },

    /// A caller-side precondition was violated.
    #[error("precondition violated: {reason}")]
    Invalid {
        /// Which precondition failed.
        reason: &'static str,
    },
}

impl BundleError {
    /// Convenience constructor for [`BundleError::InvalidFormat`].
    pub fn invalid_format(reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            reason: reason.into(),
        }
    }
}
